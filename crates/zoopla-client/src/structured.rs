//! JSON-LD extraction from raw HTML.
//!
//! Listing sites embed schema.org metadata in
//! `<script type="application/ld+json">` elements. Each script body may hold
//! a single object or an array of objects; every object becomes one
//! [`StructuredBlock`]. Bodies that are not valid JSON are skipped.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde_json::{Map, Value};

use crate::parser::selector;

static JSON_LD: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"script[type="application/ld+json"]"#));

/// One JSON-LD object, tagged by its `@type`.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredBlock(Map<String, Value>);

impl StructuredBlock {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// The block's `@type` values. Handles both `"Offer"` and `["Offer", "Product"]`.
    pub fn types(&self) -> Vec<&str> {
        match self.0.get("@type") {
            Some(Value::String(t)) => vec![t.as_str()],
            Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// True if any of the block's types is in `allowed`.
    pub fn has_type(&self, allowed: &[&str]) -> bool {
        self.types().iter().any(|t| allowed.contains(t))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Follow nested object keys. Any missing step or non-object yields `None`.
    pub fn path(&self, keys: &[&str]) -> Option<&Value> {
        let (first, rest) = keys.split_first()?;
        rest.iter().try_fold(self.0.get(*first)?, |value, key| value.get(*key))
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Scan a raw HTML page for JSON-LD blocks.
pub fn scan(html: &str) -> impl Iterator<Item = StructuredBlock> + use<> {
    scan_document(&Html::parse_document(html))
}

/// Scan an already-parsed document for JSON-LD blocks.
///
/// Script bodies are copied out up front so the returned iterator does not
/// borrow the document.
pub fn scan_document(document: &Html) -> impl Iterator<Item = StructuredBlock> + use<> {
    let bodies: Vec<String> = document
        .select(&JSON_LD)
        .map(|script| script.text().collect::<String>())
        .collect();

    bodies
        .into_iter()
        .filter_map(|body| decode(&body))
        .flat_map(into_blocks)
}

fn decode(body: &str) -> Option<Value> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str(body) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(error = %e, "Skipping malformed JSON-LD block");
            None
        }
    }
}

fn into_blocks(value: Value) -> Vec<StructuredBlock> {
    match value {
        Value::Object(fields) => vec![StructuredBlock::new(fields)],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(fields) => Some(StructuredBlock::new(fields)),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
