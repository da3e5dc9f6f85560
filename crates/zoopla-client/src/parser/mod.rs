//! Page parsers: JSON-LD first, DOM selectors as a whole-page fallback.
//!
//! Every strategy maps allow-listed JSON-LD blocks to records. Only when that
//! yields nothing for the page are the DOM rules applied. The two phases are
//! never mixed field by field.

mod agent;
mod house_price;
mod property;
mod rules;

use scraper::{Html, Selector};
use serde_json::{Number, Value};
use zoopla_core::error::AppError;
use zoopla_core::models::{Coordinates, Record, RecordKind};
use zoopla_core::traits::RecordParser;

use crate::structured::{StructuredBlock, scan_document};

pub use agent::{AgentParser, parse_agent_listings};
pub use house_price::{HousePriceParser, parse_house_prices};
pub use property::{PropertyParser, parse_property_listings};
pub use rules::{FieldRule, FieldRules};

/// Dispatches to the strategy for a [`RecordKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageParser {
    Property(PropertyParser),
    Agent(AgentParser),
    HousePrice(HousePriceParser),
}

impl PageParser {
    pub fn for_kind(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Property => PageParser::Property(PropertyParser),
            RecordKind::Agent => PageParser::Agent(AgentParser),
            RecordKind::HousePrice => PageParser::HousePrice(HousePriceParser),
        }
    }
}

impl RecordParser for PageParser {
    fn kind(&self) -> RecordKind {
        match self {
            PageParser::Property(p) => p.kind(),
            PageParser::Agent(p) => p.kind(),
            PageParser::HousePrice(p) => p.kind(),
        }
    }

    fn parse(&self, html: &str) -> Vec<Record> {
        match self {
            PageParser::Property(p) => p.parse(html),
            PageParser::Agent(p) => p.parse(html),
            PageParser::HousePrice(p) => p.parse(html),
        }
    }
}

/// Compile a selector that is known at compile time.
pub(crate) fn selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css:?}: {e}"))
}

/// Run the two-phase strategy on one page.
///
/// `accept` picks allow-listed blocks and `map` turns each into a record; a
/// block that fails to map is logged and skipped. `fallback` runs against
/// the parsed document only if no block produced a record.
pub(crate) fn parse_two_phase<T>(
    html: &str,
    kind: RecordKind,
    accept: impl Fn(&StructuredBlock) -> bool,
    map: impl Fn(&StructuredBlock) -> Result<T, AppError>,
    fallback: impl FnOnce(&Html) -> Vec<T>,
) -> Vec<T> {
    let document = Html::parse_document(html);

    let records: Vec<T> = scan_document(&document)
        .filter(|block| accept(block))
        .filter_map(|block| match map(&block) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!(%kind, error = %e, "Failed to map JSON-LD block");
                None
            }
        })
        .collect();

    if !records.is_empty() {
        return records;
    }

    tracing::debug!(%kind, "No usable JSON-LD; falling back to DOM selectors");
    fallback(&document)
}

/// Extract a numeric price from display text like `"£705,000"`.
///
/// Every non-digit is dropped; text without digits (`"POA"`) or with more
/// digits than fit an `i64` yields `None`.
pub fn parse_price(raw: &str) -> Option<i64> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    match digits.parse() {
        Ok(price) => Some(price),
        Err(e) => {
            tracing::debug!(raw, error = %e, "Failed to parse price");
            None
        }
    }
}

/// A JSON-LD price: numbers pass through, numeric strings keep their value
/// and other strings are normalized like display text.
pub(crate) fn price_value(value: Option<&Value>) -> Result<Option<Number>, AppError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(Some(n.clone())),
        Some(Value::String(s)) => {
            let s = s.trim();
            if let Ok(n) = s.parse::<i64>() {
                return Ok(Some(n.into()));
            }
            if let Some(n) = s.parse::<f64>().ok().and_then(Number::from_f64) {
                return Ok(Some(n));
            }
            Ok(parse_price(s).map(Number::from))
        }
        Some(other) => Err(AppError::ParseError(format!(
            "price must be a number or string, got {other}"
        ))),
    }
}

/// A scalar rendered as text. Blank strings and non-scalars are absent.
pub(crate) fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Shorthand for `text_value` on an optional lookup.
pub(crate) fn text_at(value: Option<&Value>) -> Option<String> {
    value.and_then(text_value)
}

/// A count such as `numberOfRooms`: a number, a numeric string, or a
/// `QuantitativeValue` object carrying `value`.
pub(crate) fn count_value(value: Option<&Value>) -> Option<u32> {
    match value? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(obj) => count_value(obj.get("value")),
        _ => None,
    }
}

/// A postal address as one line: `streetAddress addressLocality postalCode`,
/// skipping empty parts. Plain string addresses are used as-is.
pub(crate) fn join_address(address: Option<&Value>) -> Option<String> {
    match address? {
        Value::Object(obj) => {
            let parts: Vec<String> = ["streetAddress", "addressLocality", "postalCode"]
                .iter()
                .filter_map(|key| obj.get(*key).and_then(text_value))
                .collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        }
        other => text_value(other),
    }
}

/// Coordinates from a `GeoCoordinates` object. Missing or empty geo data is
/// absent; a present geo object may still lack either half.
pub(crate) fn coordinates(geo: Option<&Value>) -> Option<Coordinates> {
    let geo = geo?.as_object().filter(|obj| !obj.is_empty())?;
    Some(Coordinates {
        latitude: geo.get("latitude").and_then(float_value),
        longitude: geo.get("longitude").and_then(float_value),
    })
}

fn float_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Image URLs from a string, an `ImageObject`, or an array of either.
pub(crate) fn image_urls(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(image_url).collect(),
        Some(other) => image_url(other).into_iter().collect(),
        None => Vec::new(),
    }
}

fn image_url(value: &Value) -> Option<String> {
    match value {
        Value::Object(obj) => text_at(obj.get("url")).or_else(|| text_at(obj.get("contentUrl"))),
        other => text_value(other),
    }
}

/// Feature labels from `amenityFeature`: strings, or objects with a `name`
/// (falling back to `value`).
pub(crate) fn feature_names(value: Option<&Value>) -> Vec<String> {
    let label = |v: &Value| match v {
        Value::Object(obj) => text_at(obj.get("name")).or_else(|| text_at(obj.get("value"))),
        other => text_value(other),
    };
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(label).collect(),
        Some(other) => label(other).into_iter().collect(),
        None => Vec::new(),
    }
}
