use scraper::{ElementRef, Selector};

use super::selector;

/// What a rule reads from the element it matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extract {
    /// The element's text, whitespace-collapsed.
    Text,
    /// The value of the named attribute.
    Attr(&'static str),
    /// The value of the named attribute with a leading prefix removed.
    AttrWithoutPrefix(&'static str, &'static str),
}

/// One way of reading a field: a selector plus what to take from its first match.
#[derive(Debug, Clone)]
pub struct FieldRule {
    selector: Selector,
    extract: Extract,
}

impl FieldRule {
    pub fn text(css: &'static str) -> Self {
        Self {
            selector: selector(css),
            extract: Extract::Text,
        }
    }

    pub fn attr(css: &'static str, name: &'static str) -> Self {
        Self {
            selector: selector(css),
            extract: Extract::Attr(name),
        }
    }

    /// Like [`FieldRule::attr`], but strips `prefix` (e.g. `tel:`) before the
    /// emptiness check, so a bare prefix falls through to the next rule.
    pub fn attr_without_prefix(
        css: &'static str,
        name: &'static str,
        prefix: &'static str,
    ) -> Self {
        Self {
            selector: selector(css),
            extract: Extract::AttrWithoutPrefix(name, prefix),
        }
    }

    /// Apply to the first element under `scope` matching the selector (in
    /// document order). Blank results count as no match.
    pub fn apply(&self, scope: ElementRef<'_>) -> Option<String> {
        let element = scope.select(&self.selector).next()?;
        let value = match self.extract {
            Extract::Text => element_text(element),
            Extract::Attr(name) => element.value().attr(name)?.trim().to_string(),
            Extract::AttrWithoutPrefix(name, prefix) => {
                let raw = element.value().attr(name)?.trim();
                raw.strip_prefix(prefix).unwrap_or(raw).trim().to_string()
            }
        };
        (!value.is_empty()).then_some(value)
    }
}

/// Prioritized rules for one field. The first rule that yields a value wins.
#[derive(Debug, Clone)]
pub struct FieldRules(Vec<FieldRule>);

impl FieldRules {
    pub fn new(rules: Vec<FieldRule>) -> Self {
        Self(rules)
    }

    pub fn first(&self, scope: ElementRef<'_>) -> Option<String> {
        self.0.iter().find_map(|rule| rule.apply(scope))
    }
}

impl From<FieldRule> for FieldRules {
    fn from(rule: FieldRule) -> Self {
        Self(vec![rule])
    }
}

/// Element text with runs of whitespace collapsed to single spaces.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
