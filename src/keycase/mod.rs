//! Key-case translation between the wire format and in-process records.
//!
//! The Zscaler APIs name fields in lowerCamelCase, with a handful of
//! irregular acronyms (`routableIP`, `nameL10nTag`) that a plain rule gets
//! wrong in one direction or the other. [`KeyCaseTranslator`] consults an
//! override table first and falls back to the rule for everything else.
//! Only mapping keys are rewritten; values pass through untouched.

use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Irregular `(snake_case, camelCase)` pairs the rule cannot derive.
pub const IRREGULAR_KEYS: &[(&str, &str)] = &[
    ("routable_ip", "routableIP"),
    ("surrogate_ip", "surrogateIP"),
    (
        "surrogate_ip_enforced_for_known_browsers",
        "surrogateIPEnforcedForKnownBrowsers",
    ),
    ("name_l10n_tag", "nameL10nTag"),
    ("is_name_l10n_tag", "isNameL10nTag"),
];

static DEFAULT_TRANSLATOR: Lazy<KeyCaseTranslator> = Lazy::new(KeyCaseTranslator::default);

/// Returns the process-wide translator built from [`IRREGULAR_KEYS`].
pub fn default_translator() -> &'static KeyCaseTranslator {
    &DEFAULT_TRANSLATOR
}

/// Converts every mapping key in `value` to wire case using the default table.
pub fn to_wire(value: Value) -> Value {
    DEFAULT_TRANSLATOR.to_wire(value)
}

/// Converts every mapping key in `value` from wire case using the default table.
pub fn from_wire(value: Value) -> Value {
    DEFAULT_TRANSLATOR.from_wire(value)
}

/// Bidirectional key translator with an irregular-key override table.
#[derive(Debug, Clone)]
pub struct KeyCaseTranslator {
    to_wire: HashMap<String, String>,
    from_wire: HashMap<String, String>,
}

impl Default for KeyCaseTranslator {
    fn default() -> Self {
        IRREGULAR_KEYS
            .iter()
            .fold(Self::empty(), |t, (snake, camel)| t.with_override(*snake, *camel))
    }
}

impl KeyCaseTranslator {
    /// Creates a translator with no overrides; only the rule applies.
    pub fn empty() -> Self {
        Self {
            to_wire: HashMap::new(),
            from_wire: HashMap::new(),
        }
    }

    /// Adds an override pair. The pair applies in both directions.
    pub fn with_override(mut self, snake: impl Into<String>, camel: impl Into<String>) -> Self {
        self.insert(snake, camel);
        self
    }

    /// Adds an override pair in place.
    pub fn insert(&mut self, snake: impl Into<String>, camel: impl Into<String>) {
        let snake = snake.into();
        let camel = camel.into();
        self.to_wire.insert(snake.clone(), camel.clone());
        self.from_wire.insert(camel, snake);
    }

    /// Returns the override pairs as `(snake, camel)`.
    pub fn overrides(&self) -> impl Iterator<Item = (&str, &str)> {
        self.to_wire.iter().map(|(s, c)| (s.as_str(), c.as_str()))
    }

    /// Converts a single snake_case key to wire case.
    pub fn key_to_wire(&self, key: &str) -> String {
        match self.to_wire.get(key) {
            Some(camel) => camel.clone(),
            None => snake_to_camel(key),
        }
    }

    /// Converts a single wire-case key to snake_case.
    pub fn key_from_wire(&self, key: &str) -> String {
        match self.from_wire.get(key) {
            Some(snake) => snake.clone(),
            None => camel_to_snake(key),
        }
    }

    /// Rewrites every mapping key in the tree to wire case.
    pub fn to_wire(&self, value: Value) -> Value {
        rewrite_keys(value, &|k| self.key_to_wire(k))
    }

    /// Rewrites every mapping key in the tree to snake_case.
    pub fn from_wire(&self, value: Value) -> Value {
        rewrite_keys(value, &|k| self.key_from_wire(k))
    }
}

fn rewrite_keys(value: Value, convert: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (convert(&k), rewrite_keys(v, convert)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| rewrite_keys(v, convert)).collect())
        }
        other => other,
    }
}

/// Rule-only snake_case to lowerCamelCase conversion.
///
/// Leading underscores are kept, empty interior segments are dropped.
pub fn snake_to_camel(name: &str) -> String {
    let trimmed = name.trim_start_matches('_');
    let mut out = String::with_capacity(name.len());
    out.push_str(&name[..name.len() - trimmed.len()]);

    let mut segments = trimmed.split('_').filter(|s| !s.is_empty());
    if let Some(first) = segments.next() {
        out.push_str(&first.to_lowercase());
    }
    for segment in segments {
        let mut chars = segment.chars();
        if let Some(head) = chars.next() {
            out.extend(head.to_uppercase());
            out.push_str(&chars.as_str().to_lowercase());
        }
    }
    out
}

/// Rule-only lowerCamelCase to snake_case conversion.
pub fn camel_to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower);
            if boundary {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}
