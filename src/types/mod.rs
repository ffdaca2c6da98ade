//! Shared response types.

use crate::errors::{ZscalerError, ZscalerResult};
use crate::resilience::parse_retry_after;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ops::Index;
use std::time::Duration;

static ABSENT: Value = Value::Null;

/// A translated JSON body addressable by snake_case keys.
///
/// Lookups of missing keys return `Value::Null` instead of failing, so a
/// partially populated response never poisons the whole request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Value);

impl Record {
    /// Wraps an already translated value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Returns the value under `key`, or `Null` when absent.
    pub fn get(&self, key: &str) -> &Value {
        self.0.get(key).unwrap_or(&ABSENT)
    }

    /// Returns true when `key` is present on a mapping.
    pub fn contains(&self, key: &str) -> bool {
        self.0.get(key).is_some()
    }

    /// Walks a dotted path; numeric segments index into sequences.
    pub fn path(&self, dotted: &str) -> &Value {
        dotted
            .split('.')
            .try_fold(&self.0, |current, segment| match current {
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                other => other.get(segment),
            })
            .unwrap_or(&ABSENT)
    }

    /// String value under `key`.
    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).as_str()
    }

    /// Integer value under `key`.
    pub fn i64(&self, key: &str) -> Option<i64> {
        self.get(key).as_i64()
    }

    /// Boolean value under `key`.
    pub fn bool(&self, key: &str) -> Option<bool> {
        self.get(key).as_bool()
    }

    /// Nested record under `key`.
    pub fn record(&self, key: &str) -> Option<Record> {
        match self.get(key) {
            Value::Null => None,
            value => Some(Record(value.clone())),
        }
    }

    /// Elements of a sequence body, each as a record.
    pub fn items(&self) -> Vec<Record> {
        match &self.0 {
            Value::Array(items) => items.iter().cloned().map(Record).collect(),
            _ => Vec::new(),
        }
    }

    /// Returns true when the body is `null`.
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// Borrows the underlying value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Unwraps the underlying value.
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Deserializes into a typed structure with snake_case field names.
    pub fn deserialize<T: DeserializeOwned>(&self) -> ZscalerResult<T> {
        T::deserialize(&self.0).map_err(|e| {
            ZscalerError::protocol(format!("Unexpected response shape: {}", e)).with_cause(e)
        })
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl Index<&str> for Record {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        self.get(key)
    }
}

/// Rate-limit headers as returned by the server.
///
/// Informational only; the client never throttles on these values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// `X-RateLimit-Limit`.
    pub limit: Option<u64>,
    /// `X-RateLimit-Remaining`.
    pub remaining: Option<u64>,
    /// `X-RateLimit-Reset`, as sent.
    pub reset: Option<String>,
    /// `Retry-After`, as a duration.
    pub retry_after: Option<Duration>,
}

impl RateLimitInfo {
    /// Extracts rate-limit headers; `None` when none are present.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
        };

        let info = Self {
            limit: text("x-ratelimit-limit").and_then(|v| v.parse().ok()),
            remaining: text("x-ratelimit-remaining").and_then(|v| v.parse().ok()),
            reset: text("x-ratelimit-reset"),
            retry_after: parse_retry_after(headers),
        };

        if info == Self::default() {
            None
        } else {
            Some(info)
        }
    }
}
