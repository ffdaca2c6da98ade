//! Tracing hooks and log redaction.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the application.

use crate::errors::ZscalerError;
use crate::types::RateLimitInfo;
use reqwest::header::HeaderMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Placeholder for redacted values.
pub const REDACTED: &str = "[REDACTED]";

/// Headers that carry credential material.
pub const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "auth-token",
    "cookie",
    "set-cookie",
];

/// Query parameters that carry credential material.
pub const SENSITIVE_QUERY_PARAMS: &[&str] = &["api_token"];

/// Redacts the value of a sensitive header.
pub fn redact_header(name: &str, value: &str) -> String {
    if SENSITIVE_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
        REDACTED.to_string()
    } else {
        value.to_string()
    }
}

/// Renders headers as `name: value` pairs with credentials redacted.
pub fn redact_headers(headers: &HeaderMap) -> Vec<String> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = value.to_str().unwrap_or("<binary>");
            format!("{}: {}", name, redact_header(name.as_str(), value))
        })
        .collect()
}

/// Redacts sensitive query parameters in a URL.
///
/// Unparseable input is returned as is.
pub fn redact_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };

    if !url
        .query_pairs()
        .any(|(k, _)| SENSITIVE_QUERY_PARAMS.contains(&k.as_ref()))
    {
        return raw.to_string();
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if SENSITIVE_QUERY_PARAMS.contains(&k.as_ref()) {
                REDACTED.to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), value)
        })
        .collect();

    url.query_pairs_mut().clear().extend_pairs(pairs);
    url.to_string()
}

/// Tracing hooks for client operations.
pub struct TracingHooks;

impl TracingHooks {
    /// Logs the start of an API request along with its per-call headers.
    pub fn on_request_start(method: &str, url: &str, headers: &HeaderMap) {
        debug!(
            method = %method,
            url = %redact_url(url),
            headers = ?redact_headers(headers),
            "Zscaler API request started"
        );
    }

    /// Logs the completion of an API request.
    pub fn on_request_complete(method: &str, url: &str, status: u16, duration: Duration) {
        info!(
            method = %method,
            url = %redact_url(url),
            status = status,
            duration_ms = duration.as_millis() as u64,
            "Zscaler API request completed"
        );
    }

    /// Logs a request error.
    pub fn on_request_error(method: &str, url: &str, error: &ZscalerError) {
        warn!(
            method = %method,
            url = %redact_url(url),
            error = %error,
            "Zscaler API request failed"
        );
    }

    /// Logs a scheduled retry.
    pub fn on_retry(label: &str, attempt: u32, delay: Duration, error: &ZscalerError) {
        warn!(
            request = %label,
            attempt = attempt,
            delay_ms = delay.as_millis() as u64,
            status = error.status_code(),
            "Retrying Zscaler API request"
        );
    }

    /// Logs rate-limit headers seen on a response.
    pub fn on_rate_limit(info: &RateLimitInfo) {
        debug!(
            limit = info.limit,
            remaining = info.remaining,
            reset = info.reset.as_deref().unwrap_or(""),
            "Rate limit headers received"
        );
    }

    /// Logs a completed login.
    pub fn on_session_built(product: &str, variant: &str) {
        info!(product = %product, credential = %variant, "Session established");
    }

    /// Logs a session refresh.
    pub fn on_session_refresh(product: &str, rebuilt: bool) {
        info!(product = %product, rebuilt = rebuilt, "Session refreshed");
    }

    /// Logs a session teardown.
    pub fn on_session_teardown(product: &str, remote: bool) {
        info!(product = %product, remote_logout = remote, "Session closed");
    }

    /// Logs a logout the server rejected because the session had already ended.
    pub fn on_session_already_closed(product: &str, error: &ZscalerError) {
        info!(
            product = %product,
            status = error.status_code(),
            "Session already closed on the server"
        );
    }

    /// Logs a paginator page fetch.
    pub fn on_page_fetch(path: &str, page: u32, items: usize) {
        debug!(path = %path, page = page, items = items, "Fetched page");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_redact_header() {
        assert_eq!(redact_header("Authorization", "Bearer token"), REDACTED);
        assert_eq!(redact_header("auth-token", "jwt"), REDACTED);
        assert_eq!(redact_header("Set-Cookie", "JSESSIONID=abc"), REDACTED);
        assert_eq!(redact_header("Content-Type", "application/json"), "application/json");
    }

    #[test]
    fn test_redact_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("JSESSIONID=abc"));
        headers.insert("x-request-id", HeaderValue::from_static("r-1"));

        let rendered = redact_headers(&headers);
        assert!(rendered.contains(&format!("cookie: {}", REDACTED)));
        assert!(rendered.contains(&"x-request-id: r-1".to_string()));
        assert!(!rendered.iter().any(|h| h.contains("abc")));
    }

    #[test]
    fn test_redact_url() {
        let redacted =
            redact_url("https://csbapi.zscaler.net/zscsb/submit?api_token=secret&force=1");
        assert!(!redacted.contains("secret"));
        assert!(redacted.contains("force=1"));

        let plain = "https://zsapi.zscaler.net/api/v1/users?page=2";
        assert_eq!(redact_url(plain), plain);
        assert_eq!(redact_url("not a url"), "not a url");
    }
}
