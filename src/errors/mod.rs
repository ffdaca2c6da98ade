//! Error types for the Zscaler client core.

use std::fmt;
use thiserror::Error;

/// Result type alias for Zscaler operations.
pub type ZscalerResult<T> = Result<T, ZscalerError>;

/// Maximum characters of a response body kept in the display message.
pub(crate) const MAX_ERROR_BODY_CHARS: usize = 200;

/// Error kinds for categorizing Zscaler errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZscalerErrorKind {
    /// Missing required credential, invalid URL, or unknown helper value.
    Configuration,
    /// Login returned non-2xx, or a session refresh failed.
    Authentication,
    /// Retry budget consumed after repeated transient failures.
    TransientExhausted,
    /// Non-2xx response that is not transient.
    Server,
    /// Response could not be parsed or had an unexpected shape.
    Protocol,
    /// The caller cancelled the operation.
    Cancelled,
    /// Obfuscation seed too short or otherwise malformed.
    Credential,
}

impl fmt::Display for ZscalerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Authentication => write!(f, "authentication"),
            Self::TransientExhausted => write!(f, "transient_exhausted"),
            Self::Server => write!(f, "server"),
            Self::Protocol => write!(f, "protocol"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Credential => write!(f, "credential"),
        }
    }
}

/// Zscaler API error with structured context.
#[derive(Error, Debug)]
pub struct ZscalerError {
    /// Error kind.
    kind: ZscalerErrorKind,
    /// One-line error message.
    message: String,
    /// HTTP status code.
    status_code: Option<u16>,
    /// Raw response body.
    body: Option<String>,
    /// Request path the error relates to.
    path: Option<String>,
    /// Attempt number (1-based) that produced the error.
    attempt: Option<u32>,
    /// Underlying cause.
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for ZscalerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(code) = self.status_code {
            write!(f, " (HTTP {})", code)?;
        }
        if let Some(ref path) = self.path {
            write!(f, " [path: {}]", path)?;
        }
        if let Some(attempt) = self.attempt {
            write!(f, " [attempt {}]", attempt)?;
        }
        Ok(())
    }
}

impl ZscalerError {
    /// Creates a new error.
    pub fn new(kind: ZscalerErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
            body: None,
            path: None,
            attempt: None,
            cause: None,
        }
    }

    /// Sets the HTTP status code.
    pub fn with_status(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Sets the response body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the request path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the attempt number.
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    /// Sets the underlying cause.
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Gets the error kind.
    pub fn kind(&self) -> ZscalerErrorKind {
        self.kind
    }

    /// Gets the message without context decorations.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Gets the HTTP status code.
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Gets the response body.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Gets the request path.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Gets the attempt number.
    pub fn attempt(&self) -> Option<u32> {
        self.attempt
    }

    /// Re-labels the error with a different kind, keeping every field.
    pub(crate) fn into_kind(mut self, kind: ZscalerErrorKind) -> Self {
        self.kind = kind;
        self
    }

    // Convenience constructors

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ZscalerErrorKind::Configuration, message)
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ZscalerErrorKind::Authentication, message)
    }

    /// Creates a server error from a non-transient response.
    pub fn server(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let message = if body.is_empty() {
            format!("HTTP {} error", status)
        } else {
            format!("HTTP {} error: {}", status, truncate_str(&body, MAX_ERROR_BODY_CHARS))
        };
        Self::new(ZscalerErrorKind::Server, message)
            .with_status(status)
            .with_body(body)
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ZscalerErrorKind::Protocol, message)
    }

    /// Creates a cancellation error.
    pub fn cancelled() -> Self {
        Self::new(ZscalerErrorKind::Cancelled, "Operation cancelled")
    }

    /// Creates a credential error.
    pub fn credential(message: impl Into<String>) -> Self {
        Self::new(ZscalerErrorKind::Credential, message)
    }
}

impl From<serde_json::Error> for ZscalerError {
    fn from(err: serde_json::Error) -> Self {
        ZscalerError::protocol(format!("Failed to parse JSON: {}", err)).with_cause(err)
    }
}

/// Truncates a string to at most `max_chars` characters on a valid UTF-8 boundary.
pub(crate) fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ZscalerError::server(404, r#"{"message":"not found"}"#)
            .with_path("/users/1")
            .with_attempt(1);

        let display = format!("{}", error);
        assert!(display.starts_with("[server]"));
        assert!(display.contains("HTTP 404"));
        assert!(display.contains("/users/1"));
        assert!(display.contains("attempt 1"));
        assert!(!display.contains('\n'));
    }

    #[test]
    fn test_server_error_keeps_full_body() {
        let body = "x".repeat(500);
        let error = ZscalerError::server(400, body.clone());

        assert_eq!(error.body(), Some(body.as_str()));
        assert!(error.message().len() < 300);
        assert_eq!(error.status_code(), Some(400));
    }

    #[test]
    fn test_into_kind_preserves_fields() {
        let error = ZscalerError::server(401, "denied")
            .with_path("/authenticatedSession")
            .into_kind(ZscalerErrorKind::Authentication);

        assert_eq!(error.kind(), ZscalerErrorKind::Authentication);
        assert_eq!(error.status_code(), Some(401));
        assert_eq!(error.body(), Some("denied"));
        assert_eq!(error.path(), Some("/authenticatedSession"));
    }

    #[test]
    fn test_json_error_is_protocol() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: ZscalerError = err.into();
        assert_eq!(error.kind(), ZscalerErrorKind::Protocol);
    }

    #[test]
    fn truncate_str_multibyte() {
        assert_eq!(truncate_str("héllo wörld", 5), "héllo");
        assert_eq!(truncate_str("", 10), "");
    }
}
