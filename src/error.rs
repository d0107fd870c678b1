//! Error types and the public rejection shape

use std::fmt;
use thiserror::Error;

/// Result type for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Internal errors raised by transports, the token store and URL handling.
///
/// These never reach callers of [`crate::Client`] directly; the request
/// orchestrator converts them into an [`ApiError`] at the public boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Network error before any response was received
    #[error("Network error: {message} (code: {code})")]
    Network {
        /// Transport specific error code, `-1` when unknown
        code: i64,
        /// Error message
        message: String,
    },

    /// Timeout error
    #[error("Request timed out")]
    Timeout,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Classification of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request could not be built (bad URL, body or header)
    InvalidRequest,
    /// The transport failed before a response existed
    Network,
    /// The transport did not answer within the configured timeout
    Timeout,
    /// Redirects kept coming after the hop limit was reached
    RedirectLoop,
    /// The body was empty or whitespace
    EmptyResponse,
    /// The response declared a non-JSON content type
    NonJsonResponse,
    /// The body was a redirect placeholder page
    RedirectPage,
    /// The body was an HTML document
    HtmlResponse,
    /// The body could not be parsed as the expected JSON
    ParseError,
    /// The server answered with a 4xx/5xx status
    Http,
    /// An authenticated request was rejected with 401; the session was cleared
    AuthExpired,
}

impl ErrorKind {
    /// Stable name of the kind, suitable for logs and diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "InvalidRequest",
            ErrorKind::Network => "NetworkError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::RedirectLoop => "RedirectLoopError",
            ErrorKind::EmptyResponse => "EmptyResponse",
            ErrorKind::NonJsonResponse => "NonJsonResponse",
            ErrorKind::RedirectPage => "RedirectPage",
            ErrorKind::HtmlResponse => "HtmlResponse",
            ErrorKind::ParseError => "ParseError",
            ErrorKind::Http => "HttpError",
            ErrorKind::AuthExpired => "AuthExpiredError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured rejection returned by every [`crate::Client`] request.
///
/// `status_code` is the HTTP status when a response was received and `0`
/// otherwise. `message` is never empty. `raw_snippet` holds the first
/// [`crate::classify::SNIPPET_LIMIT`] characters of the body, or is empty
/// when there was no body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message} (status: {status_code})")]
pub struct ApiError {
    /// What went wrong
    pub kind: ErrorKind,
    /// HTTP status, `0` when no response was received
    pub status_code: u16,
    /// Human readable description
    pub message: String,
    /// Leading part of the response body
    pub raw_snippet: String,
}

impl ApiError {
    /// Create a new error
    pub fn new(
        kind: ErrorKind,
        status_code: u16,
        message: impl Into<String>,
        raw_snippet: impl Into<String>,
    ) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            format!("{kind} (HTTP {status_code})")
        } else {
            message
        };
        Self {
            kind,
            status_code,
            message,
            raw_snippet: raw_snippet.into(),
        }
    }

    /// The forced-logout error raised for a 401 on an authenticated request
    pub(crate) fn auth_expired(raw_snippet: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::AuthExpired,
            401,
            "Session expired. Please sign in again.",
            raw_snippet,
        )
    }

    /// Whether the server rejected the credentials
    pub fn is_unauthorized(&self) -> bool {
        self.status_code == 401
    }

    /// Whether the server rate limited the request
    pub fn is_rate_limited(&self) -> bool {
        self.status_code == 429
    }

    /// Whether the server reported a 5xx status
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status_code)
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        match error {
            Error::Timeout => ApiError::new(
                ErrorKind::Timeout,
                0,
                "The request timed out. Please try again.",
                "",
            ),
            Error::Network { message, .. } => ApiError::new(
                ErrorKind::Network,
                0,
                format!("Could not reach the server: {message}"),
                "",
            ),
            Error::InvalidUrl(url) => {
                ApiError::new(ErrorKind::InvalidRequest, 0, format!("Invalid URL: {url}"), "")
            }
            Error::Json(e) => ApiError::new(
                ErrorKind::InvalidRequest,
                0,
                format!("Request body could not be encoded: {e}"),
                "",
            ),
            other @ (Error::Io(_) | Error::Config(_) | Error::Internal(_)) => {
                ApiError::new(ErrorKind::InvalidRequest, 0, other.to_string(), "")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_have_no_status() {
        let err = ApiError::from(Error::Timeout);
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert_eq!(err.status_code, 0);
        assert!(!err.message.is_empty());

        let err = ApiError::from(Error::Network {
            code: -1,
            message: "connection refused".to_string(),
        });
        assert_eq!(err.kind, ErrorKind::Network);
        assert!(err.message.contains("connection refused"));
    }

    #[test]
    fn blank_message_is_filled_in() {
        let err = ApiError::new(ErrorKind::Http, 503, "  ", "");
        assert_eq!(err.message, "HttpError (HTTP 503)");
        assert!(err.is_server_error());
    }

    #[test]
    fn display_includes_kind_and_status() {
        let err = ApiError::new(ErrorKind::HtmlResponse, 404, "endpoint not found", "<html>");
        assert_eq!(
            err.to_string(),
            "HtmlResponse: endpoint not found (status: 404)"
        );
    }
}
