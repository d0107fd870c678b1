//! Shared types between backend implementations

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, header};
use url::Url;

/// Platform-agnostic HTTP request handed to a backend
#[derive(Debug, Clone)]
pub struct BackendRequest {
    /// HTTP method for the request
    pub method: Method,
    /// Fully resolved URL for the request
    pub url: Url,
    /// Headers for the request
    pub headers: HeaderMap,
    /// Optional body content
    pub body: Option<Bytes>,
}

impl BackendRequest {
    /// The same request aimed at another URL
    pub fn with_url(&self, url: Url) -> Self {
        Self {
            url,
            ..self.clone()
        }
    }
}

/// Platform-agnostic HTTP response.
///
/// Every backend produces this shape; nothing downstream can tell which
/// transport answered. Header lookups are case-insensitive.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body decoded as text
    pub body_text: String,
}

impl RawResponse {
    /// Create a response from its parts
    pub fn new(status: StatusCode, headers: HeaderMap, body_text: impl Into<String>) -> Self {
        Self {
            status,
            headers,
            body_text: body_text.into(),
        }
    }

    /// Get a header value as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The declared content type, if any
    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE.as_str())
    }

    /// The `Location` header, if any
    pub fn location(&self) -> Option<&str> {
        self.header(header::LOCATION.as_str())
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }

    /// Whether the status is one the redirect resolver follows
    pub fn is_redirect(&self) -> bool {
        matches!(
            self.status,
            StatusCode::MOVED_PERMANENTLY
                | StatusCode::FOUND
                | StatusCode::TEMPORARY_REDIRECT
                | StatusCode::PERMANENT_REDIRECT
        )
    }
}
