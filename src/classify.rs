//! Response classification
//!
//! Bodies are inspected before any JSON parse is attempted. The checks run in
//! a fixed order and stop at the first match.

use crate::backend::types::RawResponse;
use crate::error::{ApiError, ErrorKind};
use serde_json::Value;

/// Maximum number of characters kept in [`ApiError::raw_snippet`]
pub const SNIPPET_LIMIT: usize = 2000;

/// Maximum number of characters of a non-JSON error body used as message
const MESSAGE_LIMIT: usize = 200;

/// Phrases that identify a redirect placeholder page
const REDIRECT_PHRASES: &[&str] = &["redirecting", "moved permanently"];

/// Content types accepted as JSON
const JSON_TYPES: &[&str] = &["application/json", "text/json"];

/// Turn a raw response into its JSON payload or a typed failure
pub fn classify(response: &RawResponse) -> Result<Value, ApiError> {
    let status = response.status.as_u16();
    let body = response.body_text.trim();
    let fail = |kind, message: String| {
        Err(ApiError::new(kind, status, message, snippet(&response.body_text)))
    };

    if body.is_empty() {
        return fail(
            ErrorKind::EmptyResponse,
            format!("The server returned an empty response (HTTP {status})"),
        );
    }

    if let Some(content_type) = response.content_type() {
        if !is_json_media_type(content_type) {
            let message = if response.status.is_redirection() {
                format!(
                    "The server redirected (HTTP {status}) to a non-JSON response ({content_type})"
                )
            } else {
                format!("Expected JSON but received {content_type} (HTTP {status})")
            };
            return fail(ErrorKind::NonJsonResponse, message);
        }
    }

    if is_redirect_placeholder(body) {
        return fail(
            ErrorKind::RedirectPage,
            format!("The server returned a redirect page instead of data (HTTP {status})"),
        );
    }

    if is_html(body) {
        let message = match status {
            404 => "API endpoint not found (HTTP 404)".to_string(),
            500 => "The server returned an HTML error page (HTTP 500 server error)".to_string(),
            _ => format!("The server returned an HTML page instead of JSON (HTTP {status})"),
        };
        return fail(ErrorKind::HtmlResponse, message);
    }

    if status >= 400 {
        return fail(ErrorKind::Http, error_message(body, status));
    }

    serde_json::from_str(body).or_else(|e| {
        fail(
            ErrorKind::ParseError,
            format!("The response is not valid JSON: {e}"),
        )
    })
}

/// Whether a body is a redirect placeholder rather than real content.
///
/// JSON documents are never placeholders, whatever text they carry.
pub fn is_redirect_placeholder(body: &str) -> bool {
    let body = body.trim();
    if is_json_document(body) {
        return false;
    }
    let lower = body.to_lowercase();
    REDIRECT_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

fn is_json_document(body: &str) -> bool {
    (body.starts_with('{') || body.starts_with('['))
        && serde_json::from_str::<serde::de::IgnoredAny>(body).is_ok()
}

/// First [`SNIPPET_LIMIT`] characters of a body
pub fn snippet(body: &str) -> String {
    truncate(body, SNIPPET_LIMIT).to_string()
}

fn is_json_media_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    JSON_TYPES.contains(&essence.as_str())
}

fn is_html(body: &str) -> bool {
    let head = truncate(body, 16).to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

/// Extract the server's error text from a failure body
fn error_message(body: &str, status: u16) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => ["error", "message"]
            .iter()
            .find_map(|field| value.get(field).and_then(Value::as_str))
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {status}")),
        Err(_) => truncate(body, MESSAGE_LIMIT).to_string(),
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
