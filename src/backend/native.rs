//! Native bridge backend
//!
//! App wrappers expose their own HTTP primitive to the embedded code. That
//! primitive is reached through the [`NativeHttp`] trait, and its answers are
//! normalized here into a [`RawResponse`] before anything else sees them.

use crate::backend::types::{BackendRequest, RawResponse};
use crate::{Error, Result};
use futures_util::future::BoxFuture;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Request as handed to the wrapper's native HTTP primitive
#[derive(Debug, Clone, PartialEq)]
pub struct NativeRequest {
    /// HTTP method name
    pub method: String,
    /// Absolute URL
    pub url: String,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Request payload. JSON bodies are passed as structured data,
    /// anything else as a JSON string.
    pub data: Option<serde_json::Value>,
}

/// Body returned by the native primitive
#[derive(Debug, Clone, PartialEq)]
pub enum NativeData {
    /// No body
    Empty,
    /// Body left as text
    Text(String),
    /// Body already decoded into structured data
    Json(serde_json::Value),
}

/// Response as returned by the wrapper's native HTTP primitive
#[derive(Debug, Clone, PartialEq)]
pub struct NativeResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers, in whatever case the wrapper reports them
    pub headers: HashMap<String, String>,
    /// Response body
    pub data: NativeData,
}

/// The HTTP primitive exposed by a native app wrapper.
///
/// Implementations report connection problems as [`Error::Network`] and
/// expired requests as [`Error::Timeout`].
pub trait NativeHttp: Send + Sync {
    /// Perform one request without following redirects
    fn request(&self, request: NativeRequest) -> BoxFuture<'_, Result<NativeResponse>>;
}

/// Backend that routes requests through a [`NativeHttp`] bridge
#[derive(Clone)]
pub struct NativeBridgeBackend {
    bridge: Arc<dyn NativeHttp>,
}

impl fmt::Debug for NativeBridgeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBridgeBackend").finish_non_exhaustive()
    }
}

impl NativeBridgeBackend {
    /// Create a backend over the given bridge
    pub fn new(bridge: Arc<dyn NativeHttp>) -> Self {
        Self { bridge }
    }

    /// Execute an HTTP request through the native bridge
    pub async fn execute(&self, request: BackendRequest) -> Result<RawResponse> {
        let native_request = to_native_request(request)?;
        let response = self.bridge.request(native_request).await?;
        from_native_response(response)
    }
}

fn to_native_request(request: BackendRequest) -> Result<NativeRequest> {
    let mut headers = HashMap::new();
    for (name, value) in &request.headers {
        let value = value
            .to_str()
            .map_err(|e| Error::Internal(format!("Header {} is not valid text: {}", name, e)))?;
        headers.insert(name.as_str().to_string(), value.to_string());
    }

    let data = match request.body {
        Some(body) if !body.is_empty() => match serde_json::from_slice(&body) {
            Ok(value) => Some(value),
            Err(_) => Some(serde_json::Value::String(
                String::from_utf8_lossy(&body).into_owned(),
            )),
        },
        _ => None,
    };

    Ok(NativeRequest {
        method: request.method.as_str().to_string(),
        url: request.url.to_string(),
        headers,
        data,
    })
}

fn from_native_response(response: NativeResponse) -> Result<RawResponse> {
    let status = StatusCode::from_u16(response.status).map_err(|e| {
        Error::Internal(format!("Invalid HTTP status code {}: {}", response.status, e))
    })?;

    let mut headers = HeaderMap::new();
    for (name, value) in &response.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => tracing::warn!("Dropping malformed native header: {}", name),
        }
    }

    let body_text = match response.data {
        NativeData::Empty => String::new(),
        NativeData::Text(text) => text,
        NativeData::Json(serde_json::Value::Null) => String::new(),
        NativeData::Json(serde_json::Value::String(text)) => text,
        NativeData::Json(value) => serde_json::to_string(&value)?,
    };

    Ok(RawResponse {
        status,
        headers,
        body_text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use std::sync::Mutex;

    struct Echo {
        seen: Mutex<Vec<NativeRequest>>,
        reply: NativeResponse,
    }

    impl NativeHttp for Echo {
        fn request(&self, request: NativeRequest) -> BoxFuture<'_, Result<NativeResponse>> {
            self.seen.lock().unwrap().push(request);
            let reply = self.reply.clone();
            Box::pin(async move { Ok(reply) })
        }
    }

    fn backend(data: NativeData) -> (Arc<Echo>, NativeBridgeBackend) {
        let echo = Arc::new(Echo {
            seen: Mutex::new(Vec::new()),
            reply: NativeResponse {
                status: 200,
                headers: HashMap::from([("Content-Type".to_string(), "application/json".to_string())]),
                data,
            },
        });
        (echo.clone(), NativeBridgeBackend::new(echo))
    }

    fn post(body: &'static [u8]) -> BackendRequest {
        BackendRequest {
            method: Method::POST,
            url: "https://api.example.com/api/login/".parse().unwrap(),
            headers: HeaderMap::new(),
            body: Some(bytes::Bytes::from_static(body)),
        }
    }

    #[tokio::test]
    async fn structured_data_is_reserialized() {
        let (_, backend) = backend(NativeData::Json(serde_json::json!({"teams": []})));
        let response = backend.execute(post(b"{}")).await.unwrap();
        assert_eq!(response.body_text, r#"{"teams":[]}"#);
        assert_eq!(response.header("content-type"), Some("application/json"));
    }

    #[tokio::test]
    async fn text_and_empty_bodies_pass_through() {
        let (_, backend) = backend(NativeData::Text("<!DOCTYPE html>".to_string()));
        let response = backend.execute(post(b"{}")).await.unwrap();
        assert_eq!(response.body_text, "<!DOCTYPE html>");

        let (_, backend) = self::backend(NativeData::Json(serde_json::Value::Null));
        let response = backend.execute(post(b"{}")).await.unwrap();
        assert_eq!(response.body_text, "");
    }

    #[tokio::test]
    async fn json_request_body_is_sent_as_data() {
        let (echo, backend) = backend(NativeData::Empty);
        backend.execute(post(br#"{"a":1}"#)).await.unwrap();
        backend.execute(post(b"plain")).await.unwrap();

        let seen = echo.seen.lock().unwrap();
        assert_eq!(seen[0].method, "POST");
        assert_eq!(seen[0].data, Some(serde_json::json!({"a": 1})));
        assert_eq!(seen[1].data, Some(serde_json::json!("plain")));
    }

    #[tokio::test]
    async fn invalid_status_is_rejected() {
        let echo = Arc::new(Echo {
            seen: Mutex::new(Vec::new()),
            reply: NativeResponse {
                status: 42,
                headers: HashMap::new(),
                data: NativeData::Empty,
            },
        });
        let result = NativeBridgeBackend::new(echo).execute(post(b"")).await;
        assert!(matches!(result, Err(Error::Internal(_))));
    }
}
