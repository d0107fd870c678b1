//! Reqwest backend: the standard web transport

use crate::backend::BackendConfig;
use crate::backend::types::{BackendRequest, RawResponse};
use crate::{Error, Result};

/// Reqwest backend for cross-platform HTTP
///
/// Redirects are never followed here; the redirect resolver sees every 3xx.
#[derive(Clone, Debug)]
pub struct ReqwestBackend {
    client: reqwest::Client,
}

impl ReqwestBackend {
    /// Create a new Reqwest backend
    pub fn new() -> Result<Self> {
        Self::with_config(BackendConfig::default())
    }

    /// Create a new Reqwest backend with configuration
    pub fn with_config(config: BackendConfig) -> Result<Self> {
        let mut builder =
            reqwest::Client::builder().redirect(reqwest::redirect::Policy::none());

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(user_agent) = config.user_agent {
            builder = builder.user_agent(user_agent);
        }

        if let Some(default_headers) = config.default_headers {
            builder = builder.default_headers(default_headers);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create reqwest client: {}", e)))?;

        Ok(Self { client })
    }

    /// Execute an HTTP request using reqwest
    pub async fn execute(&self, request: BackendRequest) -> Result<RawResponse> {
        let mut req_builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);

        if let Some(body) = request.body {
            req_builder = req_builder.body(body);
        }

        let response = req_builder.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body_text = response.text().await.map_err(map_reqwest_error)?;

        Ok(RawResponse {
            status,
            headers,
            body_text,
        })
    }

    /// Get the underlying reqwest client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

fn map_reqwest_error(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        return Error::Timeout;
    }
    Error::Network {
        code: error.status().map(|s| i64::from(s.as_u16())).unwrap_or(-1),
        message: format!("Request failed: {}", error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Method};

    fn get(url: &str) -> BackendRequest {
        BackendRequest {
            method: Method::GET,
            url: url.parse().unwrap(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    #[tokio::test]
    async fn does_not_follow_redirects() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/teams")
            .with_status(308)
            .with_header("location", "/api/teams/")
            .create_async()
            .await;

        let backend = ReqwestBackend::new().unwrap();
        let response = backend
            .execute(get(&format!("{}/api/teams", server.url())))
            .await
            .unwrap();

        assert_eq!(response.status.as_u16(), 308);
        assert_eq!(response.location(), Some("/api/teams/"));
        assert_eq!(response.body_text, "");
    }

    #[tokio::test]
    async fn returns_body_as_text() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/login/")
            .match_header("content-type", "application/json")
            .match_body(r#"{"email":"a@b.c"}"#)
            .with_status(201)
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"token":"t"}"#)
            .create_async()
            .await;

        let mut request = get(&format!("{}/api/login/", server.url()));
        request.method = Method::POST;
        request.headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        request.body = Some(bytes::Bytes::from_static(br#"{"email":"a@b.c"}"#));

        let response = ReqwestBackend::new().unwrap().execute(request).await.unwrap();
        assert_eq!(response.status.as_u16(), 201);
        assert_eq!(response.content_type(), Some("application/json"));
        assert_eq!(response.body_text, r#"{"token":"t"}"#);
    }

    #[tokio::test]
    async fn connection_failure_is_a_network_error() {
        // Port 1 is reserved and never listening.
        let result = ReqwestBackend::new()
            .unwrap()
            .execute(get("http://127.0.0.1:1/api/teams/"))
            .await;
        assert!(matches!(result, Err(Error::Network { .. })));
    }
}
