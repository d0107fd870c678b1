//! Request descriptors and builders

use crate::Result;
use crate::client::Client;
use crate::error::ApiError;
use bytes::Bytes;
use http::Method;
use serde::de::DeserializeOwned;

/// A request as the caller describes it.
///
/// The endpoint is kept as given; canonicalization and joining with the base
/// URL happen when the request is executed.
#[derive(Debug, Clone)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) endpoint: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Option<Bytes>,
    pub(crate) require_auth: bool,
}

impl Request {
    /// Create a request that requires authentication
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            headers: Vec::new(),
            body: None,
            require_auth: true,
        }
    }

    /// HTTP method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Endpoint as given by the caller
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Caller supplied headers
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Serialized JSON body
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Whether the bearer token is attached and a 401 ends the session
    pub fn require_auth(&self) -> bool {
        self.require_auth
    }
}

/// Builder for a single request, created by [`Client::get`] and friends
pub struct RequestBuilder {
    client: Client,
    request: Request,
}

impl RequestBuilder {
    pub(crate) fn new(client: Client, method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            request: Request::new(method, endpoint),
        }
    }

    /// Add a header. Later values replace earlier ones with the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.push((name.into(), value.into()));
        self
    }

    /// Set a JSON body
    pub fn json(mut self, value: impl serde::Serialize) -> Result<Self> {
        self.request.body = Some(Bytes::from(serde_json::to_vec(&value)?));
        Ok(self)
    }

    /// Set an already serialized JSON body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.request.body = Some(body.into());
        self
    }

    /// Whether to send the stored token; defaults to `true`
    pub fn require_auth(mut self, require: bool) -> Self {
        self.request.require_auth = require;
        self
    }

    /// Finish building without sending
    pub fn build(self) -> Request {
        self.request
    }

    /// Send the request and decode the JSON payload
    pub async fn send<T: DeserializeOwned>(self) -> std::result::Result<T, ApiError> {
        self.client.execute(self.request).await
    }
}
