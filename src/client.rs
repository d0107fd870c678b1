//! API client and request orchestration

use crate::auth;
use crate::backend::native::NativeHttp;
use crate::backend::types::{BackendRequest, RawResponse};
use crate::backend::{self, Backend};
use crate::classify::{self, classify};
use crate::config::{ClientConfig, DEFAULT_TIMEOUT, parse_url};
use crate::endpoint;
use crate::error::{ApiError, ErrorKind};
use crate::platform::{PlatformContext, PlatformSignals};
use crate::redirect::{self, Exchange};
use crate::request::{Request, RequestBuilder};
use crate::token::TokenStore;
use crate::{Error, Result};
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const JSON: &str = "application/json";

/// Callback run when a 401 ends the session
pub type SessionExpiredHandler = Arc<dyn Fn() + Send + Sync + 'static>;

/// Client for the backend API.
///
/// Every request goes through the same pipeline: endpoint canonicalization,
/// header assembly, transport selection, a per-attempt timeout, bounded
/// redirect resolution and response classification. Failures are always
/// reported as an [`ApiError`].
///
/// Cloning is cheap; clones share the token store and platform context.
///
/// # Examples
///
/// ```rust,no_run
/// use ferrule::Client;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Team {
///     name: String,
/// }
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")
///     .on_session_expired(|| println!("signed out"))
///     .build()?;
///
/// let teams: Vec<Team> = client.get_json("/api/teams").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientContext>,
}

struct ClientContext {
    config: ClientConfig,
    default_headers: HeaderMap,
    tokens: TokenStore,
    signals: PlatformSignals,
    platform: OnceLock<PlatformContext>,
    native: Option<Backend>,
    standard: Option<Backend>,
    on_session_expired: Option<SessionExpiredHandler>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.config.base_url.as_str())
            .field("native", &self.inner.native.as_ref().map(Backend::name))
            .field("standard", &self.inner.standard.as_ref().map(Backend::name))
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client with default settings for the given base URL
    pub fn new(base_url: &str) -> Result<Self> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a client configured from the environment
    pub fn from_env() -> Result<Self> {
        ClientBuilder::from_config(ClientConfig::from_env()?).build()
    }

    /// Create a client builder
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The token store used for authentication
    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    /// The client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Platform context, detected on first use and then fixed
    pub fn platform(&self) -> PlatformContext {
        *self
            .inner
            .platform
            .get_or_init(|| PlatformContext::detect(&self.inner.signals, &self.inner.config.base_url))
    }

    /// Base URL requests are actually sent to
    pub fn effective_base_url(&self) -> &Url {
        backend::effective_base_url(
            &self.platform(),
            &self.inner.config.base_url,
            self.inner.config.fallback_base_url.as_ref(),
        )
    }

    /// Create a GET request
    pub fn get(&self, endpoint: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), Method::GET, endpoint)
    }

    /// Create a POST request
    pub fn post(&self, endpoint: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), Method::POST, endpoint)
    }

    /// Create a PUT request
    pub fn put(&self, endpoint: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), Method::PUT, endpoint)
    }

    /// Create a PATCH request
    pub fn patch(&self, endpoint: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), Method::PATCH, endpoint)
    }

    /// Create a DELETE request
    pub fn delete(&self, endpoint: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), Method::DELETE, endpoint)
    }

    /// Authenticated GET decoding the JSON payload
    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> std::result::Result<T, ApiError> {
        self.get(endpoint).send().await
    }

    /// Authenticated POST with a JSON body
    pub async fn post_json<T, B>(&self, endpoint: &str, body: &B) -> std::result::Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.post(endpoint).json(body)?.send().await
    }

    /// Authenticated PUT with a JSON body
    pub async fn put_json<T, B>(&self, endpoint: &str, body: &B) -> std::result::Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.put(endpoint).json(body)?.send().await
    }

    /// Authenticated PATCH with a JSON body
    pub async fn patch_json<T, B>(&self, endpoint: &str, body: &B) -> std::result::Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.patch(endpoint).json(body)?.send().await
    }

    /// Authenticated DELETE decoding the JSON payload
    pub async fn delete_json<T: DeserializeOwned>(&self, endpoint: &str) -> std::result::Result<T, ApiError> {
        self.delete(endpoint).send().await
    }

    /// Execute a request and decode its JSON payload into `T`
    pub async fn execute<T: DeserializeOwned>(&self, request: Request) -> std::result::Result<T, ApiError> {
        let platform = self.platform();
        let url = endpoint::join(self.effective_base_url(), &endpoint::normalize(&request.endpoint))?;
        let (headers, sent_token) = self.headers_for(&request)?;
        let transport = Backend::select(&platform, self.inner.native.as_ref(), self.inner.standard.as_ref())?;

        debug!(
            method = %request.method,
            url = %url,
            transport = transport.name(),
            authenticated = sent_token.is_some(),
            "Sending request"
        );

        let outgoing = BackendRequest {
            method: request.method.clone(),
            url,
            headers,
            body: request.body.clone(),
        };
        let send = |req: BackendRequest| self.send_once(&transport, req);
        let response = send(outgoing.clone()).await?;
        let exchange = redirect::resolve(
            Exchange {
                request: outgoing,
                response,
            },
            send,
        )
        .await?;

        let status = exchange.response.status.as_u16();
        match classify(&exchange.response) {
            Ok(payload) => serde_json::from_value(payload).map_err(|e| {
                ApiError::new(
                    ErrorKind::ParseError,
                    status,
                    format!("The response did not have the expected shape: {e}"),
                    classify::snippet(&exchange.response.body_text),
                )
            }),
            Err(failure) if failure.status_code == 401 && request.require_auth => {
                Err(self.expire_session(sent_token.as_deref(), failure))
            }
            Err(failure) => {
                warn!(
                    kind = %failure.kind,
                    status = failure.status_code,
                    url = %exchange.request.url,
                    "Request failed: {}",
                    failure.message
                );
                Err(failure)
            }
        }
    }

    /// One transport call bounded by the configured timeout
    async fn send_once(
        &self,
        transport: &Backend,
        request: BackendRequest,
    ) -> std::result::Result<RawResponse, ApiError> {
        let url = request.url.clone();
        match tokio::time::timeout(self.inner.config.timeout, transport.execute(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                warn!(url = %url, "Transport failed: {}", e);
                Err(transport_error(e))
            }
            Err(_) => {
                warn!(url = %url, timeout = ?self.inner.config.timeout, "Request timed out");
                Err(ApiError::from(Error::Timeout))
            }
        }
    }

    /// Assemble headers, returning the token that was attached, if any
    fn headers_for(&self, request: &Request) -> Result<(HeaderMap, Option<String>)> {
        let mut headers = self.inner.default_headers.clone();
        if request.body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
        }
        for (name, value) in &request.headers {
            let (name, value) = parse_header(name, value)?;
            headers.insert(name, value);
        }

        if !request.require_auth {
            return Ok((headers, None));
        }
        let token = self.inner.tokens.get_token();
        match &token {
            Some(token) => {
                headers.insert(AUTHORIZATION, auth::bearer(token)?);
            }
            None => debug!("No token stored, sending without credentials"),
        }
        Ok((headers, token))
    }

    /// Clear the session after a 401 and notify at most once per expiry.
    ///
    /// Only the token the request carried is removed; a token stored after
    /// the request went out belongs to a newer session.
    fn expire_session(&self, sent_token: Option<&str>, failure: ApiError) -> ApiError {
        let tokens = &self.inner.tokens;
        let removed = match sent_token {
            Some(sent) => tokens.take_token_if(sent).unwrap_or_else(|e| {
                warn!("Failed to remove stored token: {}", e);
                true
            }),
            None => false,
        };

        let signed_out = removed || !tokens.has_token();
        if signed_out {
            if let Err(e) = tokens.clear_user() {
                warn!("Failed to remove stored user: {}", e);
            }
            warn!(status = failure.status_code, "Session expired, credentials cleared");
        } else {
            debug!("Rejected token was already replaced, keeping the current session");
        }

        if removed || (sent_token.is_none() && signed_out) {
            if let Some(handler) = &self.inner.on_session_expired {
                handler();
            }
        }

        ApiError::auth_expired(failure.raw_snippet)
    }
}

fn transport_error(error: Error) -> ApiError {
    match error {
        Error::Timeout | Error::Network { .. } => ApiError::from(error),
        other => ApiError::from(Error::Network {
            code: -1,
            message: other.to_string(),
        }),
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| Error::Internal(format!("Invalid header name {name:?}: {e}")))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|e| Error::Internal(format!("Invalid value for header {name}: {e}")))?;
    Ok((header_name, header_value))
}

/// Builder for creating API clients
pub struct ClientBuilder {
    base_url: Option<String>,
    fallback_base_url: Option<String>,
    timeout: Duration,
    user_agent: Option<String>,
    headers: Vec<(String, String)>,
    tokens: Option<TokenStore>,
    token_dir: Option<PathBuf>,
    signals: PlatformSignals,
    native_bridge: Option<Arc<dyn NativeHttp>>,
    transport: Option<Backend>,
    on_session_expired: Option<SessionExpiredHandler>,
}

impl ClientBuilder {
    /// Create a new client builder
    pub fn new() -> Self {
        Self {
            base_url: None,
            fallback_base_url: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            headers: Vec::new(),
            tokens: None,
            token_dir: None,
            signals: PlatformSignals::none(),
            native_bridge: None,
            transport: None,
            on_session_expired: None,
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            base_url: Some(config.base_url.to_string()),
            fallback_base_url: config.fallback_base_url.map(|u| u.to_string()),
            timeout: config.timeout,
            user_agent: config.user_agent,
            token_dir: config.token_dir,
            ..Self::new()
        }
    }

    /// Set the base URL for all requests
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Base URL used instead when wrapped or pointed at a private address
    pub fn fallback_base_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_base_url = Some(url.into());
        self
    }

    /// Set the per-attempt timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Add a default header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Use an existing token store
    pub fn token_store(mut self, tokens: TokenStore) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Keep the token store on disk in `dir`
    pub fn token_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.token_dir = Some(dir.into());
        self
    }

    /// Signals used to detect the platform context
    pub fn platform_signals(mut self, signals: PlatformSignals) -> Self {
        self.signals = signals;
        self
    }

    /// Native HTTP primitive provided by an app wrapper
    pub fn native_bridge(mut self, bridge: Arc<dyn NativeHttp>) -> Self {
        self.native_bridge = Some(bridge);
        self
    }

    /// Replace the standard transport
    pub fn transport(mut self, transport: Backend) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Run `handler` when a 401 ends the session, e.g. to show the sign-in screen
    pub fn on_session_expired<F>(mut self, handler: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_session_expired = Some(Arc::new(handler));
        self
    }

    /// Build the client
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("A base URL is required".to_string()))?;
        let mut config = ClientConfig::new(&base_url)?;
        if let Some(fallback) = &self.fallback_base_url {
            config.fallback_base_url = Some(parse_url("fallback base URL", fallback)?);
        }
        if self.timeout.is_zero() {
            return Err(Error::Config("Timeout must be greater than zero".to_string()));
        }
        config.timeout = self.timeout;
        config.user_agent = self.user_agent;
        config.token_dir = self.token_dir;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static(JSON));
        for (name, value) in &self.headers {
            let (name, value) = parse_header(name, value)?;
            default_headers.insert(name, value);
        }

        let tokens = match (self.tokens, &config.token_dir) {
            (Some(tokens), _) => tokens,
            (None, Some(dir)) => TokenStore::open(dir)?,
            (None, None) => TokenStore::in_memory(),
        };

        let standard = match self.transport {
            Some(transport) => Some(transport),
            None => default_transport(&config)?,
        };
        let native = self.native_bridge.map(Backend::native);
        if standard.is_none() && native.is_none() {
            return Err(Error::Config("No HTTP transport is available".to_string()));
        }

        Ok(Client {
            inner: Arc::new(ClientContext {
                config,
                default_headers,
                tokens,
                signals: self.signals,
                platform: OnceLock::new(),
                native,
                standard,
                on_session_expired: self.on_session_expired,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "backend-reqwest")]
fn default_transport(config: &ClientConfig) -> Result<Option<Backend>> {
    Backend::reqwest_with_config(backend::BackendConfig {
        timeout: None,
        user_agent: config.user_agent.clone(),
        default_headers: None,
    })
    .map(Some)
}

#[cfg(not(feature = "backend-reqwest"))]
fn default_transport(_config: &ClientConfig) -> Result<Option<Backend>> {
    Ok(None)
}
