//! Backend abstraction for HTTP transports

pub mod native;
pub mod types;

#[cfg(feature = "backend-reqwest")]
pub mod reqwest;

use crate::platform::PlatformContext;
use crate::{Error, Result};
use std::time::Duration;
use types::{BackendRequest, RawResponse};
use url::Url;

/// Configuration for backend creation
#[derive(Clone, Debug, Default)]
pub struct BackendConfig {
    /// Request timeout enforced by the transport itself
    pub timeout: Option<Duration>,
    /// User agent string
    pub user_agent: Option<String>,
    /// Default headers to add to all requests
    pub default_headers: Option<http::HeaderMap>,
}

/// HTTP transport implementations
#[derive(Clone, Debug)]
pub enum Backend {
    /// Standard web transport using reqwest
    #[cfg(feature = "backend-reqwest")]
    Reqwest(reqwest::ReqwestBackend),

    /// Transport provided by a native app wrapper
    NativeBridge(native::NativeBridgeBackend),
}

impl Backend {
    /// Explicitly use the reqwest backend
    #[cfg(feature = "backend-reqwest")]
    pub fn reqwest() -> Result<Self> {
        Ok(Backend::Reqwest(reqwest::ReqwestBackend::new()?))
    }

    /// Use the reqwest backend with configuration
    #[cfg(feature = "backend-reqwest")]
    pub fn reqwest_with_config(config: BackendConfig) -> Result<Self> {
        Ok(Backend::Reqwest(reqwest::ReqwestBackend::with_config(
            config,
        )?))
    }

    /// Use a native bridge backend
    pub fn native(bridge: std::sync::Arc<dyn native::NativeHttp>) -> Self {
        Backend::NativeBridge(native::NativeBridgeBackend::new(bridge))
    }

    /// Pick the transport for the given platform context.
    ///
    /// Native-wrapped contexts go through the bridge when one is available;
    /// every other context uses the standard transport.
    pub fn select(
        context: &PlatformContext,
        native: Option<&Backend>,
        standard: Option<&Backend>,
    ) -> Result<Backend> {
        let chosen = if context.is_native_wrapped {
            native.or(standard)
        } else {
            standard.or(native)
        };
        chosen
            .cloned()
            .ok_or_else(|| Error::Internal("No HTTP transport is configured".to_string()))
    }

    /// Short name of the transport, for logs
    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "backend-reqwest")]
            Backend::Reqwest(_) => "reqwest",
            Backend::NativeBridge(_) => "native-bridge",
        }
    }

    /// Execute an HTTP request
    pub async fn execute(&self, request: BackendRequest) -> Result<RawResponse> {
        match self {
            #[cfg(feature = "backend-reqwest")]
            Backend::Reqwest(r) => r.execute(request).await,

            Backend::NativeBridge(n) => n.execute(request).await,
        }
    }
}

/// Base URL the transport should actually talk to.
///
/// When the app runs wrapped or against a private address, a configured
/// fallback replaces the base URL so stale debug configuration still reaches
/// a reachable backend.
pub fn effective_base_url<'a>(
    context: &PlatformContext,
    base_url: &'a Url,
    fallback: Option<&'a Url>,
) -> &'a Url {
    match fallback {
        Some(fallback) if context.is_native_wrapped || context.looks_like_private_address => {
            fallback
        }
        _ => base_url,
    }
}
