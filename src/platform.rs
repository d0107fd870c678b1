//! Runtime platform detection
//!
//! A single signal is not reliable across the different ways an app can be
//! wrapped, so the wrapped check is an OR over every signal we have.

use std::net::{IpAddr, Ipv4Addr};
use url::{Host, Url};

/// URL schemes served by native app wrappers
const WRAPPED_SCHEMES: &[&str] = &["capacitor", "ionic"];

/// Raw observations about the runtime, supplied by the embedding app
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformSignals {
    /// The wrapper reports that it is running natively
    pub native_runtime: bool,
    /// Origin of the page hosting the client, if there is one
    pub origin: Option<Url>,
    /// The wrapper injected its global bridge object
    pub wrapper_global: bool,
}

impl PlatformSignals {
    /// Signals of a plain process: not wrapped, no page origin
    pub fn none() -> Self {
        Self::default()
    }

    /// Set the native runtime flag
    pub fn native_runtime(mut self, native: bool) -> Self {
        self.native_runtime = native;
        self
    }

    /// Set the page origin
    pub fn origin(mut self, origin: Url) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Set whether the wrapper global is present
    pub fn wrapper_global(mut self, present: bool) -> Self {
        self.wrapper_global = present;
        self
    }
}

/// Result of platform detection. Computed once, never mutated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformContext {
    /// Running inside a native app wrapper
    pub is_native_wrapped: bool,
    /// The page origin or the backend base URL is local/private
    pub looks_like_private_address: bool,
}

impl PlatformContext {
    /// Classify the runtime from its signals and the configured base URL
    pub fn detect(signals: &PlatformSignals, base_url: &Url) -> Self {
        let origin = signals.origin.as_ref();

        let wrapped_scheme = origin.is_some_and(|o| WRAPPED_SCHEMES.contains(&o.scheme()));
        let secure_localhost = origin.is_some_and(|o| {
            o.scheme() == "https" && o.host() == Some(Host::Domain("localhost"))
        });

        let is_native_wrapped =
            signals.native_runtime || wrapped_scheme || secure_localhost || signals.wrapper_global;

        let looks_like_private_address =
            origin.is_some_and(is_private_url) || is_private_url(base_url);

        let context = Self {
            is_native_wrapped,
            looks_like_private_address,
        };
        tracing::debug!(
            native_wrapped = context.is_native_wrapped,
            private_address = context.looks_like_private_address,
            "Detected platform context"
        );
        context
    }
}

/// Whether the URL points at localhost, a loopback or an RFC1918 address
pub fn is_private_url(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.');
            domain.eq_ignore_ascii_case("localhost")
                || domain.to_ascii_lowercase().ends_with(".localhost")
        }
        Some(Host::Ipv4(ip)) => is_private_ipv4(ip),
        Some(Host::Ipv6(ip)) => match ip.to_ipv4_mapped() {
            Some(v4) => is_private_ipv4(v4),
            None => IpAddr::V6(ip).is_loopback(),
        },
        None => false,
    }
}

fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private()
}
