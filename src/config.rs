//! Client configuration
//!
//! A [`ClientConfig`] can be built in code or read from the environment:
//!
//! | Variable            | Meaning                                   |
//! |---------------------|-------------------------------------------|
//! | `API_BASE_URL`      | Base URL of the backend (required)        |
//! | `API_FALLBACK_URL`  | Base URL used when wrapped or private     |
//! | `API_TIMEOUT_SECS`  | Per-attempt timeout in seconds            |
//! | `API_TOKEN_DIR`     | Directory for the durable token store     |

use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Timeout applied to each transport call when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const ENV_BASE_URL: &str = "API_BASE_URL";
const ENV_FALLBACK_URL: &str = "API_FALLBACK_URL";
const ENV_TIMEOUT_SECS: &str = "API_TIMEOUT_SECS";
const ENV_TOKEN_DIR: &str = "API_TOKEN_DIR";

/// Settings for a [`crate::Client`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every relative endpoint is joined to
    pub base_url: Url,
    /// Replacement base URL for wrapped or private-address contexts
    pub fallback_base_url: Option<Url>,
    /// Per-attempt timeout, including each redirect hop
    pub timeout: Duration,
    /// User agent sent by the standard transport
    pub user_agent: Option<String>,
    /// Directory of the durable token store; in-memory when unset
    pub token_dir: Option<PathBuf>,
}

impl ClientConfig {
    /// Configuration with defaults for everything but the base URL
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: parse_url("base URL", base_url)?,
            fallback_base_url: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            token_dir: None,
        })
    }

    /// Read the configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    ///
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let base_url = get(ENV_BASE_URL)
            .ok_or_else(|| Error::Config(format!("{ENV_BASE_URL} is not set")))?;
        let mut config = Self::new(&base_url)?;

        if let Some(fallback) = get(ENV_FALLBACK_URL) {
            config.fallback_base_url = Some(parse_url(ENV_FALLBACK_URL, &fallback)?);
        }

        if let Some(secs) = get(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs.parse().map_err(|_| {
                Error::Config(format!("{ENV_TIMEOUT_SECS} must be a whole number of seconds, got {secs:?}"))
            })?;
            if secs == 0 {
                return Err(Error::Config(format!("{ENV_TIMEOUT_SECS} must be greater than zero")));
            }
            config.timeout = Duration::from_secs(secs);
        }

        config.token_dir = get(ENV_TOKEN_DIR).map(PathBuf::from);

        tracing::debug!(
            base_url = %config.base_url,
            fallback = config.fallback_base_url.is_some(),
            timeout_secs = config.timeout.as_secs(),
            "Loaded client configuration from environment"
        );

        Ok(config)
    }
}

pub(crate) fn parse_url(what: &str, raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::Config(format!("{what}: invalid URL {raw:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::Config(format!(
            "{what}: unsupported scheme {other:?}, expected http or https"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = ClientConfig::new("https://api.example.com").unwrap();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.fallback_base_url.is_none());
        assert!(config.token_dir.is_none());
    }

    #[test]
    fn reads_all_variables() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("API_BASE_URL", "http://192.168.1.20:3001"),
            ("API_FALLBACK_URL", "https://api.example.com"),
            ("API_TIMEOUT_SECS", "15"),
            ("API_TOKEN_DIR", "/tmp/tokens"),
        ]))
        .unwrap();

        assert_eq!(config.base_url.as_str(), "http://192.168.1.20:3001/");
        assert_eq!(
            config.fallback_base_url.unwrap().as_str(),
            "https://api.example.com/"
        );
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.token_dir, Some(PathBuf::from("/tmp/tokens")));
    }

    #[test]
    fn base_url_is_required() {
        let err = ClientConfig::from_lookup(lookup(&[("API_BASE_URL", "  ")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_bad_values() {
        for vars in [
            &[("API_BASE_URL", "not a url")][..],
            &[("API_BASE_URL", "ftp://example.com")][..],
            &[("API_BASE_URL", "https://a.example"), ("API_TIMEOUT_SECS", "soon")][..],
            &[("API_BASE_URL", "https://a.example"), ("API_TIMEOUT_SECS", "0")][..],
        ] {
            assert!(ClientConfig::from_lookup(lookup(vars)).is_err(), "{vars:?}");
        }
    }
}
