//! Endpoint canonicalization
//!
//! The backend answers API paths without a trailing slash with a permanent
//! redirect. Adding the slash up front saves a round trip and keeps
//! transports that do not follow redirects working.

use crate::{Error, Result};
use url::Url;

/// Path prefix of the backend's API routes
pub const API_NAMESPACE: &str = "/api";

/// Canonicalize an endpoint.
///
/// API paths gain a trailing slash, inserted before any query string or
/// fragment. Absolute URLs are handled the same way. Other paths are
/// returned unchanged. `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(endpoint: &str) -> String {
    let (prefix, rest) = split_origin(endpoint);
    let split_at = rest.find(['?', '#']).unwrap_or(rest.len());
    let (path, suffix) = rest.split_at(split_at);

    if !is_api_path(path) || path.ends_with('/') {
        return endpoint.to_string();
    }

    format!("{prefix}{path}/{suffix}")
}

/// Whether a path lies in the API namespace.
///
/// The leading slash is optional, since [`join`] accepts both forms.
pub fn is_api_path(path: &str) -> bool {
    let path = path.strip_prefix('/').unwrap_or(path);
    match path.strip_prefix(API_NAMESPACE.trim_start_matches('/')) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Resolve an endpoint against the base URL.
///
/// Absolute endpoints are used as they are.
pub fn join(base: &Url, endpoint: &str) -> Result<Url> {
    if is_absolute(endpoint) {
        return Url::parse(endpoint).map_err(|_| Error::InvalidUrl(endpoint.to_string()));
    }

    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|_| Error::InvalidUrl(joined))
}

/// Append a trailing slash to the URL's path, keeping its query.
///
/// Returns `None` when the path already ends in a slash.
pub fn with_trailing_slash(url: &Url) -> Option<Url> {
    if url.path().ends_with('/') {
        return None;
    }
    let mut url = url.clone();
    let path = format!("{}/", url.path());
    url.set_path(&path);
    Some(url)
}

fn is_absolute(endpoint: &str) -> bool {
    let lower = endpoint.get(..8).unwrap_or(endpoint).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Split `scheme://authority` off an absolute URL
fn split_origin(endpoint: &str) -> (&str, &str) {
    if !is_absolute(endpoint) {
        return ("", endpoint);
    }
    let after_scheme = endpoint.find("://").map(|i| i + 3).unwrap_or(0);
    let path_start = endpoint[after_scheme..]
        .find(['/', '?', '#'])
        .map(|i| after_scheme + i)
        .unwrap_or(endpoint.len());
    endpoint.split_at(path_start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_trailing_slash_to_api_paths() {
        assert_eq!(normalize("/api/teams"), "/api/teams/");
        assert_eq!(normalize("/api"), "/api/");
        assert_eq!(normalize("/api/teams/"), "/api/teams/");
        assert_eq!(normalize("/api/teams/42/members"), "/api/teams/42/members/");
    }

    #[test]
    fn inserts_slash_before_query() {
        assert_eq!(normalize("/api/teams?page=2"), "/api/teams/?page=2");
        assert_eq!(normalize("/api/teams/?page=2"), "/api/teams/?page=2");
        assert_eq!(normalize("/api/teams#top"), "/api/teams/#top");
    }

    #[test]
    fn relative_api_paths_are_normalized() {
        assert_eq!(normalize("api/teams"), "api/teams/");
        assert_eq!(normalize("api/teams?page=2"), "api/teams/?page=2");
        assert_eq!(normalize("api"), "api/");
        assert_eq!(normalize("apiary/x"), "apiary/x");

        let base: Url = "https://api.example.com".parse().unwrap();
        assert_eq!(
            join(&base, &normalize("api/teams")).unwrap().as_str(),
            "https://api.example.com/api/teams/"
        );
    }

    #[test]
    fn leaves_other_paths_alone() {
        assert_eq!(normalize("/auth/signin"), "/auth/signin");
        assert_eq!(normalize("/apiary"), "/apiary");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn normalizes_absolute_urls() {
        assert_eq!(
            normalize("https://api.example.com/api/login"),
            "https://api.example.com/api/login/"
        );
        assert_eq!(
            normalize("https://api.example.com/api/teams?x=1"),
            "https://api.example.com/api/teams/?x=1"
        );
        assert_eq!(
            normalize("https://api.example.com"),
            "https://api.example.com"
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        for endpoint in [
            "/api/teams",
            "/api/teams?page=2&q=a?b",
            "/api",
            "/other",
            "https://h.example/api/x?y",
            "/api/teams/#frag",
        ] {
            let once = normalize(endpoint);
            assert_eq!(normalize(&once), once, "{endpoint}");
        }
    }

    #[test]
    fn joins_relative_and_absolute_endpoints() {
        let base: Url = "https://api.example.com/".parse().unwrap();
        assert_eq!(
            join(&base, "/api/teams/").unwrap().as_str(),
            "https://api.example.com/api/teams/"
        );
        assert_eq!(
            join(&base, "https://other.example.com/api/x/").unwrap().as_str(),
            "https://other.example.com/api/x/"
        );

        let prefixed: Url = "https://api.example.com/v1".parse().unwrap();
        assert_eq!(
            join(&prefixed, "api/teams/").unwrap().as_str(),
            "https://api.example.com/v1/api/teams/"
        );
    }

    #[test]
    fn trailing_slash_keeps_query() {
        let url: Url = "https://api.example.com/api/teams?page=2".parse().unwrap();
        assert_eq!(
            with_trailing_slash(&url).unwrap().as_str(),
            "https://api.example.com/api/teams/?page=2"
        );
        let url: Url = "https://api.example.com/api/teams/".parse().unwrap();
        assert!(with_trailing_slash(&url).is_none());
    }
}
