//! Redirect resolution
//!
//! Standard transports are configured not to follow redirects, and native
//! bridges differ in whether they do, so redirects are handled here the same
//! way for every transport.

use crate::backend::types::{BackendRequest, RawResponse};
use crate::classify::{self, is_redirect_placeholder};
use crate::endpoint;
use crate::error::{ApiError, ErrorKind};
use std::future::Future;
use url::Url;

/// Additional requests allowed after the first one
pub const MAX_REDIRECT_HOPS: usize = 2;

/// A request together with the response it produced
#[derive(Debug, Clone)]
pub struct Exchange {
    /// The request as sent
    pub request: BackendRequest,
    /// The response received for it
    pub response: RawResponse,
}

/// Why a bounded follow loop stopped without a final value
#[derive(Debug)]
pub enum FollowError<T, E> {
    /// `next` still asked for another step after the last allowed hop;
    /// carries the last value produced
    Exhausted(T),
    /// A step failed
    Failed(E),
}

/// Repeat `attempt` while `next` yields another step, at most `max_hops` times.
///
/// `next` is the exit predicate: returning `None` ends the loop with the
/// current value.
pub async fn follow_bounded<T, S, E, Next, Attempt, Fut>(
    max_hops: usize,
    initial: T,
    mut next: Next,
    mut attempt: Attempt,
) -> Result<T, FollowError<T, E>>
where
    Next: FnMut(&T) -> Option<S>,
    Attempt: FnMut(S) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut current = initial;
    let mut hops = 0;
    while let Some(step) = next(&current) {
        if hops == max_hops {
            return Err(FollowError::Exhausted(current));
        }
        hops += 1;
        current = attempt(step).await.map_err(FollowError::Failed)?;
    }
    Ok(current)
}

/// Where a response sends us next, if anywhere
pub fn next_url(exchange: &Exchange) -> Option<Url> {
    let current = &exchange.request.url;
    let response = &exchange.response;

    if response.is_redirect() {
        return match response.location() {
            Some(location) => resolve_location(current, location),
            None => endpoint::with_trailing_slash(current),
        };
    }

    if !response.status.is_client_error()
        && !response.status.is_server_error()
        && is_redirect_placeholder(&response.body_text)
    {
        return endpoint::with_trailing_slash(current);
    }

    None
}

/// Resolve a `Location` value against the URL that produced it
fn resolve_location(current: &Url, location: &str) -> Option<Url> {
    let target = match current.join(location) {
        Ok(target) => target,
        Err(e) => {
            tracing::warn!("Ignoring unparsable redirect location {:?}: {}", location, e);
            return None;
        }
    };
    Url::parse(&endpoint::normalize(target.as_str())).ok()
}

/// Follow redirects starting from an already received response.
///
/// Each hop goes through `send` and so through the same transport. A third
/// consecutive redirect fails with [`ErrorKind::RedirectLoop`].
pub async fn resolve<F, Fut>(first: Exchange, mut send: F) -> Result<Exchange, ApiError>
where
    F: FnMut(BackendRequest) -> Fut,
    Fut: Future<Output = Result<RawResponse, ApiError>>,
{
    let result = follow_bounded(
        MAX_REDIRECT_HOPS,
        first,
        |exchange: &Exchange| {
            next_url(exchange).map(|url| {
                tracing::debug!(from = %exchange.request.url, to = %url, status = %exchange.response.status, "Following redirect");
                exchange.request.with_url(url)
            })
        },
        |request: BackendRequest| {
            let sent = request.clone();
            let fut = send(request);
            async move {
                let response = fut.await?;
                Ok::<_, ApiError>(Exchange {
                    request: sent,
                    response,
                })
            }
        },
    )
    .await;

    match result {
        Ok(exchange) => Ok(exchange),
        Err(FollowError::Failed(e)) => Err(e),
        Err(FollowError::Exhausted(last)) => Err(ApiError::new(
            ErrorKind::RedirectLoop,
            last.response.status.as_u16(),
            format!("Too many redirects (more than {MAX_REDIRECT_HOPS} additional requests)"),
            classify::snippet(&last.response.body_text),
        )),
    }
}
