//! Resilient API client for apps that run both in a browser-like web context
//! and inside native app wrappers.
//!
//! Requests go through the standard web transport or the wrapper's native
//! HTTP bridge depending on the detected platform. Endpoints are
//! canonicalized, redirects are followed a bounded number of times, and every
//! response is classified before it is parsed, so callers always get either
//! their payload or a structured [`ApiError`].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

pub use auth::{AuthApi, Session, TeamInfo, TeamVerification};
pub use backend::native::{NativeData, NativeHttp, NativeRequest, NativeResponse};
pub use backend::{Backend, BackendConfig};
pub use client::{Client, ClientBuilder, SessionExpiredHandler};
pub use config::ClientConfig;
pub use error::{ApiError, Error, ErrorKind, Result};
pub use platform::{PlatformContext, PlatformSignals};
pub use request::{Request, RequestBuilder};
pub use token::{TokenStore, UserSummary};

mod auth;
pub mod backend;
pub mod classify;
mod client;
pub mod config;
pub mod endpoint;
mod error;
pub mod platform;
pub mod redirect;
mod request;
pub mod token;
