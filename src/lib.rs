//! Resilient HTTP request core shared by cloud provider drivers.
//!
//! [`connection::RetryingConnection`] sends requests through a
//! [`http::Transport`] and retries transient network failures;
//! [`response::classify`] turns HTTP 429 into a
//! [`error::RateLimitReachedError`] carrying the provider's retry-after hint.

pub mod connection;
pub mod error;
pub mod http;
pub mod response;

pub use connection::{ConnectionConfig, RetryingConnection};
pub use error::{RateLimitInfo, RateLimitReachedError, TransientNetworkError};
pub use http::{Headers, Method, RawExchange, ReqwestTransport, StatusLine, Transport};
pub use response::{ParsedResponse, classify};
