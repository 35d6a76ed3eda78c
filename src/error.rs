//! Error conditions surfaced by the request core.
//!
//! Both types are meant to travel inside an `anyhow::Error` and be
//! recovered with `downcast_ref`, so callers branch on the type and never
//! on message text.

use std::time::Duration;

/// Network failures that may go away when the request is sent again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransientNetworkError {
    /// Host name could not be resolved
    DnsResolution(String),
    /// Peer refused the connection
    ConnectionRefused(String),
    /// An established connection was reset or dropped
    ConnectionReset(String),
}

impl TransientNetworkError {
    /// The underlying cause as reported by the transport.
    pub fn cause(&self) -> &str {
        match self {
            TransientNetworkError::DnsResolution(cause)
            | TransientNetworkError::ConnectionRefused(cause)
            | TransientNetworkError::ConnectionReset(cause) => cause,
        }
    }
}

impl std::fmt::Display for TransientNetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransientNetworkError::DnsResolution(cause) => {
                write!(f, "DNS resolution failed: {}", cause)
            }
            TransientNetworkError::ConnectionRefused(cause) => {
                write!(f, "Connection refused: {}", cause)
            }
            TransientNetworkError::ConnectionReset(cause) => {
                write!(f, "Connection reset: {}", cause)
            }
        }
    }
}

impl std::error::Error for TransientNetworkError {}

/// Details a provider attaches to a rate-limited (HTTP 429) response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// How long the provider asks the caller to wait before resubmitting.
    pub retry_after: Duration,
    /// Provider explanation, from a `reason` header or the status line.
    pub reason: String,
}

/// The provider rejected the request because the caller exceeded its rate limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitReachedError {
    info: RateLimitInfo,
}

impl RateLimitReachedError {
    /// Creates a rate-limit error from the provider's details.
    pub fn new(info: RateLimitInfo) -> Self {
        Self { info }
    }

    /// Returns a reference to the carried rate-limit details.
    pub fn info(&self) -> &RateLimitInfo {
        &self.info
    }

    /// Returns how long the provider asks the caller to wait.
    pub fn retry_after(&self) -> Duration {
        self.info.retry_after
    }

    /// Returns the provider's explanation.
    pub fn reason(&self) -> &str {
        &self.info.reason
    }
}

impl std::fmt::Display for RateLimitReachedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Rate limit exceeded ({}). Retry after {:.1}s.",
            self.info.reason,
            self.info.retry_after.as_secs_f64()
        )
    }
}

impl std::error::Error for RateLimitReachedError {}

/// Returns true when the error is a [`TransientNetworkError`] worth retrying.
pub fn is_transient(e: &anyhow::Error) -> bool {
    e.downcast_ref::<TransientNetworkError>().is_some()
}

/// Returns the rate-limit condition carried by the error, if any.
pub fn rate_limit(e: &anyhow::Error) -> Option<&RateLimitReachedError> {
    e.downcast_ref::<RateLimitReachedError>()
}
