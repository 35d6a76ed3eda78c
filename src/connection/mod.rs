//! Connection that retries transient network failures.

mod config;

use anyhow::Result;
use log::{debug, warn};

use crate::error::is_transient;
use crate::http::{Headers, Method, RawExchange, Request, Transport};
use crate::response::{ParsedResponse, classify};

pub use config::{ConnectionConfig, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT};

/// Issues requests through a [`Transport`], retrying DNS, refused and
/// reset failures up to `max_retries` times.
pub struct RetryingConnection<T: Transport> {
    transport: T,
    config: ConnectionConfig,
}

impl<T: Transport> RetryingConnection<T> {
    /// Creates a new connection over `transport` with the given settings.
    pub fn new(transport: T, config: ConnectionConfig) -> Self {
        Self { transport, config }
    }

    /// Returns a reference to the connection settings.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Returns a reference to the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Performs one logical request and returns the raw exchange.
    ///
    /// A [`crate::error::TransientNetworkError`] is retried after the
    /// configured delay; once retries run out the last one is returned
    /// unchanged. Any other error is returned at once.
    #[tracing::instrument(skip(self, headers, body))]
    pub async fn request(
        &self,
        path: &str,
        method: Method,
        headers: Headers,
        body: Option<Vec<u8>>,
    ) -> Result<RawExchange> {
        if path.is_empty() {
            anyhow::bail!("Request path must not be empty");
        }

        let request = Request {
            path: path.to_string(),
            method,
            headers,
            body,
        };
        let max_retries = self.config.max_retries();
        let mut retry = 0;

        loop {
            match self.transport.send(&request, self.config.timeout()).await {
                Ok(exchange) => return Ok(exchange),
                Err(e) => {
                    if !is_transient(&e) {
                        debug!("{} {}: non-retryable error: {}", method, path, e);
                        return Err(e);
                    }

                    if retry >= max_retries {
                        warn!(
                            "{} {}: giving up after {} attempts: {}",
                            method,
                            path,
                            retry + 1,
                            e
                        );
                        return Err(e);
                    }

                    let delay = self.config.delay_for_retry(retry);
                    retry += 1;
                    warn!(
                        "{} {}: attempt {}/{} failed ({}), retrying in {:?}...",
                        method,
                        path,
                        retry,
                        max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Performs a request and classifies the result.
    ///
    /// Fails with [`crate::error::RateLimitReachedError`] on HTTP 429; the
    /// connection never resubmits a rate-limited request itself.
    #[tracing::instrument(skip(self, headers, body))]
    pub async fn execute(
        &self,
        path: &str,
        method: Method,
        headers: Headers,
        body: Option<Vec<u8>>,
    ) -> Result<ParsedResponse> {
        let exchange = self.request(path, method, headers, body).await?;
        classify(exchange)
    }
}
