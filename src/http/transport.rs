//! Transport boundary: issue exactly one HTTP request, no retries.

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use std::error::Error as StdError;
use std::io::ErrorKind;
use std::time::Duration;

use super::exchange::{Headers, Method, RawExchange, Request, StatusLine};
use crate::error::TransientNetworkError;

/// Sends a single request and returns the completed exchange.
///
/// Implementations must report DNS, connection-refused and connection-reset
/// failures as [`TransientNetworkError`] so the connection layer can retry
/// them. Any other failure is returned as-is.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &Request, timeout: Duration) -> Result<RawExchange>;
}

/// Default transport backed by a `reqwest::Client` bound to one base URL.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Creates a new transport wrapping the given reqwest Client.
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Returns the base URL request paths are joined to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins the base URL and a request path with exactly one slash.
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn send(&self, request: &Request, timeout: Duration) -> Result<RawExchange> {
        let url = self.url_for(&request.path);
        debug!("{} {} (timeout {:?})", request.method, url, timeout);

        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &url)
            .timeout(timeout);
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(into_transport_error)?;

        let status = response.status();
        let status_line = StatusLine::new(
            format!("{:?}", response.version()),
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
        );
        let headers: Headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(into_transport_error)?
            .to_vec();

        Ok(RawExchange {
            status_line,
            headers,
            body,
        })
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Options => reqwest::Method::OPTIONS,
    }
}

/// Maps a reqwest failure to a transient error when it qualifies,
/// otherwise returns the reqwest error unchanged.
fn into_transport_error(error: reqwest::Error) -> anyhow::Error {
    match classify_transient(&error) {
        Some(transient) => anyhow::Error::from(transient),
        None => anyhow::Error::from(error),
    }
}

/// Walks the error source chain looking for a DNS, refused or reset failure.
///
/// DNS failures carry no io kind of their own, so they are recognised by
/// message, and only on nested sources, never on the outermost error.
pub fn classify_transient(error: &(dyn StdError + 'static)) -> Option<TransientNetworkError> {
    let mut current = Some(error);
    let mut nested = false;
    while let Some(err) = current {
        if nested {
            let message = err.to_string();
            if message.contains("dns error") || message.contains("failed to lookup address") {
                return Some(TransientNetworkError::DnsResolution(describe(error)));
            }
        }
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            match io.kind() {
                ErrorKind::ConnectionRefused => {
                    return Some(TransientNetworkError::ConnectionRefused(describe(error)));
                }
                ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
                | ErrorKind::NotConnected => {
                    return Some(TransientNetworkError::ConnectionReset(describe(error)));
                }
                _ => {}
            }
        }
        current = err.source();
        nested = true;
    }
    None
}

/// Flattens an error chain into `outer: inner: ...`.
fn describe(error: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![error.to_string()];
    let mut current = error.source();
    while let Some(err) = current {
        let message = err.to_string();
        if !parts.iter().any(|p| p == &message) {
            parts.push(message);
        }
        current = err.source();
    }
    parts.join(": ")
}
