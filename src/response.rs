//! Rate-limit aware classification of completed exchanges.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::{RateLimitInfo, RateLimitReachedError};
use crate::http::{Headers, RawExchange};

/// Status code providers use to signal rate limiting.
pub const TOO_MANY_REQUESTS: u16 = 429;

/// Wait suggested to the caller when a 429 carries no usable `retry-after`.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::ZERO;

const RETRY_AFTER_HEADERS: [&str; 2] = ["retry-after", "retry_after"];
const REASON_HEADER: &str = "reason";

/// Classifies an exchange, failing with [`RateLimitReachedError`] on 429.
///
/// The status code alone decides: a 429 whose reason phrase reads
/// "CONFLICT" is still a rate limit. Every other status becomes a
/// [`ParsedResponse`] without further interpretation.
pub fn classify(exchange: RawExchange) -> Result<ParsedResponse> {
    if exchange.status_line.status_code == TOO_MANY_REQUESTS {
        let info = rate_limit_info(&exchange);
        warn!(
            "Rate limited ({}), provider asks to retry after {:?}",
            info.reason, info.retry_after
        );
        return Err(RateLimitReachedError::new(info).into());
    }

    debug!("Response: {}", exchange.status_line);
    Ok(ParsedResponse { exchange })
}

fn rate_limit_info(exchange: &RawExchange) -> RateLimitInfo {
    RateLimitInfo {
        retry_after: retry_after(&exchange.headers),
        reason: rate_limit_reason(exchange),
    }
}

fn retry_after(headers: &Headers) -> Duration {
    RETRY_AFTER_HEADERS
        .iter()
        .find_map(|name| headers.get(name))
        .and_then(|value| {
            let parsed = parse_retry_after(value);
            if parsed.is_none() {
                debug!("Ignoring unparsable retry-after value {:?}", value);
            }
            parsed
        })
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

/// Parses a delay in seconds, integral or fractional. Values too large
/// for a `Duration` saturate to `Duration::MAX`.
fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let secs = value.parse::<f64>().ok()?;
    if secs.is_nan() || secs < 0.0 {
        return None;
    }
    Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
}

fn rate_limit_reason(exchange: &RawExchange) -> String {
    let from_header = exchange
        .headers
        .get(REASON_HEADER)
        .map(str::trim)
        .filter(|r| !r.is_empty());
    let from_status = Some(exchange.status_line.reason.trim()).filter(|r| !r.is_empty());

    from_header
        .or(from_status)
        .unwrap_or("Too Many Requests")
        .to_string()
}

/// A completed exchange that was not rate limited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    exchange: RawExchange,
}

impl ParsedResponse {
    /// Returns the HTTP status code.
    pub fn status(&self) -> u16 {
        self.exchange.status_line.status_code
    }

    /// Returns the status-line reason phrase.
    pub fn reason(&self) -> &str {
        &self.exchange.status_line.reason
    }

    /// Returns all response headers in the order received.
    pub fn headers(&self) -> &Headers {
        &self.exchange.headers
    }

    /// Returns the first value of a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.exchange.headers.get(name)
    }

    /// Returns the raw response body.
    pub fn body(&self) -> &[u8] {
        &self.exchange.body
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.exchange.body).into_owned()
    }

    /// Body decoded as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.exchange.body).context("Failed to parse JSON response")
    }

    /// True for 2xx and 3xx statuses.
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status())
    }

    /// Returns a reference to the underlying exchange.
    pub fn exchange(&self) -> &RawExchange {
        &self.exchange
    }

    /// Consumes the response and returns the underlying exchange.
    pub fn into_exchange(self) -> RawExchange {
        self.exchange
    }
}
