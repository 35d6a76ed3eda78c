//! HTTP exchange types and the transport they travel over.

mod exchange;
mod transport;

pub use exchange::{Headers, Method, RawExchange, Request, StatusLine};
pub use transport::{ReqwestTransport, Transport, classify_transient};

#[cfg(test)]
pub use transport::MockTransport;
