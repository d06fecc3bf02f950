//! Transport abstraction
//!
//! The engine talks to the gateway through these two traits. A new
//! [`Transport`] is opened by the [`Connector`] for every connection attempt.

#[cfg(test)]
pub(crate) mod memory;
mod websocket;

pub use websocket::{WsConnector, WsTransport};

use crate::error::GatewayError;
use async_trait::async_trait;

/// Something read from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Text frame
    Text(String),
    /// Binary frame; accepted when it holds UTF-8 JSON
    Binary(Vec<u8>),
    /// Read failed; the stream ends right after
    Error(String),
    /// Close frame received. `code` is 1005 when the frame carried no status.
    Closed { code: u16, reason: String },
}

/// One open connection
#[async_trait]
pub trait Transport: Send {
    /// Send a text frame
    async fn send(&mut self, text: String) -> Result<(), GatewayError>;

    /// Next inbound event; `None` once the stream has ended without a close frame
    ///
    /// Must be cancel safe: it is polled inside `select!`.
    async fn next_event(&mut self) -> Option<TransportEvent>;

    /// Send a close frame; errors are swallowed since the connection is going away
    async fn close(&mut self, code: u16, reason: &str);
}

/// Opens transports
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, GatewayError>;
}
