//! # guildwatch-gateway
//!
//! Client side of the Discord gateway: opens the WebSocket, identifies or
//! resumes, keeps the heartbeat going, reconnects with backoff, and fans
//! dispatch events out to subscribers and sinks.
//!
//! ```no_run
//! use guildwatch_gateway::{GatewayClient, GatewayConfig, GatewayEvent, LoggingSink};
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let client = GatewayClient::builder(GatewayConfig::new("bot-token"))
//!     .sink(Arc::new(LoggingSink))
//!     .build();
//! let mut events = client.subscribe();
//! client.connect();
//!
//! while let Ok(event) = events.recv().await {
//!     if let GatewayEvent::Dispatch { event_name, .. } = event {
//!         println!("{event_name}");
//!     }
//! }
//! # }
//! ```

pub mod broadcast;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod protocol;
pub mod transport;

pub use broadcast::{EventDispatcher, EventDispatcherConfig, EventSink, LoggingSink};
pub use client::{GatewayClient, GatewayClientBuilder};
pub use config::{GatewayConfig, DEFAULT_GATEWAY_URL, DEFAULT_MAX_RECONNECTS};
pub use connection::{ConnectionState, SessionInfo};
pub use error::{GatewayError, GatewayResult, ProtocolError};
pub use events::{GatewayEvent, GatewayEventType};
pub use protocol::{CloseCode, GatewayPayload, Intents, OpCode};
pub use transport::{Connector, Transport, TransportEvent};
