//! Gateway events
//!
//! The typed event stream the client publishes to subscribers and sinks.

mod event_types;
mod gateway_event;

pub use event_types::GatewayEventType;
pub use gateway_event::GatewayEvent;
