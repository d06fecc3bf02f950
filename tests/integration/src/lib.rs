//! Integration test utilities for the gateway client
//!
//! A mock Discord gateway on a local TCP port, plus canned payloads and
//! sinks, for driving [`guildwatch_gateway::GatewayClient`] end to end over
//! real WebSockets.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
