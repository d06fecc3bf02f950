//! Events emitted by the gateway client

use super::GatewayEventType;
use crate::connection::ConnectionState;
use crate::error::GatewayError;
use serde_json::Value;

/// Everything a subscriber can observe
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// READY or RESUMED processed; the session is usable
    Connected,
    /// A dispatch (op 0) frame, in arrival order
    Dispatch { event_name: String, payload: Value },
    /// Something went wrong; a following `StateChange` to `Failed` marks it terminal
    Error(GatewayError),
    StateChange {
        new: ConnectionState,
        old: ConnectionState,
    },
}

impl GatewayEvent {
    /// Typed dispatch name, if this is a dispatch with a known name
    #[must_use]
    pub fn event_type(&self) -> Option<GatewayEventType> {
        match self {
            Self::Dispatch { event_name, .. } => GatewayEventType::from_str(event_name),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_dispatch(&self) -> bool {
        matches!(self, Self::Dispatch { .. })
    }
}
