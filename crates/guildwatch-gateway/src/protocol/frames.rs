//! Typed view of inbound frames
//!
//! Converts a decoded [`GatewayPayload`] into a tagged union keyed by opcode,
//! so the engine never looks at raw `d` values for the frames it acts on.

use super::{GatewayPayload, HelloPayload, OpCode, ReadyPayload};
use crate::error::ProtocolError;
use serde::Deserialize;
use serde_json::Value;

/// Dispatch event names the engine reacts to
pub const READY: &str = "READY";
pub const RESUMED: &str = "RESUMED";

/// Inbound frame, one variant per opcode the client handles
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayFrame {
    Dispatch(DispatchEvent),
    /// Server asks for an immediate heartbeat
    Heartbeat,
    Reconnect,
    InvalidSession {
        resumable: bool,
    },
    Hello(HelloPayload),
    HeartbeatAck,
    /// Unknown opcode, or a client-only opcode echoed by the server
    Unknown {
        op: u64,
    },
}

/// Dispatch (op 0) body
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    Ready { ready: ReadyPayload, payload: Value },
    Resumed { payload: Value },
    Other { name: String, payload: Value },
}

impl DispatchEvent {
    /// Event name as sent in `t`
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Ready { .. } => READY,
            Self::Resumed { .. } => RESUMED,
            Self::Other { name, .. } => name,
        }
    }

    /// Raw `d` value
    #[must_use]
    pub fn payload(&self) -> &Value {
        match self {
            Self::Ready { payload, .. } | Self::Resumed { payload } | Self::Other { payload, .. } => {
                payload
            }
        }
    }

    /// Split into the `(event_name, payload)` pair forwarded to consumers
    #[must_use]
    pub fn into_parts(self) -> (String, Value) {
        match self {
            Self::Ready { payload, .. } => (READY.to_string(), payload),
            Self::Resumed { payload } => (RESUMED.to_string(), payload),
            Self::Other { name, payload } => (name, payload),
        }
    }

    fn parse(name: String, payload: Value) -> Result<Self, ProtocolError> {
        match name.as_str() {
            READY => {
                let ready = ReadyPayload::deserialize(&payload)
                    .map_err(|e| ProtocolError::invalid_payload("READY", &e))?;
                Ok(Self::Ready { ready, payload })
            }
            RESUMED => Ok(Self::Resumed { payload }),
            _ => Ok(Self::Other { name, payload }),
        }
    }
}

impl TryFrom<GatewayPayload> for GatewayFrame {
    type Error = ProtocolError;

    fn try_from(payload: GatewayPayload) -> Result<Self, Self::Error> {
        let Some(op) = payload.opcode() else {
            return Ok(Self::Unknown { op: payload.op });
        };

        match op {
            OpCode::Dispatch => {
                let name = payload.t.ok_or(ProtocolError::MissingEventName)?;
                DispatchEvent::parse(name, payload.d).map(Self::Dispatch)
            }
            OpCode::Heartbeat => Ok(Self::Heartbeat),
            OpCode::Reconnect => Ok(Self::Reconnect),
            OpCode::InvalidSession => Ok(Self::InvalidSession {
                resumable: payload.d.as_bool().unwrap_or(false),
            }),
            OpCode::Hello => serde_json::from_value(payload.d)
                .map(Self::Hello)
                .map_err(|e| ProtocolError::invalid_payload("HELLO", &e)),
            OpCode::HeartbeatAck => Ok(Self::HeartbeatAck),
            OpCode::Identify
            | OpCode::PresenceUpdate
            | OpCode::VoiceStateUpdate
            | OpCode::Resume
            | OpCode::RequestGuildMembers => Ok(Self::Unknown { op: payload.op }),
        }
    }
}
