//! Gateway message envelope
//!
//! Every frame on the wire is a JSON object `{op, d, s, t}`.

use super::{
    IdentifyPayload, OpCode, PresenceUpdatePayload, RequestGuildMembersPayload, ResumePayload,
};
use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gateway message envelope
///
/// `op` is kept raw so frames with opcodes this client does not know still
/// decode; use [`GatewayPayload::opcode`] for the typed view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPayload {
    /// Operation code
    pub op: u64,

    /// Event data payload
    #[serde(default)]
    pub d: Value,

    /// Sequence number (dispatches only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Event name (dispatches only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayPayload {
    /// Envelope with no sequence or event name
    #[must_use]
    pub fn new(op: OpCode, d: Value) -> Self {
        Self {
            op: op.as_u8().into(),
            d,
            s: None,
            t: None,
        }
    }

    /// Typed opcode, `None` when unknown
    #[must_use]
    pub fn opcode(&self) -> Option<OpCode> {
        u8::try_from(self.op).ok().and_then(OpCode::from_u8)
    }

    // === Decode / encode ===

    /// Decode a text frame
    ///
    /// Only a JSON object is an envelope; serde would otherwise map a JSON
    /// array onto the fields by position.
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(raw).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        if !value.is_object() {
            return Err(ProtocolError::Malformed(format!(
                "expected a JSON object, found {}",
                json_kind(&value)
            )));
        }
        serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// Decode a binary frame carrying UTF-8 JSON
    pub fn decode_bytes(raw: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(raw).map_err(|_| ProtocolError::InvalidUtf8)?;
        Self::decode(text)
    }

    /// Encode to a text frame
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    // === Client messages ===

    /// Heartbeat (op=1) carrying the last sequence, or null
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::new(OpCode::Heartbeat, last_sequence.map_or(Value::Null, Value::from))
    }

    /// Identify (op=2)
    pub fn identify(payload: &IdentifyPayload) -> Result<Self, ProtocolError> {
        Self::with_body(OpCode::Identify, payload)
    }

    /// Presence Update (op=3)
    pub fn presence_update(payload: &PresenceUpdatePayload) -> Result<Self, ProtocolError> {
        Self::with_body(OpCode::PresenceUpdate, payload)
    }

    /// Resume (op=6)
    pub fn resume(payload: &ResumePayload) -> Result<Self, ProtocolError> {
        Self::with_body(OpCode::Resume, payload)
    }

    /// Request Guild Members (op=8)
    pub fn request_guild_members(payload: &RequestGuildMembersPayload) -> Result<Self, ProtocolError> {
        Self::with_body(OpCode::RequestGuildMembers, payload)
    }

    fn with_body<T: Serialize>(op: OpCode, body: &T) -> Result<Self, ProtocolError> {
        let d = serde_json::to_value(body).map_err(|e| ProtocolError::Encode(e.to_string()))?;
        Ok(Self::new(op, d))
    }

    // === Server messages ===

    /// Dispatch (op=0)
    #[must_use]
    pub fn dispatch(event_name: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch.as_u8().into(),
            d: data,
            s: Some(sequence),
            t: Some(event_name.into()),
        }
    }

    /// Hello (op=10)
    #[must_use]
    pub fn hello(heartbeat_interval: u64) -> Self {
        Self::new(OpCode::Hello, serde_json::json!({ "heartbeat_interval": heartbeat_interval }))
    }

    /// Heartbeat ACK (op=11)
    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::new(OpCode::HeartbeatAck, Value::Null)
    }

    /// Reconnect (op=7)
    #[must_use]
    pub fn reconnect() -> Self {
        Self::new(OpCode::Reconnect, Value::Null)
    }

    /// Invalid Session (op=9)
    ///
    /// `resumable` indicates if the session can be resumed.
    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self::new(OpCode::InvalidSession, Value::Bool(resumable))
    }

    /// Attach a sequence number
    #[must_use]
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.s = Some(sequence);
        self
    }
}

impl std::fmt::Display for GatewayPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.opcode() {
            Some(op) => write!(f, "GatewayPayload(op={op}")?,
            None => write!(f, "GatewayPayload(op=unknown {}", self.op)?,
        }
        if let Some(t) = &self.t {
            write!(f, ", t={t}")?;
        }
        if let Some(s) = self.s {
            write!(f, ", s={s}")?;
        }
        write!(f, ")")
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
