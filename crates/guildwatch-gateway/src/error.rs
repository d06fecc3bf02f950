//! Gateway error types

use thiserror::Error;

/// Frame decode and shape failures
///
/// A protocol error affects only the frame that produced it; the connection
/// is kept open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Frame is not a JSON object with an integer `op`
    #[error("Malformed frame: {0}")]
    Malformed(String),

    /// Binary frame whose bytes are not UTF-8
    #[error("Binary frame is not valid UTF-8")]
    InvalidUtf8,

    /// Dispatch frame without a `t` field
    #[error("Dispatch frame is missing its event name")]
    MissingEventName,

    /// Known opcode or event whose `d` does not have the expected shape
    #[error("Invalid {kind} payload: {reason}")]
    InvalidPayload { kind: &'static str, reason: String },

    /// Outbound payload could not be serialized
    #[error("Failed to encode payload: {0}")]
    Encode(String),
}

impl ProtocolError {
    pub(crate) fn invalid_payload(kind: &'static str, err: &serde_json::Error) -> Self {
        Self::InvalidPayload {
            kind,
            reason: err.to_string(),
        }
    }
}

/// Errors surfaced through the `error` event
///
/// `Clone` so a single error can be delivered to every subscriber.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Transport failed to open, read or write
    #[error("Transport error: {0}")]
    Transport(String),

    /// A single inbound frame could not be decoded
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The previous heartbeat was never acknowledged
    #[error("Heartbeat not acknowledged within {interval_ms}ms")]
    HeartbeatTimeout { interval_ms: u64 },

    /// Server closed with a code that can never succeed on retry
    #[error("Fatal close code {code}: {reason}")]
    FatalSession { code: u16, reason: String },

    /// Reconnect budget exhausted
    #[error("Max reconnect attempts reached")]
    MaxReconnect { attempts: u32 },

    /// Outbound command issued while no session is established
    #[error("Gateway is not connected")]
    NotConnected,
}

impl GatewayError {
    /// Whether this error is followed by a transition to `Failed`
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::FatalSession { .. } | Self::MaxReconnect { .. })
    }

    pub(crate) fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Gateway result type
pub type GatewayResult<T> = Result<T, GatewayError>;
