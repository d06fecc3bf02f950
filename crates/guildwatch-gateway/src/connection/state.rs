//! Connection lifecycle state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection state
///
/// `Failed` is terminal until the next explicit `connect()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No transport and no pending reconnect
    #[default]
    Disconnected,
    /// Transport opening, or open and waiting for READY/RESUMED
    Connecting,
    /// Session established
    Connected,
    /// Transport closed, waiting out the backoff
    Reconnecting,
    /// Fatal close or reconnect budget exhausted
    Failed,
}

impl ConnectionState {
    /// Get the name of this state
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }

    /// Whether a `connect()` from this state starts a fresh lifecycle
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
