//! Session state manager
//!
//! Holds the connection state and everything needed to resume: session id,
//! resume URL, last sequence and the retry counter. All fields sit behind a
//! single lock; the driver task is the only writer of `sequence`.

use super::ConnectionState;
use crate::broadcast::EventDispatcher;
use crate::events::GatewayEvent;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

/// Session id and resume URL, always stored together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumableSession {
    pub session_id: String,
    pub resume_url: String,
}

/// Per-lifecycle session data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    /// Present from READY until the session is invalidated or reset
    pub resumable: Option<ResumableSession>,
    /// Last sequence number received on any frame
    pub sequence: Option<u64>,
    /// Reconnect decisions since the last READY
    pub reconnect_attempts: u32,
}

impl SessionInfo {
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.resumable.as_ref().map(|s| s.session_id.as_str())
    }

    #[must_use]
    pub fn resume_url(&self) -> Option<&str> {
        self.resumable.as_ref().map(|s| s.resume_url.as_str())
    }

    #[must_use]
    pub fn can_resume(&self) -> bool {
        self.resumable.is_some()
    }
}

/// Session write errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Session id and resume URL must be set together")]
    UnpairedSession,
}

#[derive(Debug, Default)]
struct Inner {
    state: ConnectionState,
    info: SessionInfo,
}

/// Shared connection and session state
pub struct SessionState {
    inner: RwLock<Inner>,
    events: EventDispatcher,
}

impl SessionState {
    /// Create in `Disconnected` with an empty session
    #[must_use]
    pub fn new(events: EventDispatcher) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            events,
        }
    }

    // === Connection state ===

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.read().state
    }

    /// Move to `new`, emitting `StateChange` only if the state actually changed
    ///
    /// Returns the previous state.
    pub fn set_state(&self, new: ConnectionState) -> ConnectionState {
        let old = {
            let mut inner = self.inner.write();
            std::mem::replace(&mut inner.state, new)
        };

        if old != new {
            debug!(old = %old, new = %new, "Connection state changed");
            self.events.emit(GatewayEvent::StateChange { new, old });
        }
        old
    }

    // === Session info ===

    /// Copy of the current session info
    #[must_use]
    pub fn snapshot(&self) -> SessionInfo {
        self.inner.read().info.clone()
    }

    #[must_use]
    pub fn resumable(&self) -> Option<ResumableSession> {
        self.inner.read().info.resumable.clone()
    }

    /// Store or clear the session id / resume URL pair
    ///
    /// Both must be present or both absent.
    pub fn set_session(
        &self,
        session_id: Option<String>,
        resume_url: Option<String>,
    ) -> Result<(), SessionError> {
        let resumable = match (session_id, resume_url) {
            (Some(session_id), Some(resume_url)) => Some(ResumableSession {
                session_id,
                resume_url,
            }),
            (None, None) => None,
            _ => return Err(SessionError::UnpairedSession),
        };

        self.inner.write().info.resumable = resumable;
        Ok(())
    }

    /// Forget the session id and resume URL; the sequence is kept
    pub fn clear_session(&self) {
        self.inner.write().info.resumable = None;
    }

    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.inner.read().info.sequence
    }

    pub fn set_sequence(&self, sequence: u64) {
        self.inner.write().info.sequence = Some(sequence);
    }

    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.read().info.reconnect_attempts
    }

    /// Count one more reconnect decision, returning the new total
    pub fn increment_attempts(&self) -> u32 {
        let mut inner = self.inner.write();
        inner.info.reconnect_attempts = inner.info.reconnect_attempts.saturating_add(1);
        inner.info.reconnect_attempts
    }

    pub fn reset_attempts(&self) {
        self.inner.write().info.reconnect_attempts = 0;
    }

    /// Drop all session data; the connection state is left alone
    pub fn reset(&self) {
        self.inner.write().info = SessionInfo::default();
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("SessionState")
            .field("state", &inner.state)
            .field("info", &inner.info)
            .finish()
    }
}
