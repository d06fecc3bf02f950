//! Connection management
//!
//! Session state, heartbeat, reconnect backoff and the driver task that ties
//! them to a transport.

pub mod backoff;
mod driver;
mod heartbeat;
mod session;
mod state;

pub(crate) use driver::{spawn_driver, Command, DriverContext, DriverHandle};
pub use heartbeat::{HeartbeatController, HeartbeatSignal};
pub use session::{ResumableSession, SessionError, SessionInfo, SessionState};
pub use state::ConnectionState;
