//! Event broadcasting
//!
//! Distributes gateway events to subscribers and downstream sinks.

mod dispatcher;
mod sink;

pub use dispatcher::{EventDispatcher, EventDispatcherConfig};
pub use sink::{EventSink, LoggingSink};
