//! Downstream event sinks

use crate::events::GatewayEventType;
use async_trait::async_trait;
use serde_json::Value;

/// Consumer of dispatch events
///
/// Called once per dispatch, in arrival order, on the dispatcher's worker
/// task. Returned errors and panics are logged and never reach the
/// connection.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Process one dispatch event
    async fn handle(&self, event_name: &str, payload: &Value) -> anyhow::Result<()>;

    /// Name used in log lines
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Sink that logs each dispatch
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSink;

#[async_trait]
impl EventSink for LoggingSink {
    async fn handle(&self, event_name: &str, payload: &Value) -> anyhow::Result<()> {
        let guild_id = payload.get("guild_id").and_then(Value::as_str);

        match GatewayEventType::from_str(event_name) {
            Some(event) => tracing::info!(event = %event, guild_id, "Dispatch received"),
            None => tracing::debug!(event = event_name, guild_id, "Unhandled dispatch received"),
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "logging"
    }
}
