//! Test fixtures
//!
//! Canned server payloads and recording sinks.

use async_trait::async_trait;
use guildwatch_gateway::{EventSink, GatewayPayload};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::time::Duration;

pub fn hello(heartbeat_interval: u64) -> GatewayPayload {
    GatewayPayload::hello(heartbeat_interval)
}

pub fn ready(session_id: &str, resume_url: &str, seq: u64) -> GatewayPayload {
    GatewayPayload::dispatch(
        "READY",
        seq,
        json!({
            "v": 10,
            "user": {"id": "80351110224678912", "username": "guildwatch"},
            "guilds": [],
            "session_id": session_id,
            "resume_gateway_url": resume_url,
        }),
    )
}

pub fn guild_create(seq: u64, guild_id: &str) -> GatewayPayload {
    GatewayPayload::dispatch(
        "GUILD_CREATE",
        seq,
        json!({"id": guild_id, "name": "Test Guild", "member_count": 3}),
    )
}

pub fn message_create(seq: u64, guild_id: &str, content: &str) -> GatewayPayload {
    GatewayPayload::dispatch(
        "MESSAGE_CREATE",
        seq,
        json!({"guild_id": guild_id, "channel_id": "1", "content": content}),
    )
}

/// Sink that remembers every dispatch it sees
#[derive(Default)]
pub struct RecordingSink {
    seen: Mutex<Vec<(String, Value)>>,
}

impl RecordingSink {
    pub fn names(&self) -> Vec<String> {
        self.seen.lock().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn payloads(&self) -> Vec<(String, Value)> {
        self.seen.lock().clone()
    }

    /// Poll until at least `count` events arrived or `timeout` passes
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.seen.lock().len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.seen.lock().len() >= count
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn handle(&self, event_name: &str, payload: &Value) -> anyhow::Result<()> {
        self.seen.lock().push((event_name.to_string(), payload.clone()));
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Sink that errors on every event and panics on `MESSAGE_CREATE`
pub struct BrokenSink;

#[async_trait]
impl EventSink for BrokenSink {
    async fn handle(&self, event_name: &str, _payload: &Value) -> anyhow::Result<()> {
        if event_name == "MESSAGE_CREATE" {
            panic!("broken sink");
        }
        anyhow::bail!("downstream unavailable")
    }

    fn name(&self) -> &str {
        "broken"
    }
}
