//! In-memory transport for driving the engine from tests

use super::{Connector, Transport, TransportEvent};
use crate::error::GatewayError;
use crate::protocol::GatewayPayload;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// What the client did on a memory transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ClientFrame {
    Sent(String),
    Closed { code: u16, reason: String },
}

#[derive(Default)]
struct Attempts {
    urls: Vec<(String, Instant)>,
    refuse_next: u32,
}

/// Hands the test a [`MockServer`] for every connection the client opens
#[derive(Clone)]
pub(crate) struct MemoryConnector {
    servers: mpsc::UnboundedSender<MockServer>,
    attempts: Arc<Mutex<Attempts>>,
}

impl MemoryConnector {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<MockServer>) {
        let (servers, rx) = mpsc::unbounded_channel();
        let connector = Self {
            servers,
            attempts: Arc::new(Mutex::new(Attempts::default())),
        };
        (connector, rx)
    }

    /// Fail the next `count` connection attempts
    pub(crate) fn refuse_next(&self, count: u32) {
        self.attempts.lock().refuse_next = count;
    }

    /// URL and time of every attempt, refused ones included
    pub(crate) fn attempts(&self) -> Vec<(String, Instant)> {
        self.attempts.lock().urls.clone()
    }

    pub(crate) fn attempt_count(&self) -> usize {
        self.attempts.lock().urls.len()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, GatewayError> {
        {
            let mut attempts = self.attempts.lock();
            attempts.urls.push((url.to_string(), Instant::now()));
            if attempts.refuse_next > 0 {
                attempts.refuse_next -= 1;
                return Err(GatewayError::Transport("connection refused".into()));
            }
        }

        let (to_client, incoming) = mpsc::unbounded_channel();
        let (outgoing, from_client) = mpsc::unbounded_channel();

        let server = MockServer {
            url: url.to_string(),
            to_client,
            from_client,
        };
        self.servers
            .send(server)
            .map_err(|_| GatewayError::Transport("test harness gone".into()))?;

        Ok(Box::new(MemoryTransport {
            incoming,
            outgoing,
            closed: false,
        }))
    }
}

struct MemoryTransport {
    incoming: mpsc::UnboundedReceiver<TransportEvent>,
    outgoing: mpsc::UnboundedSender<ClientFrame>,
    closed: bool,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, text: String) -> Result<(), GatewayError> {
        if self.closed {
            return Err(GatewayError::Transport("transport closed".into()));
        }
        self.outgoing
            .send(ClientFrame::Sent(text))
            .map_err(|_| GatewayError::Transport("peer gone".into()))
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.incoming.recv().await
    }

    async fn close(&mut self, code: u16, reason: &str) {
        if !self.closed {
            self.closed = true;
            let _ = self.outgoing.send(ClientFrame::Closed {
                code,
                reason: reason.to_string(),
            });
        }
    }
}

/// Server end of one memory connection
pub(crate) struct MockServer {
    pub(crate) url: String,
    to_client: mpsc::UnboundedSender<TransportEvent>,
    from_client: mpsc::UnboundedReceiver<ClientFrame>,
}

impl MockServer {
    pub(crate) fn send(&self, payload: &GatewayPayload) {
        let text = payload.encode().expect("encodable payload");
        let _ = self.to_client.send(TransportEvent::Text(text));
    }

    pub(crate) fn send_event(&self, event: TransportEvent) {
        let _ = self.to_client.send(event);
    }

    pub(crate) fn close(&self, code: u16) {
        self.send_event(TransportEvent::Closed {
            code,
            reason: String::new(),
        });
    }

    /// Next thing the client did, `None` once it dropped the transport
    pub(crate) async fn recv(&mut self) -> Option<ClientFrame> {
        self.from_client.recv().await
    }

    /// Next frame the client sent; panics on close
    pub(crate) async fn recv_payload(&mut self) -> GatewayPayload {
        match self.recv().await {
            Some(ClientFrame::Sent(text)) => GatewayPayload::decode(&text).expect("client sent valid JSON"),
            other => panic!("expected a client frame, got {other:?}"),
        }
    }

    /// Non-blocking check for anything the client has sent
    pub(crate) fn try_recv(&mut self) -> Option<ClientFrame> {
        self.from_client.try_recv().ok()
    }
}
