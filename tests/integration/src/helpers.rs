//! Test helpers for integration tests
//!
//! [`MockGateway`] listens on a local port and upgrades every accepted TCP
//! connection to a WebSocket, handing each one to the test as a
//! [`GatewayConnection`].

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use guildwatch_gateway::{GatewayClient, GatewayConfig, GatewayEvent, GatewayPayload, OpCode};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

/// Default wait for anything the client is expected to do
pub const STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// Local stand-in for the Discord gateway
pub struct MockGateway {
    pub addr: SocketAddr,
    connections: mpsc::UnboundedReceiver<GatewayConnection>,
    _handle: JoinHandle<()>,
}

impl MockGateway {
    /// Bind to an ephemeral port and start accepting
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, connections) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Ok(ws) = accept_async(stream).await {
                        let _ = tx.send(GatewayConnection { ws });
                    }
                });
            }
        });

        Ok(Self {
            addr,
            connections,
            _handle: handle,
        })
    }

    /// URL for `GatewayConfig::gateway_url`
    pub fn url(&self) -> String {
        format!("ws://{}/?v=10&encoding=json", self.addr)
    }

    /// Bare URL, the shape Discord uses for `resume_gateway_url`
    pub fn resume_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Client config pointed at this gateway
    pub fn config(&self) -> GatewayConfig {
        GatewayConfig::new("integration-token").with_gateway_url(self.url())
    }

    /// Wait for the client's next connection
    pub async fn accept(&mut self) -> Result<GatewayConnection> {
        tokio::time::timeout(STEP_TIMEOUT, self.connections.recv())
            .await
            .context("timed out waiting for a connection")?
            .context("listener stopped")
    }

    /// Next connection within `wait`, if any
    pub async fn try_accept(&mut self, wait: Duration) -> Option<GatewayConnection> {
        tokio::time::timeout(wait, self.connections.recv())
            .await
            .ok()
            .flatten()
    }
}

/// Server side of one client connection
pub struct GatewayConnection {
    ws: WebSocketStream<TcpStream>,
}

impl GatewayConnection {
    pub async fn send(&mut self, payload: &GatewayPayload) -> Result<()> {
        self.ws.send(Message::Text(payload.encode()?)).await?;
        Ok(())
    }

    /// Next payload from the client; fails on close
    pub async fn recv_payload(&mut self) -> Result<GatewayPayload> {
        loop {
            let message = tokio::time::timeout(STEP_TIMEOUT, self.ws.next())
                .await
                .context("timed out waiting for a client frame")?
                .context("client hung up")??;

            match message {
                Message::Text(text) => return Ok(GatewayPayload::decode(&text)?),
                Message::Close(frame) => {
                    anyhow::bail!("client closed: {frame:?}");
                }
                _ => {}
            }
        }
    }

    /// Next payload with the given opcode, skipping others
    pub async fn expect_op(&mut self, op: OpCode) -> Result<GatewayPayload> {
        loop {
            let payload = self.recv_payload().await?;
            if payload.opcode() == Some(op) {
                return Ok(payload);
            }
        }
    }

    /// Wait for the client's close frame and return its code
    pub async fn expect_close(&mut self) -> Result<u16> {
        loop {
            let next = tokio::time::timeout(STEP_TIMEOUT, self.ws.next())
                .await
                .context("timed out waiting for close")?;

            match next {
                Some(Ok(Message::Close(Some(frame)))) => return Ok(u16::from(frame.code)),
                Some(Ok(Message::Close(None))) => return Ok(1005),
                Some(Ok(_)) => {}
                Some(Err(e)) => anyhow::bail!("stream error before close: {e}"),
                None => anyhow::bail!("stream ended without close frame"),
            }
        }
    }

    /// Close from the server side with `code`
    pub async fn close(&mut self, code: u16) -> Result<()> {
        self.ws
            .close(Some(CloseFrame {
                code: CloseCode::from(code),
                reason: "mock gateway".into(),
            }))
            .await?;
        Ok(())
    }

    /// HELLO, wait for IDENTIFY, then READY with `session_id`
    pub async fn handshake(&mut self, session_id: &str, resume_url: &str) -> Result<GatewayPayload> {
        self.send(&crate::hello(45_000)).await?;
        let identify = self.expect_op(OpCode::Identify).await?;
        self.send(&crate::ready(session_id, resume_url, 1)).await?;
        Ok(identify)
    }
}

/// Wait until `events` yields something matching `pred`
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<GatewayEvent>,
    mut pred: F,
) -> Result<GatewayEvent>
where
    F: FnMut(&GatewayEvent) -> bool,
{
    tokio::time::timeout(STEP_TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return Ok(event),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => anyhow::bail!("event stream closed"),
            }
        }
    })
    .await
    .context("timed out waiting for event")?
}

/// Wait for the client to reach `Connected`
pub async fn wait_connected(events: &mut broadcast::Receiver<GatewayEvent>) -> Result<()> {
    wait_for_event(events, |event| matches!(event, GatewayEvent::Connected)).await?;
    Ok(())
}

/// Subscribe, then start connecting, so no early event is missed
pub fn connect_client(client: GatewayClient) -> (GatewayClient, broadcast::Receiver<GatewayEvent>) {
    let events = client.subscribe();
    client.connect();
    (client, events)
}
