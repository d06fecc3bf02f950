//! WebSocket transport over tokio-tungstenite

use super::{Connector, Transport, TransportEvent};
use crate::error::GatewayError;
use crate::protocol::NO_STATUS_RECEIVED;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Connector that dials `ws://` and `wss://` URLs
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, GatewayError> {
        let (stream, response) = connect_async(url).await.map_err(GatewayError::transport)?;

        tracing::debug!(url = %url, status = %response.status(), "WebSocket handshake complete");

        Ok(Box::new(WsTransport::new(stream)))
    }
}

/// An open WebSocket connection
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    ended: bool,
}

impl WsTransport {
    #[must_use]
    pub fn new(stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
        Self {
            stream,
            ended: false,
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), GatewayError> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(GatewayError::transport)
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        if self.ended {
            return None;
        }

        loop {
            let message = match self.stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    self.ended = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.ended = true;
                    return Some(TransportEvent::Error(e.to_string()));
                }
            };

            match message {
                Message::Text(text) => return Some(TransportEvent::Text(text)),
                Message::Binary(bytes) => return Some(TransportEvent::Binary(bytes)),
                Message::Close(frame) => {
                    self.ended = true;
                    let (code, reason) = frame.map_or((NO_STATUS_RECEIVED, String::new()), |f| {
                        (u16::from(f.code), f.reason.into_owned())
                    });
                    return Some(TransportEvent::Closed { code, reason });
                }
                // Pongs are queued by tungstenite itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) {
        let frame = CloseFrame {
            code: WsCloseCode::from(code),
            reason: reason.to_owned().into(),
        };
        if let Err(e) = self.stream.close(Some(frame)).await {
            tracing::debug!(error = %e, code, "Close frame not delivered");
        }
    }
}
