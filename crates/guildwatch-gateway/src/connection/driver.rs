//! Connection driver
//!
//! One task per `connect()`. It owns the transport and the heartbeat, reacts
//! to inbound frames, and loops through reconnects until it is cancelled,
//! hits a fatal close, or runs out of attempts.
//!
//! ```text
//! connect ──> HELLO ──> IDENTIFY/RESUME ──> READY/RESUMED ──> dispatches...
//!    ^                                                           │
//!    └──── backoff(attempt) <── recoverable close / timeout <────┘
//! ```

use super::backoff::backoff;
use super::{ConnectionState, HeartbeatController, HeartbeatSignal, SessionState};
use crate::broadcast::EventDispatcher;
use crate::config::{resume_connect_url, GatewayConfig};
use crate::error::{GatewayError, GatewayResult, ProtocolError};
use crate::events::{GatewayEvent, GatewayEventType};
use crate::protocol::{
    is_fatal, CloseCode, DispatchEvent, GatewayFrame, GatewayPayload, IdentifyPayload, Intents,
    ResumePayload, ABNORMAL_CLOSURE, NORMAL_CLOSURE,
};
use crate::transport::{Connector, Transport, TransportEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Wait between INVALID_SESSION and the fresh IDENTIFY
pub(crate) const INVALID_SESSION_DELAY: Duration = Duration::from_millis(5_000);

/// Requests from the client handle to the driver
pub(crate) enum Command {
    Send {
        payload: GatewayPayload,
        reply: oneshot::Sender<GatewayResult<()>>,
    },
}

/// Client-side handle to a running driver
///
/// Dropping the handle cancels the driver.
pub(crate) struct DriverHandle {
    cancel: CancellationToken,
    commands: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl DriverHandle {
    pub(crate) fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    pub(crate) fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Cancel and wait until the heartbeat is stopped and the transport closed
    pub(crate) async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!("Gateway driver panicked");
                }
            }
        }
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Shared pieces the driver works with
pub(crate) struct DriverContext {
    pub(crate) config: Arc<GatewayConfig>,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) session: Arc<SessionState>,
    pub(crate) events: EventDispatcher,
}

/// Start a driver task
pub(crate) fn spawn_driver(ctx: DriverContext) -> DriverHandle {
    let cancel = CancellationToken::new();
    let (commands, command_rx) = mpsc::unbounded_channel();

    let driver = Driver {
        config: ctx.config,
        connector: ctx.connector,
        session: ctx.session,
        events: ctx.events,
        heartbeat: HeartbeatController::new(),
        cancel: cancel.clone(),
        commands: command_rx,
    };
    let task = tokio::spawn(driver.run());

    DriverHandle {
        cancel,
        commands,
        task: Some(task),
    }
}

fn reject(command: Command) {
    match command {
        Command::Send { reply, .. } => {
            let _ = reply.send(Err(GatewayError::NotConnected));
        }
    }
}

/// How a single connection ended
enum ConnectionEnd {
    Cancelled,
    Closed { code: u16, reason: String },
}

impl ConnectionEnd {
    fn local(code: CloseCode) -> Self {
        Self::Closed {
            code: code.as_u16(),
            reason: code.description().to_string(),
        }
    }
}

struct Driver {
    config: Arc<GatewayConfig>,
    connector: Arc<dyn Connector>,
    session: Arc<SessionState>,
    events: EventDispatcher,
    heartbeat: HeartbeatController,
    cancel: CancellationToken,
    commands: mpsc::UnboundedReceiver<Command>,
}

/// Whether a 4014 close was caused by privileged intents in the identify
fn rejected_privileged_intents(code: u16, intents: Intents) -> bool {
    code == CloseCode::DisallowedIntents.as_u16() && intents.is_privileged()
}

impl Driver {
    async fn run(mut self) {
        loop {
            self.session.set_state(ConnectionState::Connecting);

            let end = self.connect_once().await;
            self.heartbeat.stop();

            let (code, reason) = match end {
                ConnectionEnd::Cancelled => return,
                ConnectionEnd::Closed { code, reason } => (code, reason),
            };

            if is_fatal(code) {
                error!(code, reason = %reason, "Gateway closed with fatal code");
                if rejected_privileged_intents(code, self.config.intents) {
                    warn!(
                        intents = self.config.intents.bits(),
                        "Privileged intents requested; enable them for the application in the developer portal"
                    );
                }
                self.fail(GatewayError::FatalSession { code, reason });
                return;
            }

            self.session.set_state(ConnectionState::Reconnecting);

            let attempts = self.session.reconnect_attempts();
            if attempts >= self.config.max_reconnects {
                error!(attempts, max = self.config.max_reconnects, "Giving up on gateway");
                self.fail(GatewayError::MaxReconnect { attempts });
                return;
            }

            let attempt = self.session.increment_attempts();
            let delay = backoff(attempt);
            info!(
                code,
                reason = %reason,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Gateway connection closed, reconnecting"
            );

            let wake = sleep(delay);
            tokio::pin!(wake);
            loop {
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return,
                    () = &mut wake => break,
                    Some(command) = self.commands.recv() => reject(command),
                }
            }
        }
    }

    fn fail(&self, err: GatewayError) {
        self.events.emit(GatewayEvent::Error(err));
        self.session.reset();
        self.session.set_state(ConnectionState::Failed);
    }

    fn connect_url(&self) -> String {
        match self.session.resumable() {
            Some(session) => resume_connect_url(&session.resume_url),
            None => self.config.gateway_url.clone(),
        }
    }

    /// Open one transport and drive it until it closes
    async fn connect_once(&mut self) -> ConnectionEnd {
        let url = self.connect_url();
        debug!(url = %url, "Opening gateway connection");

        let opened = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return ConnectionEnd::Cancelled,
            opened = self.connector.connect(&url) => opened,
        };

        match opened {
            Ok(transport) => self.drive(transport).await,
            Err(err) => {
                warn!(url = %url, error = %err, "Failed to open gateway connection");
                self.events.emit(GatewayEvent::Error(err));
                ConnectionEnd::Closed {
                    code: ABNORMAL_CLOSURE,
                    reason: "connect failed".to_string(),
                }
            }
        }
    }

    async fn drive(&mut self, mut transport: Box<dyn Transport>) -> ConnectionEnd {
        let (beat_tx, mut beat_rx) = mpsc::unbounded_channel();
        let mut reidentify_at: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    self.heartbeat.stop();
                    transport.close(NORMAL_CLOSURE, "client disconnect").await;
                    return ConnectionEnd::Cancelled;
                }
                Some(signal) = beat_rx.recv() => match signal {
                    HeartbeatSignal::Beat(payload) => {
                        let _ = self.send_payload(transport.as_mut(), &payload).await;
                    }
                    HeartbeatSignal::TimedOut => {
                        let interval_ms = self.heartbeat.interval().as_millis() as u64;
                        self.events.emit(GatewayEvent::Error(GatewayError::HeartbeatTimeout { interval_ms }));
                        return self.close_locally(transport.as_mut(), CloseCode::HeartbeatTimeout).await;
                    }
                },
                () = sleep_until(reidentify_at.unwrap_or_else(Instant::now)), if reidentify_at.is_some() => {
                    reidentify_at = None;
                    self.identify(transport.as_mut()).await;
                }
                Some(command) = self.commands.recv() => {
                    self.handle_command(transport.as_mut(), command).await;
                }
                event = transport.next_event() => match event {
                    Some(TransportEvent::Text(text)) => {
                        let decoded = GatewayPayload::decode(&text);
                        if let Some(end) = self.on_payload(transport.as_mut(), decoded, &beat_tx, &mut reidentify_at).await {
                            return end;
                        }
                    }
                    Some(TransportEvent::Binary(bytes)) => {
                        let decoded = GatewayPayload::decode_bytes(&bytes);
                        if let Some(end) = self.on_payload(transport.as_mut(), decoded, &beat_tx, &mut reidentify_at).await {
                            return end;
                        }
                    }
                    Some(TransportEvent::Error(message)) => {
                        warn!(error = %message, "Gateway transport error");
                        self.events.emit(GatewayEvent::Error(GatewayError::Transport(message)));
                    }
                    Some(TransportEvent::Closed { code, reason }) => {
                        return ConnectionEnd::Closed { code, reason };
                    }
                    None => {
                        return ConnectionEnd::Closed {
                            code: ABNORMAL_CLOSURE,
                            reason: "connection lost".to_string(),
                        };
                    }
                },
            }
        }
    }

    async fn close_locally(&mut self, transport: &mut dyn Transport, code: CloseCode) -> ConnectionEnd {
        self.heartbeat.stop();
        transport.close(code.as_u16(), code.description()).await;
        ConnectionEnd::local(code)
    }

    /// Handle one decoded frame; `Some` ends the connection
    async fn on_payload(
        &mut self,
        transport: &mut dyn Transport,
        decoded: Result<GatewayPayload, ProtocolError>,
        beat_tx: &mpsc::UnboundedSender<HeartbeatSignal>,
        reidentify_at: &mut Option<Instant>,
    ) -> Option<ConnectionEnd> {
        let payload = match decoded {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "Dropping undecodable frame");
                self.events.emit(GatewayEvent::Error(err.into()));
                return None;
            }
        };

        if let Some(sequence) = payload.s {
            self.session.set_sequence(sequence);
        }

        let frame = match GatewayFrame::try_from(payload) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "Dropping invalid frame");
                self.events.emit(GatewayEvent::Error(err.into()));
                return None;
            }
        };

        match frame {
            GatewayFrame::Hello(hello) => {
                let session = Arc::clone(&self.session);
                self.heartbeat.start(
                    Duration::from_millis(hello.heartbeat_interval),
                    move || session.sequence(),
                    beat_tx.clone(),
                );

                match self.session.resumable() {
                    Some(resumable) => self.resume(transport, resumable.session_id).await,
                    None => self.identify(transport).await,
                }
            }
            GatewayFrame::HeartbeatAck => self.heartbeat.ack(),
            GatewayFrame::Heartbeat => {
                let beat = GatewayPayload::heartbeat(self.session.sequence());
                let _ = self.send_payload(transport, &beat).await;
            }
            GatewayFrame::Reconnect => {
                info!("Gateway requested reconnect");
                return Some(self.close_locally(transport, CloseCode::ReconnectRequested).await);
            }
            GatewayFrame::InvalidSession { resumable } => {
                warn!(resumable, "Session invalidated, identifying again shortly");
                self.session.clear_session();
                *reidentify_at = Some(Instant::now() + INVALID_SESSION_DELAY);
            }
            GatewayFrame::Dispatch(event) => self.on_dispatch(event),
            GatewayFrame::Unknown { op } => debug!(op, "Ignoring frame with unhandled opcode"),
        }

        None
    }

    fn on_dispatch(&self, event: DispatchEvent) {
        match &event {
            DispatchEvent::Ready { ready, .. } => {
                let stored = match &ready.resume_gateway_url {
                    Some(url) => self
                        .session
                        .set_session(Some(ready.session_id.clone()), Some(url.clone())),
                    None => {
                        warn!(
                            session_id = %ready.session_id,
                            "READY without resume_gateway_url, session will not be resumable"
                        );
                        self.session.set_session(None, None)
                    }
                };
                if let Err(e) = stored {
                    warn!(error = %e, "Could not store session");
                }

                self.session.reset_attempts();
                info!(session_id = %ready.session_id, "Gateway session ready");
                self.session.set_state(ConnectionState::Connected);
                self.events.emit(GatewayEvent::Connected);
            }
            DispatchEvent::Resumed { .. } => {
                info!(sequence = ?self.session.sequence(), "Gateway session resumed");
                self.session.set_state(ConnectionState::Connected);
                self.events.emit(GatewayEvent::Connected);
            }
            DispatchEvent::Other { name, .. } => {
                if let Some(kind) = GatewayEventType::from_str(name) {
                    if !kind.is_enabled_by(self.config.intents) {
                        debug!(event = %kind, "Dispatch arrived outside the configured intents");
                    }
                }
            }
        }

        let (event_name, payload) = event.into_parts();
        self.events.emit(GatewayEvent::Dispatch {
            event_name,
            payload,
        });
    }

    async fn identify(&self, transport: &mut dyn Transport) {
        let identify = IdentifyPayload {
            token: self.config.token.clone(),
            intents: self.config.intents.bits(),
            properties: self.config.properties.clone(),
        };

        match GatewayPayload::identify(&identify) {
            Ok(payload) => {
                info!(intents = identify.intents, "Identifying");
                let _ = self.send_payload(transport, &payload).await;
            }
            Err(err) => self.events.emit(GatewayEvent::Error(err.into())),
        }
    }

    async fn resume(&self, transport: &mut dyn Transport, session_id: String) {
        let resume = ResumePayload {
            token: self.config.token.clone(),
            session_id,
            seq: self.session.sequence(),
        };

        match GatewayPayload::resume(&resume) {
            Ok(payload) => {
                info!(session_id = %resume.session_id, seq = ?resume.seq, "Resuming session");
                let _ = self.send_payload(transport, &payload).await;
            }
            Err(err) => self.events.emit(GatewayEvent::Error(err.into())),
        }
    }

    async fn handle_command(&self, transport: &mut dyn Transport, command: Command) {
        match command {
            Command::Send { payload, reply } if self.session.state() == ConnectionState::Connected => {
                let _ = reply.send(self.write(transport, &payload).await);
            }
            rejected => reject(rejected),
        }
    }

    /// Send a frame the engine produced itself; failures become `error` events
    async fn send_payload(&self, transport: &mut dyn Transport, payload: &GatewayPayload) -> GatewayResult<()> {
        let result = self.write(transport, payload).await;
        if let Err(err) = &result {
            warn!(error = %err, payload = %payload, "Failed to send frame");
            self.events.emit(GatewayEvent::Error(err.clone()));
        }
        result
    }

    async fn write(&self, transport: &mut dyn Transport, payload: &GatewayPayload) -> GatewayResult<()> {
        let text = payload.encode()?;
        transport.send(text).await
    }
}
