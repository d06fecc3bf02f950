//! Gateway client
//!
//! Public handle over one gateway session. `connect` spawns the driver task;
//! everything that happens afterwards is reported through [`GatewayEvent`]s
//! and the registered sinks.

use crate::broadcast::{EventDispatcher, EventDispatcherConfig, EventSink};
use crate::config::GatewayConfig;
use crate::connection::{
    spawn_driver, Command, ConnectionState, DriverContext, DriverHandle, SessionInfo, SessionState,
};
use crate::error::{GatewayError, GatewayResult, ProtocolError};
use crate::events::GatewayEvent;
use crate::protocol::{GatewayPayload, PresenceUpdatePayload, RequestGuildMembersPayload};
use crate::transport::{Connector, WsConnector};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info};

/// Builder for [`GatewayClient`]
pub struct GatewayClientBuilder {
    config: GatewayConfig,
    connector: Option<Arc<dyn Connector>>,
    sinks: Vec<Arc<dyn EventSink>>,
    dispatcher: EventDispatcherConfig,
}

impl GatewayClientBuilder {
    /// Use a custom connector instead of the WebSocket one
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Register a sink for dispatch events
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    #[must_use]
    pub fn broadcast_buffer(mut self, size: usize) -> Self {
        self.dispatcher.broadcast_buffer = size;
        self
    }

    #[must_use]
    pub fn build(self) -> GatewayClient {
        let events = EventDispatcher::with_sinks(self.dispatcher, self.sinks);
        let session = Arc::new(SessionState::new(events.clone()));

        GatewayClient {
            config: Arc::new(self.config),
            connector: self
                .connector
                .unwrap_or_else(|| Arc::new(WsConnector)),
            session,
            events,
            driver: Mutex::new(None),
        }
    }
}

/// Client for one Discord gateway session
pub struct GatewayClient {
    config: Arc<GatewayConfig>,
    connector: Arc<dyn Connector>,
    session: Arc<SessionState>,
    events: EventDispatcher,
    driver: Mutex<Option<DriverHandle>>,
}

impl GatewayClient {
    #[must_use]
    pub fn builder(config: GatewayConfig) -> GatewayClientBuilder {
        GatewayClientBuilder {
            config,
            connector: None,
            sinks: Vec::new(),
            dispatcher: EventDispatcherConfig::default(),
        }
    }

    /// Client over the real WebSocket transport with no sinks
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self::builder(config).build()
    }

    /// Start connecting
    ///
    /// Returns immediately; progress is reported as events. Calling this
    /// while a session is already being driven does nothing. Must be called
    /// from within a Tokio runtime.
    pub fn connect(&self) {
        let mut driver = self.driver.lock();
        if driver.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!(state = %self.state(), "Gateway already running, ignoring connect");
            return;
        }

        if self.state().is_idle() {
            self.session.reset_attempts();
        }

        self.events.start();
        info!(url = %self.config.gateway_url, "Connecting to gateway");

        *driver = Some(spawn_driver(DriverContext {
            config: Arc::clone(&self.config),
            connector: Arc::clone(&self.connector),
            session: Arc::clone(&self.session),
            events: self.events.clone(),
        }));
    }

    /// Stop the session
    ///
    /// Stops the heartbeat, closes the transport with 1000 and forgets the
    /// session so the next `connect` identifies from scratch. Safe to call
    /// more than once. A `connect` that lands while the old driver is
    /// shutting down keeps its own state and session.
    pub async fn disconnect(&self) {
        let handle = self.driver.lock().take();
        if let Some(mut handle) = handle {
            handle.shutdown().await;
            info!("Disconnected from gateway");
        }

        let driver = self.driver.lock();
        if driver.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("Gateway reconnected during disconnect, leaving the new session alone");
            return;
        }
        self.session.set_state(ConnectionState::Disconnected);
        self.session.reset();
    }

    /// Send a raw payload on the open connection
    ///
    /// # Errors
    ///
    /// `NotConnected` unless the session is `Connected`; transport errors
    /// from the write itself.
    pub async fn send(&self, payload: GatewayPayload) -> GatewayResult<()> {
        if self.state() != ConnectionState::Connected {
            return Err(GatewayError::NotConnected);
        }

        let (reply, rx) = oneshot::channel();
        let queued = self
            .driver
            .lock()
            .as_ref()
            .is_some_and(|handle| handle.send(Command::Send { payload, reply }));
        if !queued {
            return Err(GatewayError::NotConnected);
        }

        rx.await.unwrap_or(Err(GatewayError::NotConnected))
    }

    /// Send a PRESENCE_UPDATE
    ///
    /// # Errors
    ///
    /// Fails before sending if the status is not one Discord accepts.
    pub async fn update_presence(&self, presence: &PresenceUpdatePayload) -> GatewayResult<()> {
        if !presence.is_valid_status() {
            return Err(ProtocolError::InvalidPayload {
                kind: "PRESENCE_UPDATE",
                reason: format!("unknown status '{}'", presence.status),
            }
            .into());
        }
        self.send(GatewayPayload::presence_update(presence)?).await
    }

    /// Send a REQUEST_GUILD_MEMBERS; the chunks arrive as dispatches
    pub async fn request_guild_members(&self, request: &RequestGuildMembersPayload) -> GatewayResult<()> {
        self.send(GatewayPayload::request_guild_members(request)?).await
    }

    /// Subscribe to everything the client publishes from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Snapshot of session id, resume URL, sequence and attempts
    #[must_use]
    pub fn session(&self) -> SessionInfo {
        self.session.snapshot()
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
