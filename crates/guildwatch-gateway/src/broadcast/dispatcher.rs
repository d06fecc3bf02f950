//! Event dispatcher
//!
//! Fans gateway events out two ways: every event goes to `broadcast`
//! subscribers, and dispatch events are also queued for the registered
//! [`EventSink`]s, which a single worker task drains in arrival order.

use super::EventSink;
use crate::events::GatewayEvent;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Configuration for the event dispatcher
#[derive(Debug, Clone)]
pub struct EventDispatcherConfig {
    /// Broadcast buffer size; slow subscribers past this lag and skip events
    pub broadcast_buffer: usize,
}

impl Default for EventDispatcherConfig {
    fn default() -> Self {
        Self {
            broadcast_buffer: 1024,
        }
    }
}

struct SinkJob {
    event_name: String,
    payload: Value,
}

struct Inner {
    events: broadcast::Sender<GatewayEvent>,
    sinks: Vec<Arc<dyn EventSink>>,
    sink_tx: mpsc::UnboundedSender<SinkJob>,
    sink_rx: Mutex<Option<mpsc::UnboundedReceiver<SinkJob>>>,
    running: AtomicBool,
}

/// Publish/subscribe fan-out for gateway events
///
/// Cheap to clone; all clones share one channel and one sink queue.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<Inner>,
}

impl EventDispatcher {
    /// Dispatcher with no sinks
    #[must_use]
    pub fn new(config: EventDispatcherConfig) -> Self {
        Self::with_sinks(config, Vec::new())
    }

    /// Dispatcher feeding the given sinks
    ///
    /// Sink jobs queue up until [`EventDispatcher::start`] spawns the worker.
    #[must_use]
    pub fn with_sinks(config: EventDispatcherConfig, sinks: Vec<Arc<dyn EventSink>>) -> Self {
        let (events, _) = broadcast::channel(config.broadcast_buffer.max(1));
        let (sink_tx, sink_rx) = mpsc::unbounded_channel();

        Self {
            inner: Arc::new(Inner {
                events,
                sinks,
                sink_tx,
                sink_rx: Mutex::new(Some(sink_rx)),
                running: AtomicBool::new(false),
            }),
        }
    }

    /// Spawn the sink worker; later calls do nothing
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        if self.inner.sinks.is_empty() {
            return;
        }
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(rx) = self.inner.sink_rx.lock().take() else {
            return;
        };

        let sinks = self.inner.sinks.clone();
        tokio::spawn(run_sinks(sinks, rx));

        tracing::debug!(sinks = self.inner.sinks.len(), "Event sink worker started");
    }

    /// Subscribe to every event published from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.events.subscribe()
    }

    /// Publish an event; never blocks
    pub fn emit(&self, event: GatewayEvent) {
        if let GatewayEvent::Dispatch {
            event_name,
            payload,
        } = &event
        {
            if !self.inner.sinks.is_empty() {
                let job = SinkJob {
                    event_name: event_name.clone(),
                    payload: payload.clone(),
                };
                if self.inner.sink_tx.send(job).is_err() {
                    tracing::warn!(event = %event_name, "Sink worker gone, dropping event");
                }
            }
        }

        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    /// Number of live broadcast subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.events.receiver_count()
    }

    /// Check if the sink worker has been started
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("sinks", &self.inner.sinks.len())
            .field("subscribers", &self.subscriber_count())
            .field("running", &self.is_running())
            .finish()
    }
}

async fn run_sinks(sinks: Vec<Arc<dyn EventSink>>, mut rx: mpsc::UnboundedReceiver<SinkJob>) {
    while let Some(job) = rx.recv().await {
        for sink in &sinks {
            deliver(sink.as_ref(), &job).await;
        }
    }

    tracing::debug!("Event sink worker exiting");
}

/// Run one sink on one event; errors and panics stop here
async fn deliver(sink: &dyn EventSink, job: &SinkJob) {
    let outcome = AssertUnwindSafe(sink.handle(&job.event_name, &job.payload))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(
                sink = sink.name(),
                event = %job.event_name,
                error = %e,
                "Event sink failed"
            );
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            tracing::error!(
                sink = sink.name(),
                event = %job.event_name,
                panic = %message,
                "Event sink panicked"
            );
        }
    }
}
