//! Heartbeat liveness controller
//!
//! A dedicated task ticks at the interval from HELLO and hands each heartbeat
//! to the connection driver over an unbounded channel:
//!
//! ```text
//! heartbeat task --(HeartbeatSignal)--> driver --> transport
//! ```
//!
//! The first beat goes out one full interval after `start`. If a tick finds
//! the previous beat still unacknowledged the task reports `TimedOut` once and
//! exits; the driver decides what to do about it.

use crate::protocol::GatewayPayload;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Message from the heartbeat task to the driver
#[derive(Debug, Clone, PartialEq)]
pub enum HeartbeatSignal {
    /// Send this heartbeat now
    Beat(GatewayPayload),
    /// The previous heartbeat was never acknowledged
    TimedOut,
}

/// Periodic heartbeat with ack tracking
pub struct HeartbeatController {
    interval: Duration,
    /// True when no heartbeat is outstanding
    acknowledged: Arc<AtomicBool>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl HeartbeatController {
    /// Create a stopped controller
    #[must_use]
    pub fn new() -> Self {
        Self {
            interval: Duration::ZERO,
            acknowledged: Arc::new(AtomicBool::new(true)),
            cancel: None,
            task: None,
        }
    }

    /// Start beating every `interval`
    ///
    /// Restarting replaces any running timer. `sequence` is read on every
    /// tick so each heartbeat carries the latest sequence number.
    pub fn start<F>(
        &mut self,
        interval: Duration,
        sequence: F,
        signals: mpsc::UnboundedSender<HeartbeatSignal>,
    ) where
        F: Fn() -> Option<u64> + Send + 'static,
    {
        self.stop();

        let interval = interval.max(Duration::from_millis(1));
        let cancel = CancellationToken::new();
        self.interval = interval;
        self.acknowledged = Arc::new(AtomicBool::new(true));

        let task = tokio::spawn(heartbeat_task(
            interval,
            sequence,
            Arc::clone(&self.acknowledged),
            signals,
            cancel.clone(),
        ));

        debug!(interval_ms = interval.as_millis() as u64, "Heartbeat started");
        self.cancel = Some(cancel);
        self.task = Some(task);
    }

    /// Record a HEARTBEAT_ACK
    pub fn ack(&self) {
        self.acknowledged.store(true, Ordering::SeqCst);
    }

    /// Whether the last heartbeat has been acknowledged
    #[must_use]
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged.load(Ordering::SeqCst)
    }

    /// Interval of the current (or last) run
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the timer task is still alive
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancel the timer
    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
            debug!("Heartbeat stopped");
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Default for HeartbeatController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HeartbeatController {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn heartbeat_task<F>(
    interval: Duration,
    sequence: F,
    acknowledged: Arc<AtomicBool>,
    signals: mpsc::UnboundedSender<HeartbeatSignal>,
    cancel: CancellationToken,
) where
    F: Fn() -> Option<u64> + Send + 'static,
{
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                // Flip to pending; the old value says whether the last beat was acked.
                if !acknowledged.swap(false, Ordering::SeqCst) {
                    warn!(interval_ms = interval.as_millis() as u64, "Heartbeat ack missed");
                    let _ = signals.send(HeartbeatSignal::TimedOut);
                    break;
                }

                let beat = GatewayPayload::heartbeat(sequence());
                if signals.send(HeartbeatSignal::Beat(beat)).is_err() {
                    debug!("Heartbeat channel closed, shutting down heartbeat task");
                    break;
                }
            }
        }
    }
}
