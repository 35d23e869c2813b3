//! Cooperative countdown loop.
//!
//! Polls [`SessionController::tick`] on a fixed interval and publishes a
//! [`TickUpdate`] per poll. Cancelling at any point is safe: the controller
//! keeps no in-flight state between polls.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::controller::SessionController;
use super::session::Session;
use crate::clock::Clock;
use crate::events::Event;

#[derive(Debug, Clone)]
pub struct TickUpdate {
    pub at: DateTime<Utc>,
    /// The active session after this poll, if any.
    pub session: Option<Session>,
    pub remaining_secs: Option<u64>,
    /// Events produced by an automatic finish on this poll.
    pub events: Vec<Event>,
}

pub struct SessionTicker;

impl SessionTicker {
    /// Spawn the polling loop on the current tokio runtime.
    pub fn spawn(
        controller: Arc<SessionController>,
        clock: Arc<dyn Clock>,
        period: Duration,
    ) -> TickerHandle {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(controller, clock, period, cancel_rx, update_tx));
        TickerHandle {
            cancel: cancel_tx,
            task,
            updates: update_rx,
        }
    }
}

pub struct TickerHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
    updates: mpsc::UnboundedReceiver<TickUpdate>,
}

impl TickerHandle {
    /// Next update, or `None` once the loop has ended.
    pub async fn next(&mut self) -> Option<TickUpdate> {
        self.updates.recv().await
    }

    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// Cancel and wait for the loop to exit.
    pub async fn shutdown(self) {
        self.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "ticker task ended abnormally");
        }
    }
}

async fn run(
    controller: Arc<SessionController>,
    clock: Arc<dyn Clock>,
    period: Duration,
    mut cancel: watch::Receiver<bool>,
    updates: mpsc::UnboundedSender<TickUpdate>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    debug!("ticker cancelled");
                    break;
                }
            }
            _ = interval.tick() => {
                let now = clock.now();
                let events = controller.tick(now).unwrap_or_else(|e| {
                    warn!(error = %e, "tick failed");
                    Vec::new()
                });
                let session = controller.active_session().unwrap_or_else(|e| {
                    warn!(error = %e, "could not read session slot");
                    None
                });
                let update = TickUpdate {
                    at: now,
                    remaining_secs: session.as_ref().map(|s| s.remaining_secs(now)),
                    session,
                    events,
                };
                if updates.send(update).is_err() {
                    debug!("ticker receiver dropped");
                    break;
                }
            }
        }
    }
}
