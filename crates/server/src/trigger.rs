//! What starts a reconcile cycle: a fixed-interval timer, explicit requests
//! and insert notifications from the record store.

use crate::metrics;
use crate::reconcile::Reconciler;
use crate::reconcile::engine::log_cycle_error;
use sigtrack_records::{RecordEvent, RecordStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Handle for requesting a reconcile cycle.
///
/// Requests made while a request is already pending collapse into one cycle.
#[derive(Debug, Clone, Default)]
pub struct ReconcileTrigger {
    notify: Arc<Notify>,
}

impl ReconcileTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.notify.notify_one();
    }
}

/// Resolves once shutdown was signalled or the sender is gone.
async fn shutdown_signalled(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Run reconcile cycles until shutdown.
///
/// A cycle starts on every timer tick and on every coalesced trigger request.
/// With `run_on_startup` the first tick fires immediately.
pub fn spawn_driver(
    reconciler: Arc<Reconciler>,
    trigger: ReconcileTrigger,
    poll_interval: Duration,
    run_on_startup: bool,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = if run_on_startup {
            Instant::now()
        } else {
            Instant::now() + poll_interval
        };
        let mut ticker = tokio::time::interval_at(start, poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = poll_interval.as_secs_f64(),
            run_on_startup,
            "reconcile driver started"
        );

        loop {
            let source = tokio::select! {
                _ = shutdown_signalled(&mut shutdown) => break,
                _ = ticker.tick() => "timer",
                _ = trigger.notify.notified() => "request",
            };
            metrics::RECONCILE_TRIGGERS.with_label_values(&[source]).inc();

            match reconciler.reconcile().await {
                Ok(run) => {
                    if run.report.units > 0 {
                        tracing::debug!(source, report = ?run.report, "reconcile cycle dispatched");
                    }
                }
                Err(e) => log_cycle_error(&e),
            }
        }

        tracing::info!("reconcile driver stopped");
    })
}

/// Forward record store insert events to the trigger until shutdown.
///
/// A lagged subscriber still requests a cycle, since at least one insert was
/// missed.
pub fn spawn_insert_listener(
    records: &dyn RecordStore,
    trigger: ReconcileTrigger,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let mut events = records.subscribe();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = shutdown_signalled(&mut shutdown) => break,
                event = events.recv() => event,
            };
            match event {
                Ok(RecordEvent::Inserted { id }) => {
                    tracing::info!(record_id = %id, "new request detected");
                    trigger.request();
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "insert listener lagged");
                    trigger.request();
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::warn!("insert event channel closed");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn requests_coalesce_into_one_permit() {
        let trigger = ReconcileTrigger::new();
        trigger.request();
        trigger.request();
        trigger.request();

        trigger.notify.notified().await;
        let second =
            tokio::time::timeout(Duration::from_millis(50), trigger.notify.notified()).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn dropped_sender_counts_as_shutdown() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), shutdown_signalled(&mut rx))
            .await
            .unwrap();
    }
}
