use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{HandlerError, NotifqError};
use crate::ports::{JsonKeyCodec, KeyCodec};
use crate::queue::{InMemoryNotificationQueue, NotificationQueue, RetryPolicy};

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handler succeeded; entry removed.
    pub processed: usize,
    /// Handler failed transiently; entry replaced by a follow-up.
    pub rescheduled: usize,
    /// Handler failed and will not be retried; entry removed.
    pub dropped: usize,
}

impl DispatchReport {
    pub fn total(&self) -> usize {
        self.processed + self.rescheduled + self.dropped
    }
}

/// Drains ready entries of one queue through its handler.
///
/// Flow per pass:
/// 1. `list_ready(now)` snapshot (nothing removed yet)
/// 2. handler per entry, in effective-time order
/// 3. one `mark_processed(batch, follow_ups)` commit
pub struct Dispatcher<C = JsonKeyCodec> {
    queue: Arc<InMemoryNotificationQueue<C>>,
    retry_policy: Arc<dyn RetryPolicy>,
}

impl<C: KeyCodec + 'static> Dispatcher<C> {
    pub fn new(queue: Arc<InMemoryNotificationQueue<C>>, retry_policy: Arc<dyn RetryPolicy>) -> Self {
        Self { queue, retry_policy }
    }

    pub fn queue(&self) -> &Arc<InMemoryNotificationQueue<C>> {
        &self.queue
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<DispatchReport, NotifqError> {
        let store = self.queue.store();
        let ready = store.list_ready(now);
        if ready.is_empty() {
            return Ok(DispatchReport::default());
        }

        let handler = self.queue.handler();
        let mut report = DispatchReport::default();
        let mut follow_ups = Vec::new();

        for entry in &ready {
            match handler.handle_ready_notification(entry).await {
                Ok(()) => report.processed += 1,
                Err(HandlerError::Transient(reason)) => {
                    match self.retry_policy.next_attempt(entry, now) {
                        Some(next_at) => {
                            let follow_up = entry.reschedule(store.ids().generate_notification_id(), next_at);
                            debug!(
                                notification_id = %entry.id(),
                                follow_up_id = %follow_up.id(),
                                retry_count = follow_up.retry_count(),
                                next_at = %next_at,
                                error = %reason,
                                "rescheduling notification"
                            );
                            follow_ups.push(follow_up);
                            report.rescheduled += 1;
                        }
                        None => {
                            warn!(
                                notification_id = %entry.id(),
                                retry_count = entry.retry_count(),
                                error = %reason,
                                "notification retries exhausted"
                            );
                            report.dropped += 1;
                        }
                    }
                }
                Err(HandlerError::Permanent(reason)) => {
                    warn!(notification_id = %entry.id(), error = %reason, "notification failed permanently");
                    report.dropped += 1;
                }
            }
        }

        store.mark_processed(&ready, follow_ups)?;
        Ok(report)
    }

    /// Poll every `poll_interval` while the queue is started.
    pub fn spawn(self: Arc<Self>, poll_interval: Duration) -> DispatcherHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            self.poll_loop(poll_interval, &mut shutdown_rx).await;
        });
        DispatcherHandle { shutdown_tx, join }
    }

    async fn poll_loop(&self, poll_interval: Duration, shutdown_rx: &mut watch::Receiver<bool>) {
        let qname = self.queue.full_qname();
        let clock = Arc::clone(self.queue.store().clock());
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(queue = %qname, ?poll_interval, "dispatcher started");
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown_rx.changed() => {
                    // sender dropped counts as shutdown
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            if !self.queue.is_started() {
                continue;
            }

            match self.run_once(clock.now()).await {
                Ok(report) if report.total() > 0 => {
                    info!(
                        queue = %qname,
                        processed = report.processed,
                        rescheduled = report.rescheduled,
                        dropped = report.dropped,
                        "dispatched notifications"
                    );
                }
                Ok(_) => {}
                Err(e) => error!(queue = %qname, error = %e, "dispatch pass failed"),
            }
        }
        info!(queue = %qname, "dispatcher stopped");
    }
}

/// Handle of a spawned dispatcher loop.
/// - `request_shutdown` stops taking new batches after the current one
/// - `shutdown_and_join` waits for the loop to exit
pub struct DispatcherHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl DispatcherHandle {
    pub fn request_shutdown(&self) {
        // receiver may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        if let Err(e) = self.join.await {
            error!(error = %e, "dispatcher task panicked");
        }
    }
}
