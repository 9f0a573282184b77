//! In-memory notification queue: a store bound to a name, a host and a handler.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use tracing::info;

use super::{NotificationQueue, NotificationStore};
use crate::domain::{NotificationEntry, NotificationId, NotificationKey, OwnerId, UserToken};
use crate::error::NotifqError;
use crate::ports::{JsonKeyCodec, KeyCodec};
use crate::runtime::NotificationQueueHandler;

pub struct InMemoryNotificationQueue<C = JsonKeyCodec> {
    store: Arc<NotificationStore<C>>,
    handler: Arc<dyn NotificationQueueHandler>,
    /// Started-queue counter of the owning service, if any.
    /// Held while flipping the started flag so deletion can detach atomically.
    started_queues: Mutex<Option<Arc<AtomicUsize>>>,
}

impl<C: KeyCodec> InMemoryNotificationQueue<C> {
    /// Standalone queue, not tracked by any service.
    pub fn new(store: NotificationStore<C>, handler: Arc<dyn NotificationQueueHandler>) -> Self {
        Self {
            store: Arc::new(store),
            handler,
            started_queues: Mutex::new(None),
        }
    }

    pub(crate) fn with_counter(
        store: NotificationStore<C>,
        handler: Arc<dyn NotificationQueueHandler>,
        started_queues: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            store: Arc::new(store),
            handler,
            started_queues: Mutex::new(Some(started_queues)),
        }
    }

    fn membership(&self) -> MutexGuard<'_, Option<Arc<AtomicUsize>>> {
        self.started_queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drops the service counter unless the queue is started.
    ///
    /// Returns `false` (and keeps the counter) for a started queue. Once
    /// detached, start/stop no longer touch the service count.
    pub(crate) fn detach_if_stopped(&self) -> bool {
        let mut membership = self.membership();
        if self.store.is_started() {
            return false;
        }
        membership.take();
        true
    }

    pub fn store(&self) -> &Arc<NotificationStore<C>> {
        &self.store
    }

    /// Ready entries as of the store clock's now.
    pub fn ready_notifications(&self) -> Vec<NotificationEntry> {
        self.store.list_ready_now()
    }

    pub fn mark_processed_notifications(
        &self,
        to_remove: &[NotificationEntry],
        to_add: Vec<NotificationEntry>,
    ) -> Result<(), NotifqError> {
        self.store.mark_processed(to_remove, to_add)
    }
}

impl<C: KeyCodec> NotificationQueue for InMemoryNotificationQueue<C> {
    fn record_future_notification<K: NotificationKey>(
        &self,
        effective_date: DateTime<Utc>,
        key: &K,
        user_token: UserToken,
        owner: OwnerId,
        tenant_record_id: u64,
    ) -> Result<NotificationId, NotifqError> {
        self.store
            .record(effective_date, key, user_token, owner, tenant_record_id)
    }

    fn future_notifications_for_owner(&self, owner: OwnerId) -> Vec<NotificationEntry> {
        self.store.list_future_for_owner(owner)
    }

    fn remove_notification(&self, id: NotificationId) {
        self.store.remove(id);
    }

    fn full_qname(&self) -> String {
        self.store.queue_name().composite()
    }

    fn service_name(&self) -> &str {
        self.store.queue_name().service()
    }

    fn queue_name(&self) -> &str {
        self.store.queue_name().queue()
    }

    fn host_name(&self) -> &str {
        self.store.hostname()
    }

    fn handler(&self) -> Arc<dyn NotificationQueueHandler> {
        Arc::clone(&self.handler)
    }

    fn start_queue(&self) {
        let membership = self.membership();
        let was_started = self.store.swap_started(true);
        if !was_started {
            if let Some(counter) = membership.as_ref() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            info!(queue = %self.store.queue_name(), "notification queue started");
        }
    }

    fn stop_queue(&self) {
        let membership = self.membership();
        let was_started = self.store.swap_started(false);
        if was_started {
            if let Some(counter) = membership.as_ref() {
                counter.fetch_sub(1, Ordering::SeqCst);
            }
            info!(queue = %self.store.queue_name(), "notification queue stopped");
        }
    }

    fn is_started(&self) -> bool {
        self.store.is_started()
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use ulid::Ulid;

    use super::*;
    use crate::domain::QueueName;
    use crate::domain::notification::fixtures::at;
    use crate::error::HandlerError;
    use crate::ports::{ManualClock, SystemClock, UlidGenerator};
    use crate::runtime::FnHandler;

    #[derive(Debug, Serialize, Deserialize)]
    struct Reminder {
        text: String,
    }

    impl NotificationKey for Reminder {
        const KEY_TYPE: &'static str = "test.reminder.v1";
    }

    fn queue(clock: Arc<ManualClock>, counter: Arc<AtomicUsize>) -> InMemoryNotificationQueue {
        let store = NotificationStore::new(
            QueueName::new("svc", "reminders"),
            "host-1",
            clock,
            Arc::new(UlidGenerator::new(SystemClock)),
        );
        let handler = Arc::new(FnHandler(|_: &NotificationEntry| Ok::<(), HandlerError>(())));
        InMemoryNotificationQueue::with_counter(store, handler, counter)
    }

    #[test]
    fn names_come_from_the_store() {
        let q = queue(Arc::new(ManualClock::new(at(0))), Arc::new(AtomicUsize::new(0)));

        assert_eq!(q.full_qname(), "svc:reminders");
        assert_eq!(q.service_name(), "svc");
        assert_eq!(q.queue_name(), "reminders");
        assert_eq!(q.host_name(), "host-1");
    }

    #[test]
    fn start_stop_updates_counter_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let q = queue(Arc::new(ManualClock::new(at(0))), Arc::clone(&counter));

        q.start_queue();
        q.start_queue();
        assert!(q.is_started());
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        q.stop_queue();
        q.stop_queue();
        assert!(!q.is_started());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn detached_queue_no_longer_counts() {
        let counter = Arc::new(AtomicUsize::new(0));
        let q = queue(Arc::new(ManualClock::new(at(0))), Arc::clone(&counter));

        q.start_queue();
        assert!(!q.detach_if_stopped());
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        q.stop_queue();
        assert!(q.detach_if_stopped());
        q.start_queue();
        assert!(q.is_started());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        q.stop_queue();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn record_then_list_future_then_remove() {
        let clock = Arc::new(ManualClock::new(at(0)));
        let q = queue(clock.clone(), Arc::new(AtomicUsize::new(0)));
        let owner = OwnerId::new(9);

        let id = q
            .record_future_notification(
                at(60),
                &Reminder { text: "pay".to_string() },
                UserToken::from_ulid(Ulid::new()),
                owner,
                1,
            )
            .unwrap();

        assert_eq!(q.future_notifications_for_owner(owner).len(), 1);
        assert!(q.ready_notifications().is_empty());

        clock.set(at(60));
        assert_eq!(q.ready_notifications().len(), 1);

        q.remove_notification(id);
        q.remove_notification(id);
        assert!(q.ready_notifications().is_empty());
    }
}
