//! Queue service: owns every notification queue of the process by composite name.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use super::{InMemoryNotificationQueue, NotificationStore};
use crate::config::QueueConfig;
use crate::domain::QueueName;
use crate::error::NotifqError;
use crate::ports::{Clock, IdGenerator, SystemClock, UlidGenerator};
use crate::runtime::NotificationQueueHandler;

pub struct NotificationQueueService {
    hostname: String,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    queues: Mutex<HashMap<String, Arc<InMemoryNotificationQueue>>>,
    started_queues: Arc<AtomicUsize>,
}

impl NotificationQueueService {
    pub fn new(hostname: impl Into<String>, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            hostname: hostname.into(),
            clock,
            ids,
            queues: Mutex::new(HashMap::new()),
            started_queues: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wall clock and ULID ids, host name from the config.
    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(
            config.hostname.clone(),
            Arc::new(SystemClock),
            Arc::new(UlidGenerator::new(SystemClock)),
        )
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn queues(&self) -> MutexGuard<'_, HashMap<String, Arc<InMemoryNotificationQueue>>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create_notification_queue(
        &self,
        service: &str,
        queue: &str,
        handler: Arc<dyn NotificationQueueHandler>,
    ) -> Result<Arc<InMemoryNotificationQueue>, NotifqError> {
        let name = QueueName::new(service, queue);
        let composite = name.composite();

        let mut queues = self.queues();
        if queues.contains_key(&composite) {
            return Err(NotifqError::QueueAlreadyExists(composite));
        }

        let store = NotificationStore::new(
            name,
            self.hostname.clone(),
            Arc::clone(&self.clock),
            Arc::clone(&self.ids),
        );
        let created = Arc::new(InMemoryNotificationQueue::with_counter(
            store,
            handler,
            Arc::clone(&self.started_queues),
        ));
        queues.insert(composite.clone(), Arc::clone(&created));
        drop(queues);

        info!(queue = %composite, "created notification queue");
        Ok(created)
    }

    pub fn get_notification_queue(
        &self,
        service: &str,
        queue: &str,
    ) -> Result<Arc<InMemoryNotificationQueue>, NotifqError> {
        let composite = QueueName::new(service, queue).composite();
        self.queues()
            .get(&composite)
            .cloned()
            .ok_or(NotifqError::QueueNotFound(composite))
    }

    /// A started queue must be stopped before it can be deleted.
    ///
    /// The started check and the detach from the service count happen under
    /// the queue's own start/stop lock, so a concurrent `start_queue` either
    /// wins (delete fails) or lands on the detached queue (not counted).
    pub fn delete_notification_queue(&self, service: &str, queue: &str) -> Result<(), NotifqError> {
        let composite = QueueName::new(service, queue).composite();

        let mut queues = self.queues();
        let existing = queues
            .get(&composite)
            .ok_or_else(|| NotifqError::QueueNotFound(composite.clone()))?;
        if !existing.detach_if_stopped() {
            return Err(NotifqError::QueueStillStarted(composite));
        }
        queues.remove(&composite);
        drop(queues);

        info!(queue = %composite, "deleted notification queue");
        Ok(())
    }

    /// Composite names of all registered queues, sorted.
    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.queues().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn started_queues(&self) -> usize {
        self.started_queues.load(Ordering::SeqCst)
    }
}
