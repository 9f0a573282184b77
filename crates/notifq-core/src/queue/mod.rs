//! Queue module: the time-ordered store, its queue facade, the queue service
//! and retry policies.

mod memory;
mod retry;
mod service;
mod store;

pub use memory::InMemoryNotificationQueue;
pub use retry::{ExponentialBackoff, NoRetry, RetryPolicy};
pub use service::NotificationQueueService;
pub use store::NotificationStore;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{NotificationEntry, NotificationId, NotificationKey, OwnerId, UserToken};
use crate::error::NotifqError;
use crate::runtime::NotificationQueueHandler;

/// Notification queue port (interface).
///
/// Producers schedule and cancel work through this trait; the dispatcher
/// drains the underlying store.
pub trait NotificationQueue: Send + Sync {
    /// Schedule `key` for `effective_date`.
    fn record_future_notification<K: NotificationKey>(
        &self,
        effective_date: DateTime<Utc>,
        key: &K,
        user_token: UserToken,
        owner: OwnerId,
        tenant_record_id: u64,
    ) -> Result<NotificationId, NotifqError>
    where
        Self: Sized;

    /// Pending entries for `owner` that have not fired yet.
    fn future_notifications_for_owner(&self, owner: OwnerId) -> Vec<NotificationEntry>;

    /// Cancel one entry. Absent ids are a no-op.
    fn remove_notification(&self, id: NotificationId);

    /// `"<service>:<queue>"`.
    fn full_qname(&self) -> String;

    fn service_name(&self) -> &str;

    fn queue_name(&self) -> &str;

    fn host_name(&self) -> &str;

    fn handler(&self) -> Arc<dyn NotificationQueueHandler>;

    fn start_queue(&self);

    fn stop_queue(&self);

    fn is_started(&self) -> bool;
}
