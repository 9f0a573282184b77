//! In-memory notification store.
//!
//! Design:
//! - One coarse `Mutex` guards the whole state; every read and write goes
//!   through it, so readers never see a half-applied batch.
//! - Entries live in a `BTreeMap` keyed by `(effective_date, id)`, which gives
//!   ascending iteration for free. A side index maps id -> effective date so
//!   removal by id does not scan.
//! - Serialization happens before the lock is taken; a failing encode never
//!   touches the state.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use crate::domain::{
    EncodedKey, NotificationDraft, NotificationEntry, NotificationId, NotificationKey, OwnerId,
    QueueName, UserToken,
};
use crate::error::NotifqError;
use crate::observability::QueueStats;
use crate::ports::{Clock, IdGenerator, JsonKeyCodec, KeyCodec};

type EntryKey = (DateTime<Utc>, NotificationId);

fn key_of(entry: &NotificationEntry) -> EntryKey {
    (entry.effective_date(), entry.id())
}

#[derive(Default)]
struct StoreState {
    /// Pending entries in `(effective_date, id)` order.
    entries: BTreeMap<EntryKey, NotificationEntry>,

    /// id -> effective_date, kept in sync with `entries`.
    index: HashMap<NotificationId, DateTime<Utc>>,
}

impl StoreState {
    fn contains(&self, id: NotificationId) -> bool {
        self.index.contains_key(&id)
    }

    /// Caller must have checked `contains` first.
    fn insert(&mut self, entry: NotificationEntry) {
        self.index.insert(entry.id(), entry.effective_date());
        self.entries.insert(key_of(&entry), entry);
    }

    fn remove(&mut self, id: NotificationId) -> Option<NotificationEntry> {
        let effective_date = self.index.remove(&id)?;
        self.entries.remove(&(effective_date, id))
    }

    fn ready(&self, now: DateTime<Utc>) -> impl Iterator<Item = &NotificationEntry> {
        self.entries
            .values()
            .take_while(move |entry| entry.is_available_for_processing(now))
    }
}

/// Time-ordered store of pending notifications for one queue.
pub struct NotificationStore<C = JsonKeyCodec> {
    queue_name: QueueName,
    hostname: String,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    codec: C,
    state: Mutex<StoreState>,
    started: AtomicBool,
}

impl NotificationStore<JsonKeyCodec> {
    pub fn new(
        queue_name: QueueName,
        hostname: impl Into<String>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self::with_codec(queue_name, hostname, clock, ids, JsonKeyCodec)
    }
}

impl<C: KeyCodec> NotificationStore<C> {
    pub fn with_codec(
        queue_name: QueueName,
        hostname: impl Into<String>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        codec: C,
    ) -> Self {
        Self {
            queue_name,
            hostname: hostname.into(),
            clock,
            ids,
            codec,
            state: Mutex::new(StoreState::default()),
            started: AtomicBool::new(false),
        }
    }

    pub fn queue_name(&self) -> &QueueName {
        &self.queue_name
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn ids(&self) -> &Arc<dyn IdGenerator> {
        &self.ids
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Every mutation validates before it writes, so a poisoned guard still
    /// holds a consistent state.
    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Schedule `key` to fire at `effective_date`.
    pub fn record<K: NotificationKey>(
        &self,
        effective_date: DateTime<Utc>,
        key: &K,
        user_token: UserToken,
        owner: OwnerId,
        tenant_record_id: u64,
    ) -> Result<NotificationId, NotifqError> {
        let payload = self.codec.encode(key)?;
        let id = self.ids.generate_notification_id();
        let entry = NotificationEntry::new(
            id,
            NotificationDraft {
                queue_name: self.queue_name.clone(),
                created_by_host: self.hostname.clone(),
                key: EncodedKey {
                    key_type: K::KEY_TYPE.to_string(),
                    payload,
                },
                user_token,
                effective_date,
                owner,
                tenant_record_id,
            },
        );

        let mut state = self.state();
        if state.contains(id) {
            error!(notification_id = %id, queue = %self.queue_name, "id generator produced a duplicate");
            return Err(NotifqError::DuplicateNotification(id));
        }
        state.insert(entry);
        drop(state);

        debug!(
            notification_id = %id,
            queue = %self.queue_name,
            key_type = K::KEY_TYPE,
            effective_date = %effective_date,
            "recorded notification"
        );
        Ok(id)
    }

    /// Pending entries of `owner` that fire strictly after the clock's now.
    pub fn list_future_for_owner(&self, owner: OwnerId) -> Vec<NotificationEntry> {
        let now = self.clock.now();
        let state = self.state();
        state
            .entries
            .values()
            .skip_while(|entry| entry.is_available_for_processing(now))
            .filter(|entry| entry.owner() == owner)
            .cloned()
            .collect()
    }

    /// Entries with `effective_date <= now`, ascending. Nothing is removed.
    pub fn list_ready(&self, now: DateTime<Utc>) -> Vec<NotificationEntry> {
        self.state().ready(now).cloned().collect()
    }

    pub fn list_ready_now(&self) -> Vec<NotificationEntry> {
        self.list_ready(self.clock.now())
    }

    /// Remove `to_remove` and insert `to_add` as one step.
    ///
    /// Ids in `to_remove` that are already gone are skipped. If any entry in
    /// `to_add` would collide with an id that stays in the store (or with
    /// another entry of the same batch), nothing is applied.
    pub fn mark_processed(
        &self,
        to_remove: &[NotificationEntry],
        to_add: Vec<NotificationEntry>,
    ) -> Result<(), NotifqError> {
        let removing: HashSet<NotificationId> = to_remove.iter().map(NotificationEntry::id).collect();

        let mut state = self.state();

        let mut adding = HashSet::with_capacity(to_add.len());
        for entry in &to_add {
            let id = entry.id();
            let stays = state.contains(id) && !removing.contains(&id);
            if stays || !adding.insert(id) {
                return Err(NotifqError::DuplicateNotification(id));
            }
        }

        let mut removed = 0usize;
        for id in &removing {
            if state.remove(*id).is_some() {
                removed += 1;
            }
        }
        let added = to_add.len();
        for entry in to_add {
            state.insert(entry);
        }
        drop(state);

        debug!(queue = %self.queue_name, removed, added, "marked notifications processed");
        Ok(())
    }

    /// Cancel one entry. Absent ids are a no-op.
    pub fn remove(&self, id: NotificationId) {
        if self.state().remove(id).is_some() {
            debug!(notification_id = %id, queue = %self.queue_name, "removed notification");
        }
    }

    pub fn get(&self, id: NotificationId) -> Option<NotificationEntry> {
        let state = self.state();
        let effective_date = *state.index.get(&id)?;
        state.entries.get(&(effective_date, id)).cloned()
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self, now: DateTime<Utc>) -> QueueStats {
        let state = self.state();
        QueueStats {
            pending: state.entries.len(),
            ready: state.ready(now).count(),
        }
    }

    pub fn start(&self) {
        self.swap_started(true);
    }

    pub fn stop(&self) {
        self.swap_started(false);
    }

    /// Set the flag and return its previous value.
    pub(crate) fn swap_started(&self, started: bool) -> bool {
        self.started.swap(started, Ordering::SeqCst)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}
