//! Scheduled notification entry.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{NotificationId, OwnerId, UserToken};
use super::key::NotificationKey;
use super::queue_name::QueueName;
use crate::error::NotifqError;
use crate::ports::KeyCodec;

/// Serialized key payload plus its type discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedKey {
    pub key_type: String,
    pub payload: String,
}

/// Everything a new entry needs except its identity.
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub queue_name: QueueName,
    pub created_by_host: String,
    pub key: EncodedKey,
    pub user_token: UserToken,
    pub effective_date: DateTime<Utc>,
    pub owner: OwnerId,
    pub tenant_record_id: u64,
}

/// One unit of scheduled work.
///
/// Entries are totally ordered by `(effective_date, id)`. Equality follows the
/// same key so that `Ord` and `Eq` agree; ids are unique, so in practice two
/// entries are equal only if they are the same entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEntry {
    id: NotificationId,
    queue_name: QueueName,
    created_by_host: String,
    key: EncodedKey,
    user_token: UserToken,
    effective_date: DateTime<Utc>,
    processed_date: Option<DateTime<Utc>>,
    owner: OwnerId,
    tenant_record_id: u64,
    retry_count: u32,
}

impl NotificationEntry {
    pub fn new(id: NotificationId, draft: NotificationDraft) -> Self {
        Self {
            id,
            queue_name: draft.queue_name,
            created_by_host: draft.created_by_host,
            key: draft.key,
            user_token: draft.user_token,
            effective_date: draft.effective_date,
            processed_date: None,
            owner: draft.owner,
            tenant_record_id: draft.tenant_record_id,
            retry_count: 0,
        }
    }

    pub fn id(&self) -> NotificationId {
        self.id
    }

    pub fn queue_name(&self) -> &QueueName {
        &self.queue_name
    }

    pub fn created_by_host(&self) -> &str {
        &self.created_by_host
    }

    pub fn key_type(&self) -> &str {
        &self.key.key_type
    }

    pub fn notification_key(&self) -> &str {
        &self.key.payload
    }

    pub fn user_token(&self) -> UserToken {
        self.user_token
    }

    pub fn effective_date(&self) -> DateTime<Utc> {
        self.effective_date
    }

    pub fn processed_date(&self) -> Option<DateTime<Utc>> {
        self.processed_date
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn tenant_record_id(&self) -> u64 {
        self.tenant_record_id
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn is_processed(&self) -> bool {
        self.processed_date.is_some()
    }

    /// Ready once the effective date is at or before `now`.
    pub fn is_available_for_processing(&self, now: DateTime<Utc>) -> bool {
        self.effective_date <= now
    }

    /// Decode the payload back into `K`, checking the discriminator first.
    pub fn decode_key<K, C>(&self, codec: &C) -> Result<K, NotifqError>
    where
        K: NotificationKey,
        C: KeyCodec,
    {
        if self.key.key_type != K::KEY_TYPE {
            return Err(NotifqError::KeyTypeMismatch {
                expected: K::KEY_TYPE.to_string(),
                actual: self.key.key_type.clone(),
            });
        }
        codec.decode::<K>(&self.key.payload)
    }

    /// Follow-up entry for a retry: fresh identity and fire time, same payload.
    pub fn reschedule(&self, id: NotificationId, effective_date: DateTime<Utc>) -> Self {
        Self {
            id,
            effective_date,
            processed_date: None,
            retry_count: self.retry_count.saturating_add(1),
            ..self.clone()
        }
    }

    /// Copy of this entry stamped as processed. Pending -> processed only.
    pub fn processed(&self, now: DateTime<Utc>) -> Self {
        Self {
            processed_date: Some(self.processed_date.unwrap_or(now)),
            ..self.clone()
        }
    }
}

impl PartialEq for NotificationEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for NotificationEntry {}

impl PartialOrd for NotificationEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NotificationEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.effective_date
            .cmp(&other.effective_date)
            .then_with(|| self.id.cmp(&other.id))
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{at, entry, id};
    use super::*;
    use crate::ports::JsonKeyCodec;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        n: u64,
    }

    impl NotificationKey for Payload {
        const KEY_TYPE: &'static str = "test.key.v1";
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Other;

    impl NotificationKey for Other {
        const KEY_TYPE: &'static str = "test.other.v1";
    }

    #[test]
    fn orders_by_effective_date_then_id() {
        let early = entry(9, 5, 1);
        let late_low = entry(1, 10, 1);
        let late_high = entry(3, 10, 1);

        let mut entries = vec![late_high.clone(), early.clone(), late_low.clone()];
        entries.sort();

        assert_eq!(entries, vec![early, late_low, late_high]);
    }

    #[test]
    fn same_time_different_id_never_equal() {
        assert_ne!(entry(1, 10, 1), entry(2, 10, 1));
    }

    #[test]
    fn readiness_is_inclusive() {
        let e = entry(1, 10, 1);
        assert!(e.is_available_for_processing(at(10)));
        assert!(e.is_available_for_processing(at(11)));
        assert!(!e.is_available_for_processing(at(9)));
    }

    #[test]
    fn decode_key_checks_discriminator() {
        let e = entry(7, 0, 1);
        let codec = JsonKeyCodec;

        let decoded: Payload = e.decode_key(&codec).unwrap();
        assert_eq!(decoded, Payload { n: 7 });

        let err = e.decode_key::<Other, _>(&codec).unwrap_err();
        assert!(matches!(err, NotifqError::KeyTypeMismatch { .. }));
    }

    #[test]
    fn reschedule_keeps_payload_and_bumps_retry_count() {
        let original = entry(1, 10, 42);
        let follow_up = original.reschedule(id(2), at(30));

        assert_eq!(follow_up.id(), id(2));
        assert_eq!(follow_up.effective_date(), at(30));
        assert_eq!(follow_up.retry_count(), 1);
        assert_eq!(follow_up.owner(), original.owner());
        assert_eq!(follow_up.notification_key(), original.notification_key());
        assert_eq!(follow_up.user_token(), original.user_token());
        assert!(!follow_up.is_processed());
    }

    #[test]
    fn processed_date_is_set_once() {
        let e = entry(1, 10, 1);
        assert!(!e.is_processed());

        let first = e.processed(at(20));
        let second = first.processed(at(99));

        assert_eq!(first.processed_date(), Some(at(20)));
        assert_eq!(second.processed_date(), Some(at(20)));
        // 処理済みでも順序キーは変わらない
        assert_eq!(first.effective_date(), e.effective_date());
    }
}
