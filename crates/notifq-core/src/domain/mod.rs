//! Domain model (IDs, queue names, keys, notification entries).

pub mod ids;
pub mod key;
pub mod notification;
pub mod queue_name;

pub use ids::{NotificationId, OwnerId, UserToken};
pub use key::NotificationKey;
pub use notification::{EncodedKey, NotificationDraft, NotificationEntry};
pub use queue_name::QueueName;
