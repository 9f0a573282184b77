use serde::{Deserialize, Serialize};
use std::fmt;

/// Two-part queue name: the owning service plus the queue within it.
///
/// The composite form `"<service>:<queue>"` is what the queue service keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueName {
    service: String,
    queue: String,
}

impl QueueName {
    pub const SEPARATOR: char = ':';

    pub fn new(service: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            queue: queue.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn composite(&self) -> String {
        format!("{}{}{}", self.service, Self::SEPARATOR, self.queue)
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.service, Self::SEPARATOR, self.queue)
    }
}
