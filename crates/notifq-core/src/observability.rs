use serde::{Deserialize, Serialize};

/// Snapshot counts for one store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Entries not yet processed, ready or not.
    pub pending: usize,
    /// Subset of `pending` whose effective time has passed.
    pub ready: usize,
}
