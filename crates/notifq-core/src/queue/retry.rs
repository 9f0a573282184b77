//! Retry policy: decides when a failed notification fires again.

use chrono::{DateTime, Duration, Utc};

use crate::domain::NotificationEntry;

/// Decides the follow-up fire time for an entry whose handler failed.
///
/// `None` means give up; the dispatcher then drops the entry.
pub trait RetryPolicy: Send + Sync {
    fn next_attempt(&self, entry: &NotificationEntry, now: DateTime<Utc>) -> Option<DateTime<Utc>>;
}

/// Never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn next_attempt(&self, _entry: &NotificationEntry, _now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        None
    }
}

/// Exponential backoff: delay = base_delay * multiplier^retry_count.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Delay before the first retry.
    pub base_delay: std::time::Duration,

    /// Backoff multiplier.
    pub multiplier: f64,

    /// Retries allowed after the first failure.
    pub max_retries: u32,
}

impl ExponentialBackoff {
    pub fn new(base_delay: std::time::Duration, multiplier: f64, max_retries: u32) -> Self {
        Self {
            base_delay,
            multiplier,
            max_retries,
        }
    }

    /// Delay before retry number `retry_count + 1`.
    ///
    /// Example with base_delay=2s, multiplier=2.0:
    /// - retry_count 0: 2s
    /// - retry_count 1: 4s
    /// - retry_count 2: 8s
    pub fn next_delay(&self, retry_count: u32) -> std::time::Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let delay_secs = base_secs * self.multiplier.powi(retry_count.min(i32::MAX as u32) as i32);
        std::time::Duration::try_from_secs_f64(delay_secs).unwrap_or(std::time::Duration::MAX)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(std::time::Duration::from_secs(2), 2.0, 5)
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_attempt(&self, entry: &NotificationEntry, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if entry.retry_count() >= self.max_retries {
            return None;
        }
        // out-of-range delays clamp to the latest representable time
        let at = Duration::from_std(self.next_delay(entry.retry_count()))
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Some(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notification::fixtures::{at, entry, id};
    use std::time::Duration as StdDuration;

    #[test]
    fn default_policy_has_reasonable_values() {
        let policy = ExponentialBackoff::default();
        assert_eq!(policy.base_delay, StdDuration::from_secs(2));
        assert_eq!(policy.multiplier, 2.0);
        assert_eq!(policy.max_retries, 5);
    }

    #[test]
    fn exponential_backoff_increases() {
        let policy = ExponentialBackoff::default();

        let d0 = policy.next_delay(0);
        let d1 = policy.next_delay(1);
        let d2 = policy.next_delay(2);

        assert_eq!(d0, StdDuration::from_secs(2));
        assert_eq!(d1, StdDuration::from_secs(4));
        assert_eq!(d2, StdDuration::from_secs(8));
    }

    #[test]
    fn next_attempt_uses_retry_count() {
        let policy = ExponentialBackoff::default();
        let fresh = entry(1, 0, 1);
        let retried = fresh.reschedule(id(2), at(0)).reschedule(id(3), at(0));

        assert_eq!(policy.next_attempt(&fresh, at(100)), Some(at(102)));
        assert_eq!(policy.next_attempt(&retried, at(100)), Some(at(108)));
    }

    #[test]
    fn gives_up_after_max_retries() {
        let policy = ExponentialBackoff::new(StdDuration::from_secs(1), 2.0, 1);
        let fresh = entry(1, 0, 1);
        let retried = fresh.reschedule(id(2), at(0));

        assert!(policy.next_attempt(&fresh, at(0)).is_some());
        assert_eq!(policy.next_attempt(&retried, at(0)), None);
        assert_eq!(NoRetry.next_attempt(&fresh, at(0)), None);
    }

    #[test]
    fn huge_delays_saturate_instead_of_panicking() {
        let policy = ExponentialBackoff::new(StdDuration::from_secs(1), 1e300, u32::MAX);
        assert_eq!(policy.next_delay(10), StdDuration::MAX);

        let retried = entry(1, 0, 1).reschedule(id(2), at(0));
        assert_eq!(policy.next_attempt(&retried, at(0)), Some(DateTime::<Utc>::MAX_UTC));
    }

    #[test]
    fn delay_past_the_calendar_still_retries() {
        // fits in std Duration but not in a chrono offset from `now`
        let policy = ExponentialBackoff::new(StdDuration::from_secs(u64::MAX / 4), 1.0, 3);
        let next = policy.next_attempt(&entry(1, 0, 1), at(0));
        assert_eq!(next, Some(DateTime::<Utc>::MAX_UTC));

        let exhausted = ExponentialBackoff::new(StdDuration::from_secs(u64::MAX / 4), 1.0, 0);
        assert_eq!(exhausted.next_attempt(&entry(1, 0, 1), at(0)), None);
    }
}
