//! # Lock wait policy.
//!
//! [`LockPolicy`] bounds how long a persistence call waits for the shared
//! persistence lock. The writer polls instead of queueing: it sleeps
//! `interval` between polls, at most `attempts` times, and then gives up with
//! [`PersistError::LockTimeout`](crate::PersistError::LockTimeout).
//!
//! ```text
//! try_lock ─► held? ─► sleep(interval) ─► try_lock ─► ... (attempts sleeps) ─► LockTimeout
//!     └─► free ─► acquired
//! ```

use std::time::Duration;

use super::JitterPolicy;

/// Fixed-interval polling budget for the persistence lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockPolicy {
    /// Maximum number of sleeps before giving up (`0` = fail immediately when held).
    pub attempts: u32,
    /// Base interval between polls.
    pub interval: Duration,
    /// Randomization applied to each interval.
    pub jitter: JitterPolicy,
}

impl Default for LockPolicy {
    /// Five polls, sixty seconds apart: at most five minutes of waiting.
    fn default() -> Self {
        Self {
            attempts: 5,
            interval: Duration::from_secs(60),
            jitter: JitterPolicy::None,
        }
    }
}

impl LockPolicy {
    /// Returns the sleep before the next poll.
    pub fn next_interval(&self) -> Duration {
        self.jitter.apply(self.interval)
    }

    /// Worst-case total wait without jitter.
    pub fn budget(&self) -> Duration {
        self.interval.saturating_mul(self.attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_budget_is_five_minutes() {
        let p = LockPolicy::default();
        assert_eq!(p.attempts, 5);
        assert_eq!(p.next_interval(), Duration::from_secs(60));
        assert_eq!(p.budget(), Duration::from_secs(300));
    }
}
