//! # Global runtime configuration.
//!
//! Provides [`Config`], the centralized settings shared by the [`Supervisor`](crate::Supervisor)
//! and the [`SnapshotEngine`](crate::SnapshotEngine).
//!
//! Config is used in two ways:
//! 1. **Supervisor creation**: `Supervisor::builder(config)`
//! 2. **Engine creation**: `SnapshotEngine::new(config, provider)`
//!
//! ## Sentinel values
//! - `grace = 0s` → do not wait for tasks on shutdown
//! - `lock.attempts = 0` → fail immediately when the persistence lock is held
//! - `offload_retries = 0` → never retry a failed snapshot write

use std::path::PathBuf;
use std::time::Duration;

use crate::policies::LockPolicy;

/// Default set of persisted state names.
pub const DEFAULT_STATE_NAMES: [&str; 3] = ["db", "stats", "message_queue"];

/// Global configuration for the supervisor and the snapshot engine.
///
/// ## Field semantics
/// - `grace`: Maximum wait for tasks to stop on shutdown
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `data_dir`: Directory holding `{name}.json` and its backup generations
/// - `names`: State names the engine accepts
/// - `lock`: How long a writer polls for the persistence lock
/// - `offload_retries`: Extra attempts after a transient write fault
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for live tasks after cancelling them on shutdown.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Directory where state files and their backups live.
    pub data_dir: PathBuf,

    /// Fixed set of state names that may be persisted or loaded.
    pub names: Vec<String>,

    /// Wait budget for the shared persistence lock.
    pub lock: LockPolicy,

    /// Number of times a transiently failing snapshot write is retried.
    pub offload_retries: u32,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns true if `name` is one of the configured state names.
    #[inline]
    pub fn supports(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Overrides fields from the process environment.
    ///
    /// - `SNAPVISOR_DATA_DIR` → `data_dir` (ignored when empty)
    /// - `SNAPVISOR_GRACE_SECS` → `grace` (ignored when not an integer)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("SNAPVISOR_DATA_DIR") {
            if !dir.is_empty() {
                self.data_dir = PathBuf::from(dir);
            }
        }

        if let Ok(secs) = std::env::var("SNAPVISOR_GRACE_SECS") {
            match secs.parse::<u64>() {
                Ok(secs) => self.grace = Duration::from_secs(secs),
                Err(_) => tracing::warn!(value = %secs, "ignoring invalid SNAPVISOR_GRACE_SECS"),
            }
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 60s`
    /// - `bus_capacity = 1024`
    /// - `data_dir = "."`
    /// - `names = ["db", "stats", "message_queue"]`
    /// - `lock = LockPolicy::default()` (5 polls, 60s apart)
    /// - `offload_retries = 1`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(60),
            bus_capacity: 1024,
            data_dir: PathBuf::from("."),
            names: DEFAULT_STATE_NAMES.iter().map(|n| n.to_string()).collect(),
            lock: LockPolicy::default(),
            offload_retries: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert!(cfg.supports("db"));
        assert!(cfg.supports("message_queue"));
        assert!(!cfg.supports("users"));
        assert_eq!(cfg.offload_retries, 1);
        assert_eq!(cfg.lock.attempts, 5);
    }

    #[test]
    fn bus_capacity_never_zero() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
