//! # PersistLock: the one writer gate shared by every named state.
//!
//! Writers poll instead of queueing, following [`LockPolicy`]: at most
//! `attempts` sleeps of `interval`, then one last try, then
//! [`PersistError::LockTimeout`]. No file is touched on timeout.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::PersistError;
use crate::policies::LockPolicy;

/// Held persistence lock. Released on drop.
pub type PersistGuard = OwnedMutexGuard<()>;

/// Cloneable handle to a single mutual-exclusion gate.
///
/// Clones share the gate, so several engines can be serialized together by
/// handing them the same lock (see [`SnapshotEngine::with_lock`](crate::SnapshotEngine::with_lock)).
#[derive(Clone, Debug, Default)]
pub struct PersistLock {
    inner: Arc<Mutex<()>>,
}

impl PersistLock {
    /// Creates a new, unheld lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// True while some writer holds the lock.
    pub fn is_held(&self) -> bool {
        self.inner.try_lock().is_err()
    }

    /// Waits as long as it takes and holds the lock, keeping writers out.
    pub async fn hold(&self) -> PersistGuard {
        Arc::clone(&self.inner).lock_owned().await
    }

    /// Polls for the lock under `policy`.
    ///
    /// `on_contended(attempt, delay)` is called before each sleep.
    pub(crate) async fn acquire<F>(
        &self,
        policy: &LockPolicy,
        mut on_contended: F,
    ) -> Result<PersistGuard, PersistError>
    where
        F: FnMut(u32, Duration),
    {
        let mut waited = Duration::ZERO;
        for attempt in 1..=policy.attempts {
            if let Ok(guard) = Arc::clone(&self.inner).try_lock_owned() {
                return Ok(guard);
            }
            let delay = policy.next_interval();
            on_contended(attempt, delay);
            tokio::time::sleep(delay).await;
            waited += delay;
        }

        Arc::clone(&self.inner)
            .try_lock_owned()
            .map_err(|_| PersistError::LockTimeout {
                waited,
                attempts: policy.attempts,
            })
    }
}
