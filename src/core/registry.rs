//! # Registry of live tasks.
//!
//! The supervisor inserts an entry synchronously in `launch` (before the task
//! is spawned) and the task's watcher removes it after the completion hook ran.
//! Shutdown uses the registry to wait for the set to drain and to name the
//! tasks that did not.
//!
//! ## Rules
//! - Insert always happens-before remove for the same id.
//! - `wait_empty` never misses the final removal (the `Notified` future is
//!   created before the emptiness check).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

struct Entry {
    name: Arc<str>,
    cancel: CancellationToken,
}

/// Live tasks by id.
pub(crate) struct Registry {
    tasks: Mutex<HashMap<u64, Entry>>,
    drained: Notify,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            drained: Notify::new(),
        }
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<u64, Entry>> {
        // Entries stay consistent even if a holder panicked; nothing is half-updated.
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn insert(&self, id: u64, name: Arc<str>, cancel: CancellationToken) {
        self.guard().insert(id, Entry { name, cancel });
    }

    pub(crate) fn remove(&self, id: u64) {
        let now_empty = {
            let mut tasks = self.guard();
            tasks.remove(&id);
            tasks.is_empty()
        };
        if now_empty {
            self.drained.notify_waiters();
        }
    }

    /// Sorted names of live tasks.
    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.guard().values().map(|e| e.name.to_string()).collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn len(&self) -> usize {
        self.guard().len()
    }

    /// Cancels every live task, including ones not tied to the runtime token.
    pub(crate) fn cancel_all(&self) {
        for entry in self.guard().values() {
            entry.cancel.cancel();
        }
    }

    /// Resolves once no task is live.
    pub(crate) async fn wait_empty(&self) {
        loop {
            let notified = self.drained.notified();
            if self.len() == 0 {
                return;
            }
            notified.await;
        }
    }
}
