//! # Runtime events emitted by the supervisor and the snapshot engine.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Task events**: supervised work lifecycle (launched, completed, failed, cancelled)
//! - **Persistence events**: snapshot writes and loads
//! - **Shutdown events**: supervisor shutdown progress
//! - **Subscriber events**: problems inside the fan-out itself
//!
//! The [`Event`] struct carries additional metadata such as timestamps, task or
//! state name, reasons, and poll delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use snapvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::LockContended)
//!     .with_state("db")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_secs(60));
//!
//! assert_eq!(ev.kind, EventKind::LockContended);
//! assert_eq!(ev.state.as_deref(), Some("db"));
//! assert_eq!(ev.delay_ms, Some(60_000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `task` (subscriber name), `reason` (panic info).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `task` (subscriber name), `reason` ("full" or "closed").
    SubscriberOverflow,

    // === Shutdown events ===
    /// Shutdown requested (OS signal or explicit call).
    ShutdownRequested,

    /// All live tasks stopped within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some tasks did not stop in time.
    ///
    /// Sets: `reason` (stuck task names).
    GraceExceeded,

    // === Task events ===
    /// Work was scheduled on the runtime.
    ///
    /// Sets: `task`, `task_id`.
    TaskLaunched,

    /// Work finished without error.
    ///
    /// Sets: `task`, `task_id`.
    TaskCompleted,

    /// Work returned an error or panicked.
    ///
    /// Sets: `task`, `task_id`, `reason`.
    TaskFailed,

    /// Work was cancelled before it finished.
    ///
    /// Sets: `task`, `task_id`.
    TaskCancelled,

    /// The completion hook itself failed; the failure was logged and swallowed.
    ///
    /// Sets: `task`, `task_id`, `reason`.
    CallbackFailed,

    /// A failure was handed to the diagnostic sink as a supervised task.
    ///
    /// Sets: `task` (origin name), `reason` (error message).
    DiagnosticDispatched,

    // === Persistence events ===
    /// A snapshot write acquired the persistence lock and started.
    ///
    /// Sets: `state`.
    PersistStarted,

    /// The persistence lock was held; the writer is sleeping before the next poll.
    ///
    /// Sets: `state`, `attempt`, `delay_ms`.
    LockContended,

    /// The lock wait budget was exhausted.
    ///
    /// Sets: `state`, `attempt`.
    LockTimedOut,

    /// A transient write fault was observed; the write is being retried.
    ///
    /// Sets: `state`, `attempt`, `reason`.
    OffloadRetried,

    /// The snapshot was written and the backup chain rotated.
    ///
    /// Sets: `state`, `bytes`.
    PersistCompleted,

    /// The snapshot write failed for good.
    ///
    /// Sets: `state`, `reason`.
    PersistFailed,

    /// Loading found a missing or empty file and installed an empty mapping.
    ///
    /// Sets: `state`, `reason` ("missing" or "empty").
    LoadRecovered,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the task, if applicable.
    pub task: Option<Arc<str>>,
    /// Supervisor-assigned task id, if applicable.
    pub task_id: Option<u64>,
    /// Name of the persisted state, if applicable.
    pub state: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Poll or retry attempt (starting from 1).
    pub attempt: Option<u32>,
    /// Delay before the next poll in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Bytes written by a snapshot.
    pub bytes: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            task_id: None,
            state: None,
            reason: None,
            attempt: None,
            delay_ms: None,
            bytes: None,
        }
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a task id.
    #[inline]
    pub fn with_task_id(mut self, id: u64) -> Self {
        self.task_id = Some(id);
        self
    }

    /// Attaches a state name.
    #[inline]
    pub fn with_state(mut self, state: impl Into<Arc<str>>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a byte count.
    #[inline]
    pub fn with_bytes(mut self, bytes: u64) -> Self {
        self.bytes = Some(bytes);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    /// True for events produced by the subscriber fan-out itself.
    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::TaskLaunched);
        let b = Event::new(EventKind::TaskCompleted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn delay_saturates() {
        let ev = Event::new(EventKind::LockContended).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }
}
