//! # LogWriter: renders events through `tracing`
//!
//! A minimal subscriber that logs every incoming [`Event`]. Failures and
//! timeouts go out at `warn`/`error`, lifecycle noise at `debug`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! DEBUG snapvisor: launched task="autosave" id=3
//! WARN  snapvisor: lock contended state="db" attempt=1 delay_ms=60000
//! ERROR snapvisor: task failed task="sync_roles" id=7 reason="execution failed: 403"
//! INFO  snapvisor: task cancelled task="ticker" id=2
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let state = e.state.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::TaskLaunched => {
                tracing::debug!(task, id = ?e.task_id, "launched");
            }
            EventKind::TaskCompleted => {
                tracing::debug!(task, id = ?e.task_id, "completed");
            }
            EventKind::TaskCancelled => {
                tracing::info!(task, id = ?e.task_id, "task cancelled");
            }
            EventKind::TaskFailed => {
                tracing::error!(task, id = ?e.task_id, reason, "task failed");
            }
            EventKind::CallbackFailed => {
                tracing::error!(task, id = ?e.task_id, reason, "completion hook failed");
            }
            EventKind::DiagnosticDispatched => {
                tracing::debug!(origin = task, reason, "diagnostic dispatched");
            }
            EventKind::PersistStarted => {
                tracing::debug!(state, "persist started");
            }
            EventKind::LockContended => {
                tracing::warn!(state, attempt = ?e.attempt, delay_ms = ?e.delay_ms, "lock contended");
            }
            EventKind::LockTimedOut => {
                tracing::error!(state, attempt = ?e.attempt, "lock wait budget exhausted");
            }
            EventKind::OffloadRetried => {
                tracing::warn!(state, attempt = ?e.attempt, reason, "retrying snapshot write");
            }
            EventKind::PersistCompleted => {
                tracing::debug!(state, bytes = ?e.bytes, "persist completed");
            }
            EventKind::PersistFailed => {
                tracing::error!(state, reason, "persist failed");
            }
            EventKind::LoadRecovered => {
                tracing::warn!(state, reason, "load recovered with empty state");
            }
            EventKind::ShutdownRequested => {
                tracing::info!("shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                tracing::info!("all tasks stopped within grace");
            }
            EventKind::GraceExceeded => {
                tracing::error!(stuck = reason, "grace exceeded");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(subscriber = task, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(subscriber = task, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn renders_every_kind() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();

        let writer = LogWriter::new();
        let kinds = [
            EventKind::TaskLaunched,
            EventKind::TaskCompleted,
            EventKind::TaskCancelled,
            EventKind::TaskFailed,
            EventKind::CallbackFailed,
            EventKind::DiagnosticDispatched,
            EventKind::PersistStarted,
            EventKind::LockContended,
            EventKind::LockTimedOut,
            EventKind::OffloadRetried,
            EventKind::PersistCompleted,
            EventKind::PersistFailed,
            EventKind::LoadRecovered,
            EventKind::ShutdownRequested,
            EventKind::AllStoppedWithin,
            EventKind::GraceExceeded,
            EventKind::SubscriberOverflow,
            EventKind::SubscriberPanicked,
        ];
        for kind in kinds {
            let ev = Event::new(kind)
                .with_task("save_db")
                .with_task_id(7)
                .with_state("db")
                .with_reason("disk full")
                .with_attempt(1)
                .with_delay(Duration::from_secs(60))
                .with_bytes(128);
            writer.on_event(&ev).await;
        }
        assert_eq!(writer.name(), "LogWriter");
    }
}
