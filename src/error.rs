//! Error types used by the supervisor, the tasks it runs, and the snapshot engine.
//!
//! This module defines four error enums:
//!
//! - [`RuntimeError`]: errors raised by the supervisor runtime itself.
//! - [`TaskError`]: errors raised by individual supervised tasks.
//! - [`PersistError`]: errors raised by [`SnapshotEngine`](crate::SnapshotEngine).
//! - [`ProviderError`]: errors raised by a [`StateProvider`](crate::StateProvider).
//!
//! All of them provide `as_label` (stable snake_case label for logs/events);
//! the runtime and task errors also provide `as_message`.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced by the supervisor runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some tasks were still running.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of tasks that did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use snapvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck tasks={stuck:?}")
            }
        }
    }
}

/// # Errors produced by supervised work.
///
/// A task that returns `Err` (or panics) is reported to the diagnostic sink,
/// except for [`TaskError::Canceled`], which is a benign terminal state.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Work failed with an error.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
        /// Rendered cause chain, outermost first (may be empty).
        causes: Vec<String>,
    },

    /// Work failed in a way the application considers unrecoverable.
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Work panicked.
    #[error("panicked: {info}")]
    Panicked {
        /// Panic payload, when it was a string.
        info: String,
    },

    /// Work observed cancellation and stopped.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Builds a [`TaskError::Fail`] from any error, capturing its `source()` chain.
    ///
    /// # Example
    /// ```
    /// use snapvisor::TaskError;
    ///
    /// let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
    /// let err = TaskError::from_error(&io);
    /// assert_eq!(err.as_label(), "task_failed");
    /// ```
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        TaskError::Fail {
            error: err.to_string(),
            causes,
        }
    }

    /// Shorthand for a [`TaskError::Fail`] without causes.
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
            causes: Vec::new(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error, causes } if causes.is_empty() => format!("error: {error}"),
            TaskError::Fail { error, causes } => {
                format!("error: {error}; caused by: {}", causes.join(": "))
            }
            TaskError::Fatal { error } => format!("fatal: {error}"),
            TaskError::Panicked { info } => format!("panic: {info}"),
            TaskError::Canceled => "context cancelled".to_string(),
        }
    }

    /// True for [`TaskError::Canceled`].
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}

impl From<PersistError> for TaskError {
    fn from(err: PersistError) -> Self {
        TaskError::from_error(&err)
    }
}

/// # Errors produced by a state provider.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider does not hold a state under this name.
    #[error("unknown state '{name}'")]
    Unknown {
        /// Requested state name.
        name: String,
    },

    /// The provider could not convert between its value and JSON.
    #[error("state '{name}' could not be converted: {reason}")]
    Conversion {
        /// State name.
        name: String,
        /// What went wrong.
        reason: String,
    },

    /// The provider's own guard was poisoned by a panicking writer.
    #[error("state '{name}' guard poisoned")]
    Poisoned {
        /// State name.
        name: String,
    },
}

impl ProviderError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProviderError::Unknown { .. } => "provider_unknown_state",
            ProviderError::Conversion { .. } => "provider_conversion",
            ProviderError::Poisoned { .. } => "provider_poisoned",
        }
    }
}

/// # Errors produced by the snapshot engine.
///
/// `InvalidName` and `LockTimeout` are raised before any file is touched.
/// `CorruptState` and `Access` come from loading and are never auto-recovered.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PersistError {
    /// The name is not one of the engine's supported state names.
    #[error("invalid state name '{name}'; expected one of {expected:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Names the engine accepts.
        expected: Vec<String>,
    },

    /// The persistence lock stayed held for the whole wait budget.
    #[error("persistence lock still held after waiting {waited:?} ({attempts} polls)")]
    LockTimeout {
        /// Total time spent polling.
        waited: Duration,
        /// Number of polls performed.
        attempts: u32,
    },

    /// The state file holds non-empty content that is not valid JSON.
    #[error("state file {path:?} is corrupt: {source}")]
    CorruptState {
        /// File that failed to parse.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },

    /// The state file exists but cannot be opened with the current permissions.
    #[error("permission denied for state file {path:?}")]
    Access {
        /// File that could not be opened.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Any other I/O failure while reading, rotating or writing files.
    #[error("i/o failure on {path:?}: {source}")]
    Io {
        /// File involved in the failed operation.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A generation index outside `1..=max` was requested.
    #[error("generation {generation} out of range 1..={max}")]
    InvalidGeneration {
        /// Requested generation.
        generation: usize,
        /// Oldest generation kept.
        max: usize,
    },

    /// The blocking worker running the write did not complete (panicked or was aborted).
    #[error("snapshot worker for '{name}' did not complete: {reason}")]
    Offload {
        /// State being written.
        name: String,
        /// Join failure description.
        reason: String,
    },

    /// The state provider could not produce or accept a value.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The snapshot could not be serialized.
    #[error("state '{name}' could not be serialized: {source}")]
    Serialize {
        /// State name.
        name: String,
        /// Serializer error.
        #[source]
        source: serde_json::Error,
    },
}

impl PersistError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use snapvisor::PersistError;
    /// use std::time::Duration;
    ///
    /// let err = PersistError::LockTimeout { waited: Duration::from_secs(300), attempts: 5 };
    /// assert_eq!(err.as_label(), "persist_lock_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            PersistError::InvalidName { .. } => "persist_invalid_name",
            PersistError::LockTimeout { .. } => "persist_lock_timeout",
            PersistError::CorruptState { .. } => "persist_corrupt_state",
            PersistError::Access { .. } => "persist_access_denied",
            PersistError::Io { .. } => "persist_io",
            PersistError::InvalidGeneration { .. } => "persist_invalid_generation",
            PersistError::Offload { .. } => "persist_offload",
            PersistError::Provider(_) => "persist_provider",
            PersistError::Serialize { .. } => "persist_serialize",
        }
    }

    /// Indicates whether the failure is a transient fault worth one more attempt.
    ///
    /// Returns `true` for [`PersistError::Offload`] and for I/O errors of kind
    /// `Interrupted`, `WouldBlock` or `TimedOut`.
    pub fn is_transient(&self) -> bool {
        match self {
            PersistError::Offload { .. } => true,
            PersistError::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PersistError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        let offload = PersistError::Offload {
            name: "db".into(),
            reason: "panic".into(),
        };
        assert!(offload.is_transient());

        let interrupted = PersistError::io("db.json", io::Error::from(io::ErrorKind::Interrupted));
        assert!(interrupted.is_transient());

        let missing = PersistError::io("db.json", io::Error::from(io::ErrorKind::NotFound));
        assert!(!missing.is_transient());

        let timeout = PersistError::LockTimeout {
            waited: Duration::from_secs(1),
            attempts: 1,
        };
        assert!(!timeout.is_transient());
    }

    #[test]
    fn task_error_keeps_cause_chain() {
        let err = PersistError::io("db_temp.json", io::Error::other("disk full"));
        let task_err = TaskError::from(err);
        match &task_err {
            TaskError::Fail { error, causes } => {
                assert!(error.contains("db_temp.json"));
                assert_eq!(causes, &vec!["disk full".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(task_err.as_message().contains("caused by: disk full"));
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
        assert_eq!(
            TaskError::Panicked { info: "x".into() }.as_label(),
            "task_panicked"
        );
        assert_eq!(
            ProviderError::Unknown { name: "db".into() }.as_label(),
            "provider_unknown_state"
        );
    }
}
