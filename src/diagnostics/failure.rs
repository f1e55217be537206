//! # Failure events handed to a diagnostic sink.
//!
//! A [`FailureEvent`] is produced once per unhandled failure: by the supervisor
//! when a task fails, or by application code (command handlers, event
//! handlers, interactions) through [`Supervisor::report`](crate::Supervisor::report).

use std::fmt::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::TaskError;

/// Where a failure came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// A supervised task, by display name.
    Task(String),
    /// A user-invoked command, by qualified name.
    Command(String),
    /// A runtime event handler, by event name.
    Event(String),
    /// An interactive component (button, form, ...), by component name.
    Interaction(String),
}

impl Origin {
    /// The identifying name of the origin.
    pub fn name(&self) -> &str {
        match self {
            Origin::Task(n) | Origin::Command(n) | Origin::Event(n) | Origin::Interaction(n) => n,
        }
    }

    /// Heading used when rendering a report.
    pub fn title(&self) -> &'static str {
        match self {
            Origin::Task(_) => "Task Error",
            Origin::Command(_) => "Command Error",
            Origin::Event(_) => "Event Error",
            Origin::Interaction(_) => "Interaction Error",
        }
    }
}

/// A labelled piece of context attached to a failure (message id, author, payload, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextValue {
    pub label: String,
    pub value: String,
}

/// One unhandled failure, consumed exactly once by a [`DiagnosticSink`](super::DiagnosticSink).
#[derive(Debug, Clone)]
pub struct FailureEvent {
    /// Where the failure came from.
    pub origin: Origin,
    /// The error itself.
    pub error: TaskError,
    /// Optional context values, in the order they were attached.
    pub context: Vec<ContextValue>,
    /// When the failure was observed.
    pub at: SystemTime,
}

impl FailureEvent {
    /// Creates an event stamped with the current time.
    pub fn new(origin: Origin, error: TaskError) -> Self {
        Self {
            origin,
            error,
            context: Vec::new(),
            at: SystemTime::now(),
        }
    }

    /// Attaches a context value. Empty values are skipped.
    pub fn with_context(mut self, label: impl Into<String>, value: impl ToString) -> Self {
        let value = value.to_string();
        if !value.is_empty() {
            self.context.push(ContextValue {
                label: label.into(),
                value,
            });
        }
        self
    }

    /// Renders a plain-text report: heading, error, cause chain, then context.
    ///
    /// ```text
    /// Task Error (nightly_cleanup) at 1718000000
    /// error: execution failed: disk full
    ///   caused by: No space left on device
    /// [0] message_id: 1234
    /// ```
    pub fn render(&self) -> String {
        let secs = self
            .at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let mut out = String::new();
        let _ = writeln!(out, "{} ({}) at {secs}", self.origin.title(), self.origin.name());
        let _ = writeln!(out, "error: {}", self.error);
        if let TaskError::Fail { causes, .. } = &self.error {
            for cause in causes {
                let _ = writeln!(out, "  caused by: {cause}");
            }
        }
        for (i, ctx) in self.context.iter().enumerate() {
            let _ = writeln!(out, "[{i}] {}: {}", ctx.label, ctx.value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_causes_and_context() {
        let ev = FailureEvent::new(
            Origin::Command("config reload".into()),
            TaskError::Fail {
                error: "bad value".into(),
                causes: vec!["line 3".into()],
            },
        )
        .with_context("channel_id", 42)
        .with_context("skipped", "")
        .with_context("author", "someone");

        let text = ev.render();
        assert!(text.starts_with("Command Error (config reload) at "));
        assert!(text.contains("error: execution failed: bad value\n"));
        assert!(text.contains("  caused by: line 3\n"));
        assert!(text.contains("[0] channel_id: 42\n"));
        assert!(text.contains("[1] author: someone\n"));
        assert_eq!(ev.context.len(), 2);
    }
}
