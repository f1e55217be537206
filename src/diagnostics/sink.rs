//! # Diagnostic sink trait and the default `tracing` sink.

use async_trait::async_trait;

use super::FailureEvent;

/// Destination for unhandled-failure reports.
///
/// The supervisor always calls `report` from a supervised task of its own, so
/// implementations may await I/O freely. `report` has no error channel:
/// delivery problems must be handled (typically logged) inside the sink.
/// A panicking sink is logged by the supervisor and never re-reported.
#[async_trait]
pub trait DiagnosticSink: Send + Sync + 'static {
    /// Delivers one failure event.
    async fn report(&self, event: FailureEvent);

    /// Sink name for logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Sink that writes the rendered report through `tracing` at `error` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl DiagnosticSink for TracingSink {
    async fn report(&self, event: FailureEvent) {
        tracing::error!(
            origin = event.origin.name(),
            label = event.error.as_label(),
            "{}",
            event.render()
        );
    }

    fn name(&self) -> &'static str {
        "tracing"
    }
}
