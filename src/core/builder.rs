use std::sync::Arc;

use crate::{
    config::Config,
    diagnostics::{DiagnosticSink, TracingSink},
    events::{Bus, EventKind},
    subscribers::{Subscribe, SubscriberSet},
};

use super::{registry::Registry, supervisor::Supervisor};

/// Builder for a [`Supervisor`].
pub struct SupervisorBuilder {
    cfg: Config,
    sink: Arc<dyn DiagnosticSink>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    /// Creates a builder with the given configuration and a [`TracingSink`].
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            sink: Arc::new(TracingSink),
            subscribers: Vec::new(),
        }
    }

    /// Sets the destination for failure reports.
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive runtime events (task lifecycle, persistence, shutdown)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the supervisor and starts its subscriber listener.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let listener = spawn_listener(&bus, self.subscribers);
        let runtime_token = tokio_util::sync::CancellationToken::new();

        Arc::new(Supervisor::new_internal(
            self.cfg,
            bus,
            self.sink,
            Registry::new(),
            runtime_token,
            listener,
        ))
    }
}

/// Forwards bus events to the subscriber set until shutdown has been reported.
fn spawn_listener(
    bus: &Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
) -> Option<tokio::task::JoinHandle<()>> {
    if subscribers.is_empty() {
        return None;
    }
    let mut rx = bus.subscribe();
    let set = SubscriberSet::new(subscribers, bus.clone());

    Some(tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    set.emit(&ev);
                    if matches!(ev.kind, EventKind::AllStoppedWithin | EventKind::GraceExceeded) {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber listener lagging; events skipped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
        set.shutdown().await;
    }))
}
