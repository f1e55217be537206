//! # Supervisor: fire-and-forget work with guaranteed failure reporting.
//!
//! The [`Supervisor`] owns the event bus, the diagnostic sink, and the registry
//! of live tasks. Application code hands it [`Work`] and gets a [`TaskHandle`]
//! back immediately; the supervisor guarantees that every task's terminal
//! state is observed exactly once.
//!
//! ## High-level architecture
//! ```text
//! launch(work)
//!   ├─► registry.insert(id)                       (before anything runs)
//!   ├─► tokio::spawn(work.start(child token))     ──► inner JoinHandle
//!   ├─► Bus.publish(TaskLaunched)
//!   └─► tokio::spawn(watcher):
//!          runner::await_outcome(inner)
//!            ├─ Completed ─► TaskCompleted
//!            ├─ Cancelled ─► TaskCancelled              (never reported)
//!            └─ Failed    ─► TaskFailed
//!                              └─► dispatch(FailureEvent)
//!                                    └─► launch(report task, diagnostic)
//!                                          └─ fails? log only
//!          completion hook panics?  ─► CallbackFailed   (caught, logged)
//!          registry.remove(id) ─► outcome ─► TaskHandle::wait()
//!
//! Shutdown path:
//!   Bus.publish(ShutdownRequested)
//!   runtime_token.cancel()           → propagates to every child token
//!   wait (≤ grace) for the registry to drain
//!     ├─ drained   → AllStoppedWithin
//!     └─ timed out → GraceExceeded (stuck names), RuntimeError::GraceExceeded
//! ```
//!
//! Diagnostic tasks are not tied to the runtime token: reports raised during
//! shutdown still get delivered within the grace period.
//!
//! ## Example
//! ```rust
//! use snapvisor::{Config, Supervisor, TaskError, TaskOutcome, Work};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let sup = Supervisor::builder(Config::default()).build();
//!
//!     let ok = sup.launch(Work::sync(|| Ok(())));
//!     let bad = sup.launch_named("refresh", Work::future(async { Err(TaskError::fail("offline")) }));
//!
//!     assert_eq!(ok.wait().await, TaskOutcome::Completed);
//!     assert!(matches!(bad.wait().await, TaskOutcome::Failed(_)));
//!
//!     sup.shutdown().await.unwrap();
//! }
//! ```

use std::borrow::Cow;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    diagnostics::{DiagnosticSink, FailureEvent, Origin},
    error::RuntimeError,
    events::{Bus, Event, EventKind},
    tasks::{TaskHandle, TaskOutcome, Work, panic_message},
};

use super::{builder::SupervisorBuilder, registry::Registry, runner, shutdown};

/// Upper bound on waiting for subscribers to drain after shutdown.
const SUBSCRIBER_DRAIN: Duration = Duration::from_secs(5);

/// Launches work, observes its outcome, and routes failures to the diagnostic sink.
pub struct Supervisor {
    cfg: Config,
    bus: Bus,
    sink: Arc<dyn DiagnosticSink>,
    registry: Registry,
    runtime_token: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl Supervisor {
    /// Returns a builder for a new supervisor.
    pub fn builder(cfg: Config) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        sink: Arc<dyn DiagnosticSink>,
        registry: Registry,
        runtime_token: CancellationToken,
        listener: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            cfg,
            bus,
            sink,
            registry,
            runtime_token,
            listener: Mutex::new(listener),
            next_id: AtomicU64::new(1),
        }
    }

    /// Schedules `work` and returns immediately.
    ///
    /// The work's derived name is used in logs and failure reports.
    pub fn launch(self: &Arc<Self>, work: Work) -> TaskHandle {
        self.launch_inner(work, false)
    }

    /// Schedules `work` under an explicit display name.
    pub fn launch_named(
        self: &Arc<Self>,
        name: impl Into<Cow<'static, str>>,
        work: Work,
    ) -> TaskHandle {
        self.launch_inner(work.named(name), false)
    }

    /// Delivers an externally produced failure (command, event, interaction)
    /// to the sink as a supervised diagnostic task.
    pub fn report(self: &Arc<Self>, event: FailureEvent) -> TaskHandle {
        self.dispatch(event)
    }

    /// Sorted names of tasks that have not finished yet.
    pub fn live(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Event bus; subscribe to observe runtime events.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Cancels every live task and waits up to [`Config::grace`] for them to stop.
    ///
    /// Returns [`RuntimeError::GraceExceeded`] with the names of the tasks
    /// still running when the grace period ran out.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        tracing::info!(grace = ?self.cfg.grace, live = self.registry.len(), "shutdown requested");
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.runtime_token.cancel();

        let drained = tokio::time::timeout(self.cfg.grace, self.registry.wait_empty()).await;
        let res = match drained {
            Ok(()) => {
                tracing::info!("all tasks stopped within grace");
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                let stuck = self.registry.names();
                self.registry.cancel_all();
                tracing::warn!(?stuck, grace = ?self.cfg.grace, "grace exceeded");
                self.bus
                    .publish(Event::new(EventKind::GraceExceeded).with_reason(stuck.join(", ")));
                Err(RuntimeError::GraceExceeded {
                    grace: self.cfg.grace,
                    stuck,
                })
            }
        };

        self.join_listener().await;
        res
    }

    /// Waits for a termination signal, then runs [`Supervisor::shutdown`].
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        if let Err(err) = shutdown::wait_for_shutdown_signal().await {
            tracing::error!(error = %err, "cannot listen for termination signals; shutting down");
        }
        self.shutdown().await
    }

    fn launch_inner(self: &Arc<Self>, work: Work, diagnostic: bool) -> TaskHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = if diagnostic {
            CancellationToken::new()
        } else {
            self.runtime_token.child_token()
        };
        let cooperative = work.is_cooperative();
        let name: Arc<str> = Arc::from(work.name());

        self.registry.insert(id, Arc::clone(&name), token.clone());
        let inner = tokio::spawn(work.start(token.clone()));

        tracing::debug!(task = %name, id, diagnostic, "task launched");
        self.bus.publish(
            Event::new(EventKind::TaskLaunched)
                .with_task(Arc::clone(&name))
                .with_task_id(id),
        );

        let (tx, rx) = oneshot::channel();
        let sup = Arc::clone(self);
        let watch_token = token.clone();
        let watch_name = Arc::clone(&name);

        tokio::spawn(async move {
            let outcome = runner::await_outcome(inner, &watch_token, cooperative).await;

            let hook = std::panic::catch_unwind(AssertUnwindSafe(|| {
                sup.on_complete(id, &watch_name, &outcome, diagnostic)
            }));
            if let Err(panic) = hook {
                let info = panic_message(panic.as_ref());
                tracing::error!(task = %watch_name, id, %info, "completion hook panicked");
                sup.bus.publish(
                    Event::new(EventKind::CallbackFailed)
                        .with_task(Arc::clone(&watch_name))
                        .with_task_id(id)
                        .with_reason(info),
                );
            }

            sup.registry.remove(id);
            let _ = tx.send(outcome);
        });

        TaskHandle::new(id, name, token, rx)
    }

    fn on_complete(self: &Arc<Self>, id: u64, name: &Arc<str>, outcome: &TaskOutcome, diagnostic: bool) {
        match outcome {
            TaskOutcome::Completed => {
                tracing::debug!(task = %name, id, "task completed");
                self.bus.publish(
                    Event::new(EventKind::TaskCompleted)
                        .with_task(Arc::clone(name))
                        .with_task_id(id),
                );
            }
            TaskOutcome::Cancelled => {
                tracing::info!(task = %name, id, "task cancelled");
                self.bus.publish(
                    Event::new(EventKind::TaskCancelled)
                        .with_task(Arc::clone(name))
                        .with_task_id(id),
                );
            }
            TaskOutcome::Failed(err) => {
                tracing::error!(
                    task = %name,
                    id,
                    label = err.as_label(),
                    error = %err.as_message(),
                    "task failed"
                );
                self.bus.publish(
                    Event::new(EventKind::TaskFailed)
                        .with_task(Arc::clone(name))
                        .with_task_id(id)
                        .with_reason(err.as_message()),
                );

                if diagnostic {
                    tracing::error!(
                        task = %name,
                        sink = self.sink.name(),
                        "diagnostic delivery failed; not reported again"
                    );
                    return;
                }
                self.dispatch(FailureEvent::new(Origin::Task(name.to_string()), err.clone()));
            }
        }
    }

    fn dispatch(self: &Arc<Self>, event: FailureEvent) -> TaskHandle {
        let origin = event.origin.name().to_string();
        self.bus.publish(
            Event::new(EventKind::DiagnosticDispatched)
                .with_task(origin.as_str())
                .with_reason(event.error.as_message()),
        );

        let sink = Arc::clone(&self.sink);
        let work = Work::future(async move {
            sink.report(event).await;
            Ok(())
        })
        .named(format!("report:{origin}"));

        self.launch_inner(work, true)
    }

    async fn join_listener(&self) {
        let handle = self
            .listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            if tokio::time::timeout(SUBSCRIBER_DRAIN, handle).await.is_err() {
                tracing::warn!(wait = ?SUBSCRIBER_DRAIN, "subscribers did not drain in time");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::broadcast;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<FailureEvent>>);

    #[async_trait]
    impl DiagnosticSink for RecordingSink {
        async fn report(&self, event: FailureEvent) {
            self.0.lock().unwrap().push(event);
        }
        fn name(&self) -> &'static str {
            "recording"
        }
    }

    #[derive(Default)]
    struct PanickingSink(AtomicUsize);

    #[async_trait]
    impl DiagnosticSink for PanickingSink {
        async fn report(&self, _event: FailureEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
            panic!("sink exploded");
        }
    }

    /// Fails to deliver, then fails again when asked for its name.
    struct BrokenSink;

    #[async_trait]
    impl DiagnosticSink for BrokenSink {
        async fn report(&self, _event: FailureEvent) {
            panic!("transport down");
        }
        fn name(&self) -> &'static str {
            panic!("no name either");
        }
    }

    fn save_stats() -> Result<(), TaskError> {
        Err(TaskError::fail("stats locked"))
    }

    fn supervisor(sink: Arc<dyn DiagnosticSink>) -> Arc<Supervisor> {
        let cfg = Config {
            grace: Duration::from_secs(5),
            ..Config::default()
        };
        Supervisor::builder(cfg).with_sink(sink).build()
    }

    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    fn count(events: &[Event], kind: EventKind, id: u64) -> usize {
        events
            .iter()
            .filter(|e| e.kind == kind && e.task_id == Some(id))
            .count()
    }

    #[tokio::test]
    async fn sync_and_async_work_complete_exactly_once() {
        let sink = Arc::new(RecordingSink::default());
        let sup = supervisor(sink.clone());
        let mut rx = sup.bus().subscribe();

        let a = sup.launch(Work::sync(|| Ok(())));
        let b = sup.launch(Work::future(async {
            tokio::task::yield_now().await;
            Ok(())
        }));
        let (a_id, b_id) = (a.id(), b.id());

        assert_eq!(a.wait().await, TaskOutcome::Completed);
        assert_eq!(b.wait().await, TaskOutcome::Completed);
        sup.shutdown().await.unwrap();

        let events = drain(&mut rx);
        for id in [a_id, b_id] {
            assert_eq!(count(&events, EventKind::TaskLaunched, id), 1);
            assert_eq!(count(&events, EventKind::TaskCompleted, id), 1);
            assert_eq!(count(&events, EventKind::TaskFailed, id), 0);
        }
        assert!(sink.0.lock().unwrap().is_empty());
        assert!(sup.live().is_empty());
    }

    #[tokio::test]
    async fn cancelled_task_is_never_reported() {
        let sink = Arc::new(RecordingSink::default());
        let sup = supervisor(sink.clone());

        let handle = sup.launch_named(
            "sleeper",
            Work::future(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }),
        );
        assert_eq!(sup.live(), vec!["sleeper".to_string()]);

        handle.cancel();
        assert_eq!(handle.wait().await, TaskOutcome::Cancelled);
        sup.shutdown().await.unwrap();

        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failure_is_reported_once_with_task_name() {
        let sink = Arc::new(RecordingSink::default());
        let sup = supervisor(sink.clone());
        let mut rx = sup.bus().subscribe();

        let handle = sup.launch_named("save_db", Work::sync(|| Err(TaskError::fail("disk full"))));
        let id = handle.id();
        assert_eq!(
            handle.wait().await,
            TaskOutcome::Failed(TaskError::fail("disk full"))
        );
        sup.shutdown().await.unwrap();

        let reports = sink.0.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].origin, Origin::Task("save_db".into()));
        assert_eq!(reports[0].error, TaskError::fail("disk full"));

        let events = drain(&mut rx);
        assert_eq!(count(&events, EventKind::TaskFailed, id), 1);
        assert_eq!(
            events
                .iter()
                .filter(|e| e.kind == EventKind::DiagnosticDispatched)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn panic_is_reported_as_failure() {
        let sink = Arc::new(RecordingSink::default());
        let sup = supervisor(sink.clone());

        let handle = sup.launch_named(
            "explode",
            Work::future(async {
                if true {
                    panic!("kaboom");
                }
                Ok(())
            }),
        );
        assert!(matches!(
            handle.wait().await,
            TaskOutcome::Failed(TaskError::Panicked { .. })
        ));
        sup.shutdown().await.unwrap();

        let reports = sink.0.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(
            reports[0].error,
            TaskError::Panicked {
                info: "kaboom".into()
            }
        );
    }

    #[tokio::test]
    async fn failing_sink_is_not_reported_again() {
        let sink = Arc::new(PanickingSink::default());
        let sup = supervisor(sink.clone());
        let mut rx = sup.bus().subscribe();

        let handle = sup.launch(Work::sync(|| Err(TaskError::fail("first"))));
        handle.wait().await;
        sup.shutdown().await.unwrap();

        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
        let events = drain(&mut rx);
        assert_eq!(
            events
                .iter()
                .filter(|e| e.kind == EventKind::DiagnosticDispatched)
                .count(),
            1
        );
        assert_eq!(
            events.iter().filter(|e| e.kind == EventKind::TaskFailed).count(),
            2
        );
    }

    #[tokio::test]
    async fn unnamed_work_is_reported_under_its_derived_name() {
        let sink = Arc::new(RecordingSink::default());
        let sup = supervisor(sink.clone());

        let handle = sup.launch(Work::sync(save_stats));
        assert!(handle.name().ends_with("save_stats"));
        handle.wait().await;
        sup.shutdown().await.unwrap();

        let reports = sink.0.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].origin.name().ends_with("save_stats"));
        assert_eq!(reports[0].error, TaskError::fail("stats locked"));
    }

    #[tokio::test]
    async fn panicking_completion_hook_is_contained() {
        let sup = supervisor(Arc::new(BrokenSink));
        let mut rx = sup.bus().subscribe();

        let handle = sup.report(FailureEvent::new(
            Origin::Command("ping".into()),
            TaskError::fail("timeout"),
        ));
        let id = handle.id();
        assert!(matches!(
            handle.wait().await,
            TaskOutcome::Failed(TaskError::Panicked { .. })
        ));
        assert!(sup.live().is_empty());
        sup.shutdown().await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(count(&events, EventKind::TaskFailed, id), 1);
        let hook = events
            .iter()
            .find(|e| e.kind == EventKind::CallbackFailed && e.task_id == Some(id))
            .expect("callback failure published");
        assert_eq!(hook.reason.as_deref(), Some("no name either"));
    }

    #[tokio::test]
    async fn external_failures_reach_the_sink() {
        let sink = Arc::new(RecordingSink::default());
        let sup = supervisor(sink.clone());

        let event = FailureEvent::new(Origin::Command("ping".into()), TaskError::fail("timeout"))
            .with_context("guild", 42);
        assert_eq!(sup.report(event).wait().await, TaskOutcome::Completed);

        let reports = sink.0.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].origin.name(), "ping");
    }

    #[tokio::test]
    async fn shutdown_cancels_cooperative_work() {
        let sup = supervisor(Arc::new(RecordingSink::default()));
        let handle = sup.launch(Work::task(|ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Err(TaskError::Canceled)
        }));

        sup.shutdown().await.unwrap();
        assert_eq!(handle.wait().await, TaskOutcome::Cancelled);
    }

    #[tokio::test]
    async fn shutdown_names_tasks_that_ignore_cancellation() {
        let cfg = Config {
            grace: Duration::from_millis(50),
            ..Config::default()
        };
        let sup = Supervisor::builder(cfg).build();
        let _handle = sup.launch_named(
            "stubborn",
            Work::task(|_ctx: CancellationToken| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }),
        );

        match sup.shutdown().await {
            Err(RuntimeError::GraceExceeded { stuck, .. }) => {
                assert_eq!(stuck, vec!["stubborn".to_string()]);
            }
            other => panic!("expected grace exceeded, got {other:?}"),
        }
    }
}
