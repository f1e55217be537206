use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::Work;

use super::SnapshotEngine;

/// Work that persists every state each `every`, plus once more when cancelled.
///
/// Meant to be launched on a [`Supervisor`](crate::Supervisor): a failed cycle
/// ends the task and is reported like any other failure.
///
/// ```rust,no_run
/// use std::{sync::Arc, time::Duration};
/// use snapvisor::{Config, MemoryState, SnapshotEngine, Supervisor, autosave};
///
/// # #[tokio::main] async fn main() {
/// let cfg = Config::default();
/// let sup = Supervisor::builder(cfg.clone()).build();
/// let engine = SnapshotEngine::new(cfg, Arc::new(MemoryState::with_names(["db", "stats", "message_queue"])))
///     .with_bus(sup.bus().clone());
///
/// sup.launch(autosave(Arc::new(engine), Duration::from_secs(300)));
/// sup.run_until_signal().await.ok();
/// # }
/// ```
pub fn autosave(engine: Arc<SnapshotEngine>, every: Duration) -> Work {
    let every = every.max(Duration::from_millis(1));
    Work::task(move |ctx: CancellationToken| run(engine, every, ctx)).named("autosave")
}

async fn run(
    engine: Arc<SnapshotEngine>,
    every: Duration,
    ctx: CancellationToken,
) -> Result<(), TaskError> {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ctx.cancelled() => {
                tracing::info!("autosave stopping; writing final snapshots");
                engine.persist_all().await?;
                return Err(TaskError::Canceled);
            }
            _ = ticker.tick() => {
                engine.persist_all().await?;
            }
        }
    }
}
