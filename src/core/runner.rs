//! # Drive one launched task to its terminal outcome.
//!
//! The work runs in its own tokio task; the watcher awaits its `JoinHandle`
//! and classifies the result:
//!
//! ```text
//! Ok(Ok(()))                  → Completed
//! Ok(Err(TaskError::Canceled)) → Cancelled
//! Ok(Err(e))                  → Failed(e)
//! Err(join) if panic          → Failed(Panicked)
//! Err(join) if cancelled      → Cancelled       (aborted by us or by the runtime)
//! ```
//!
//! ## Cancellation semantics
//! - Non-cooperative work is aborted as soon as its token is cancelled.
//! - Cooperative work ([`Work::task`](crate::Work::task)) owns the token and
//!   decides itself when to stop; the watcher just keeps waiting.
//! - A result that is already available wins over a concurrent cancellation.

use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::{TaskOutcome, panic_message};

/// Awaits `join` and returns the task's outcome.
pub(crate) async fn await_outcome(
    mut join: JoinHandle<Result<(), TaskError>>,
    token: &CancellationToken,
    cooperative: bool,
) -> TaskOutcome {
    let joined = if cooperative {
        join.await
    } else {
        tokio::select! {
            biased;
            res = &mut join => res,
            _ = token.cancelled() => {
                join.abort();
                join.await
            }
        }
    };
    classify(joined)
}

fn classify(joined: Result<Result<(), TaskError>, JoinError>) -> TaskOutcome {
    match joined {
        Ok(Ok(())) => TaskOutcome::Completed,
        Ok(Err(TaskError::Canceled)) => TaskOutcome::Cancelled,
        Ok(Err(err)) => TaskOutcome::Failed(err),
        Err(join) if join.is_panic() => {
            let info = panic_message(join.into_panic().as_ref());
            TaskOutcome::Failed(TaskError::Panicked { info })
        }
        Err(_) => TaskOutcome::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn classifies_results() {
        let token = CancellationToken::new();

        let ok = tokio::spawn(async { Ok(()) });
        assert_eq!(await_outcome(ok, &token, false).await, TaskOutcome::Completed);

        let err = tokio::spawn(async { Err(TaskError::fail("x")) });
        assert_eq!(
            await_outcome(err, &token, false).await,
            TaskOutcome::Failed(TaskError::fail("x"))
        );

        let canceled = tokio::spawn(async { Err(TaskError::Canceled) });
        assert_eq!(
            await_outcome(canceled, &token, false).await,
            TaskOutcome::Cancelled
        );
    }

    #[tokio::test]
    async fn panic_becomes_failure() {
        let token = CancellationToken::new();
        let join = tokio::spawn(async {
            if true {
                panic!("kaboom");
            }
            Ok(())
        });
        assert_eq!(
            await_outcome(join, &token, false).await,
            TaskOutcome::Failed(TaskError::Panicked {
                info: "kaboom".into()
            })
        );
    }

    #[tokio::test]
    async fn cancellation_aborts_non_cooperative_work() {
        let token = CancellationToken::new();
        let join = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        });
        token.cancel();
        assert_eq!(await_outcome(join, &token, false).await, TaskOutcome::Cancelled);
    }
}
