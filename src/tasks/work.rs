//! # Units of work accepted by the supervisor.
//!
//! [`Work`] is a closed set of two shapes behind one capability (being driven
//! to completion on the runtime):
//!
//! - **sync**: a plain `FnOnce() -> Result<(), TaskError>`, wrapped in a future
//!   transparently so the caller never needs to care;
//! - **async**: a future, either ready-made ([`Work::future`]) or produced from
//!   the task's [`CancellationToken`] ([`Work::task`]).
//!
//! Work built with [`Work::task`] is *cooperative*: on cancellation it is not
//! aborted, it is expected to observe the token and return
//! `Err(TaskError::Canceled)` (or finish early). Every other shape is aborted
//! at its next suspension point.
//!
//! ## Example
//! ```rust
//! use snapvisor::{TaskError, Work};
//!
//! let sync = Work::sync(|| Ok(()));
//! let fut = Work::future(async { Err(TaskError::fail("nope")) }).named("always-fails");
//!
//! assert_eq!(fut.name(), "always-fails");
//! assert!(sync.name().contains("closure"));
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Boxed future returned when work is started.
pub type BoxWorkFuture = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send + 'static>>;

type SyncFn = Box<dyn FnOnce() -> Result<(), TaskError> + Send + 'static>;
type AsyncFn = Box<dyn FnOnce(CancellationToken) -> BoxWorkFuture + Send + 'static>;

enum Shape {
    Sync(SyncFn),
    Async { start: AsyncFn, cooperative: bool },
}

/// A unit of work the supervisor can launch.
pub struct Work {
    name: Cow<'static, str>,
    shape: Shape,
}

impl Work {
    /// Wraps a synchronous callable.
    ///
    /// The default name is the callable's type name.
    pub fn sync<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static,
    {
        Self {
            name: Cow::Borrowed(std::any::type_name::<F>()),
            shape: Shape::Sync(Box::new(f)),
        }
    }

    /// Wraps a future. The default name is the future's type name.
    pub fn future<Fut>(fut: Fut) -> Self
    where
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self {
            name: Cow::Borrowed(std::any::type_name::<Fut>()),
            shape: Shape::Async {
                start: Box::new(move |_ctx| Box::pin(fut)),
                cooperative: false,
            },
        }
    }

    /// Wraps a cancellation-aware async closure. The default name is the closure's type name.
    pub fn task<F, Fut>(f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self {
            name: Cow::Borrowed(std::any::type_name::<F>()),
            shape: Shape::Async {
                start: Box::new(move |ctx| Box::pin(f(ctx))),
                cooperative: true,
            },
        }
    }

    /// Replaces the derived name.
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Name used in logs, events and failure reports.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when the work observes its cancellation token itself.
    pub fn is_cooperative(&self) -> bool {
        matches!(self.shape, Shape::Async { cooperative: true, .. })
    }

    /// Turns the work into a future ready to be spawned.
    pub(crate) fn start(self, ctx: CancellationToken) -> BoxWorkFuture {
        match self.shape {
            Shape::Sync(f) => Box::pin(async move { f() }),
            Shape::Async { start, .. } => start(ctx),
        }
    }
}

impl std::fmt::Debug for Work {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shape = match self.shape {
            Shape::Sync(_) => "sync",
            Shape::Async {
                cooperative: true, ..
            } => "task",
            Shape::Async { .. } => "future",
        };
        f.debug_struct("Work")
            .field("name", &self.name)
            .field("shape", &shape)
            .finish()
    }
}
