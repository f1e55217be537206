//! Runtime core: launching, observing and shutting down supervised work.
//!
//! The only public items are [`Supervisor`] and its [`SupervisorBuilder`].
//!
//! Internal modules:
//! - [`runner`]: drives one task to its terminal outcome;
//! - [`supervisor`]: launch, completion hook, failure dispatch, shutdown;
//! - [`registry`]: live tasks by id, drained on shutdown;
//! - [`shutdown`]: cross-platform termination signals.

mod builder;
mod registry;
mod runner;
mod shutdown;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use supervisor::Supervisor;
