//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and the built-in [`LogWriter`].
//!
//! ```text
//! Event flow:
//!   watcher / engine ── publish(Event) ──► Bus ──► subscriber listener
//!                                                       │
//!                                                  SubscriberSet::emit
//!                                                 ┌─────┴─────┬────────┐
//!                                                 ▼           ▼        ▼
//!                                             LogWriter    Metrics   Custom
//! ```

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
