//! Wait and retry policies.
//!
//! ## Contents
//! - [`LockPolicy`]   how long a writer polls for the persistence lock
//! - [`JitterPolicy`] randomization of the poll interval
//!
//! ## Defaults
//! - `LockPolicy::default()` → 5 polls, 60s apart, no jitter.
//! - `JitterPolicy::None` by default; consider `Equal` when many writers share one engine.

mod jitter;
mod lock;

pub use jitter::JitterPolicy;
pub use lock::LockPolicy;
