//! # Snapshot persistence.
//!
//! - [`SnapshotEngine`]: persist / load named states with a rolling backup chain
//! - [`StateProvider`] / [`MemoryState`]: where the values live in memory
//! - [`PersistLock`]: the single writer gate, explicitly owned and shareable
//! - [`GenerationSet`]: file layout of one state
//! - [`ParseOutcome`]: classification of a file's contents
//! - [`autosave`]: periodic persistence as supervised work

mod autosave;
mod engine;
mod layout;
mod lock;
mod parse;
mod provider;

pub use autosave::autosave;
pub use engine::{SnapshotEngine, SnapshotReport};
pub use layout::{GENERATIONS, GenerationSet};
pub use lock::{PersistGuard, PersistLock};
pub use parse::ParseOutcome;
pub use provider::{MemoryState, StateProvider};
