//! # snapvisor
//!
//! **Snapvisor** runs fire-and-forget background work on tokio without losing
//! its failures, and keeps a small set of named JSON states on disk behind a
//! rolling chain of backups.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   application code
//!        │ launch(Work)                        persist(name) / load(name)
//!        ▼                                              │
//! ┌──────────────────────────────────────┐   ┌──────────▼───────────────────┐
//! │ Supervisor                           │   │ SnapshotEngine               │
//! │ - Registry (live tasks by id)        │   │ - PersistLock (one writer)   │
//! │ - watcher per task (exactly-once     │   │ - StateProvider (values)     │
//! │   completion hook)                   │   │ - GenerationSet per name     │
//! │ - DiagnosticSink (failure reports)   │   │   live, _2, _3, _4, _temp    │
//! └──────┬───────────────────────┬───────┘   └──────────┬───────────────────┘
//!        │ Failed?               │ publish(Event)       │ publish(Event)
//!        ▼                       ▼                      ▼
//!   launch(report task)   ┌──────────────────────────────────────┐
//!   └─► sink.report()     │ Bus (broadcast channel)              │
//!                         └──────────────────┬───────────────────┘
//!                                            ▼
//!                                subscriber listener ─► SubscriberSet
//!                                                   ┌──────┼──────┐
//!                                                   ▼      ▼      ▼
//!                                               LogWriter  ...  custom
//! ```
//!
//! ### Task lifecycle
//! ```text
//! launch(work) ──► TaskLaunched
//!   ├─ Ok         ──► TaskCompleted
//!   ├─ cancelled  ──► TaskCancelled                  (never reported)
//!   └─ Err/panic  ──► TaskFailed ──► DiagnosticDispatched
//!                                      └─► report task ─► DiagnosticSink
//!                                            └─ fails ─► logged only
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Supervision**   | Launch sync or async work; observe every outcome once.        | [`Supervisor`], [`Work`], [`TaskHandle`]    |
//! | **Diagnostics**   | Route unhandled failures to a pluggable sink.                 | [`DiagnosticSink`], [`FailureEvent`]        |
//! | **Persistence**   | Crash-safe JSON snapshots with four generations.              | [`SnapshotEngine`], [`StateProvider`]       |
//! | **Subscriber API**| Hook into task and persistence events.                        | [`Subscribe`], [`LogWriter`]                |
//! | **Policies**      | Bound the wait for the persistence lock.                      | [`LockPolicy`], [`JitterPolicy`]            |
//! | **Errors**        | Typed errors with stable labels.                              | [`TaskError`], [`PersistError`]             |
//! | **Configuration** | Centralize runtime settings, with env overrides.              | [`Config`]                                  |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use snapvisor::{Config, MemoryState, SnapshotEngine, Supervisor, TaskError, Work};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dir = std::env::temp_dir().join("snapvisor-doc");
//!     let cfg = Config { data_dir: dir, ..Config::default() };
//!
//!     let sup = Supervisor::builder(cfg.clone()).build();
//!     let state = Arc::new(MemoryState::with_names(["db", "stats", "message_queue"]));
//!     let engine = Arc::new(SnapshotEngine::new(cfg, state.clone()).with_bus(sup.bus().clone()));
//!
//!     engine.load_all()?;
//!     state.update("db", |db| db["greeted"] = json!(true))?;
//!
//!     let saver = Arc::clone(&engine);
//!     let handle = sup.launch_named("save_db", Work::future(async move {
//!         saver.persist("db").await.map_err(TaskError::from)?;
//!         Ok(())
//!     }));
//!     handle.wait().await;
//!
//!     sup.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod diagnostics;
mod error;
mod events;
mod persist;
mod policies;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use config::{Config, DEFAULT_STATE_NAMES};
pub use core::{Supervisor, SupervisorBuilder};
pub use diagnostics::{
    ChannelSink, ContextValue, DEFAULT_SEGMENT_LIMIT, DESTINATION_VARS, DiagnosticSink,
    FailureEvent, Origin, TracingSink, Transport, TransportError, split_segments,
};
pub use error::{PersistError, ProviderError, RuntimeError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use persist::{
    GENERATIONS, GenerationSet, MemoryState, ParseOutcome, PersistGuard, PersistLock,
    SnapshotEngine, SnapshotReport, StateProvider, autosave,
};
pub use policies::{JitterPolicy, LockPolicy};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use tasks::{BoxWorkFuture, TaskHandle, TaskOutcome, Work};
