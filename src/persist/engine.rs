//! # SnapshotEngine: crash-safe JSON snapshots with a rolling backup chain.
//!
//! ```text
//! persist(name)
//!   ├─► name supported?            no ─► InvalidName           (no I/O)
//!   ├─► lock.acquire(LockPolicy)   held past budget ─► LockTimeout (no I/O)
//!   └─► spawn_blocking (guard moved in):
//!          provider.snapshot(name)
//!          rotate backups          (once per call: seed from live, or 3→4, 2→3, live→2)
//!          write {name}_temp.json  (pretty JSON, synced)
//!          copy temp ─► {name}_swap.json, rename ─► {name}.json
//!          first write ever?       seed _2, _3, _4 from the new live file
//!        transient fault? ─► retry (offload_retries times), else propagate
//!
//! load(name)
//!   read {name}.json
//!     ├─ missing / empty  ─► {} (warn, LoadRecovered)
//!     ├─ permission       ─► Access
//!     ├─ malformed        ─► CorruptState
//!     └─ value ─► provider.reconstruct ─► provider.install
//! ```
//!
//! The lock guard travels into the blocking worker, so the critical section
//! stays closed until the write really ends, even if the calling future is
//! dropped mid-way.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::Config;
use crate::error::PersistError;
use crate::events::{Bus, Event, EventKind};
use crate::tasks::panic_message;

use super::layout::{GENERATIONS, GenerationSet, Rotation};
use super::lock::{PersistGuard, PersistLock};
use super::parse::ParseOutcome;
use super::provider::StateProvider;

/// Result of one successful snapshot cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotReport {
    /// State name.
    pub name: String,
    /// Bytes written to the live file.
    pub bytes: u64,
    /// True when this cycle filled the backup chain from a single live file.
    pub seeded: bool,
}

/// Persists and loads named states under one shared [`PersistLock`].
pub struct SnapshotEngine {
    cfg: Config,
    provider: Arc<dyn StateProvider>,
    lock: PersistLock,
    bus: Option<Bus>,
}

impl SnapshotEngine {
    /// Creates an engine with its own lock.
    pub fn new(cfg: Config, provider: Arc<dyn StateProvider>) -> Self {
        Self {
            cfg,
            provider,
            lock: PersistLock::new(),
            bus: None,
        }
    }

    /// Shares `lock` with other engines.
    pub fn with_lock(mut self, lock: PersistLock) -> Self {
        self.lock = lock;
        self
    }

    /// Publishes persistence events on `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// The lock serializing this engine's writes.
    pub fn lock(&self) -> &PersistLock {
        &self.lock
    }

    /// Supported state names, in persist order.
    pub fn names(&self) -> &[String] {
        &self.cfg.names
    }

    /// On-disk paths for `name`.
    pub fn generations(&self, name: &str) -> Result<GenerationSet, PersistError> {
        if !self.cfg.supports(name) {
            return Err(PersistError::InvalidName {
                name: name.to_string(),
                expected: self.cfg.names.clone(),
            });
        }
        Ok(GenerationSet::new(&self.cfg.data_dir, name))
    }

    /// Writes a snapshot of `name` and rotates its backups.
    pub async fn persist(&self, name: &str) -> Result<SnapshotReport, PersistError> {
        let set = self.generations(name)?;

        let guard = Arc::new(self.acquire_lock(name).await?);
        self.publish(Event::new(EventKind::PersistStarted).with_state(name));

        let cycle = Arc::new(Cycle::default());
        let mut attempt = 0u32;
        let res = loop {
            attempt += 1;
            match self
                .offload_write(name, &set, Arc::clone(&cycle), Arc::clone(&guard))
                .await
            {
                Err(err) if err.is_transient() && attempt <= self.cfg.offload_retries => {
                    tracing::warn!(state = name, attempt, error = %err, "snapshot write failed; retrying");
                    self.publish(
                        Event::new(EventKind::OffloadRetried)
                            .with_state(name)
                            .with_attempt(attempt)
                            .with_reason(err.to_string()),
                    );
                }
                other => break other,
            }
        };
        drop(guard);

        match &res {
            Ok(report) => {
                tracing::debug!(state = name, bytes = report.bytes, seeded = report.seeded, "snapshot written");
                self.publish(
                    Event::new(EventKind::PersistCompleted)
                        .with_state(name)
                        .with_bytes(report.bytes),
                );
            }
            Err(err) => {
                tracing::error!(state = name, label = err.as_label(), error = %err, "snapshot failed");
                self.publish(
                    Event::new(EventKind::PersistFailed)
                        .with_state(name)
                        .with_reason(err.to_string()),
                );
            }
        }
        res
    }

    /// Persists every supported name in order, stopping at the first error.
    pub async fn persist_all(&self) -> Result<Vec<SnapshotReport>, PersistError> {
        let mut reports = Vec::with_capacity(self.cfg.names.len());
        for name in &self.cfg.names {
            reports.push(self.persist(name).await?);
        }
        Ok(reports)
    }

    /// Loads `name` from its live file and installs it in the provider.
    ///
    /// A missing or blank file yields (and installs) an empty mapping.
    /// Malformed content and permission problems are errors and leave the
    /// provider untouched.
    pub fn load(&self, name: &str) -> Result<Value, PersistError> {
        let set = self.generations(name)?;

        let outcome = match read_bytes(set.live())? {
            Some(raw) => ParseOutcome::parse(&raw),
            None => {
                tracing::warn!(state = name, path = %set.live().display(), "state file missing; starting empty");
                return self.recover(name, "missing");
            }
        };

        match outcome {
            ParseOutcome::Empty => {
                tracing::warn!(state = name, path = %set.live().display(), "state file empty; starting empty");
                self.recover(name, "empty")
            }
            ParseOutcome::Value(raw) => self.install(name, raw),
            ParseOutcome::Malformed(source) => Err(PersistError::CorruptState {
                path: set.live().to_path_buf(),
                source,
            }),
        }
    }

    /// Loads every supported name, stopping at the first error.
    pub fn load_all(&self) -> Result<(), PersistError> {
        for name in &self.cfg.names {
            self.load(name)?;
        }
        Ok(())
    }

    /// Reads and classifies generation `k` (1 = live, 4 = oldest) without installing it.
    pub fn read_generation(&self, name: &str, k: usize) -> Result<ParseOutcome, PersistError> {
        let set = self.generations(name)?;
        let path = generation_path(&set, k)?;
        let raw = fs::read(path).map_err(|e| read_error(path, e))?;
        Ok(ParseOutcome::parse(&raw))
    }

    /// Replaces the live file with generation `k` and loads it.
    ///
    /// Takes the persistence lock like [`persist`](Self::persist) and fails
    /// with [`PersistError::LockTimeout`] when it stays held. A malformed
    /// generation is refused before anything is overwritten.
    pub async fn restore_generation(&self, name: &str, k: usize) -> Result<Value, PersistError> {
        let set = self.generations(name)?;
        let from = generation_path(&set, k)?.to_path_buf();
        if k == 1 {
            return self.load(name);
        }

        let guard = self.acquire_lock(name).await?;
        let owned = name.to_string();
        tokio::task::spawn_blocking(move || {
            let _guard: PersistGuard = guard;
            let raw = fs::read(&from).map_err(|e| read_error(&from, e))?;
            if let ParseOutcome::Malformed(source) = ParseOutcome::parse(&raw) {
                return Err(PersistError::CorruptState { path: from, source });
            }
            set.replace_live(&from)?;
            tracing::info!(state = %owned, from = %from.display(), "restored backup generation");
            Ok(())
        })
        .await
        .map_err(|join| offload_error(name, join))??;

        self.load(name)
    }

    /// Polls the lock under the configured policy, publishing contention.
    async fn acquire_lock(&self, name: &str) -> Result<PersistGuard, PersistError> {
        let acquired = self
            .lock
            .acquire(&self.cfg.lock, |attempt, delay| {
                tracing::warn!(state = name, attempt, ?delay, "persistence lock held; waiting");
                self.publish(
                    Event::new(EventKind::LockContended)
                        .with_state(name)
                        .with_attempt(attempt)
                        .with_delay(delay),
                );
            })
            .await;
        acquired.inspect_err(|err| {
            tracing::error!(state = name, error = %err, "giving up on persistence lock");
            self.publish(
                Event::new(EventKind::LockTimedOut)
                    .with_state(name)
                    .with_attempt(self.cfg.lock.attempts),
            );
        })
    }

    async fn offload_write(
        &self,
        name: &str,
        set: &GenerationSet,
        cycle: Arc<Cycle>,
        guard: Arc<PersistGuard>,
    ) -> Result<SnapshotReport, PersistError> {
        let provider = Arc::clone(&self.provider);
        let set = set.clone();
        let owned = name.to_string();

        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            write_snapshot(provider.as_ref(), &owned, &set, &cycle)
        })
        .await
        .map_err(|join| offload_error(name, join))?
    }

    fn recover(&self, name: &str, reason: &'static str) -> Result<Value, PersistError> {
        self.publish(
            Event::new(EventKind::LoadRecovered)
                .with_state(name)
                .with_reason(reason),
        );
        self.install(name, Value::Object(Map::new()))
    }

    fn install(&self, name: &str, raw: Value) -> Result<Value, PersistError> {
        let value = self.provider.reconstruct(name, raw)?;
        self.provider.install(name, value.clone())?;
        Ok(value)
    }

    fn publish(&self, ev: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(ev);
        }
    }
}

impl std::fmt::Debug for SnapshotEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotEngine")
            .field("data_dir", &self.cfg.data_dir)
            .field("names", &self.cfg.names)
            .field("lock", &self.lock)
            .finish_non_exhaustive()
    }
}

/// Rotation outcome shared by the attempts of one persist call, so a retried
/// write never shifts the chain twice.
#[derive(Debug, Default)]
struct Cycle {
    rotation: OnceLock<Rotation>,
}

impl Cycle {
    fn rotate(&self, set: &GenerationSet) -> Result<Rotation, PersistError> {
        if let Some(done) = self.rotation.get() {
            return Ok(*done);
        }
        let done = set.rotate()?;
        Ok(*self.rotation.get_or_init(|| done))
    }
}

fn write_snapshot(
    provider: &dyn StateProvider,
    name: &str,
    set: &GenerationSet,
    cycle: &Cycle,
) -> Result<SnapshotReport, PersistError> {
    let value = provider.snapshot(name)?;
    let bytes = render(name, &value)?;

    if let Some(dir) = set.live().parent() {
        fs::create_dir_all(dir).map_err(|e| PersistError::io(dir, e))?;
    }
    let rotation = cycle.rotate(set)?;

    write_synced(set.temp(), &bytes)?;
    set.replace_live(set.temp())?;

    // First write ever: the new live file seeds the whole chain.
    if rotation == Rotation::Fresh {
        set.seed()?;
    }

    Ok(SnapshotReport {
        name: name.to_string(),
        bytes: bytes.len() as u64,
        seeded: rotation != Rotation::Shifted,
    })
}

/// Pretty JSON, four-space indent.
fn render(name: &str, value: &Value) -> Result<Vec<u8>, PersistError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut ser)
        .map_err(|source| PersistError::Serialize {
            name: name.to_string(),
            source,
        })?;
    buf.push(b'\n');
    Ok(buf)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    let mut file = fs::File::create(path).map_err(|e| PersistError::io(path, e))?;
    file.write_all(bytes).map_err(|e| PersistError::io(path, e))?;
    file.sync_all().map_err(|e| PersistError::io(path, e))
}

fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>, PersistError> {
    match fs::read(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(read_error(path, e)),
    }
}

fn read_error(path: &Path, source: io::Error) -> PersistError {
    if source.kind() == io::ErrorKind::PermissionDenied {
        PersistError::Access {
            path: path.to_path_buf(),
            source,
        }
    } else {
        PersistError::io(path, source)
    }
}

fn generation_path(set: &GenerationSet, k: usize) -> Result<&Path, PersistError> {
    set.path(k).ok_or(PersistError::InvalidGeneration {
        generation: k,
        max: GENERATIONS,
    })
}

fn offload_error(name: &str, join: tokio::task::JoinError) -> PersistError {
    let reason = if join.is_panic() {
        panic_message(join.into_panic().as_ref())
    } else {
        "cancelled".to_string()
    };
    PersistError::Offload {
        name: name.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::persist::MemoryState;
    use crate::policies::LockPolicy;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::broadcast;

    fn config(dir: &Path) -> Config {
        Config {
            data_dir: dir.to_path_buf(),
            ..Config::default()
        }
    }

    fn engine(dir: &Path) -> (SnapshotEngine, Arc<MemoryState>) {
        let state = Arc::new(MemoryState::with_names(["db", "stats", "message_queue"]));
        (SnapshotEngine::new(config(dir), state.clone()), state)
    }

    fn on_disk(path: &Path) -> Value {
        serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
    }

    fn kinds(rx: &mut broadcast::Receiver<Event>) -> Vec<EventKind> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev.kind);
        }
        out
    }

    #[tokio::test]
    async fn backup_chain_follows_the_rotation_law() {
        let tmp = TempDir::new().unwrap();
        let (engine, state) = engine(tmp.path());
        let set = engine.generations("db").unwrap();

        state.set("db", json!({"a": 1})).unwrap();
        let first = engine.persist("db").await.unwrap();
        assert!(first.seeded);
        for k in 1..=GENERATIONS {
            assert_eq!(on_disk(set.path(k).unwrap()), json!({"a": 1}), "generation {k}");
        }

        state.set("db", json!({"a": 2})).unwrap();
        engine.persist("db").await.unwrap();
        assert_eq!(on_disk(set.live()), json!({"a": 2}));
        for k in 2..=GENERATIONS {
            assert_eq!(on_disk(set.path(k).unwrap()), json!({"a": 1}), "generation {k}");
        }

        state.set("db", json!({"a": 3})).unwrap();
        engine.persist("db").await.unwrap();
        assert_eq!(on_disk(set.path(1).unwrap()), json!({"a": 3}));
        assert_eq!(on_disk(set.path(2).unwrap()), json!({"a": 2}));
        assert_eq!(on_disk(set.path(3).unwrap()), json!({"a": 1}));
        assert_eq!(on_disk(set.path(4).unwrap()), json!({"a": 1}));
        assert_eq!(on_disk(set.temp()), json!({"a": 3}));
    }

    #[tokio::test]
    async fn existing_live_file_seeds_the_chain() {
        let tmp = TempDir::new().unwrap();
        let (engine, state) = engine(tmp.path());
        let set = engine.generations("stats").unwrap();
        fs::write(set.live(), r#"{"old": true}"#).unwrap();

        state.set("stats", json!({"new": true})).unwrap();
        let first = engine.persist("stats").await.unwrap();
        assert!(first.seeded);
        assert!(first.bytes > 0);
        assert_eq!(on_disk(set.live()), json!({"new": true}));
        for k in 2..=GENERATIONS {
            assert_eq!(on_disk(set.path(k).unwrap()), json!({"old": true}), "generation {k}");
        }

        let second = engine.persist("stats").await.unwrap();
        assert!(!second.seeded);
        assert!(!set.swap().exists());
    }

    #[test]
    fn retried_write_does_not_rotate_twice() {
        let tmp = TempDir::new().unwrap();
        let state = MemoryState::with_names(["db"]);
        let set = GenerationSet::new(tmp.path(), "db");
        for n in 1..=3 {
            state.set("db", json!({"n": n})).unwrap();
            write_snapshot(&state, "db", &set, &Cycle::default()).unwrap();
        }

        // First attempt rotated and then lost its write; the retry reuses the rotation.
        state.set("db", json!({"n": 4})).unwrap();
        let cycle = Cycle::default();
        assert_eq!(cycle.rotate(&set).unwrap(), Rotation::Shifted);
        let report = write_snapshot(&state, "db", &set, &cycle).unwrap();
        assert!(!report.seeded);

        assert_eq!(on_disk(set.path(1).unwrap()), json!({"n": 4}));
        assert_eq!(on_disk(set.path(2).unwrap()), json!({"n": 3}));
        assert_eq!(on_disk(set.path(3).unwrap()), json!({"n": 2}));
        assert_eq!(on_disk(set.path(4).unwrap()), json!({"n": 1}));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_load_never_sees_a_partial_file() {
        let tmp = TempDir::new().unwrap();
        let (engine, state) = engine(tmp.path());
        let engine = Arc::new(engine);
        let big: Vec<u64> = (0..20_000).collect();
        state.set("db", json!({"rows": big})).unwrap();
        engine.persist("db").await.unwrap();

        let writer = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                for _ in 0..20 {
                    engine.persist("db").await.unwrap();
                }
            })
        };
        while !writer.is_finished() {
            let loaded = engine.load("db").unwrap();
            assert_eq!(loaded["rows"].as_array().map(Vec::len), Some(20_000));
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn unsupported_names_touch_nothing() {
        let tmp = TempDir::new().unwrap();
        let (engine, _state) = engine(tmp.path());

        let err = engine.persist("users").await.unwrap_err();
        assert!(matches!(err, PersistError::InvalidName { .. }));
        assert!(engine.load("users").is_err());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn held_lock_times_out_without_writing() {
        let tmp = TempDir::new().unwrap();
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let (engine, _state) = engine(tmp.path());
        let engine = engine.with_bus(bus);

        let _held = engine.lock().hold().await;
        let err = engine.persist("db").await.unwrap_err();

        match err {
            PersistError::LockTimeout { waited, attempts } => {
                assert_eq!(attempts, 5);
                assert_eq!(waited, Duration::from_secs(300));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!tmp.path().join("db.json").exists());
        assert!(!tmp.path().join("db_temp.json").exists());

        let kinds = kinds(&mut rx);
        assert_eq!(
            kinds.iter().filter(|k| **k == EventKind::LockContended).count(),
            5
        );
        assert_eq!(kinds.last(), Some(&EventKind::LockTimedOut));
    }

    #[tokio::test(start_paused = true)]
    async fn restore_gives_up_on_a_held_lock() {
        let tmp = TempDir::new().unwrap();
        let bus = Bus::new(64);
        let (engine, state) = engine(tmp.path());
        state.set("db", json!({"n": 1})).unwrap();
        engine.persist("db").await.unwrap();
        state.set("db", json!({"n": 2})).unwrap();
        engine.persist("db").await.unwrap();

        let engine = engine.with_bus(bus.clone());
        let mut rx = bus.subscribe();
        let _held = engine.lock().hold().await;
        let err = engine.restore_generation("db", 2).await.unwrap_err();

        assert!(matches!(err, PersistError::LockTimeout { attempts: 5, .. }));
        assert_eq!(on_disk(&tmp.path().join("db.json")), json!({"n": 2}));
        assert_eq!(kinds(&mut rx).last(), Some(&EventKind::LockTimedOut));
    }

    #[tokio::test]
    async fn engines_sharing_a_lock_serialize_writes() {
        let tmp = TempDir::new().unwrap();
        let lock = PersistLock::new();
        let cfg = Config {
            lock: LockPolicy {
                attempts: 0,
                ..LockPolicy::default()
            },
            ..config(tmp.path())
        };
        let a = SnapshotEngine::new(cfg, Arc::new(MemoryState::with_names(["db"])))
            .with_lock(lock.clone());

        let _held = lock.hold().await;
        assert!(a.lock().is_held());
        assert!(matches!(
            a.persist("db").await,
            Err(PersistError::LockTimeout { attempts: 0, .. })
        ));
    }

    #[tokio::test]
    async fn load_recovers_missing_and_blank_files() {
        let tmp = TempDir::new().unwrap();
        let (engine, state) = engine(tmp.path());
        state.set("db", json!({"stale": true})).unwrap();

        assert_eq!(engine.load("db").unwrap(), json!({}));
        assert_eq!(state.get("db").unwrap(), Some(json!({})));

        fs::write(tmp.path().join("stats.json"), "  \n").unwrap();
        assert_eq!(engine.load("stats").unwrap(), json!({}));
    }

    #[tokio::test]
    async fn load_refuses_corrupt_files() {
        let tmp = TempDir::new().unwrap();
        let (engine, state) = engine(tmp.path());
        state.set("db", json!({"keep": 1})).unwrap();
        fs::write(tmp.path().join("db.json"), "{\"a\": ").unwrap();

        let err = engine.load("db").unwrap_err();
        assert!(matches!(err, PersistError::CorruptState { .. }));
        assert_eq!(err.as_label(), "persist_corrupt_state");
        assert_eq!(state.get("db").unwrap(), Some(json!({"keep": 1})));
        assert!(fs::read(tmp.path().join("db.json")).unwrap().starts_with(b"{\"a\""));
    }

    #[tokio::test]
    async fn persist_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let (engine, state) = engine(tmp.path());
        let value = json!({"users": {"42": {"xp": 1200, "tags": ["a", "b"]}}, "v": 3});
        state.set("db", value.clone()).unwrap();
        engine.persist_all().await.unwrap();

        let (fresh, fresh_state) = self::engine(tmp.path());
        fresh.load_all().unwrap();
        assert_eq!(fresh_state.get("db").unwrap(), Some(value));
        assert_eq!(fresh_state.get("stats").unwrap(), Some(json!({})));
    }

    #[tokio::test]
    async fn load_applies_the_reconstruct_hook() {
        let tmp = TempDir::new().unwrap();
        let state = Arc::new(MemoryState::new().with_reconstructor("message_queue", |raw| {
            match raw {
                Value::Object(mut map) => {
                    map.entry("pending").or_insert(json!([]));
                    Ok(Value::Object(map))
                }
                other => Err(ProviderError::Conversion {
                    name: "message_queue".into(),
                    reason: format!("expected object, got {other}"),
                }),
            }
        }));
        let engine = SnapshotEngine::new(config(tmp.path()), state.clone());

        fs::write(tmp.path().join("message_queue.json"), r#"{"sent": 2}"#).unwrap();
        assert_eq!(
            engine.load("message_queue").unwrap(),
            json!({"sent": 2, "pending": []})
        );

        fs::write(tmp.path().join("message_queue.json"), "[1, 2]").unwrap();
        assert!(matches!(
            engine.load("message_queue"),
            Err(PersistError::Provider(ProviderError::Conversion { .. }))
        ));
    }

    /// Panics on the first `failures` snapshots.
    struct Flaky {
        inner: MemoryState,
        calls: AtomicUsize,
        failures: usize,
    }

    impl StateProvider for Flaky {
        fn snapshot(&self, name: &str) -> Result<Value, ProviderError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                panic!("worker lost");
            }
            self.inner.snapshot(name)
        }
        fn install(&self, name: &str, value: Value) -> Result<(), ProviderError> {
            self.inner.install(name, value)
        }
    }

    fn flaky(failures: usize) -> Arc<Flaky> {
        Arc::new(Flaky {
            inner: MemoryState::with_names(["db"]),
            calls: AtomicUsize::new(0),
            failures,
        })
    }

    #[tokio::test]
    async fn transient_fault_is_retried_once() {
        let tmp = TempDir::new().unwrap();
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let provider = flaky(1);
        let engine = SnapshotEngine::new(config(tmp.path()), provider.clone()).with_bus(bus);

        engine.persist("db").await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert!(!engine.lock().is_held());

        let kinds = kinds(&mut rx);
        assert_eq!(
            kinds,
            vec![
                EventKind::PersistStarted,
                EventKind::OffloadRetried,
                EventKind::PersistCompleted
            ]
        );
    }

    #[tokio::test]
    async fn second_fault_propagates() {
        let tmp = TempDir::new().unwrap();
        let provider = flaky(2);
        let engine = SnapshotEngine::new(config(tmp.path()), provider.clone());

        let err = engine.persist("db").await.unwrap_err();
        assert!(matches!(err, PersistError::Offload { .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert!(!tmp.path().join("db.json").exists());
    }

    #[tokio::test]
    async fn backups_can_be_inspected_and_restored() {
        let tmp = TempDir::new().unwrap();
        let (engine, state) = engine(tmp.path());

        for n in 1..=3 {
            state.set("db", json!({"n": n})).unwrap();
            engine.persist("db").await.unwrap();
        }
        match engine.read_generation("db", 2).unwrap() {
            ParseOutcome::Value(v) => assert_eq!(v, json!({"n": 2})),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            engine.read_generation("db", 5),
            Err(PersistError::InvalidGeneration { generation: 5, max: 4 })
        ));

        fs::write(tmp.path().join("db.json"), "garbage").unwrap();
        assert!(engine.load("db").is_err());

        assert_eq!(engine.restore_generation("db", 2).await.unwrap(), json!({"n": 2}));
        assert_eq!(state.get("db").unwrap(), Some(json!({"n": 2})));
        assert_eq!(on_disk(&tmp.path().join("db.json")), json!({"n": 2}));
    }
}
