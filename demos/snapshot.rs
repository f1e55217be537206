//! # Example: snapshot
//!
//! Persists one state a few times and shows the backup chain on disk.
//!
//! ## Flow
//! ```text
//! persist(db) {"run":1} ──► db.json + db_2..4.json seeded
//! persist(db) {"run":2} ──► 3→4, 2→3, live→2, write live
//! persist(db) {"run":3} ──► same again
//! load(db)              ──► {"run":3}
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example snapshot
//! ```

use std::sync::Arc;

use serde_json::json;
use snapvisor::{Config, GENERATIONS, MemoryState, ParseOutcome, SnapshotEngine};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let dir = std::env::temp_dir().join("snapvisor-snapshot-demo");
    let _ = std::fs::remove_dir_all(&dir);
    let cfg = Config {
        data_dir: dir.clone(),
        names: vec!["db".into()],
        ..Config::default()
    };

    let state = Arc::new(MemoryState::with_names(["db"]));
    let engine = SnapshotEngine::new(cfg, state.clone());

    for run in 1..=3 {
        state.set("db", json!({ "run": run }))?;
        let report = engine.persist("db").await?;
        println!("[persist] run={run} bytes={} seeded={}", report.bytes, report.seeded);
    }

    for k in 1..=GENERATIONS {
        match engine.read_generation("db", k)? {
            ParseOutcome::Value(v) => println!("[gen {k}] {v}"),
            other => println!("[gen {k}] {other:?}"),
        }
    }

    println!("[load] {}", engine.load("db")?);
    println!("[restore gen 3] {}", engine.restore_generation("db", 3).await?);
    println!("files under {}", dir.display());
    Ok(())
}
