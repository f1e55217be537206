//! # Example: report
//!
//! Launches work that succeeds, fails, panics and gets cancelled, and routes
//! the failures to a chat-style sink.
//!
//! ## Flow
//! ```text
//! launch(ok)        ──► TaskCompleted
//! launch(fails)     ──► TaskFailed ──► report task ──► ChannelSink ──► PrintTransport
//! launch(panics)    ──► TaskFailed ──► report task ──► ...
//! launch(sleeper)   ──► cancel() ──► TaskCancelled (never reported)
//! shutdown()        ──► AllStoppedWithin
//! ```
//!
//! ## Run
//! ```bash
//! ERROR_CHANNEL_ID=ops cargo run --example report
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use snapvisor::{
    ChannelSink, Config, LogWriter, Supervisor, TaskError, Transport, TransportError, Work,
};

/// Prints every segment instead of posting it somewhere.
struct PrintTransport;

#[async_trait]
impl Transport for PrintTransport {
    async fn send(&self, destination: &str, segment: &str) -> Result<(), TransportError> {
        println!("[{destination}] {segment}");
        Ok(())
    }
}

fn refresh_cache() -> Result<(), TaskError> {
    Err(TaskError::fail("cache backend offline"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let sup = Supervisor::builder(Config::default())
        .with_sink(Arc::new(ChannelSink::new(PrintTransport)))
        .with_subscribers(vec![Arc::new(LogWriter::new())])
        .build();

    sup.launch_named("greet", Work::sync(|| Ok(()))).wait().await;
    sup.launch(Work::sync(refresh_cache)).wait().await;
    sup.launch_named(
        "explode",
        Work::future(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let rows: Vec<u32> = Vec::new();
            println!("[explode] first row {}", rows[0]);
            Ok(())
        }),
    )
    .wait()
    .await;

    let sleeper = sup.launch_named(
        "sleeper",
        Work::future(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }),
    );
    sleeper.cancel();
    println!("[sleeper] {:?}", sleeper.wait().await);

    sup.shutdown().await?;
    Ok(())
}
