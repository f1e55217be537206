//! # ChannelSink: segmented delivery to an environment-configured destination.
//!
//! [`ChannelSink`] renders a [`FailureEvent`], splits the text into segments
//! that fit the transport's message limit, and hands them to a [`Transport`].
//! The crate does not ship a transport; chat clients, webhooks or files plug in
//! by implementing the trait.
//!
//! The destination id is resolved **at report time**, so it can be set or
//! changed after startup:
//!
//! ```text
//! report(event)
//!   ├─► destination: $ERROR_CHANNEL_ID, else $TRACEBACK_LOGGING_CHANNEL
//!   │      └─ none ─► log locally, drop report
//!   ├─► render() ─► split_segments(limit)
//!   └─► transport.send(dest, seg) for each segment
//!          └─ error ─► log locally, stop
//! ```

use async_trait::async_trait;

use super::{DiagnosticSink, FailureEvent};

/// Environment variables consulted, in order, for the destination id.
pub const DESTINATION_VARS: [&str; 2] = ["ERROR_CHANNEL_ID", "TRACEBACK_LOGGING_CHANNEL"];

/// Default maximum segment length, in characters.
pub const DEFAULT_SEGMENT_LIMIT: usize = 1900;

/// Error type transports may return.
pub type TransportError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Delivers one text segment to a destination.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, destination: &str, segment: &str) -> Result<(), TransportError>;
}

#[derive(Debug, Clone)]
enum Destination {
    Env(Vec<String>),
    Fixed(String),
}

/// Sink delivering rendered reports through a [`Transport`].
pub struct ChannelSink<T> {
    transport: T,
    destination: Destination,
    segment_limit: usize,
}

impl<T: Transport> ChannelSink<T> {
    /// Creates a sink resolving its destination from [`DESTINATION_VARS`].
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            destination: Destination::Env(DESTINATION_VARS.iter().map(|v| v.to_string()).collect()),
            segment_limit: DEFAULT_SEGMENT_LIMIT,
        }
    }

    /// Resolves the destination from the given variables instead, first non-empty wins.
    pub fn with_env_vars<I, S>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.destination = Destination::Env(vars.into_iter().map(Into::into).collect());
        self
    }

    /// Always delivers to `destination`.
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Destination::Fixed(destination.into());
        self
    }

    /// Sets the maximum segment length in characters (minimum 1).
    pub fn with_segment_limit(mut self, limit: usize) -> Self {
        self.segment_limit = limit.max(1);
        self
    }

    /// Resolves the destination now.
    pub fn destination(&self) -> Option<String> {
        match &self.destination {
            Destination::Fixed(d) => Some(d.clone()),
            Destination::Env(vars) => vars
                .iter()
                .filter_map(|v| std::env::var(v).ok())
                .find(|v| !v.trim().is_empty()),
        }
    }
}

#[async_trait]
impl<T: Transport> DiagnosticSink for ChannelSink<T> {
    async fn report(&self, event: FailureEvent) {
        let Some(destination) = self.destination() else {
            tracing::error!(
                origin = event.origin.name(),
                "no diagnostic destination configured; report dropped"
            );
            return;
        };

        let text = event.render();
        for segment in split_segments(&text, self.segment_limit) {
            if let Err(err) = self.transport.send(&destination, &segment).await {
                tracing::error!(
                    origin = event.origin.name(),
                    %destination,
                    error = %err,
                    "failed to deliver diagnostic report"
                );
                return;
            }
        }
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

/// Splits `text` into segments of at most `limit` characters.
///
/// Cuts at the last newline inside the window, else the last space, else
/// hard at the limit. Leading whitespace of each following segment is dropped.
pub fn split_segments(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut segments = Vec::new();
    let mut rest = text;

    loop {
        // Byte offset of the first character past the window, if any.
        let Some((window_end, _)) = rest.char_indices().nth(limit) else {
            break;
        };
        let window = &rest[..window_end];
        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(window_end);

        segments.push(rest[..cut].to_string());
        rest = rest[cut..].trim_start();
    }

    segments.push(rest.to_string());
    segments
}
