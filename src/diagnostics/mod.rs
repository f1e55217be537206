//! # Failure reporting.
//!
//! - [`FailureEvent`] / [`Origin`] / [`ContextValue`]: what is reported
//! - [`DiagnosticSink`]: where it goes (never raises)
//! - [`TracingSink`]: default sink, logs through `tracing`
//! - [`ChannelSink`] + [`Transport`]: segmented delivery to an
//!   environment-configured destination
//!
//! The supervisor owns one sink and always calls it from a supervised task of
//! its own, flagged so that a failing report is logged instead of reported again.

mod channel;
mod failure;
mod sink;

pub use channel::{
    ChannelSink, DEFAULT_SEGMENT_LIMIT, DESTINATION_VARS, Transport, TransportError,
    split_segments,
};
pub use failure::{ContextValue, FailureEvent, Origin};
pub use sink::{DiagnosticSink, TracingSink};
