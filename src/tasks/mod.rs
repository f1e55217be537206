//! # Work and task handles.
//!
//! - [`Work`] - what can be launched (sync callable or future)
//! - [`TaskHandle`] - what `launch` returns
//! - [`TaskOutcome`] - terminal state observed exactly once per task

mod handle;
mod work;

pub use handle::{TaskHandle, TaskOutcome};
pub use work::{BoxWorkFuture, Work};

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
