//! Run entry points: submit, resume, cancel

mod graph;
mod signal;

pub use graph::Driver;
pub use signal::{CancelSignal, NoOpSignalChecker, SignalChecker};
