//! Observability
//!
//! Progress reporting for external observers of a testing session.

pub mod progress;

pub use progress::{LogReporter, ProgressReporter, RecordingReporter};
