/// Progress reporting for testing sessions
/// Emits the transient intermediate state (building / testing a given test)
/// to external observers. Nothing here is authoritative judging state.
use crate::config::types::{IntermediateState, Phase};
use log::info;
use std::sync::Mutex;

/// Sink for intermediate session states
pub trait ProgressReporter: Send + Sync {
    fn report(&self, state: &IntermediateState);
}

/// Reports every state as an `info` log line
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn report(&self, state: &IntermediateState) {
        match (state.phase, state.test_id.as_deref()) {
            (Phase::Building, _) => info!("progress phase=BUILDING"),
            (Phase::Testing, Some(test_id)) => {
                info!("progress phase=TESTING test_id={}", test_id)
            }
            (Phase::Testing, None) => info!("progress phase=TESTING"),
        }
    }
}

/// Keeps every reported state in order
#[derive(Debug, Default)]
pub struct RecordingReporter {
    states: Mutex<Vec<IntermediateState>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn states(&self) -> Vec<IntermediateState> {
        match self.states.lock() {
            Ok(states) => states.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Last reported state: where the session currently is, or where it stopped
    pub fn last(&self) -> Option<IntermediateState> {
        self.states().pop()
    }
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, state: &IntermediateState) {
        match self.states.lock() {
            Ok(mut states) => states.push(state.clone()),
            Err(poisoned) => poisoned.into_inner().push(state.clone()),
        }
    }
}
