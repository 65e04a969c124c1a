/// Verdict classification
/// Reduces raw sandbox results and checker exit codes to the closed status sets.
use crate::config::types::*;
use crate::core::types::{ProcessGroupResult, ProcessResult};

/// Verdict classifier - pure functions over raw results
pub struct VerdictClassifier;

impl VerdictClassifier {
    /// Classify one process run.
    ///
    /// Limit flags win over the exit status: a process killed for exceeding a
    /// limit usually surfaces as a signal or a non-zero exit as well.
    pub fn classify_execution(group: &ProcessGroupResult, process: &ProcessResult) -> Execution {
        Execution {
            status: Self::execution_status(group, process),
            exit_code: process.exit_code,
            term_signal: process.term_signal,
            time_usage_millis: process.usage.cpu_time_millis,
            real_time_usage_millis: group.real_time_millis,
            memory_usage_bytes: process.usage.memory_peak_bytes,
        }
    }

    fn execution_status(group: &ProcessGroupResult, process: &ProcessResult) -> ExecutionStatus {
        let violations = &process.violations;
        if violations.time {
            return ExecutionStatus::TimeLimit;
        }
        if group.real_time_limit_exceeded {
            return ExecutionStatus::RealTimeLimit;
        }
        if violations.memory {
            return ExecutionStatus::MemoryLimit;
        }
        if violations.output {
            return ExecutionStatus::OutputLimit;
        }
        if violations.processes {
            return ExecutionStatus::ProcessLimit;
        }

        match (process.exit_code, process.term_signal) {
            (Some(0), None) => ExecutionStatus::Ok,
            _ => ExecutionStatus::RuntimeError,
        }
    }

    /// Map a testlib-style checker exit status onto the four checker verdicts.
    ///
    /// Anything outside 0..=3, or a checker killed by a signal, is a broken
    /// collaborator and never becomes a verdict.
    pub fn checking_status(exit_code: Option<i32>) -> Result<CheckingStatus> {
        match exit_code {
            Some(0) => Ok(CheckingStatus::Ok),
            Some(1) => Ok(CheckingStatus::WrongAnswer),
            Some(2) => Ok(CheckingStatus::PresentationError),
            Some(3) => Ok(CheckingStatus::FailTest),
            Some(code) => Err(JudgeError::CheckerContract(format!(
                "unrecognized checker exit code {}",
                code
            ))),
            None => Err(JudgeError::CheckerContract(
                "checker terminated without an exit code".to_string(),
            )),
        }
    }
}
