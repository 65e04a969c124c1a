//! Execution orchestration
//!
//! Builds a solution once, then provisions, runs and classifies it per test.

pub mod capture;
pub mod driver;
pub mod process;
pub mod provision;
pub mod session;

pub use driver::judge_task;
pub use session::{BuildOutcome, Built, TestingSession, Unbuilt};
