//! Builders and checkers.
//!
//! The orchestrator stays language-agnostic. Builders turn a source into a
//! runnable solution; checkers turn produced output into a verdict.

pub mod builder;
pub mod checker;
pub mod languages;
pub mod registry;

pub use builder::{Builder, ExecutableSolution, Solution};
pub use checker::{checker_for, Checker, ProgramChecker, TokenChecker};
pub use registry::builder_for;
