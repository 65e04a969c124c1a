//! Verdict classification
//!
//! Derives execution and checker statuses as pure functions over raw results.

pub mod verdict;

pub use verdict::VerdictClassifier;
