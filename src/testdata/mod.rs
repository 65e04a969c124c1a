//! Test data
//!
//! Read-only store mapping (test id, data id) to files. Loaded once and never
//! mutated while judging, so one store can be shared across sessions.

pub mod store;

pub use store::{DirectoryTestStore, TestStore};
