//! Test selection
//!
//! Resolves a declarative test query into a concrete set of test ids.
//! Selection is a pure filter over the test universe.

pub mod matcher;
pub mod query;

pub use matcher::{resolve, Matcher};
pub use query::{PatternQuery, QueryFlag, TestQuery, TestQueryMessage};
