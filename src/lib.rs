//! rustjudge: sandboxed test execution core of a programming-contest judge
//! Builds a submission once, runs it per test in a sandbox under resource
//! limits, and classifies every run through a checker.
//!
//! # Architecture
//!
//! ## Test Selection ([`selector`])
//! - [`selector::query`]: Declarative test queries and their wire form
//! - [`selector::matcher`]: Compiled, reusable matchers and `resolve`
//!
//! ## Execution Control ([`exec`])
//! - [`exec::session`]: Type-state testing session (`build` before `test`)
//! - [`exec::provision`]: Ordered provisioning of the sandbox working directory
//! - [`exec::process`]: Limits, identity and stream binding of the solution process
//! - [`exec::capture`]: Receive-range capture after execution
//! - [`exec::driver`]: Whole-task judging
//!
//! ## Collaborators ([`core`], [`judge`], [`testdata`])
//! - [`core::container`]: Container, jail filesystem and process group capabilities
//! - [`judge::builder`] / [`judge::registry`]: Builders by id
//! - [`judge::checker`]: Token and external-program checkers
//! - [`testdata::store`]: Read-only test data store
//!
//! ## Verdict ([`verdict`])
//! - [`verdict::verdict`]: Raw results to execution and checker statuses
//!
//! ## Sandbox ([`sandbox`])
//! - [`sandbox::host`]: Reference host container (rlimits, process groups, watchdog)
//!
//! ## Observability ([`observability`])
//! - [`observability::progress`]: Intermediate session state reporting
//!
//! ## Configuration ([`config`])
//! - [`config::types`]: Shared types, wire messages and the error taxonomy
//! - [`config::validator`]: Settings and config validation
//! - [`config::loader`]: Judge configuration loading

// Configuration & shared types
pub mod config;

// Test selection
pub mod selector;

// Collaborator capabilities
pub mod core;

// Builders and checkers
pub mod judge;

// Test data
pub mod testdata;

// Execution Control
pub mod exec;

// Verdict
pub mod verdict;

// Host sandbox
pub mod sandbox;

// Observability
pub mod observability;

// CLI entrypoint for the judge binary
pub mod cli;

// Re-export commonly used types for convenience
pub use config::types::*;
