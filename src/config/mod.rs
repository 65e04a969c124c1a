//! Configuration and settings
//!
//! Shared types, settings validation, and judge configuration loading.

pub mod loader;
pub mod types;
pub mod validator;
