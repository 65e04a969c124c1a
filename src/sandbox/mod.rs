//! Host sandbox
//!
//! Reference container running solutions directly on the local host.

pub mod host;
pub mod rlimits;

pub use host::{HostContainer, HostProcessGroup};
