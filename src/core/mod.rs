//! Collaborator capabilities of the judge core.
//!
//! The orchestrator only talks to the sandbox through these traits, so a
//! host container and an in-memory fake are interchangeable.

pub mod container;
pub mod types;

pub use container::{jail_path, Container, JailFilesystem, ProcessGroup};
pub use types::{
    LimitViolations, ProcessGroupResult, ProcessId, ProcessResult, ProcessSpec, ResourceUsage,
    StreamTarget,
};
