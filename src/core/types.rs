use crate::config::types::{AccessMode, OwnerId, ResourceLimits, Stream};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a standard stream of a sandboxed process points
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StreamTarget {
    /// /dev/null
    Null,
    /// A file inside the jail, addressed by its jail location
    File { location: PathBuf, mode: AccessMode },
}

impl Default for StreamTarget {
    fn default() -> Self {
        StreamTarget::Null
    }
}

/// Description of one sandboxed process.
///
/// `current_path` and stream locations are jail locations and are translated
/// by the container. `executable` and `arguments` are passed verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub executable: PathBuf,
    /// Arguments after argv[0]
    pub arguments: Vec<String>,
    pub environment: Vec<(String, String)>,
    pub current_path: PathBuf,
    pub owner_id: Option<OwnerId>,
    /// Indexed by file descriptor: stdin, stdout, stderr
    pub streams: [StreamTarget; 3],
    pub resource_limits: ResourceLimits,
}

impl ProcessSpec {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            arguments: Vec::new(),
            environment: Vec::new(),
            current_path: PathBuf::from("/"),
            owner_id: None,
            streams: Default::default(),
            resource_limits: ResourceLimits::default(),
        }
    }

    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self
    }

    pub fn set_stream(&mut self, stream: Stream, target: StreamTarget) {
        self.streams[stream.fd()] = target;
    }

    pub fn stream(&self, stream: Stream) -> &StreamTarget {
        &self.streams[stream.fd()]
    }
}

/// Handle of a process inside its group
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProcessId(pub usize);

/// Resource usage reported by the sandbox
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub cpu_time_millis: u64,
    pub memory_peak_bytes: u64,
}

/// Limit-enforcement flags raised by the sandbox for one process
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LimitViolations {
    pub time: bool,
    pub memory: bool,
    pub output: bool,
    pub processes: bool,
}

impl LimitViolations {
    pub fn any(&self) -> bool {
        self.time || self.memory || self.output || self.processes
    }
}

/// Raw result of one sandboxed process
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessResult {
    /// Exit code (if normal exit)
    pub exit_code: Option<i32>,
    /// Terminating signal (if signaled)
    pub term_signal: Option<i32>,
    pub violations: LimitViolations,
    pub usage: ResourceUsage,
}

/// Raw result of a whole process group
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessGroupResult {
    /// Group was killed by the wall clock watchdog
    pub real_time_limit_exceeded: bool,
    pub real_time_millis: u64,
}
