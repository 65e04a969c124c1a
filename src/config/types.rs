/// Core types and structures for the rustjudge system
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::selector::TestQueryMessage;

/// Fixed sandbox working directory, relative to the container root.
pub const SANDBOX_WORKDIR: &str = "/tmp/testing";

/// Mode applied to the sandbox working directory before every test.
pub const SANDBOX_WORKDIR_MODE: u32 = 0o400;

/// Permission bits the sandbox identity may hold on provisioned files.
pub const SANDBOX_FILE_MODE_MASK: u32 = 0o700;

/// Owner identity (uid/gid pair) applied to sandboxed files and processes
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct OwnerId {
    pub uid: u32,
    pub gid: u32,
}

impl OwnerId {
    pub const fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new(1000, 1000)
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.uid, self.gid)
    }
}

/// Resource ceilings for one sandboxed process and its group.
///
/// `None` means the limit is not enforced by this layer.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResourceLimits {
    /// CPU time limit in milliseconds
    pub time_limit_millis: Option<u64>,
    /// Peak resident memory limit in bytes
    pub memory_limit_bytes: Option<u64>,
    /// Largest file the process may write, in bytes
    pub output_limit_bytes: Option<u64>,
    /// Maximum number of processes
    pub number_of_processes: Option<u64>,
    /// Wall clock limit for the whole process group, in milliseconds
    pub real_time_limit_millis: Option<u64>,
}

/// Standard stream of the sandboxed process
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Stream {
    #[serde(rename = "STDIN")]
    Stdin,
    #[serde(rename = "STDOUT")]
    Stdout,
    #[serde(rename = "STDERR")]
    Stderr,
}

impl Stream {
    pub fn fd(self) -> usize {
        match self {
            Stream::Stdin => 0,
            Stream::Stdout => 1,
            Stream::Stderr => 2,
        }
    }

    /// stdin is only ever read, stdout and stderr are only ever written
    pub fn access_mode(self) -> AccessMode {
        match self {
            Stream::Stdin => AccessMode::ReadOnly,
            Stream::Stdout | Stream::Stderr => AccessMode::WriteOnly,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
}

/// Binds a standard stream to a declared file id
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Redirection {
    pub stream: Stream,
    pub file_id: String,
}

/// Execution part of the process settings
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Arguments passed verbatim to the solution
    pub arguments: Vec<String>,
    /// Requested working directory. Never honored: the process always runs in
    /// [`SANDBOX_WORKDIR`].
    pub current_path: Option<PathBuf>,
    pub redirections: Vec<Redirection>,
}

/// Byte range captured from a file after execution
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReceiveRange {
    pub offset: u64,
    /// Number of bytes to read; `None` reads to the end of the file
    pub size: Option<u64>,
}

/// File staged into the sandbox working directory
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FileSpec {
    pub id: String,
    /// Declared path; only its filename component is used inside the sandbox
    pub path: PathBuf,
    /// Requested permission bits, masked with [`SANDBOX_FILE_MODE_MASK`]
    #[serde(
        default = "default_file_permissions",
        deserialize_with = "deserialize_mode"
    )]
    pub permissions: u32,
    /// Test data id copied into the file before execution
    #[serde(default)]
    pub init: Option<String>,
    #[serde(default)]
    pub receive: Option<ReceiveRange>,
}

fn default_file_permissions() -> u32 {
    0o600
}

/// Accepts either a plain number or an octal string such as `"0640"`.
fn deserialize_mode<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Mode {
        Bits(u32),
        Octal(String),
    }

    match Mode::deserialize(deserializer)? {
        Mode::Bits(bits) => Ok(bits),
        Mode::Octal(text) => {
            let digits = text.trim_start_matches("0o");
            u32::from_str_radix(digits, 8).map_err(|e| {
                serde::de::Error::custom(format!("invalid octal mode {:?}: {}", text, e))
            })
        }
    }
}

/// Settings for one sandboxed run of the solution
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProcessSettings {
    pub resource_limits: ResourceLimits,
    pub execution: ExecutionSettings,
    pub files: Vec<FileSpec>,
}

/// Build configuration of a solution
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BuildSettings {
    /// Builder id, resolved through the builder registry
    pub builder: String,
    #[serde(default)]
    pub resource_limits: ResourceLimits,
}

/// Solution submitted for judging
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SolutionSettings {
    /// Host path of the solution source
    pub source: PathBuf,
    pub build: BuildSettings,
}

/// Which tests to run and how to run each of them
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TestingSettings {
    /// Interpreted as a logical OR; empty selects nothing
    pub test_query: Vec<TestQueryMessage>,
    pub process: ProcessSettings,
}

/// Checker configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckerSettings {
    /// Whitespace-token comparison of test data against a solution file
    Tokens { expected: String, produced: String },
    /// External checker program following testlib exit codes
    Program {
        path: PathBuf,
        #[serde(default)]
        arguments: Vec<String>,
        /// Test data id passed as the checker input
        #[serde(default = "default_checker_input")]
        input: String,
        /// Solution file id passed as the checker output
        produced: String,
        /// Test data id passed as the checker answer
        expected: String,
    },
}

fn default_checker_input() -> String {
    "in".to_string()
}

/// Full judging request
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub solution: SolutionSettings,
    #[serde(default)]
    pub testing: TestingSettings,
    pub checker: CheckerSettings,
}

/// Phase of a testing session
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Phase {
    #[serde(rename = "BUILDING")]
    Building,
    #[serde(rename = "TESTING")]
    Testing,
}

/// Transient progress snapshot, overwritten on every phase transition
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntermediateState {
    pub phase: Phase,
    pub test_id: Option<String>,
}

impl IntermediateState {
    pub fn building() -> Self {
        Self {
            phase: Phase::Building,
            test_id: None,
        }
    }

    pub fn testing(test_id: &str) -> Self {
        Self {
            phase: Phase::Testing,
            test_id: Some(test_id.to_string()),
        }
    }
}

/// Status of process execution - closed set
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Process exited with code 0 and no limit was breached
    #[serde(rename = "OK")]
    Ok,
    /// Non-zero exit or fatal signal
    #[serde(rename = "RUNTIME_ERROR")]
    RuntimeError,
    /// CPU time limit exceeded
    #[serde(rename = "TIME_LIMIT_EXCEEDED")]
    TimeLimit,
    /// Wall clock limit exceeded
    #[serde(rename = "REAL_TIME_LIMIT_EXCEEDED")]
    RealTimeLimit,
    #[serde(rename = "MEMORY_LIMIT_EXCEEDED")]
    MemoryLimit,
    #[serde(rename = "OUTPUT_LIMIT_EXCEEDED")]
    OutputLimit,
    #[serde(rename = "PROCESS_LIMIT_EXCEEDED")]
    ProcessLimit,
}

/// An unclassified execution counts as a runtime error
impl Default for ExecutionStatus {
    fn default() -> Self {
        ExecutionStatus::RuntimeError
    }
}

/// Execution half of a test result
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Execution {
    pub status: ExecutionStatus,
    pub exit_code: Option<i32>,
    pub term_signal: Option<i32>,
    /// CPU time used (milliseconds)
    pub time_usage_millis: u64,
    /// Wall clock time used (milliseconds)
    pub real_time_usage_millis: u64,
    /// Peak memory usage (bytes)
    pub memory_usage_bytes: u64,
}

/// Checker verdict - closed set of four
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum CheckingStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "WRONG_ANSWER")]
    WrongAnswer,
    #[serde(rename = "PRESENTATION_ERROR")]
    PresentationError,
    /// The checker itself malfunctioned or the test data is broken
    #[serde(rename = "FAIL_TEST")]
    FailTest,
}

/// Checking half of a test result
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Checking {
    pub status: CheckingStatus,
    pub output: String,
}

/// Bytes captured from a sandbox file after execution
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CapturedFile {
    pub id: String,
    pub data: Vec<u8>,
}

/// Outcome of running the solution on one test
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TestResult {
    pub id: String,
    pub execution: Execution,
    /// Absent whenever execution was not OK
    pub checking: Option<Checking>,
    pub files: Vec<CapturedFile>,
}

impl TestResult {
    /// The one pass predicate: execution OK and checker OK
    pub fn passed(&self) -> bool {
        self.execution.status == ExecutionStatus::Ok
            && matches!(
                self.checking,
                Some(Checking {
                    status: CheckingStatus::Ok,
                    ..
                })
            )
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum BuildStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "FAILED")]
    Failed,
}

impl Default for BuildStatus {
    fn default() -> Self {
        BuildStatus::Failed
    }
}

/// Build outcome recorded by the builder
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct BuildResult {
    pub status: BuildStatus,
    /// Compiler diagnostics or builder notes
    pub output: String,
    /// Compiler execution details, when a compiler ran
    pub execution: Option<Execution>,
}

/// Result of judging a whole task
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionReport {
    pub build: BuildResult,
    /// Ordered by test id
    pub tests: Vec<TestResult>,
}

impl SessionReport {
    pub fn passed_count(&self) -> usize {
        self.tests.iter().filter(|t| t.passed()).count()
    }
}

/// Custom error types for rustjudge
#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error on {path}: {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown builder: {0}")]
    UnknownBuilder(String),

    #[error("Invalid test query: {0}")]
    InvalidTestQuery(String),

    #[error("Duplicate file id: {0}")]
    DuplicateFileId(String),

    #[error("Invalid file id: {0}")]
    InvalidFileId(String),

    #[error("Checker contract violation: {0}")]
    CheckerContract(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Sandbox error: {0}")]
    Sandbox(String),
}

impl JudgeError {
    /// Wrap an I/O error with the path it happened on
    pub fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        JudgeError::FileIo {
            path: path.into(),
            source,
        }
    }
}

impl From<nix::errno::Errno> for JudgeError {
    fn from(err: nix::errno::Errno) -> Self {
        JudgeError::Process(err.to_string())
    }
}

/// Result type alias for rustjudge operations
pub type Result<T> = std::result::Result<T, JudgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(status: ExecutionStatus, checking: Option<CheckingStatus>) -> TestResult {
        TestResult {
            id: "t".to_string(),
            execution: Execution {
                status,
                ..Default::default()
            },
            checking: checking.map(|status| Checking {
                status,
                output: String::new(),
            }),
            files: Vec::new(),
        }
    }

    #[test]
    fn test_passed_requires_both_conjuncts() {
        assert!(result_with(ExecutionStatus::Ok, Some(CheckingStatus::Ok)).passed());
        assert!(!result_with(ExecutionStatus::Ok, Some(CheckingStatus::WrongAnswer)).passed());
        assert!(!result_with(ExecutionStatus::Ok, Some(CheckingStatus::FailTest)).passed());
        assert!(!result_with(ExecutionStatus::RuntimeError, None).passed());
        assert!(!result_with(ExecutionStatus::Ok, None).passed());
    }

    #[test]
    fn test_default_execution_never_passes() {
        assert_eq!(Execution::default().status, ExecutionStatus::RuntimeError);
        let result = TestResult {
            id: "t".to_string(),
            execution: Execution::default(),
            checking: Some(Checking {
                status: CheckingStatus::Ok,
                output: String::new(),
            }),
            files: Vec::new(),
        };
        assert!(!result.passed());
    }

    #[test]
    fn test_stream_access_modes() {
        assert_eq!(Stream::Stdin.access_mode(), AccessMode::ReadOnly);
        assert_eq!(Stream::Stdout.access_mode(), AccessMode::WriteOnly);
        assert_eq!(Stream::Stderr.access_mode(), AccessMode::WriteOnly);
        assert_eq!(Stream::Stderr.fd(), 2);
    }

    #[test]
    fn test_process_settings_from_json() {
        let settings: ProcessSettings = serde_json::from_value(serde_json::json!({
            "resource_limits": {"time_limit_millis": 1000},
            "execution": {
                "arguments": ["--fast"],
                "redirections": [{"stream": "STDIN", "file_id": "in"}]
            },
            "files": [
                {"id": "in", "path": "a/b/input.txt", "init": "in"},
                {"id": "out", "path": "output.txt", "permissions": "0640"}
            ]
        }))
        .unwrap();

        assert_eq!(settings.resource_limits.time_limit_millis, Some(1000));
        assert_eq!(settings.execution.redirections[0].stream, Stream::Stdin);
        assert_eq!(settings.files[0].permissions, 0o600);
        assert_eq!(settings.files[0].init.as_deref(), Some("in"));
        assert!(settings.files[0].receive.is_none());
        assert_eq!(settings.files[1].permissions, 0o640);
    }

    #[test]
    fn test_checker_settings_tagged() {
        let checker: CheckerSettings = serde_json::from_value(serde_json::json!({
            "type": "tokens", "expected": "out", "produced": "stdout"
        }))
        .unwrap();
        assert_eq!(
            checker,
            CheckerSettings::Tokens {
                expected: "out".to_string(),
                produced: "stdout".to_string()
            }
        );
    }
}
