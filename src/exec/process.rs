use crate::config::types::{
    ExecutionSettings, JudgeError, OwnerId, ResourceLimits, Result, SANDBOX_WORKDIR,
};
use crate::core::container::ProcessGroup;
use crate::core::types::{ProcessSpec, StreamTarget};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Apply resource limits to a process and its group
pub fn setup(limits: &ResourceLimits, group: &mut dyn ProcessGroup, spec: &mut ProcessSpec) {
    spec.resource_limits = limits.clone();
    group.set_real_time_limit(limits.real_time_limit_millis.map(Duration::from_millis));
}

/// Pin the process to the sandbox identity and bind its standard streams.
///
/// The requested current path is never honored. A redirection to an
/// undeclared file id fails here, before the process can start.
pub fn bind(
    spec: &mut ProcessSpec,
    owner_id: OwnerId,
    execution: &ExecutionSettings,
    files: &HashMap<String, PathBuf>,
) -> Result<()> {
    spec.owner_id = Some(owner_id);
    spec.current_path = PathBuf::from(SANDBOX_WORKDIR);
    if let Some(requested) = &execution.current_path {
        log::debug!(
            "Ignoring requested current path {}, using {}",
            requested.display(),
            SANDBOX_WORKDIR
        );
    }

    for redirection in &execution.redirections {
        let location = files
            .get(&redirection.file_id)
            .ok_or_else(|| JudgeError::InvalidFileId(redirection.file_id.clone()))?;
        spec.set_stream(
            redirection.stream,
            StreamTarget::File {
                location: location.clone(),
                mode: redirection.stream.access_mode(),
            },
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{AccessMode, Redirection, Stream};
    use crate::core::types::{ProcessGroupResult, ProcessId, ProcessResult};

    #[derive(Default)]
    struct LimitOnlyGroup {
        real_time_limit: Option<Duration>,
    }

    impl ProcessGroup for LimitOnlyGroup {
        fn set_real_time_limit(&mut self, limit: Option<Duration>) {
            self.real_time_limit = limit;
        }

        fn add_process(&mut self, _spec: ProcessSpec) -> Result<ProcessId> {
            Ok(ProcessId(0))
        }

        fn synchronized_call(&mut self) -> Result<ProcessGroupResult> {
            Ok(ProcessGroupResult::default())
        }

        fn process_result(&self, _id: ProcessId) -> Result<ProcessResult> {
            Ok(ProcessResult::default())
        }
    }

    fn files() -> HashMap<String, PathBuf> {
        HashMap::from([
            ("in".to_string(), PathBuf::from("/tmp/testing/input.txt")),
            ("out".to_string(), PathBuf::from("/tmp/testing/output.txt")),
        ])
    }

    fn redirect(stream: Stream, file_id: &str) -> Redirection {
        Redirection {
            stream,
            file_id: file_id.to_string(),
        }
    }

    #[test]
    fn test_setup_applies_limits() {
        let limits = ResourceLimits {
            time_limit_millis: Some(1000),
            real_time_limit_millis: Some(3000),
            ..Default::default()
        };
        let mut group = LimitOnlyGroup::default();
        let mut spec = ProcessSpec::new("/tmp/build/solution");
        setup(&limits, &mut group, &mut spec);

        assert_eq!(spec.resource_limits, limits);
        assert_eq!(group.real_time_limit, Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_bind_streams_and_identity() {
        let execution = ExecutionSettings {
            arguments: Vec::new(),
            current_path: Some(PathBuf::from("/home/user")),
            redirections: vec![redirect(Stream::Stdin, "in"), redirect(Stream::Stdout, "out")],
        };
        let mut spec = ProcessSpec::new("/tmp/build/solution");
        bind(&mut spec, OwnerId::new(1000, 1000), &execution, &files()).unwrap();

        assert_eq!(spec.current_path, PathBuf::from("/tmp/testing"));
        assert_eq!(spec.owner_id, Some(OwnerId::new(1000, 1000)));
        assert_eq!(
            spec.stream(Stream::Stdin),
            &StreamTarget::File {
                location: PathBuf::from("/tmp/testing/input.txt"),
                mode: AccessMode::ReadOnly
            }
        );
        assert_eq!(
            spec.stream(Stream::Stdout),
            &StreamTarget::File {
                location: PathBuf::from("/tmp/testing/output.txt"),
                mode: AccessMode::WriteOnly
            }
        );
        assert_eq!(spec.stream(Stream::Stderr), &StreamTarget::Null);
    }

    #[test]
    fn test_dangling_redirection() {
        let execution = ExecutionSettings {
            redirections: vec![redirect(Stream::Stderr, "err")],
            ..Default::default()
        };
        let mut spec = ProcessSpec::new("/tmp/build/solution");
        let err = bind(&mut spec, OwnerId::default(), &execution, &files()).unwrap_err();
        assert!(matches!(err, JudgeError::InvalidFileId(ref id) if id == "err"));
    }
}
