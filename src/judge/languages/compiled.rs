use crate::config::loader::CompilerConfig;
use crate::config::types::{
    AccessMode, BuildResult, BuildStatus, ExecutionStatus, JudgeError, OwnerId, ResourceLimits,
    Result, Stream,
};
use crate::core::container::Container;
use crate::core::types::{ProcessSpec, StreamTarget};
use crate::exec::process;
use crate::judge::builder::{
    prepare_build_dir, stage_source, touch, Builder, ExecutableSolution, Solution, BUILD_DIR,
};
use crate::verdict::VerdictClassifier;
use std::path::{Path, PathBuf};

const BINARY_NAME: &str = "solution";
const COMPILER_STDOUT: &str = "compiler.stdout";
const COMPILER_STDERR: &str = "compiler.stderr";

/// Builder that compiles the source inside the sandbox
#[derive(Debug, Clone)]
pub struct CompilerBuilder {
    id: &'static str,
    compiler: PathBuf,
    flags: Vec<String>,
    source_name: String,
}

impl CompilerBuilder {
    pub fn cpp() -> Self {
        Self {
            id: "cpp",
            compiler: PathBuf::from("/usr/bin/g++"),
            flags: vec!["-std=c++17".to_string(), "-O2".to_string(), "-pipe".to_string()],
            source_name: "solution.cpp".to_string(),
        }
    }

    pub fn c() -> Self {
        Self {
            id: "c",
            compiler: PathBuf::from("/usr/bin/gcc"),
            flags: vec!["-std=c11".to_string(), "-O2".to_string(), "-pipe".to_string()],
            source_name: "solution.c".to_string(),
        }
    }

    pub fn compiler(&self) -> &Path {
        &self.compiler
    }

    fn compile_arguments(&self, source: PathBuf, binary: PathBuf) -> Vec<String> {
        let mut arguments = self.flags.clone();
        arguments.push("-o".to_string());
        arguments.push(binary.to_string_lossy().to_string());
        arguments.push(source.to_string_lossy().to_string());
        arguments
    }
}

fn read_lossy(path: &Path) -> Result<String> {
    std::fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .map_err(|e| JudgeError::file_io(path, e))
}

impl Builder for CompilerBuilder {
    fn id(&self) -> &'static str {
        self.id
    }

    fn build(
        &self,
        container: &mut dyn Container,
        owner_id: OwnerId,
        source: &Path,
        limits: &ResourceLimits,
        result: &mut BuildResult,
    ) -> Result<Option<Box<dyn Solution>>> {
        let build_dir = Path::new(BUILD_DIR);
        let source_location = build_dir.join(&self.source_name);
        let binary_location = build_dir.join(BINARY_NAME);
        let stdout_location = build_dir.join(COMPILER_STDOUT);
        let stderr_location = build_dir.join(COMPILER_STDERR);

        let mut spec = {
            let fs = container.filesystem();
            prepare_build_dir(fs, owner_id)?;
            stage_source(fs, source, &source_location, owner_id, 0o400)?;
            touch(fs, &stdout_location, owner_id, 0o600)?;
            touch(fs, &stderr_location, owner_id, 0o600)?;

            ProcessSpec::new(&self.compiler).with_arguments(self.compile_arguments(
                fs.process_path(&source_location),
                fs.process_path(&binary_location),
            ))
        };
        spec.owner_id = Some(owner_id);
        spec.current_path = build_dir.to_path_buf();
        spec.set_stream(
            Stream::Stdout,
            StreamTarget::File {
                location: stdout_location.clone(),
                mode: AccessMode::WriteOnly,
            },
        );
        spec.set_stream(
            Stream::Stderr,
            StreamTarget::File {
                location: stderr_location.clone(),
                mode: AccessMode::WriteOnly,
            },
        );

        let mut group = container.create_process_group()?;
        process::setup(limits, group.as_mut(), &mut spec);
        let process_id = group.add_process(spec)?;
        let group_result = group.synchronized_call()?;
        let process_result = group.process_result(process_id)?;
        let execution = VerdictClassifier::classify_execution(&group_result, &process_result);

        let fs = container.filesystem();
        let mut output = read_lossy(&fs.keep_in_root(&stdout_location))?;
        output.push_str(&read_lossy(&fs.keep_in_root(&stderr_location))?);
        result.output = output;
        result.execution = Some(execution.clone());

        if execution.status != ExecutionStatus::Ok {
            log::info!(
                "{} build failed: {:?} (exit {:?})",
                self.id,
                execution.status,
                execution.exit_code
            );
            result.status = BuildStatus::Failed;
            return Ok(None);
        }

        result.status = BuildStatus::Ok;
        log::info!("{} build succeeded", self.id);
        Ok(Some(Box::new(ExecutableSolution {
            executable: fs.process_path(&binary_location),
            leading_arguments: Vec::new(),
            owner_id,
        })))
    }

    fn configure(&mut self, config: &CompilerConfig) {
        self.compiler = config.executable.clone();
        self.flags = config.flags.clone();
        self.source_name = config.source_name.clone();
    }
}
