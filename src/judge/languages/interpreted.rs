use crate::config::loader::CompilerConfig;
use crate::config::types::{BuildResult, BuildStatus, OwnerId, ResourceLimits, Result};
use crate::core::container::Container;
use crate::judge::builder::{prepare_build_dir, stage_source, Builder, ExecutableSolution, Solution, BUILD_DIR};
use std::path::{Path, PathBuf};

/// Builder for interpreted languages: stages the source, compiles nothing
#[derive(Debug, Clone)]
pub struct InterpreterBuilder {
    id: &'static str,
    interpreter: PathBuf,
    flags: Vec<String>,
    source_name: String,
}

impl InterpreterBuilder {
    pub fn python() -> Self {
        Self {
            id: "python",
            interpreter: PathBuf::from("/usr/bin/python3"),
            flags: vec!["-B".to_string(), "-S".to_string()],
            source_name: "solution.py".to_string(),
        }
    }

    pub fn shell() -> Self {
        Self {
            id: "shell",
            interpreter: PathBuf::from("/bin/sh"),
            flags: Vec::new(),
            source_name: "solution.sh".to_string(),
        }
    }

    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }
}

impl Builder for InterpreterBuilder {
    fn id(&self) -> &'static str {
        self.id
    }

    fn build(
        &self,
        container: &mut dyn Container,
        owner_id: OwnerId,
        source: &Path,
        _limits: &ResourceLimits,
        result: &mut BuildResult,
    ) -> Result<Option<Box<dyn Solution>>> {
        let fs = container.filesystem();
        let location = prepare_build_dir(fs, owner_id)?.join(&self.source_name);
        stage_source(fs, source, &location, owner_id, 0o400)?;

        let mut leading_arguments = self.flags.clone();
        leading_arguments.push(fs.process_path(&location).to_string_lossy().to_string());

        result.status = BuildStatus::Ok;
        result.output = format!("{} source staged at {}", self.id, location.display());
        result.execution = None;
        log::debug!("{} source staged under {}", self.id, BUILD_DIR);

        Ok(Some(Box::new(ExecutableSolution {
            executable: self.interpreter.clone(),
            leading_arguments,
            owner_id,
        })))
    }

    fn configure(&mut self, config: &CompilerConfig) {
        self.interpreter = config.executable.clone();
        self.flags = config.flags.clone();
        self.source_name = config.source_name.clone();
    }
}
