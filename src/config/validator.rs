// Settings validation
// Runs before any sandbox interaction: a settings message that fails here
// never reaches the container.

use crate::config::loader::JudgeConfig;
use crate::config::types::{
    JudgeError, ProcessSettings, ResourceLimits, Result, Stream, SANDBOX_FILE_MODE_MASK,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Validation result with detailed errors
#[derive(Debug)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Filename component of a declared file path.
///
/// Directory components are discarded so that the file always lands directly
/// in the sandbox working directory.
pub fn flattened_name(path: &Path) -> Option<PathBuf> {
    path.file_name().map(PathBuf::from)
}

/// Validate process settings
///
/// Duplicate file ids and redirections to undeclared ids are fatal and
/// reported through their dedicated error variants. Everything else that is
/// merely suspicious is returned as a warning.
pub fn validate_process_settings(settings: &ProcessSettings) -> Result<ValidationResult> {
    let mut result = ValidationResult::new();

    let mut declared = HashSet::new();
    let mut names: HashMap<PathBuf, &str> = HashMap::new();
    for file in &settings.files {
        if !declared.insert(file.id.as_str()) {
            return Err(JudgeError::DuplicateFileId(file.id.clone()));
        }

        let Some(name) = flattened_name(&file.path) else {
            return Err(JudgeError::Config(format!(
                "file {:?} has no filename component in path {:?}",
                file.id, file.path
            )));
        };

        if name.as_path() != file.path.as_path() {
            result.add_warning(format!(
                "file {:?}: path {:?} flattened to {:?}",
                file.id, file.path, name
            ));
        }
        if let Some(previous) = names.insert(name.clone(), file.id.as_str()) {
            result.add_warning(format!(
                "files {:?} and {:?} share sandbox name {:?}",
                previous, file.id, name
            ));
        }
        if file.permissions & !SANDBOX_FILE_MODE_MASK != 0 {
            result.add_warning(format!(
                "file {:?}: permissions {:o} masked to {:o}",
                file.id,
                file.permissions,
                file.permissions & SANDBOX_FILE_MODE_MASK
            ));
        }
    }

    let mut bound: HashSet<Stream> = HashSet::new();
    for redirection in &settings.execution.redirections {
        if !declared.contains(redirection.file_id.as_str()) {
            return Err(JudgeError::InvalidFileId(redirection.file_id.clone()));
        }
        if !bound.insert(redirection.stream) {
            result.add_warning(format!(
                "{:?} redirected more than once; last binding wins",
                redirection.stream
            ));
        }
    }

    if let Some(ref requested) = settings.execution.current_path {
        result.add_warning(format!(
            "requested current path {:?} ignored",
            requested
        ));
    }

    validate_limits(&settings.resource_limits, &mut result);

    if !result.is_valid() {
        return Err(JudgeError::Config(result.errors.join("\n")));
    }

    Ok(result)
}

/// Validate resource limits
fn validate_limits(limits: &ResourceLimits, result: &mut ValidationResult) {
    if limits.time_limit_millis == Some(0) {
        result.add_error("time_limit_millis cannot be zero".to_string());
    }
    if limits.real_time_limit_millis == Some(0) {
        result.add_error("real_time_limit_millis cannot be zero".to_string());
    }
    if limits.memory_limit_bytes == Some(0) {
        result.add_error("memory_limit_bytes cannot be zero".to_string());
    }
    if limits.number_of_processes == Some(0) {
        result.add_error("number_of_processes cannot be zero".to_string());
    }

    if let Some(memory_limit) = limits.memory_limit_bytes {
        if memory_limit > 0 && memory_limit < 1024 * 1024 {
            result.add_warning(format!(
                "memory_limit_bytes {} is very low (< 1MB), may cause OOM",
                memory_limit
            ));
        }
    }

    if let (Some(cpu), Some(wall)) = (limits.time_limit_millis, limits.real_time_limit_millis) {
        if wall < cpu {
            result.add_warning(format!(
                "real_time_limit_millis ({}) is below time_limit_millis ({})",
                wall, cpu
            ));
        }
    }
}

/// Validate judge configuration at startup
///
/// Strict mode must fail fast on an unusable sandbox identity.
pub fn validate_config(config: &JudgeConfig) -> Result<ValidationResult> {
    let mut result = ValidationResult::new();

    if let Some(ref root) = config.sandbox_root {
        if !root.is_absolute() {
            result.add_error(format!("sandbox_root must be absolute path: {:?}", root));
        }
    }

    if config.strict_mode {
        if config.owner_id.uid == 0 {
            result.add_error(
                "owner uid cannot be 0 (root) for untrusted solutions in strict mode".to_string(),
            );
        }
        if config.owner_id.gid == 0 {
            result.add_error(
                "owner gid cannot be 0 (root) for untrusted solutions in strict mode".to_string(),
            );
        }
    }

    for (id, compiler) in &config.compilers {
        if compiler.source_name.contains('/') {
            result.add_error(format!(
                "compiler {:?}: source_name must be a bare filename",
                id
            ));
        }
    }

    if !result.is_valid() {
        return Err(JudgeError::Config(format!(
            "Config validation failed:\n{}",
            result.errors.join("\n")
        )));
    }

    Ok(result)
}
