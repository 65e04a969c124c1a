use crate::config::types::{BuildResult, JudgeError, OwnerId, ResourceLimits, Result};
use crate::config::loader::CompilerConfig;
use crate::core::container::{Container, JailFilesystem};
use crate::core::types::ProcessSpec;
use std::path::{Path, PathBuf};

/// Jail directory a builder stages sources and artifacts in
pub const BUILD_DIR: &str = "/tmp/build";

/// Runnable artifact produced by a builder, alive for the whole session
pub trait Solution: Send {
    /// Process description for one run; `arguments` are appended verbatim
    fn create(&self, arguments: &[String]) -> ProcessSpec;
}

/// Builder contract: turn a source into a runnable [`Solution`].
///
/// Build failures are recorded into `result` and reported as `Ok(None)`.
/// `Err` is reserved for failures of the judge itself.
pub trait Builder: Send + Sync {
    fn id(&self) -> &'static str;

    fn build(
        &self,
        container: &mut dyn Container,
        owner_id: OwnerId,
        source: &Path,
        limits: &ResourceLimits,
        result: &mut BuildResult,
    ) -> Result<Option<Box<dyn Solution>>>;

    /// Replace the tool and flags with an operator override
    fn configure(&mut self, config: &CompilerConfig);
}

/// Solution started as `executable [leading_arguments..] [arguments..]`
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutableSolution {
    /// Path as seen by the sandboxed process
    pub executable: PathBuf,
    pub leading_arguments: Vec<String>,
    pub owner_id: OwnerId,
}

impl Solution for ExecutableSolution {
    fn create(&self, arguments: &[String]) -> ProcessSpec {
        let mut spec = ProcessSpec::new(&self.executable)
            .with_arguments(self.leading_arguments.iter().cloned())
            .with_arguments(arguments.iter().cloned());
        spec.owner_id = Some(self.owner_id);
        spec
    }
}

/// Create [`BUILD_DIR`] and hand it to the sandbox identity
pub fn prepare_build_dir(fs: &dyn JailFilesystem, owner_id: OwnerId) -> Result<PathBuf> {
    let location = PathBuf::from(BUILD_DIR);
    let host = fs.keep_in_root(&location);
    std::fs::create_dir_all(&host).map_err(|e| JudgeError::file_io(&host, e))?;
    fs.set_owner_id(&location, owner_id)?;
    fs.set_mode(&location, 0o700)?;
    Ok(location)
}

/// Copy a host source file to a jail location owned by the sandbox identity
pub fn stage_source(
    fs: &dyn JailFilesystem,
    source: &Path,
    location: &Path,
    owner_id: OwnerId,
    mode: u32,
) -> Result<()> {
    let host = fs.keep_in_root(location);
    std::fs::copy(source, &host).map_err(|e| JudgeError::file_io(source, e))?;
    fs.set_owner_id(location, owner_id)?;
    fs.set_mode(location, mode)?;
    Ok(())
}

/// Create an empty file at a jail location owned by the sandbox identity
pub fn touch(fs: &dyn JailFilesystem, location: &Path, owner_id: OwnerId, mode: u32) -> Result<()> {
    let host = fs.keep_in_root(location);
    std::fs::File::create(&host).map_err(|e| JudgeError::file_io(&host, e))?;
    fs.set_owner_id(location, owner_id)?;
    fs.set_mode(location, mode)?;
    Ok(())
}
