use crate::config::types::{OwnerId, Result};
use crate::core::types::{ProcessGroupResult, ProcessId, ProcessResult, ProcessSpec};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Filesystem view of a container jail.
///
/// Every `location` is a path as seen from inside the jail.
pub trait JailFilesystem {
    /// Host path backing `location`; never escapes the jail root
    fn keep_in_root(&self, location: &Path) -> PathBuf;

    /// Path under which a sandboxed process addresses `location`
    fn process_path(&self, location: &Path) -> PathBuf;

    fn set_owner_id(&self, location: &Path, owner_id: OwnerId) -> Result<()>;

    fn set_mode(&self, location: &Path, mode: u32) -> Result<()>;
}

/// A set of sandboxed processes observed and terminated as one unit
pub trait ProcessGroup {
    /// Wall clock ceiling for the whole group
    fn set_real_time_limit(&mut self, limit: Option<Duration>);

    /// Bind a process to this group. Nothing runs before `synchronized_call`.
    fn add_process(&mut self, spec: ProcessSpec) -> Result<ProcessId>;

    /// Run every bound process and block until the whole group terminates
    fn synchronized_call(&mut self) -> Result<ProcessGroupResult>;

    /// Result of one process; available only after `synchronized_call`
    fn process_result(&self, id: ProcessId) -> Result<ProcessResult>;
}

/// Isolated execution environment
pub trait Container: Send {
    fn create_process_group(&mut self) -> Result<Box<dyn ProcessGroup>>;

    fn filesystem(&self) -> &dyn JailFilesystem;
}

/// Join `location` under `root` without ever leaving `root`.
///
/// Root and prefix components are dropped, `..` cannot climb above the jail.
pub fn jail_path(root: &Path, location: &Path) -> PathBuf {
    let mut inner = PathBuf::new();
    for component in location.components() {
        match component {
            Component::Normal(part) => inner.push(part),
            Component::ParentDir => {
                inner.pop();
            }
            Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
        }
    }
    root.join(inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jail_path_stays_in_root() {
        let root = Path::new("/srv/jail");
        assert_eq!(
            jail_path(root, Path::new("/tmp/testing/input.txt")),
            PathBuf::from("/srv/jail/tmp/testing/input.txt")
        );
        assert_eq!(
            jail_path(root, Path::new("/../../etc/passwd")),
            PathBuf::from("/srv/jail/etc/passwd")
        );
        assert_eq!(
            jail_path(root, Path::new("tmp/./a/../b")),
            PathBuf::from("/srv/jail/tmp/b")
        );
        assert_eq!(jail_path(root, Path::new("/")), PathBuf::from("/srv/jail"));
    }
}
