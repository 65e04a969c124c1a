use crate::config::types::{JudgeError, Result};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// Read-only test data store
pub trait TestStore: Send + Sync {
    /// Every test id known to the store
    fn test_set(&self) -> HashSet<String>;

    /// Every data id known to the store
    fn data_set(&self) -> HashSet<String>;

    /// Host path of one piece of test data. The file need not exist.
    fn location(&self, test_id: &str, data_id: &str) -> PathBuf;

    /// Copy one piece of test data to `destination`, replacing its content
    fn copy(&self, test_id: &str, data_id: &str, destination: &Path) -> Result<()> {
        let source = self.location(test_id, data_id);
        std::fs::copy(&source, destination).map_err(|e| JudgeError::file_io(source, e))?;
        Ok(())
    }
}

/// Test data laid out as `<root>/<test_id>.<data_id>` files.
///
/// The data id is the text after the last dot. Directories and files
/// without a dot are ignored.
#[derive(Debug, Clone)]
pub struct DirectoryTestStore {
    root: PathBuf,
    tests: BTreeMap<String, BTreeSet<String>>,
}

impl DirectoryTestStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let entries = std::fs::read_dir(&root).map_err(|e| JudgeError::file_io(&root, e))?;

        let mut tests: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| JudgeError::file_io(&root, e))?;
            let file_type = entry
                .file_type()
                .map_err(|e| JudgeError::file_io(entry.path(), e))?;
            if file_type.is_dir() {
                continue;
            }

            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                log::warn!("Skipping non UTF-8 test file {:?}", entry.path());
                continue;
            };
            match split_name(name) {
                Some((test_id, data_id)) => {
                    tests
                        .entry(test_id.to_string())
                        .or_default()
                        .insert(data_id.to_string());
                }
                None => log::debug!("Ignoring {} without a data id", name),
            }
        }

        log::info!(
            "Loaded {} tests from {}",
            tests.len(),
            root.display()
        );
        Ok(Self { root, tests })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Data ids present for one test
    pub fn data_of(&self, test_id: &str) -> Option<&BTreeSet<String>> {
        self.tests.get(test_id)
    }
}

fn split_name(name: &str) -> Option<(&str, &str)> {
    let (test_id, data_id) = name.rsplit_once('.')?;
    if test_id.is_empty() || data_id.is_empty() {
        return None;
    }
    Some((test_id, data_id))
}

impl TestStore for DirectoryTestStore {
    fn test_set(&self) -> HashSet<String> {
        self.tests.keys().cloned().collect()
    }

    fn data_set(&self) -> HashSet<String> {
        self.tests.values().flatten().cloned().collect()
    }

    fn location(&self, test_id: &str, data_id: &str) -> PathBuf {
        self.root.join(format!("{}.{}", test_id, data_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with(files: &[(&str, &str)]) -> (TempDir, DirectoryTestStore) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            std::fs::write(dir.path().join(name), content).unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.dir")).unwrap();
        let store = DirectoryTestStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_universe_and_data_set() {
        let (_dir, store) = store_with(&[
            ("1.in", "1 2\n"),
            ("1.out", "3\n"),
            ("sample.v2.in", "5 5\n"),
            ("README", "ignored"),
            (".hidden", "ignored"),
        ]);

        let tests = store.test_set();
        assert_eq!(tests.len(), 2);
        assert!(tests.contains("1"));
        assert!(tests.contains("sample.v2"));

        let data = store.data_set();
        assert_eq!(data.len(), 2);
        assert!(data.contains("in") && data.contains("out"));
        assert_eq!(store.data_of("sample.v2").map(|d| d.len()), Some(1));
    }

    #[test]
    fn test_location_and_copy() {
        let (dir, store) = store_with(&[("7.in", "hello\n")]);
        assert_eq!(store.location("7", "in"), dir.path().join("7.in"));

        let target = dir.path().join("copied");
        std::fs::write(&target, "old content that is longer").unwrap();
        store.copy("7", "in", &target).unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello\n");
    }

    #[test]
    fn test_copy_missing_data_names_path() {
        let (dir, store) = store_with(&[]);
        let err = store.copy("9", "in", &dir.path().join("x")).unwrap_err();
        match err {
            JudgeError::FileIo { path, .. } => assert!(path.ends_with("9.in")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_root_is_io_error() {
        assert!(matches!(
            DirectoryTestStore::open("/nonexistent/rustjudge-tests"),
            Err(JudgeError::FileIo { .. })
        ));
    }
}
