/// Judge configuration loading from a JSON file
use crate::config::types::{JudgeError, OwnerId, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Compiler override for a compiling builder
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompilerConfig {
    /// Host path of the compiler executable
    pub executable: PathBuf,
    #[serde(default)]
    pub flags: Vec<String>,
    /// Filename the source is staged under inside the build directory
    pub source_name: String,
}

/// Full judge configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JudgeConfig {
    /// Host directory used as the container root; a fresh one per session
    /// when unset
    pub sandbox_root: Option<PathBuf>,
    /// Identity the solution runs as and owns its files as
    pub owner_id: OwnerId,
    /// Strict mode: fail hard when owner changes, privilege drop or limits
    /// cannot be applied
    pub strict_mode: bool,
    /// Builder id -> compiler override
    pub compilers: HashMap<String, CompilerConfig>,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            sandbox_root: None,
            owner_id: OwnerId::default(),
            strict_mode: true,
            compilers: HashMap::new(),
        }
    }
}

impl JudgeConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            JudgeError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| JudgeError::Config(format!("Failed to parse config JSON: {}", e)))
    }

    /// Runtime root directory scoped by effective UID.
    /// Prevents root and non-root runs from colliding on a shared temp dir.
    pub fn runtime_root_dir() -> PathBuf {
        let euid = nix::unistd::geteuid();
        std::env::temp_dir().join(format!("rustjudge-uid-{}", euid))
    }

    /// Sandbox root for one session: the configured root, or a fresh
    /// directory under [`Self::runtime_root_dir`]
    pub fn session_root(&self) -> PathBuf {
        match self.sandbox_root {
            Some(ref root) => root.clone(),
            None => Self::runtime_root_dir().join(uuid::Uuid::new_v4().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_empty_object() {
        let config = JudgeConfig::from_json("{}").unwrap();
        assert_eq!(config, JudgeConfig::default());
        assert!(config.strict_mode);
        assert_eq!(config.owner_id, OwnerId::new(1000, 1000));
    }

    #[test]
    fn test_compiler_overrides() {
        let config = JudgeConfig::from_json(
            r#"{
                "strict_mode": false,
                "owner_id": {"uid": 65534, "gid": 65534},
                "compilers": {
                    "cpp": {"executable": "/usr/bin/clang++", "flags": ["-O2"], "source_name": "main.cpp"}
                }
            }"#,
        )
        .unwrap();

        assert!(!config.strict_mode);
        assert_eq!(config.owner_id.uid, 65534);
        assert_eq!(
            config.compilers["cpp"].executable,
            PathBuf::from("/usr/bin/clang++")
        );
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        assert!(matches!(
            JudgeConfig::from_json("{not json"),
            Err(JudgeError::Config(_))
        ));
    }

    #[test]
    fn test_session_roots_are_distinct() {
        let config = JudgeConfig::default();
        assert_ne!(config.session_root(), config.session_root());

        let pinned = JudgeConfig {
            sandbox_root: Some(PathBuf::from("/srv/judge")),
            ..Default::default()
        };
        assert_eq!(pinned.session_root(), PathBuf::from("/srv/judge"));
    }
}
