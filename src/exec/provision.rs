/// File provisioning
///
/// Staging the sandbox working directory is an explicit, ordered list of
/// actions: working directory first, then its metadata, then every declared
/// file followed by that file's metadata. The list is built and validated
/// without touching the sandbox; only [`ProvisionPlan::apply`] has effects.
use crate::config::types::{
    FileSpec, JudgeError, OwnerId, ReceiveRange, Result, SANDBOX_FILE_MODE_MASK, SANDBOX_WORKDIR,
    SANDBOX_WORKDIR_MODE,
};
use crate::config::validator::flattened_name;
use crate::core::container::JailFilesystem;
use crate::testdata::TestStore;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One provisioning step. Every location is a jail location.
#[derive(Debug, Clone, PartialEq)]
pub enum ProvisionAction {
    CreateDir { location: PathBuf },
    SetOwner { location: PathBuf, owner_id: OwnerId },
    SetMode { location: PathBuf, mode: u32 },
    /// Replace the file with test data `data_id` of the current test
    CopyData { data_id: String, location: PathBuf },
    /// Replace the file with an empty one
    Touch { location: PathBuf },
}

/// File whose content is captured after execution
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiveRequest {
    pub id: String,
    pub location: PathBuf,
    pub range: ReceiveRange,
}

/// Declared files as they exist inside the jail
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisionedFiles {
    /// File id -> jail location
    pub files: HashMap<String, PathBuf>,
    /// In declaration order
    pub receive: Vec<ReceiveRequest>,
}

#[derive(Debug, Clone)]
pub struct ProvisionPlan {
    actions: Vec<ProvisionAction>,
    provisioned: ProvisionedFiles,
}

impl ProvisionPlan {
    /// Build the plan for `files`, in declaration order.
    ///
    /// `files` must have passed [`validate_process_settings`], which rejects
    /// duplicate ids.
    ///
    /// [`validate_process_settings`]: crate::config::validator::validate_process_settings
    pub fn new(files: &[FileSpec], owner_id: OwnerId) -> Result<Self> {
        let workdir = PathBuf::from(SANDBOX_WORKDIR);
        let mut actions = vec![
            ProvisionAction::CreateDir {
                location: workdir.clone(),
            },
            ProvisionAction::SetOwner {
                location: workdir.clone(),
                owner_id,
            },
            ProvisionAction::SetMode {
                location: workdir.clone(),
                mode: SANDBOX_WORKDIR_MODE,
            },
        ];

        let mut provisioned = ProvisionedFiles::default();
        for file in files {
            let name = flattened_name(&file.path).ok_or_else(|| {
                JudgeError::Config(format!(
                    "file {:?} has no filename component in path {:?}",
                    file.id, file.path
                ))
            })?;
            let location = workdir.join(name);

            actions.push(match &file.init {
                Some(data_id) => ProvisionAction::CopyData {
                    data_id: data_id.clone(),
                    location: location.clone(),
                },
                None => ProvisionAction::Touch {
                    location: location.clone(),
                },
            });
            actions.push(ProvisionAction::SetOwner {
                location: location.clone(),
                owner_id,
            });
            actions.push(ProvisionAction::SetMode {
                location: location.clone(),
                mode: file.permissions & SANDBOX_FILE_MODE_MASK,
            });

            if let Some(range) = &file.receive {
                provisioned.receive.push(ReceiveRequest {
                    id: file.id.clone(),
                    location: location.clone(),
                    range: range.clone(),
                });
            }
            provisioned.files.insert(file.id.clone(), location);
        }

        Ok(Self {
            actions,
            provisioned,
        })
    }

    pub fn actions(&self) -> &[ProvisionAction] {
        &self.actions
    }

    pub fn files(&self) -> &ProvisionedFiles {
        &self.provisioned
    }

    /// Run every action in order for `test_id`
    pub fn apply(
        self,
        test_id: &str,
        fs: &dyn JailFilesystem,
        store: &dyn TestStore,
    ) -> Result<ProvisionedFiles> {
        for action in &self.actions {
            log::debug!("provision {:?}", action);
            match action {
                ProvisionAction::CreateDir { location } => {
                    let host = fs.keep_in_root(location);
                    std::fs::create_dir_all(&host).map_err(|e| JudgeError::file_io(&host, e))?;
                }
                ProvisionAction::SetOwner { location, owner_id } => {
                    fs.set_owner_id(location, *owner_id)?;
                }
                ProvisionAction::SetMode { location, mode } => {
                    fs.set_mode(location, *mode)?;
                }
                ProvisionAction::CopyData { data_id, location } => {
                    let host = fs.keep_in_root(location);
                    remove_stale(&host)?;
                    store.copy(test_id, data_id, &host)?;
                }
                ProvisionAction::Touch { location } => {
                    let host = fs.keep_in_root(location);
                    remove_stale(&host)?;
                    std::fs::File::create(&host).map_err(|e| JudgeError::file_io(&host, e))?;
                }
            }
        }
        Ok(self.provisioned)
    }
}

// Files left by a previous test may carry a read-only mode.
fn remove_stale(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(JudgeError::file_io(path, e)),
    }
}
