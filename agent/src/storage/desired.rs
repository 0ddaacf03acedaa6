//! Desired-state file
//!
//! Local stand-in for the fleet manager: a JSON document listing every
//! workload that should run on the device.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::errors::AgentError;
use crate::models::deployment::{DeploymentProfile, WorkloadId};

/// One desired workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredWorkload {
    pub id: WorkloadId,
    pub profile: DeploymentProfile,
}

/// Desired state of the whole device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesiredState {
    #[serde(default)]
    pub workloads: Vec<DesiredWorkload>,
}

/// Reference to the desired-state file on disk
#[derive(Debug, Clone)]
pub struct DesiredStateFile {
    path: PathBuf,
}

impl DesiredStateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the file. A missing file means "nothing desired".
    pub async fn read(&self) -> Result<DesiredState, AgentError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(DesiredState::default())
            }
            Err(e) => return Err(e.into()),
        };
        let state: DesiredState = serde_json::from_str(&contents)?;

        let mut ids = std::collections::HashSet::new();
        for workload in &state.workloads {
            if workload.id.is_empty() {
                return Err(AgentError::ValidationError(format!(
                    "{}: workload id must not be empty",
                    self.path.display()
                )));
            }
            if !ids.insert(workload.id.as_str()) {
                return Err(AgentError::ValidationError(format!(
                    "{}: workload '{}' listed more than once",
                    self.path.display(),
                    workload.id
                )));
            }
        }
        Ok(state)
    }

    /// Write the file, replacing it atomically
    pub async fn write(&self, state: &DesiredState) -> Result<(), AgentError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, serde_json::to_vec_pretty(state)?).await?;
        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}
