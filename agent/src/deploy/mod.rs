//! Deployment strategies

pub mod backend;
pub mod compose;
pub mod helm;
pub mod naming;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::errors::AgentError;
use crate::models::deployment::{Deployment, ProfileType};
use crate::models::profile::{decode_profile, DeploymentSpec};
use crate::registry::Registry;

/// Deployment backend strategy for one profile type.
///
/// Deployers only invoke their backend; persisting the outcome is up to the
/// caller.
#[async_trait]
pub trait Deployer: Send + Sync {
    fn get_type(&self) -> ProfileType;

    async fn deploy(&self, spec: &DeploymentSpec) -> Result<(), AgentError>;

    async fn update(&self, spec: &DeploymentSpec) -> Result<(), AgentError>;

    /// Remove everything recorded in the workload's current state
    async fn remove(&self, workload_id: &str) -> Result<(), AgentError>;
}

/// What [`DeployerRegistry::apply`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Deployed,
    Updated,
    /// Profile type changed: removed with the old strategy, deployed with the new
    Replaced,
    Unchanged,
}

/// Deployers keyed by profile type
pub struct DeployerRegistry {
    deployers: Registry<dyn Deployer>,
}

impl DeployerRegistry {
    pub fn new(deployers: Vec<Arc<dyn Deployer>>) -> Result<Self, AgentError> {
        let mut registry = Registry::new("deployer");
        for deployer in deployers {
            registry.register(deployer.get_type(), deployer)?;
        }
        Ok(Self {
            deployers: registry,
        })
    }

    pub fn get(&self, profile_type: &ProfileType) -> Result<Arc<dyn Deployer>, AgentError> {
        self.deployers.get(profile_type)
    }

    pub fn available(&self) -> Vec<String> {
        self.deployers.available()
    }

    /// Drive the backend so the workload matches its desired state
    pub async fn apply(&self, deployment: &Deployment) -> Result<ApplyOutcome, AgentError> {
        let workload_id = deployment.workload_id.as_str();
        if workload_id.is_empty() {
            return Err(AgentError::ValidationError(
                "workload id must not be empty".to_string(),
            ));
        }
        let desired = deployment.desired.as_ref().ok_or_else(|| {
            AgentError::ValidationError(format!(
                "workload '{}' has no desired state",
                workload_id
            ))
        })?;
        let spec = decode_profile(workload_id, desired)?;
        let target = self.get(&desired.profile_type)?;

        match &deployment.current {
            None => {
                info!("Deploying workload '{}' ({})", workload_id, desired.profile_type);
                target.deploy(&spec).await?;
                Ok(ApplyOutcome::Deployed)
            }
            Some(current) if current == desired => Ok(ApplyOutcome::Unchanged),
            Some(current) if current.profile_type != desired.profile_type => {
                let previous = self.get(&current.profile_type)?;
                info!(
                    "Workload '{}' changes profile type {} -> {}, replacing",
                    workload_id, current.profile_type, desired.profile_type
                );
                previous.remove(workload_id).await?;
                target.deploy(&spec).await?;
                Ok(ApplyOutcome::Replaced)
            }
            Some(_) => {
                info!("Updating workload '{}' ({})", workload_id, desired.profile_type);
                target.update(&spec).await?;
                Ok(ApplyOutcome::Updated)
            }
        }
    }

    /// Remove a workload through the strategy of its current state.
    ///
    /// Returns `false` when nothing was ever deployed.
    pub async fn remove(&self, deployment: &Deployment) -> Result<bool, AgentError> {
        let current = match &deployment.current {
            Some(current) => current,
            None => return Ok(false),
        };
        let deployer = self.get(&current.profile_type)?;
        deployer.remove(&deployment.workload_id).await?;
        Ok(true)
    }
}
