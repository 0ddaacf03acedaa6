//! Docker Compose deployer
//!
//! Registered so compose workloads resolve to a strategy, but no operation is
//! implemented yet.

use async_trait::async_trait;
use tracing::warn;

use crate::deploy::Deployer;
use crate::errors::AgentError;
use crate::models::deployment::ProfileType;
use crate::models::profile::DeploymentSpec;

#[derive(Debug, Default)]
pub struct ComposeDeployer;

impl ComposeDeployer {
    pub fn new() -> Self {
        Self
    }
}

fn not_implemented(operation: &str, workload_id: &str) -> AgentError {
    warn!("Compose {} requested for workload '{}'", operation, workload_id);
    AgentError::NotImplemented(format!("compose deployer: {}", operation))
}

#[async_trait]
impl Deployer for ComposeDeployer {
    fn get_type(&self) -> ProfileType {
        ProfileType::compose()
    }

    async fn deploy(&self, spec: &DeploymentSpec) -> Result<(), AgentError> {
        Err(not_implemented("deploy", &spec.workload_id))
    }

    async fn update(&self, spec: &DeploymentSpec) -> Result<(), AgentError> {
        Err(not_implemented("update", &spec.workload_id))
    }

    async fn remove(&self, workload_id: &str) -> Result<(), AgentError> {
        Err(not_implemented("remove", workload_id))
    }
}
