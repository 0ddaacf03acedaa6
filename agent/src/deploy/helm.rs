//! Helm chart deployer

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::deploy::backend::{HelmBackend, HelmRelease};
use crate::deploy::naming::release_name;
use crate::deploy::Deployer;
use crate::errors::AgentError;
use crate::models::deployment::ProfileType;
use crate::models::profile::{decode_profile, ComponentProperties, ComponentSpec, DeploymentSpec};
use crate::storage::state::StateStore;

/// Deploys every component of a workload as its own Helm release
pub struct HelmDeployer {
    backend: Arc<dyn HelmBackend>,
    store: Arc<dyn StateStore>,
    default_namespace: String,
}

impl HelmDeployer {
    pub fn new(
        backend: Arc<dyn HelmBackend>,
        store: Arc<dyn StateStore>,
        default_namespace: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            store,
            default_namespace: default_namespace.into(),
        }
    }

    /// Build the releases for a deployment, rejecting anything incomplete before
    /// the backend is touched.
    fn releases(&self, spec: &DeploymentSpec) -> Result<Vec<HelmRelease>, AgentError> {
        if spec.workload_id.is_empty() {
            return Err(AgentError::ValidationError(
                "workload id must not be empty".to_string(),
            ));
        }
        if spec.components.is_empty() {
            return Err(AgentError::ValidationError(format!(
                "deployment of workload '{}' has no components",
                spec.workload_id
            )));
        }

        spec.components
            .iter()
            .map(|component| self.release(&spec.workload_id, component))
            .collect()
    }

    fn release(&self, workload_id: &str, component: &ComponentSpec) -> Result<HelmRelease, AgentError> {
        let helm = match &component.properties {
            ComponentProperties::Helm(helm) => helm,
            _ => {
                return Err(AgentError::ValidationError(format!(
                    "component '{}' of workload '{}' is not a {} component",
                    component.name,
                    workload_id,
                    ProfileType::HELM_V3
                )))
            }
        };

        if helm.repository.trim().is_empty() {
            return Err(AgentError::ValidationError(format!(
                "component '{}' of workload '{}' has no repository",
                component.name, workload_id
            )));
        }
        let version = match helm.revision.as_deref().map(str::trim) {
            Some(revision) if !revision.is_empty() => revision.to_string(),
            _ => {
                return Err(AgentError::ValidationError(format!(
                    "component '{}' of workload '{}' has no revision",
                    component.name, workload_id
                )))
            }
        };

        let (chart, repository) = match &helm.chart {
            Some(chart) if !chart.is_empty() => (chart.clone(), Some(helm.repository.clone())),
            _ => (helm.repository.clone(), None),
        };

        Ok(HelmRelease {
            name: release_name(workload_id, &component.name),
            chart,
            repository,
            version: Some(version),
            namespace: self.namespace(helm.namespace.as_deref()),
            values: helm.values.clone(),
        })
    }

    /// Install missing releases and upgrade existing ones
    async fn ensure_releases(
        &self,
        operation: &str,
        workload_id: &str,
        releases: &[HelmRelease],
    ) -> Result<(), AgentError> {
        for release in releases {
            let exists = self
                .backend
                .release_exists(&release.name, &release.namespace)
                .await
                .map_err(|e| AgentError::backend(operation, workload_id, e))?;

            let result = if exists {
                info!(workload = %workload_id, release = %release.name, "Upgrading helm release");
                self.backend.upgrade(release).await
            } else {
                info!(workload = %workload_id, release = %release.name, "Installing helm release");
                self.backend.install(release).await
            };
            result.map_err(|e| AgentError::backend(operation, workload_id, e))?;
        }
        Ok(())
    }

    fn namespace(&self, namespace: Option<&str>) -> String {
        match namespace {
            Some(ns) if !ns.is_empty() => ns.to_string(),
            _ => self.default_namespace.clone(),
        }
    }
}

#[async_trait]
impl Deployer for HelmDeployer {
    fn get_type(&self) -> ProfileType {
        ProfileType::helm_v3()
    }

    async fn deploy(&self, spec: &DeploymentSpec) -> Result<(), AgentError> {
        let releases = self.releases(spec)?;
        self.ensure_releases("deploy", &spec.workload_id, &releases).await
    }

    async fn update(&self, spec: &DeploymentSpec) -> Result<(), AgentError> {
        let releases = self.releases(spec)?;
        self.ensure_releases("update", &spec.workload_id, &releases).await
    }

    async fn remove(&self, workload_id: &str) -> Result<(), AgentError> {
        if workload_id.is_empty() {
            return Err(AgentError::ValidationError(
                "workload id must not be empty".to_string(),
            ));
        }

        let deployment = self
            .store
            .get_deployment(workload_id)
            .await
            .map_err(|e| AgentError::get_deployment(workload_id, e))?;
        let current = deployment.current.as_ref().ok_or_else(|| {
            AgentError::ValidationError(format!(
                "workload '{}' has no recorded current state to remove",
                workload_id
            ))
        })?;
        let spec = decode_profile(workload_id, current)?;

        // Uninstall every release even if one of them fails
        let mut first_err = None;
        for component in &spec.components {
            let namespace = match &component.properties {
                ComponentProperties::Helm(helm) => self.namespace(helm.namespace.as_deref()),
                _ => self.default_namespace.clone(),
            };
            let name = release_name(workload_id, &component.name);
            info!(workload = %workload_id, release = %name, "Uninstalling helm release");

            if let Err(e) = self.backend.uninstall(&name, &namespace).await {
                error!("Failed to uninstall release '{}': {}", name, e);
                if first_err.is_none() {
                    first_err = Some(AgentError::backend("remove", workload_id, e));
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
