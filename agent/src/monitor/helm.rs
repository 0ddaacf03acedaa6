//! Helm release monitor

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::deploy::backend::HelmBackend;
use crate::deploy::naming::release_name;
use crate::errors::AgentError;
use crate::models::deployment::{ComponentStatus, ProfileType};
use crate::models::profile::{decode_profile, ComponentProperties};
use crate::monitor::health::classify;
use crate::monitor::poller::{self, StatusSource};
use crate::monitor::scope::WatchScope;
use crate::monitor::Monitor;
use crate::storage::state::StateStore;

/// Resolves component status through `helm status`
struct HelmStatusSource {
    backend: Arc<dyn HelmBackend>,
    store: Arc<dyn StateStore>,
    default_namespace: String,
}

#[async_trait]
impl StatusSource for HelmStatusSource {
    async fn get_status(
        &self,
        workload_id: &str,
        component: &str,
    ) -> Result<ComponentStatus, AgentError> {
        if workload_id.is_empty() || component.is_empty() {
            return Err(AgentError::ValidationError(
                "workload id and component name must not be empty".to_string(),
            ));
        }

        let deployment = self
            .store
            .get_deployment(workload_id)
            .await
            .map_err(|e| AgentError::get_deployment(workload_id, e))?;

        // Status queries must not fail just because nothing was deployed yet
        let profile = match deployment.effective_profile() {
            Some(profile) => profile,
            None => {
                return Ok(ComponentStatus::unknown(
                    "workload has no desired or current state",
                ))
            }
        };

        let spec = decode_profile(workload_id, profile)?;
        let spec_component = spec.component(component).ok_or_else(|| {
            AgentError::NotFound(format!(
                "component '{}' in workload '{}'",
                component, workload_id
            ))
        })?;
        let namespace = match &spec_component.properties {
            ComponentProperties::Helm(helm) => helm
                .namespace
                .clone()
                .filter(|ns| !ns.is_empty())
                .unwrap_or_else(|| self.default_namespace.clone()),
            _ => self.default_namespace.clone(),
        };

        let name = release_name(workload_id, component);
        let native = self
            .backend
            .status(&name, &namespace)
            .await
            .map_err(|e| AgentError::backend("status", workload_id, e))?;

        Ok(ComponentStatus::new(classify(&native), native))
    }
}

/// Polls each component's Helm release on a fixed interval
pub struct HelmMonitor {
    source: Arc<HelmStatusSource>,
    options: poller::Options,
    watches: Mutex<HashMap<String, WatchScope>>,
}

impl HelmMonitor {
    pub fn new(
        backend: Arc<dyn HelmBackend>,
        store: Arc<dyn StateStore>,
        default_namespace: impl Into<String>,
        options: poller::Options,
    ) -> Self {
        Self {
            source: Arc::new(HelmStatusSource {
                backend,
                store,
                default_namespace: default_namespace.into(),
            }),
            options,
            watches: Mutex::new(HashMap::new()),
        }
    }

    /// Workloads this monitor currently supervises
    pub fn watched(&self) -> Vec<String> {
        let watches = self.watches.lock().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = watches.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl Monitor for HelmMonitor {
    fn get_type(&self) -> ProfileType {
        ProfileType::helm_v3()
    }

    async fn watch(&self, workload_id: &str, scope: WatchScope) -> Result<(), AgentError> {
        if workload_id.is_empty() {
            return Err(AgentError::ValidationError(
                "workload id must not be empty".to_string(),
            ));
        }

        let deployment = self
            .source
            .store
            .get_deployment(workload_id)
            .await
            .map_err(|e| AgentError::get_deployment(workload_id, e))?;
        let profile = deployment.effective_profile().ok_or_else(|| {
            AgentError::ValidationError(format!(
                "workload '{}' has no desired or current state to watch",
                workload_id
            ))
        })?;
        let spec = decode_profile(workload_id, profile)?;

        if spec.components.is_empty() {
            warn!("Workload '{}' has no components to watch", workload_id);
        }

        for component in spec.component_names() {
            let source = self.source.clone();
            let options = self.options.clone();
            let workload_id = workload_id.to_string();
            let shutdown_signal = scope.cancelled();

            debug!(
                "Starting poller for release '{}'",
                release_name(&workload_id, &component)
            );
            scope.spawn(async move {
                poller::run(
                    &options,
                    source.as_ref(),
                    source.store.as_ref(),
                    &workload_id,
                    &component,
                    tokio::time::sleep,
                    shutdown_signal,
                )
                .await;
            });
        }

        let previous = {
            let mut watches = self.watches.lock().unwrap_or_else(|e| e.into_inner());
            watches.insert(workload_id.to_string(), scope.clone())
        };
        if let Some(previous) = previous {
            if !previous.same_as(&scope) {
                previous.cancel();
            }
        }

        info!(
            "Watching workload '{}' components [{}] every {:?}",
            workload_id,
            spec.component_names().join(", "),
            self.options.interval
        );
        Ok(())
    }

    async fn stop_watching(&self, workload_id: &str) -> Result<(), AgentError> {
        if workload_id.is_empty() {
            return Err(AgentError::ValidationError(
                "workload id must not be empty".to_string(),
            ));
        }

        let scope = {
            let mut watches = self.watches.lock().unwrap_or_else(|e| e.into_inner());
            watches.remove(workload_id)
        };
        match scope {
            Some(scope) => {
                scope.cancel();
                info!("Stopped watching workload '{}'", workload_id);
            }
            None => debug!("Workload '{}' was not being watched", workload_id),
        }
        Ok(())
    }

    async fn get_status(
        &self,
        workload_id: &str,
        component: &str,
    ) -> Result<ComponentStatus, AgentError> {
        self.source.get_status(workload_id, component).await
    }
}
