//! In-process state store

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::errors::AgentError;
use crate::models::deployment::{
    ComponentStatus, DatabaseEvent, Deployment, DeploymentProfile, EventType,
};
use crate::storage::state::{StateStore, Subscriber};

/// Memory-backed [`StateStore`].
///
/// Desired/current writes emit events; component status writes do not.
/// Emission is serialized so every subscriber observes events in the order
/// they were produced.
pub struct MemoryStore {
    deployments: RwLock<HashMap<String, Deployment>>,
    subscribers: RwLock<Vec<Arc<dyn Subscriber>>>,
    emit_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            deployments: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(Vec::new()),
            emit_lock: Mutex::new(()),
        }
    }

    /// Set the desired state of a workload, creating it when missing
    pub async fn upsert_desired(
        &self,
        workload_id: &str,
        profile: DeploymentProfile,
    ) -> Result<(), AgentError> {
        validate_id(workload_id)?;
        let snapshot = {
            let mut deployments = self.deployments.write().unwrap_or_else(|e| e.into_inner());
            let deployment = deployments
                .entry(workload_id.to_string())
                .or_insert_with(|| Deployment::new(workload_id));
            deployment.desired = Some(profile);
            deployment.clone()
        };
        self.emit(DatabaseEvent::new(EventType::Added, snapshot)).await;
        Ok(())
    }

    /// Record the profile that was last applied successfully
    pub async fn set_current(
        &self,
        workload_id: &str,
        profile: DeploymentProfile,
    ) -> Result<(), AgentError> {
        let snapshot = {
            let mut deployments = self.deployments.write().unwrap_or_else(|e| e.into_inner());
            let deployment = deployments
                .get_mut(workload_id)
                .ok_or_else(|| AgentError::NotFound(format!("deployment '{}'", workload_id)))?;
            deployment.current = Some(profile);
            deployment.clone()
        };
        self.emit(DatabaseEvent::new(EventType::Added, snapshot)).await;
        Ok(())
    }

    /// Delete a workload. Returns the removed record, if any.
    pub async fn delete(&self, workload_id: &str) -> Option<Deployment> {
        let removed = {
            let mut deployments = self.deployments.write().unwrap_or_else(|e| e.into_inner());
            deployments.remove(workload_id)
        };
        if let Some(deployment) = &removed {
            self.emit(DatabaseEvent::new(EventType::Deleted, deployment.clone()))
                .await;
        }
        removed
    }

    /// Snapshot of every deployment, sorted by workload id
    pub fn list(&self) -> Vec<Deployment> {
        let deployments = self.deployments.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<Deployment> = deployments.values().cloned().collect();
        all.sort_by(|a, b| a.workload_id.cmp(&b.workload_id));
        all
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    async fn emit(&self, event: DatabaseEvent) {
        let _guard = self.emit_lock.lock().await;

        let subscribers: Vec<Arc<dyn Subscriber>> = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        debug!(
            "Emitting {:?} for '{}' to {} subscriber(s)",
            event.event_type,
            event.deployment.workload_id,
            subscribers.len()
        );

        for subscriber in subscribers {
            if let Err(e) = subscriber.on_database_event(event.clone()).await {
                error!(
                    "Subscriber '{}' failed to handle event for '{}': {}",
                    subscriber.subscriber_id(),
                    event.deployment.workload_id,
                    e
                );
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_id(workload_id: &str) -> Result<(), AgentError> {
    if workload_id.is_empty() {
        return Err(AgentError::ValidationError(
            "workload id must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get_deployment(&self, workload_id: &str) -> Result<Deployment, AgentError> {
        let deployments = self.deployments.read().unwrap_or_else(|e| e.into_inner());
        deployments
            .get(workload_id)
            .cloned()
            .ok_or_else(|| AgentError::NotFound(format!("deployment '{}'", workload_id)))
    }

    async fn upsert_component_status(
        &self,
        workload_id: &str,
        component: &str,
        status: ComponentStatus,
    ) -> Result<(), AgentError> {
        let mut deployments = self.deployments.write().unwrap_or_else(|e| e.into_inner());
        let deployment = deployments
            .get_mut(workload_id)
            .ok_or_else(|| AgentError::NotFound(format!("deployment '{}'", workload_id)))?;
        deployment
            .component_status
            .insert(component.to_string(), status);
        Ok(())
    }

    async fn subscribe(&self, subscriber: Arc<dyn Subscriber>) -> Result<(), AgentError> {
        let id = subscriber.subscriber_id();
        let mut subscribers = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        if subscribers.iter().any(|s| s.subscriber_id() == id) {
            debug!("Subscriber '{}' already registered", id);
            return Ok(());
        }
        subscribers.push(subscriber);
        Ok(())
    }

    async fn unsubscribe(&self, subscriber_id: &str) -> Result<(), AgentError> {
        let mut subscribers = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|s| s.subscriber_id() != subscriber_id);
        Ok(())
    }
}
