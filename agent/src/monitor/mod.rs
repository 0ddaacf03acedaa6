//! Monitoring strategies

pub mod compose;
pub mod health;
pub mod helm;
pub mod poller;
pub mod scope;

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::AgentError;
use crate::models::deployment::{ComponentStatus, ProfileType};
use crate::registry::Registry;
use crate::monitor::scope::WatchScope;

/// Health monitoring strategy for one profile type
#[async_trait]
pub trait Monitor: Send + Sync {
    fn get_type(&self) -> ProfileType;

    /// Start one polling task per component inside `scope`.
    ///
    /// Returns once the tasks are scheduled, not when they finish.
    async fn watch(&self, workload_id: &str, scope: WatchScope) -> Result<(), AgentError>;

    async fn stop_watching(&self, workload_id: &str) -> Result<(), AgentError>;

    /// Query the backend for one component right now
    async fn get_status(
        &self,
        workload_id: &str,
        component: &str,
    ) -> Result<ComponentStatus, AgentError>;
}

/// Monitors keyed by profile type
pub struct MonitorRegistry {
    monitors: Registry<dyn Monitor>,
}

impl MonitorRegistry {
    pub fn new(monitors: Vec<Arc<dyn Monitor>>) -> Result<Self, AgentError> {
        let mut registry = Registry::new("monitor");
        for monitor in monitors {
            registry.register(monitor.get_type(), monitor)?;
        }
        Ok(Self { monitors: registry })
    }

    pub fn get(&self, profile_type: &ProfileType) -> Result<Arc<dyn Monitor>, AgentError> {
        self.monitors.get(profile_type)
    }

    pub fn available(&self) -> Vec<String> {
        self.monitors.available()
    }
}
