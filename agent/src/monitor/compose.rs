//! Docker Compose monitor, not implemented yet

use async_trait::async_trait;

use crate::errors::AgentError;
use crate::models::deployment::{ComponentStatus, ProfileType};
use crate::monitor::scope::WatchScope;
use crate::monitor::Monitor;

#[derive(Debug, Default)]
pub struct ComposeMonitor;

impl ComposeMonitor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Monitor for ComposeMonitor {
    fn get_type(&self) -> ProfileType {
        ProfileType::compose()
    }

    async fn watch(&self, _workload_id: &str, _scope: WatchScope) -> Result<(), AgentError> {
        Err(AgentError::NotImplemented("compose monitor: watch".to_string()))
    }

    async fn stop_watching(&self, _workload_id: &str) -> Result<(), AgentError> {
        Err(AgentError::NotImplemented(
            "compose monitor: stop watching".to_string(),
        ))
    }

    async fn get_status(
        &self,
        _workload_id: &str,
        _component: &str,
    ) -> Result<ComponentStatus, AgentError> {
        Err(AgentError::NotImplemented(
            "compose monitor: get status".to_string(),
        ))
    }
}
