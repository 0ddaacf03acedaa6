//! Agent state store interface

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::AgentError;
use crate::models::deployment::{ComponentStatus, DatabaseEvent, Deployment};

/// Receives change notifications from a [`StateStore`]
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Stable identifier used to unsubscribe
    fn subscriber_id(&self) -> String;

    /// Handle one event. Events arrive in emission order.
    async fn on_database_event(&self, event: DatabaseEvent) -> Result<(), AgentError>;
}

/// Holds desired/current state per workload and notifies subscribers of changes.
///
/// Implementations must be safe to call from many tasks at once.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load one deployment. Missing workloads yield [`AgentError::NotFound`].
    async fn get_deployment(&self, workload_id: &str) -> Result<Deployment, AgentError>;

    /// Record the latest status of a component
    async fn upsert_component_status(
        &self,
        workload_id: &str,
        component: &str,
        status: ComponentStatus,
    ) -> Result<(), AgentError>;

    async fn subscribe(&self, subscriber: Arc<dyn Subscriber>) -> Result<(), AgentError>;

    async fn unsubscribe(&self, subscriber_id: &str) -> Result<(), AgentError>;
}
