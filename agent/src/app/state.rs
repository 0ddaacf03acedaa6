//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::deploy::backend::{HelmBackend, HelmCli};
use crate::deploy::compose::ComposeDeployer;
use crate::deploy::helm::HelmDeployer;
use crate::deploy::{Deployer, DeployerRegistry};
use crate::errors::AgentError;
use crate::monitor::compose::ComposeMonitor;
use crate::monitor::helm::HelmMonitor;
use crate::monitor::{Monitor, MonitorRegistry};
use crate::storage::memory::MemoryStore;
use crate::storage::state::StateStore;
use crate::watcher::WorkloadWatcher;

/// Main application state
pub struct AppState {
    /// Deployment records
    pub store: Arc<MemoryStore>,

    /// Deployers by profile type
    pub deployers: Arc<DeployerRegistry>,

    /// Monitors by profile type
    pub monitors: Arc<MonitorRegistry>,

    /// Workload watcher, started
    pub watcher: Arc<WorkloadWatcher>,
}

impl AppState {
    /// Initialize application state against the `helm` executable
    pub async fn init(options: &AppOptions) -> Result<Self, AgentError> {
        let backend: Arc<dyn HelmBackend> = Arc::new(HelmCli::new(options.helm.binary.clone()));
        Self::with_backend(options, backend).await
    }

    /// Initialize application state with a given Helm backend
    pub async fn with_backend(
        options: &AppOptions,
        backend: Arc<dyn HelmBackend>,
    ) -> Result<Self, AgentError> {
        info!("Initializing application state...");

        let store = Arc::new(MemoryStore::new());
        let state_store: Arc<dyn StateStore> = store.clone();

        let deployers: Vec<Arc<dyn Deployer>> = vec![
            Arc::new(HelmDeployer::new(
                backend.clone(),
                state_store.clone(),
                options.helm.default_namespace.clone(),
            )),
            Arc::new(ComposeDeployer::new()),
        ];
        let deployers = Arc::new(DeployerRegistry::new(deployers)?);

        let monitors: Vec<Arc<dyn Monitor>> = vec![
            Arc::new(HelmMonitor::new(
                backend,
                state_store.clone(),
                options.helm.default_namespace.clone(),
                options.poller.clone(),
            )),
            Arc::new(ComposeMonitor::new()),
        ];
        let monitors = Arc::new(MonitorRegistry::new(monitors)?);

        let watcher = Arc::new(WorkloadWatcher::new(
            state_store,
            monitors.clone(),
            options.watcher.clone(),
        ));
        watcher.start().await?;

        Ok(Self {
            store,
            deployers,
            monitors,
            watcher,
        })
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), AgentError> {
        info!("Shutting down application state...");
        self.watcher.stop().await
    }
}
