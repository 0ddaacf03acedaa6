//! Component status polling loop

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::errors::AgentError;
use crate::models::deployment::ComponentStatus;
use crate::storage::state::StateStore;

/// Poller options
#[derive(Debug, Clone)]
pub struct Options {
    /// Time between two status checks
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

/// Anything that can report a component's status
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn get_status(
        &self,
        workload_id: &str,
        component: &str,
    ) -> Result<ComponentStatus, AgentError>;
}

/// Check a component once and record the result in the store
pub async fn poll_once<P>(
    source: &P,
    store: &dyn StateStore,
    workload_id: &str,
    component: &str,
) -> Result<ComponentStatus, AgentError>
where
    P: StatusSource + ?Sized,
{
    let status = source.get_status(workload_id, component).await?;
    store
        .upsert_component_status(workload_id, component, status.clone())
        .await?;
    Ok(status)
}

/// Run the polling loop until the shutdown signal resolves.
///
/// A failed check is logged and retried on the next tick.
pub async fn run<P, S, F>(
    options: &Options,
    source: &P,
    store: &dyn StateStore,
    workload_id: &str,
    component: &str,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    P: StatusSource + ?Sized,
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    debug!("Poller for {}/{} starting...", workload_id, component);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_signal => {
                debug!("Poller for {}/{} shutting down...", workload_id, component);
                return;
            }
            _ = sleep_fn(options.interval) => {
                // Continue with check
            }
        }

        tokio::select! {
            biased;
            _ = &mut shutdown_signal => {
                debug!("Poller for {}/{} cancelled mid-check", workload_id, component);
                return;
            }
            result = poll_once(source, store, workload_id, component) => {
                match result {
                    Ok(status) => {
                        debug!(
                            workload = %workload_id,
                            component = %component,
                            state = %status.state,
                            "Component status updated"
                        );
                    }
                    Err(e) => {
                        warn!("Status check for {}/{} failed: {}", workload_id, component, e);
                    }
                }
            }
        }
    }
}
