//! Desired-state reconciler worker
//!
//! Periodically reads the desired-state file, records desired profiles in the
//! state store and drives the deployers until every workload's current state
//! matches. Workloads that disappear from the file are removed.

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::deploy::{ApplyOutcome, DeployerRegistry};
use crate::errors::AgentError;
use crate::storage::desired::DesiredStateFile;
use crate::storage::memory::MemoryStore;
use crate::storage::state::StateStore;

/// Reconciler worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Time between two reconciliation passes
    pub interval: Duration,

    /// Delay before the first pass
    pub initial_delay: Duration,

    /// Desired-state document
    pub desired_state_file: PathBuf,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            initial_delay: Duration::from_secs(0),
            desired_state_file: PathBuf::from("/etc/edge-reconciler/desired.json"),
        }
    }
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub applied: Vec<(String, ApplyOutcome)>,
    pub removed: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty() && self.removed.is_empty() && self.failed.is_empty()
    }
}

/// Run one reconciliation pass.
///
/// Per-workload failures are collected in the report; only an unreadable
/// desired-state file or a store failure aborts the pass.
pub async fn reconcile_once(
    desired_file: &DesiredStateFile,
    deployers: &DeployerRegistry,
    store: &MemoryStore,
) -> Result<ReconcileReport, AgentError> {
    let desired = desired_file.read().await?;
    let mut report = ReconcileReport::default();

    for workload in &desired.workloads {
        let existing = store.get_deployment(&workload.id).await.ok();
        let recorded_desired = existing.as_ref().and_then(|d| d.desired.as_ref());
        if recorded_desired != Some(&workload.profile) {
            debug!("Desired state of '{}' changed", workload.id);
            store
                .upsert_desired(&workload.id, workload.profile.clone())
                .await?;
        }

        let deployment = store.get_deployment(&workload.id).await?;
        if deployment.current.as_ref() == Some(&workload.profile) {
            continue;
        }

        match deployers.apply(&deployment).await {
            Ok(outcome) => {
                store
                    .set_current(&workload.id, workload.profile.clone())
                    .await?;
                info!("Workload '{}' reconciled: {:?}", workload.id, outcome);
                report.applied.push((workload.id.clone(), outcome));
            }
            Err(e) => {
                error!("Failed to reconcile workload '{}': {}", workload.id, e);
                report.failed.push((workload.id.clone(), e.to_string()));
            }
        }
    }

    let wanted: HashSet<&str> = desired.workloads.iter().map(|w| w.id.as_str()).collect();
    for deployment in store.list() {
        if wanted.contains(deployment.workload_id.as_str()) {
            continue;
        }
        match deployers.remove(&deployment).await {
            Ok(_) => {
                store.delete(&deployment.workload_id).await;
                info!("Workload '{}' removed", deployment.workload_id);
                report.removed.push(deployment.workload_id.clone());
            }
            Err(e) => {
                error!(
                    "Failed to remove workload '{}': {}",
                    deployment.workload_id, e
                );
                report
                    .failed
                    .push((deployment.workload_id.clone(), e.to_string()));
            }
        }
    }

    Ok(report)
}

/// Run the reconciler worker
pub async fn run<S, F>(
    options: &Options,
    deployers: &DeployerRegistry,
    store: &MemoryStore,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Reconciler worker starting...");
    let desired_file = DesiredStateFile::new(&options.desired_state_file);

    tokio::select! {
        _ = &mut shutdown_signal => {
            info!("Reconciler worker shutting down...");
            return;
        }
        _ = sleep_fn(options.initial_delay) => {}
    }

    loop {
        match reconcile_once(&desired_file, deployers, store).await {
            Ok(report) if report.is_noop() => debug!("Workloads already reconciled"),
            Ok(report) if !report.failed.is_empty() => {
                warn!(
                    "Reconciliation finished with {} failure(s), retrying in {:?}",
                    report.failed.len(),
                    options.interval
                );
            }
            Ok(report) => {
                info!(
                    "Reconciliation finished: {} applied, {} removed",
                    report.applied.len(),
                    report.removed.len()
                );
            }
            Err(e) => {
                error!(
                    "Unable to reconcile from {}: {}",
                    desired_file.path().display(),
                    e
                );
            }
        }

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Reconciler worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {
                // Continue with next pass
            }
        }
    }
}
