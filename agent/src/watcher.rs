//! Workload watcher
//!
//! Subscribes to the state store and keeps exactly one supervised watch per
//! workload: `Added` events (re)start a watch through the monitor registered
//! for the workload's profile type, `Deleted` events stop it. The watcher also
//! answers on-demand status queries through the same monitor lookup.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::errors::AgentError;
use crate::models::deployment::{ComponentStatus, DatabaseEvent, Deployment, EventType, ProfileType};
use crate::models::profile::decode_profile;
use crate::monitor::scope::WatchScope;
use crate::monitor::{Monitor, MonitorRegistry};
use crate::storage::state::{StateStore, Subscriber};

/// Watcher options
#[derive(Debug, Clone, Default)]
pub struct WatcherOptions {
    /// Bound on how long `stop` waits for polling tasks. `None` waits until
    /// every task has exited.
    pub stop_timeout: Option<Duration>,
}

struct ActiveWatch {
    profile_type: ProfileType,
    monitor: Arc<dyn Monitor>,
    scope: WatchScope,
}

/// Orchestrates per-workload monitoring
pub struct WorkloadWatcher {
    id: String,
    store: Arc<dyn StateStore>,
    monitors: Arc<MonitorRegistry>,
    options: WatcherOptions,
    watches: Mutex<HashMap<String, ActiveWatch>>,
    /// Cancelled scopes whose tasks may still be winding down
    retired: Mutex<Vec<WatchScope>>,
    started: AtomicBool,
    events: tokio::sync::Mutex<()>,
}

fn validate_workload_id(workload_id: &str) -> Result<(), AgentError> {
    if workload_id.is_empty() {
        return Err(AgentError::ValidationError(
            "workload id must not be empty".to_string(),
        ));
    }
    Ok(())
}

impl WorkloadWatcher {
    pub fn new(
        store: Arc<dyn StateStore>,
        monitors: Arc<MonitorRegistry>,
        options: WatcherOptions,
    ) -> Self {
        Self {
            id: format!("workload-watcher-{}", uuid::Uuid::new_v4()),
            store,
            monitors,
            options,
            watches: Mutex::new(HashMap::new()),
            retired: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            events: tokio::sync::Mutex::new(()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Subscribe to the state store. Calling it again while started is a no-op.
    pub async fn start(self: &Arc<Self>) -> Result<(), AgentError> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Workload watcher already started");
            return Ok(());
        }

        let subscriber: Arc<dyn Subscriber> = self.clone();
        if let Err(e) = self.store.subscribe(subscriber).await {
            self.started.store(false, Ordering::SeqCst);
            return Err(e);
        }

        info!("Workload watcher started ({})", self.id);
        Ok(())
    }

    /// Cancel every watch, unsubscribe, and wait for all polling tasks to exit
    pub async fn stop(&self) -> Result<(), AgentError> {
        if !self.started.swap(false, Ordering::SeqCst) {
            warn!("Workload watcher stopped before it was started");
            return Ok(());
        }
        info!("Stopping workload watcher...");

        let unsubscribed = self.store.unsubscribe(&self.id).await;

        // Let an in-flight event finish before draining
        let _events = self.events.lock().await;

        let active: Vec<(String, ActiveWatch)> = {
            let mut watches = self.watches.lock().unwrap_or_else(|e| e.into_inner());
            watches.drain().collect()
        };
        for (workload_id, watch) in active {
            self.retire(&workload_id, watch).await;
        }

        let scopes: Vec<WatchScope> = {
            let mut retired = self.retired.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *retired)
        };
        let join = futures::future::join_all(scopes.iter().map(|scope| scope.join()));
        match self.options.stop_timeout {
            None => {
                join.await;
            }
            Some(limit) => {
                if tokio::time::timeout(limit, join).await.is_err() {
                    let pending = scopes.iter().filter(|s| !s.is_finished()).count();
                    warn!(
                        "{} watch(es) did not exit within {:?}, detaching",
                        pending, limit
                    );
                }
            }
        }

        if let Err(e) = unsubscribed {
            error!("Failed to unsubscribe workload watcher: {}", e);
            return Err(e);
        }
        info!("Workload watcher stopped");
        Ok(())
    }

    /// Start (or restart) supervision of a workload
    pub async fn start_watching(&self, deployment: &Deployment) -> Result<(), AgentError> {
        let workload_id = deployment.workload_id.as_str();
        validate_workload_id(workload_id)?;
        self.ensure_started()?;

        let profile_type = deployment.profile_type().cloned().ok_or_else(|| {
            AgentError::ValidationError(format!(
                "workload '{}' has no desired or current state",
                workload_id
            ))
        })?;
        let monitor = self.monitors.get(&profile_type)?;

        // Supersede: the previous watch is cancelled before the new one exists
        if let Some(previous) = self.take_watch(workload_id) {
            debug!("Superseding existing watch for '{}'", workload_id);
            self.retire(workload_id, previous).await;
        }

        let scope = WatchScope::new();
        if let Err(e) = monitor.watch(workload_id, scope.clone()).await {
            scope.cancel();
            self.push_retired(scope);
            return Err(e);
        }

        // `stop` may have drained the map while the monitor was starting
        let watch = ActiveWatch {
            profile_type: profile_type.clone(),
            monitor,
            scope,
        };
        let rejected = {
            let mut watches = self.watches.lock().unwrap_or_else(|e| e.into_inner());
            if self.is_started() {
                if let Some(replaced) = watches.insert(workload_id.to_string(), watch) {
                    replaced.scope.cancel();
                    self.push_retired(replaced.scope);
                }
                None
            } else {
                Some(watch)
            }
        };
        if let Some(watch) = rejected {
            self.retire(workload_id, watch).await;
            return Err(Self::stopped_error(workload_id));
        }

        info!("Watching workload '{}' ({})", workload_id, profile_type);
        Ok(())
    }

    /// Stop supervision of a workload. Unknown workloads are ignored.
    pub async fn stop_watching(&self, workload_id: &str) -> Result<(), AgentError> {
        validate_workload_id(workload_id)?;
        match self.take_watch(workload_id) {
            Some(watch) => {
                self.retire(workload_id, watch).await;
                info!("Stopped watching workload '{}'", workload_id);
            }
            None => debug!("Workload '{}' is not watched", workload_id),
        }
        Ok(())
    }

    /// Query every component of a workload right now, bypassing the poll loop.
    ///
    /// Workloads without desired or current state yield an empty map.
    pub async fn get_deployment_status(
        &self,
        workload_id: &str,
    ) -> Result<BTreeMap<String, ComponentStatus>, AgentError> {
        validate_workload_id(workload_id)?;

        let deployment = self
            .store
            .get_deployment(workload_id)
            .await
            .map_err(|e| AgentError::get_deployment(workload_id, e))?;
        let profile = match deployment.effective_profile() {
            Some(profile) => profile,
            None => return Ok(BTreeMap::new()),
        };
        let spec = decode_profile(workload_id, profile)?;
        let monitor = self.monitors.get(&profile.profile_type)?;

        let mut statuses = BTreeMap::new();
        for component in spec.component_names() {
            let status = monitor.get_status(workload_id, &component).await?;
            statuses.insert(component, status);
        }
        Ok(statuses)
    }

    /// Query one component right now
    pub async fn get_component_status(
        &self,
        workload_id: &str,
        component: &str,
    ) -> Result<ComponentStatus, AgentError> {
        validate_workload_id(workload_id)?;
        if component.is_empty() {
            return Err(AgentError::ValidationError(
                "component name must not be empty".to_string(),
            ));
        }

        let deployment = self
            .store
            .get_deployment(workload_id)
            .await
            .map_err(|e| AgentError::get_deployment(workload_id, e))?;
        let profile_type = match deployment.profile_type() {
            Some(profile_type) => profile_type,
            None => {
                return Ok(ComponentStatus::unknown(
                    "workload has no desired or current state",
                ))
            }
        };
        let monitor = self.monitors.get(profile_type)?;
        monitor.get_status(workload_id, component).await
    }

    /// Workloads with an active watch, sorted
    pub fn active_watches(&self) -> Vec<String> {
        let watches = self.watches.lock().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = watches.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_watching(&self, workload_id: &str) -> bool {
        let watches = self.watches.lock().unwrap_or_else(|e| e.into_inner());
        watches.contains_key(workload_id)
    }

    /// Profile type an active watch was started with
    pub fn watched_profile_type(&self, workload_id: &str) -> Option<ProfileType> {
        let watches = self.watches.lock().unwrap_or_else(|e| e.into_inner());
        watches.get(workload_id).map(|w| w.profile_type.clone())
    }

    async fn handle_event(&self, event: DatabaseEvent) -> Result<(), AgentError> {
        if !self.is_started() {
            debug!("Watcher not started, ignoring event");
            return Ok(());
        }

        let deployment = &event.deployment;
        match event.event_type {
            EventType::Added => {
                if deployment.desired.is_none() {
                    debug!(
                        "Workload '{}' added without desired state, not watching",
                        deployment.workload_id
                    );
                    return Ok(());
                }
                self.start_watching(deployment).await
            }
            EventType::Deleted => self.stop_watching(&deployment.workload_id).await,
            other => {
                debug!(
                    "Ignoring {:?} event for workload '{}'",
                    other, deployment.workload_id
                );
                Ok(())
            }
        }
    }

    fn ensure_started(&self) -> Result<(), AgentError> {
        if self.is_started() {
            Ok(())
        } else {
            Err(AgentError::ShutdownError(
                "workload watcher is not started".to_string(),
            ))
        }
    }

    fn stopped_error(workload_id: &str) -> AgentError {
        AgentError::ShutdownError(format!(
            "workload watcher stopped while starting watch for '{}'",
            workload_id
        ))
    }

    fn take_watch(&self, workload_id: &str) -> Option<ActiveWatch> {
        let mut watches = self.watches.lock().unwrap_or_else(|e| e.into_inner());
        watches.remove(workload_id)
    }

    async fn retire(&self, workload_id: &str, watch: ActiveWatch) {
        watch.scope.cancel();
        if let Err(e) = watch.monitor.stop_watching(workload_id).await {
            debug!(
                "Monitor {} could not stop watching '{}': {}",
                watch.profile_type, workload_id, e
            );
        }
        self.push_retired(watch.scope);
    }

    fn push_retired(&self, scope: WatchScope) {
        let mut retired = self.retired.lock().unwrap_or_else(|e| e.into_inner());
        retired.retain(|s| !s.is_finished());
        retired.push(scope);
    }
}

#[async_trait]
impl Subscriber for WorkloadWatcher {
    fn subscriber_id(&self) -> String {
        self.id.clone()
    }

    async fn on_database_event(&self, event: DatabaseEvent) -> Result<(), AgentError> {
        let _events = self.events.lock().await;
        self.handle_event(event).await
    }
}
