//! Server state

use std::sync::Arc;

use crate::watcher::WorkloadWatcher;

/// Server state shared across handlers
pub struct ServerState {
    pub watcher: Arc<WorkloadWatcher>,
}

impl ServerState {
    pub fn new(watcher: Arc<WorkloadWatcher>) -> Self {
        Self { watcher }
    }
}
