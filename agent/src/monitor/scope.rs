//! Cancellation scope for supervised polling tasks

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

struct ScopeInner {
    cancel_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Groups the tasks of one watch under a single cancellation flag.
///
/// Clones share the same flag and task list. Tasks stop cooperatively: they
/// await [`WatchScope::cancelled`] alongside their own work.
#[derive(Clone)]
pub struct WatchScope {
    inner: Arc<ScopeInner>,
}

impl WatchScope {
    pub fn new() -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(ScopeInner {
                cancel_tx,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Signal every task in the scope to stop. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancel_tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancel_tx.borrow()
    }

    /// Resolves once the scope is cancelled
    pub fn cancelled(&self) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        let mut cancel_rx = self.inner.cancel_tx.subscribe();
        Box::pin(async move {
            let _ = cancel_rx.wait_for(|cancelled| *cancelled).await;
        })
    }

    /// Spawn a task owned by this scope
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        let mut tasks = self.inner.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    /// Number of tasks that have not exited yet
    pub fn running_tasks(&self) -> usize {
        let tasks = self.inner.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.iter().filter(|h| !h.is_finished()).count()
    }

    pub fn is_finished(&self) -> bool {
        self.running_tasks() == 0
    }

    /// Wait for every task spawned so far to exit
    pub async fn join(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.inner.tasks.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *tasks)
        };
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                warn!("Watch task ended abnormally: {}", e);
            }
        }
    }

    /// Whether two handles refer to the same scope
    pub fn same_as(&self, other: &WatchScope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for WatchScope {
    fn default() -> Self {
        Self::new()
    }
}
