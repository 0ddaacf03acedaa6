//! Monitor and poller tests

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_test::{assert_err, assert_ok};

use edge_reconciler::errors::AgentError;
use edge_reconciler::models::deployment::{ComponentState, ComponentStatus, Deployment};
use edge_reconciler::monitor::compose::ComposeMonitor;
use edge_reconciler::monitor::helm::HelmMonitor;
use edge_reconciler::monitor::poller::{self, StatusSource};
use edge_reconciler::monitor::scope::WatchScope;
use edge_reconciler::monitor::Monitor;
use edge_reconciler::storage::memory::MemoryStore;
use edge_reconciler::storage::state::StateStore;

use common::{eventually, helm_profile, FakeHelmBackend, FixedStore};

fn fast_poll() -> poller::Options {
    poller::Options {
        interval: Duration::from_millis(10),
    }
}

fn helm_monitor(backend: &Arc<FakeHelmBackend>, store: Arc<dyn StateStore>) -> HelmMonitor {
    HelmMonitor::new(backend.clone(), store, "default", fast_poll())
}

fn desired(workload_id: &str, components: &[&str]) -> Deployment {
    let mut deployment = Deployment::new(workload_id);
    deployment.desired = Some(helm_profile(components));
    deployment
}

// ================================= GET STATUS =================================== //

#[tokio::test]
async fn test_status_is_unknown_without_any_state() {
    let backend = FakeHelmBackend::new();
    let store = FixedStore::with(vec![Deployment::new("wl-1")]);
    let monitor = helm_monitor(&backend, store);

    let status = assert_ok!(monitor.get_status("wl-1", "c1").await);
    assert_eq!(status.state, ComponentState::Unknown);
    assert_eq!(backend.status_count(), 0);
}

#[tokio::test]
async fn test_status_is_classified_from_native_status() {
    let backend = FakeHelmBackend::new();
    backend.set_status("wl-1-c1", "pending-upgrade");
    backend.set_status("wl-1-c2", "superseded");
    let store = FixedStore::with(vec![desired("wl-1", &["c1", "c2", "c3"])]);
    let monitor = helm_monitor(&backend, store);

    let c1 = assert_ok!(monitor.get_status("wl-1", "c1").await);
    assert_eq!(c1.state, ComponentState::Unhealthy);
    assert_eq!(c1.message, "pending-upgrade");

    let c2 = assert_ok!(monitor.get_status("wl-1", "c2").await);
    assert_eq!(c2.state, ComponentState::Unknown);

    let c3 = assert_ok!(monitor.get_status("wl-1", "c3").await);
    assert_eq!(c3.state, ComponentState::Healthy);

    assert_eq!(
        backend.status_queries.lock().unwrap()[0],
        ("wl-1-c1".to_string(), "default".to_string())
    );
}

#[tokio::test]
async fn test_status_prefers_current_state() {
    let backend = FakeHelmBackend::new();
    let mut deployment = desired("wl-1", &["next"]);
    deployment.current = Some(helm_profile(&["running"]));
    let store = FixedStore::with(vec![deployment]);
    let monitor = helm_monitor(&backend, store);

    assert_ok!(monitor.get_status("wl-1", "running").await);
    let err = assert_err!(monitor.get_status("wl-1", "next").await);
    assert!(matches!(err, AgentError::NotFound(_)));
}

#[tokio::test]
async fn test_status_of_unknown_workload_fails_lookup() {
    let backend = FakeHelmBackend::new();
    let store = FixedStore::with(vec![]);
    let monitor = helm_monitor(&backend, store);

    let err = assert_err!(monitor.get_status("unknown-id", "c1").await);
    assert!(err.to_string().contains("failed to get deployment"));
}

#[tokio::test]
async fn test_status_backend_failure_is_wrapped() {
    let backend = FakeHelmBackend::new();
    backend.fail_next_status(1);
    let store = FixedStore::with(vec![desired("wl-1", &["c1"])]);
    let monitor = helm_monitor(&backend, store);

    let err = assert_err!(monitor.get_status("wl-1", "c1").await);
    match err {
        AgentError::BackendError { operation, .. } => assert_eq!(operation, "status"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_status_requires_ids() {
    let backend = FakeHelmBackend::new();
    let store = FixedStore::with(vec![desired("wl-1", &["c1"])]);
    let monitor = helm_monitor(&backend, store);

    assert!(matches!(
        monitor.get_status("", "c1").await,
        Err(AgentError::ValidationError(_))
    ));
    assert!(matches!(
        monitor.get_status("wl-1", "").await,
        Err(AgentError::ValidationError(_))
    ));
}

// =================================== POLLER ===================================== //

/// Fails the first `failures` checks, then reports healthy
struct FlakySource {
    failures: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl StatusSource for FlakySource {
    async fn get_status(
        &self,
        _workload_id: &str,
        _component: &str,
    ) -> Result<ComponentStatus, AgentError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(AgentError::Internal("transient".to_string()));
        }
        Ok(ComponentStatus::new(ComponentState::Healthy, "deployed"))
    }
}

#[tokio::test]
async fn test_poll_once_records_status() {
    let store = Arc::new(MemoryStore::new());
    store.upsert_desired("wl-1", helm_profile(&["c1"])).await.unwrap();
    let source = FlakySource {
        failures: 0,
        calls: AtomicUsize::new(0),
    };

    let status = assert_ok!(poller::poll_once(&source, store.as_ref(), "wl-1", "c1").await);
    assert_eq!(status.state, ComponentState::Healthy);

    let deployment = store.get_deployment("wl-1").await.unwrap();
    assert_eq!(deployment.component_status["c1"], status);
}

#[tokio::test]
async fn test_poller_survives_transient_failures() {
    let store = Arc::new(MemoryStore::new());
    store.upsert_desired("wl-1", helm_profile(&["c1"])).await.unwrap();
    let source = Arc::new(FlakySource {
        failures: 2,
        calls: AtomicUsize::new(0),
    });

    let scope = WatchScope::new();
    {
        let source = source.clone();
        let store = store.clone();
        let shutdown = scope.cancelled();
        scope.spawn(async move {
            poller::run(
                &fast_poll(),
                source.as_ref(),
                store.as_ref(),
                "wl-1",
                "c1",
                tokio::time::sleep,
                shutdown,
            )
            .await;
        });
    }

    let recorded = eventually(Duration::from_secs(2), || {
        store
            .list()
            .first()
            .map(|d| d.component_status.contains_key("c1"))
            .unwrap_or(false)
    })
    .await;
    assert!(recorded);
    assert!(source.calls.load(Ordering::SeqCst) >= 3);

    scope.cancel();
    tokio::time::timeout(Duration::from_secs(1), scope.join())
        .await
        .unwrap();
    assert!(scope.is_finished());
}

#[tokio::test]
async fn test_poller_exits_before_first_tick_when_cancelled() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(FlakySource {
        failures: 0,
        calls: AtomicUsize::new(0),
    });

    let scope = WatchScope::new();
    scope.cancel();
    {
        let source = source.clone();
        let store = store.clone();
        let shutdown = scope.cancelled();
        scope.spawn(async move {
            poller::run(
                &poller::Options {
                    interval: Duration::from_secs(3600),
                },
                source.as_ref(),
                store.as_ref(),
                "wl-1",
                "c1",
                tokio::time::sleep,
                shutdown,
            )
            .await;
        });
    }

    tokio::time::timeout(Duration::from_secs(1), scope.join())
        .await
        .unwrap();
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}

// ================================ HELM MONITOR ================================== //

#[tokio::test]
async fn test_watch_polls_every_component() {
    let backend = FakeHelmBackend::new();
    backend.set_status("wl-1-c2", "failed");
    let store = Arc::new(MemoryStore::new());
    store
        .upsert_desired("wl-1", helm_profile(&["c1", "c2"]))
        .await
        .unwrap();
    let monitor = helm_monitor(&backend, store.clone());

    let scope = WatchScope::new();
    assert_ok!(monitor.watch("wl-1", scope.clone()).await);
    assert_eq!(monitor.watched(), vec!["wl-1".to_string()]);
    assert_eq!(scope.running_tasks(), 2);

    let both = eventually(Duration::from_secs(2), || {
        store
            .list()
            .first()
            .map(|d| d.component_status.len() == 2)
            .unwrap_or(false)
    })
    .await;
    assert!(both);

    let deployment = store.get_deployment("wl-1").await.unwrap();
    assert_eq!(deployment.component_status["c1"].state, ComponentState::Healthy);
    assert_eq!(deployment.component_status["c2"].state, ComponentState::Unhealthy);

    assert_ok!(monitor.stop_watching("wl-1").await);
    assert!(scope.is_cancelled());
    assert!(monitor.watched().is_empty());
    tokio::time::timeout(Duration::from_secs(1), scope.join())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_watch_requires_a_known_workload() {
    let backend = FakeHelmBackend::new();
    let store = Arc::new(MemoryStore::new());
    let monitor = helm_monitor(&backend, store);

    let scope = WatchScope::new();
    assert_err!(monitor.watch("missing", scope.clone()).await);
    assert_eq!(scope.running_tasks(), 0);
    assert!(monitor.watched().is_empty());
}

#[tokio::test]
async fn test_stop_watching_unknown_workload_is_ok() {
    let backend = FakeHelmBackend::new();
    let store = Arc::new(MemoryStore::new());
    let monitor = helm_monitor(&backend, store);

    assert_ok!(monitor.stop_watching("never-watched").await);
}

#[tokio::test]
async fn test_compose_monitor_is_not_implemented() {
    let monitor = ComposeMonitor::new();

    assert!(matches!(
        monitor.watch("wl-1", WatchScope::new()).await,
        Err(AgentError::NotImplemented(_))
    ));
    assert!(matches!(
        monitor.get_status("wl-1", "c1").await,
        Err(AgentError::NotImplemented(_))
    ));
}
