//! Reconciler worker tests

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_test::{assert_err, assert_ok};

use edge_reconciler::deploy::compose::ComposeDeployer;
use edge_reconciler::deploy::helm::HelmDeployer;
use edge_reconciler::deploy::{ApplyOutcome, Deployer, DeployerRegistry};
use edge_reconciler::models::deployment::{DeploymentProfile, ProfileType};
use edge_reconciler::storage::desired::{DesiredState, DesiredStateFile, DesiredWorkload};
use edge_reconciler::storage::memory::MemoryStore;
use edge_reconciler::storage::state::StateStore;
use edge_reconciler::workers::reconciler::{self, reconcile_once};

use common::{helm_profile, profile_of_type, FakeHelmBackend};

struct Harness {
    _dir: tempfile::TempDir,
    file: DesiredStateFile,
    backend: Arc<FakeHelmBackend>,
    store: Arc<MemoryStore>,
    deployers: DeployerRegistry,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let file = DesiredStateFile::new(dir.path().join("desired.json"));
    let backend = FakeHelmBackend::new();
    let store = Arc::new(MemoryStore::new());
    let deployers: Vec<Arc<dyn Deployer>> = vec![
        Arc::new(HelmDeployer::new(
            backend.clone(),
            store.clone() as Arc<dyn StateStore>,
            "default",
        )),
        Arc::new(ComposeDeployer::new()),
    ];
    Harness {
        _dir: dir,
        file,
        backend,
        store,
        deployers: DeployerRegistry::new(deployers).unwrap(),
    }
}

async fn write_desired(file: &DesiredStateFile, workloads: Vec<(&str, DeploymentProfile)>) {
    let state = DesiredState {
        workloads: workloads
            .into_iter()
            .map(|(id, profile)| DesiredWorkload {
                id: id.to_string(),
                profile,
            })
            .collect(),
    };
    file.write(&state).await.unwrap();
}

#[tokio::test]
async fn test_missing_file_is_a_noop() {
    let h = harness();

    let report = assert_ok!(reconcile_once(&h.file, &h.deployers, &h.store).await);
    assert!(report.is_noop());
    assert_eq!(h.backend.total_calls(), 0);
}

#[tokio::test]
async fn test_new_workload_is_deployed_and_recorded() {
    let h = harness();
    write_desired(&h.file, vec![("wl-1", helm_profile(&["api"]))]).await;

    let report = assert_ok!(reconcile_once(&h.file, &h.deployers, &h.store).await);
    assert_eq!(
        report.applied,
        vec![("wl-1".to_string(), ApplyOutcome::Deployed)]
    );

    let deployment = h.store.get_deployment("wl-1").await.unwrap();
    assert_eq!(deployment.current, Some(helm_profile(&["api"])));
    assert_eq!(h.backend.installs().len(), 1);

    // Second pass has nothing to do
    let report = assert_ok!(reconcile_once(&h.file, &h.deployers, &h.store).await);
    assert!(report.is_noop());
    assert_eq!(h.backend.installs().len(), 1);
}

#[tokio::test]
async fn test_changed_workload_is_updated() {
    let h = harness();
    write_desired(&h.file, vec![("wl-1", helm_profile(&["api"]))]).await;
    assert_ok!(reconcile_once(&h.file, &h.deployers, &h.store).await);

    write_desired(&h.file, vec![("wl-1", helm_profile(&["api", "worker"]))]).await;
    let report = assert_ok!(reconcile_once(&h.file, &h.deployers, &h.store).await);

    assert_eq!(
        report.applied,
        vec![("wl-1".to_string(), ApplyOutcome::Updated)]
    );
    assert_eq!(h.backend.upgrades().len(), 1);
    assert_eq!(h.backend.installs().len(), 2);
}

#[tokio::test]
async fn test_dropped_workload_is_removed() {
    let h = harness();
    write_desired(
        &h.file,
        vec![
            ("wl-1", helm_profile(&["api"])),
            ("wl-2", helm_profile(&["db"])),
        ],
    )
    .await;
    assert_ok!(reconcile_once(&h.file, &h.deployers, &h.store).await);

    write_desired(&h.file, vec![("wl-1", helm_profile(&["api"]))]).await;
    let report = assert_ok!(reconcile_once(&h.file, &h.deployers, &h.store).await);

    assert_eq!(report.removed, vec!["wl-2".to_string()]);
    assert_eq!(
        h.backend.uninstalls(),
        vec![("wl-2-db".to_string(), "default".to_string())]
    );
    assert!(h.store.get_deployment("wl-2").await.is_err());
}

#[tokio::test]
async fn test_failures_are_reported_and_retried() {
    let h = harness();
    h.backend.fail_installs("timed out waiting for the condition");
    write_desired(
        &h.file,
        vec![
            ("wl-1", helm_profile(&["api"])),
            ("wl-2", profile_of_type(ProfileType::COMPOSE, &["app"])),
        ],
    )
    .await;

    let report = assert_ok!(reconcile_once(&h.file, &h.deployers, &h.store).await);
    assert!(report.applied.is_empty());
    assert_eq!(report.failed.len(), 2);

    // Desired state is recorded even though nothing is running yet
    let deployment = h.store.get_deployment("wl-1").await.unwrap();
    assert!(deployment.desired.is_some());
    assert!(deployment.current.is_none());

    // The next pass tries again
    assert_ok!(reconcile_once(&h.file, &h.deployers, &h.store).await);
    assert_eq!(h.backend.installs().len(), 2);
}

#[tokio::test]
async fn test_partially_deployed_workload_converges() {
    let h = harness();
    h.backend.fail_install_once("wl-1-c2", "transient timeout");
    write_desired(&h.file, vec![("wl-1", helm_profile(&["c1", "c2"]))]).await;

    let report = assert_ok!(reconcile_once(&h.file, &h.deployers, &h.store).await);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].1.contains("transient timeout"));
    assert!(h.store.get_deployment("wl-1").await.unwrap().current.is_none());

    let report = assert_ok!(reconcile_once(&h.file, &h.deployers, &h.store).await);
    assert!(report.failed.is_empty(), "{:?}", report.failed);
    assert_eq!(
        report.applied,
        vec![("wl-1".to_string(), ApplyOutcome::Deployed)]
    );
    assert_eq!(
        h.store.get_deployment("wl-1").await.unwrap().current,
        Some(helm_profile(&["c1", "c2"]))
    );
    assert_eq!(
        h.backend.release_names(),
        vec!["wl-1-c1".to_string(), "wl-1-c2".to_string()]
    );
}

#[tokio::test]
async fn test_unreadable_file_aborts_the_pass() {
    let h = harness();
    tokio::fs::write(h.file.path(), "{ not json").await.unwrap();

    assert_err!(reconcile_once(&h.file, &h.deployers, &h.store).await);
}

#[tokio::test]
async fn test_worker_reconciles_until_shutdown() {
    let h = harness();
    write_desired(&h.file, vec![("wl-1", helm_profile(&["api"]))]).await;

    let options = reconciler::Options {
        interval: Duration::from_millis(10),
        initial_delay: Duration::from_millis(0),
        desired_state_file: h.file.path().to_path_buf(),
    };
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let worker = reconciler::run(
        &options,
        &h.deployers,
        &h.store,
        tokio::time::sleep,
        Box::pin(async move {
            let _ = shutdown_rx.await;
        }),
    );
    let stopper = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = shutdown_tx.send(());
    };

    tokio::time::timeout(Duration::from_secs(2), async { tokio::join!(worker, stopper) })
        .await
        .unwrap();

    let deployment = h.store.get_deployment("wl-1").await.unwrap();
    assert_eq!(deployment.current, Some(helm_profile(&["api"])));
    assert_eq!(h.backend.installs().len(), 1);
}
