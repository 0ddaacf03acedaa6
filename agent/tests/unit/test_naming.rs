//! Release naming tests

mod common;

use std::sync::Arc;

use edge_reconciler::deploy::helm::HelmDeployer;
use edge_reconciler::deploy::naming::{release_name, MAX_RELEASE_NAME_LEN};
use edge_reconciler::deploy::Deployer;
use edge_reconciler::models::deployment::Deployment;
use edge_reconciler::models::profile::decode_profile;
use edge_reconciler::monitor::helm::HelmMonitor;
use edge_reconciler::monitor::{poller, Monitor};
use edge_reconciler::storage::state::StateStore;

use common::{helm_profile, FakeHelmBackend, FixedStore};

#[test]
fn test_name_at_limit_is_kept() {
    let workload = "w".repeat(20);
    let component = "c".repeat(MAX_RELEASE_NAME_LEN - 21);
    let name = release_name(&workload, &component);

    assert_eq!(name.len(), MAX_RELEASE_NAME_LEN);
    assert_eq!(name, format!("{}-{}", workload, component));
}

#[test]
fn test_one_over_limit_is_shortened() {
    let workload = "w".repeat(20);
    let component = "c".repeat(MAX_RELEASE_NAME_LEN - 20);
    let name = release_name(&workload, &component);

    assert!(name.len() <= MAX_RELEASE_NAME_LEN);
    assert!(name.starts_with("wwwwwwww-"));
}

#[test]
fn test_derivation_is_deterministic() {
    let workload = "8f14e45f-ceea-467f-a0e7-9f4f2a1b3c5d";
    let component = "Telemetry_Collector_With_A_Long_Name";

    assert_eq!(
        release_name(workload, component),
        release_name(workload, component)
    );
    assert!(release_name(workload, component)
        .chars()
        .all(|c| !c.is_uppercase() && c != '_'));
}

#[tokio::test]
async fn test_deployer_and_monitor_address_the_same_release() {
    let workload_id = "8f14e45f-ceea-467f-a0e7-9f4f2a1b3c5d";
    let component = "a-component-whose-name-pushes-past-the-limit";

    let mut deployment = Deployment::new(workload_id);
    deployment.desired = Some(helm_profile(&[component]));
    let store = FixedStore::with(vec![deployment.clone()]);
    let backend = FakeHelmBackend::new();

    let deployer = HelmDeployer::new(backend.clone(), store.clone() as Arc<dyn StateStore>, "default");
    let spec = decode_profile(workload_id, deployment.desired.as_ref().unwrap()).unwrap();
    deployer.deploy(&spec).await.unwrap();

    let monitor = HelmMonitor::new(
        backend.clone(),
        store as Arc<dyn StateStore>,
        "default",
        poller::Options::default(),
    );
    monitor.get_status(workload_id, component).await.unwrap();

    let installed = backend.installs();
    let queried = backend.status_queries.lock().unwrap().clone();
    assert_eq!(installed.len(), 1);
    assert_eq!(queried.len(), 1);
    assert_eq!(installed[0].name, queried[0].0);
    assert_eq!(installed[0].name, release_name(workload_id, component));
    assert!(installed[0].name.len() <= MAX_RELEASE_NAME_LEN);
}
