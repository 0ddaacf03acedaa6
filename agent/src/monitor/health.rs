//! Helm release status classification

use crate::models::deployment::ComponentState;

/// Release statuses that mean the component is not serving as desired
const UNHEALTHY_STATUSES: [&str; 5] = [
    "failed",
    "uninstalling",
    "pending-install",
    "pending-upgrade",
    "pending-rollback",
];

/// Map a native Helm release status onto [`ComponentState`]
pub fn classify(status: &str) -> ComponentState {
    if status == "deployed" {
        ComponentState::Healthy
    } else if UNHEALTHY_STATUSES.contains(&status) {
        ComponentState::Unhealthy
    } else {
        ComponentState::Unknown
    }
}
