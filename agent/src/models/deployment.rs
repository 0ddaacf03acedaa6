//! Deployment models

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of one workload ("app") on this device
pub type WorkloadId = String;

/// Tag selecting which deployer/monitor strategy governs a workload.
///
/// Profile types are free-form strings supplied by desired-state data, so new
/// strategies can register under a new tag without touching the watcher.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileType(String);

impl ProfileType {
    pub const HELM_V3: &'static str = "helm.v3";
    pub const COMPOSE: &'static str = "compose";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn helm_v3() -> Self {
        Self::new(Self::HELM_V3)
    }

    pub fn compose() -> Self {
        Self::new(Self::COMPOSE)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProfileType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A component as stored in the state store, before decoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawComponent {
    /// Component name, unique within the profile
    pub name: String,

    /// Backend-specific properties
    #[serde(default)]
    pub properties: serde_json::Value,
}

/// Desired or current state snapshot of a workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentProfile {
    /// Profile type, e.g. "helm.v3"
    #[serde(rename = "type")]
    pub profile_type: ProfileType,

    /// Ordered component list
    #[serde(default)]
    pub components: Vec<RawComponent>,
}

/// Workload deployment record held by the state store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub workload_id: WorkloadId,

    /// What the fleet manager wants running
    pub desired: Option<DeploymentProfile>,

    /// What was last successfully applied, absent before the first deploy
    pub current: Option<DeploymentProfile>,

    /// Latest status per component name
    #[serde(default)]
    pub component_status: BTreeMap<String, ComponentStatus>,
}

impl Deployment {
    pub fn new(workload_id: impl Into<WorkloadId>) -> Self {
        Self {
            workload_id: workload_id.into(),
            desired: None,
            current: None,
            component_status: BTreeMap::new(),
        }
    }

    /// Profile that describes what is (or is about to be) running: the current
    /// state when known, otherwise the desired state.
    pub fn effective_profile(&self) -> Option<&DeploymentProfile> {
        self.current.as_ref().or(self.desired.as_ref())
    }

    /// Profile type of the effective profile
    pub fn profile_type(&self) -> Option<&ProfileType> {
        self.effective_profile().map(|p| &p.profile_type)
    }
}

/// Health of a single component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentState {
    /// Not known yet or backend reported something unrecognised
    Unknown,

    /// Backend reports the component as deployed
    Healthy,

    /// Backend reports a failed, pending or uninstalling component
    Unhealthy,
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentState::Unknown => write!(f, "unknown"),
            ComponentState::Healthy => write!(f, "healthy"),
            ComponentState::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Status of a single component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub state: ComponentState,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ComponentStatus {
    pub fn new(state: ComponentState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ComponentState::Unknown, message)
    }
}

/// Kind of state store change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Added,
    Deleted,
    /// Reserved, not emitted by the built-in store
    Changed,
}

/// Change notification emitted by the state store
#[derive(Debug, Clone)]
pub struct DatabaseEvent {
    pub event_type: EventType,
    pub deployment: Deployment,
    pub timestamp: DateTime<Utc>,
}

impl DatabaseEvent {
    pub fn new(event_type: EventType, deployment: Deployment) -> Self {
        Self {
            event_type,
            deployment,
            timestamp: Utc::now(),
        }
    }
}
