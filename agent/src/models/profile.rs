//! Deployment profile decoding
//!
//! Turns the state-store representation of a workload ([`DeploymentProfile`])
//! into a normalized [`DeploymentSpec`] whose components carry typed,
//! backend-specific properties.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::errors::AgentError;
use crate::models::deployment::{DeploymentProfile, ProfileType, RawComponent, WorkloadId};

/// Normalized deployment specification for one workload
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentSpec {
    pub workload_id: WorkloadId,
    pub profile_type: ProfileType,
    pub components: Vec<ComponentSpec>,
}

impl DeploymentSpec {
    pub fn component(&self, name: &str) -> Option<&ComponentSpec> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn component_names(&self) -> Vec<String> {
        self.components.iter().map(|c| c.name.clone()).collect()
    }
}

/// One named component of a deployment
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSpec {
    pub name: String,
    pub profile_type: ProfileType,
    pub properties: ComponentProperties,
}

/// Backend-specific component properties
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentProperties {
    Helm(HelmProperties),
    Compose(ComposeProperties),
    /// Properties of a profile type this build has no typed view of
    Opaque(serde_json::Value),
}

/// Helm chart component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HelmProperties {
    /// Chart reference (OCI URL) or classic repository URL when `chart` is set
    #[serde(default)]
    pub repository: String,

    /// Chart name inside `repository`
    #[serde(default)]
    pub chart: Option<String>,

    /// Chart version
    #[serde(default)]
    pub revision: Option<String>,

    #[serde(default)]
    pub namespace: Option<String>,

    /// Values passed to the chart
    #[serde(default)]
    pub values: Option<serde_json::Value>,
}

/// Compose component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposeProperties {
    #[serde(default)]
    pub package_location: Option<String>,

    #[serde(default)]
    pub key_location: Option<String>,
}

/// Decode a stored profile into a deployment spec.
///
/// Malformed component properties are reported as [`AgentError::ProfileError`].
pub fn decode_profile(
    workload_id: &str,
    profile: &DeploymentProfile,
) -> Result<DeploymentSpec, AgentError> {
    let mut seen = HashSet::new();
    let mut components = Vec::with_capacity(profile.components.len());

    for raw in &profile.components {
        if raw.name.trim().is_empty() {
            return Err(AgentError::ProfileError(format!(
                "workload '{}' has a component without a name",
                workload_id
            )));
        }
        if !seen.insert(raw.name.as_str()) {
            return Err(AgentError::ProfileError(format!(
                "workload '{}' declares component '{}' more than once",
                workload_id, raw.name
            )));
        }
        components.push(decode_component(workload_id, &profile.profile_type, raw)?);
    }

    Ok(DeploymentSpec {
        workload_id: workload_id.to_string(),
        profile_type: profile.profile_type.clone(),
        components,
    })
}

fn decode_component(
    workload_id: &str,
    profile_type: &ProfileType,
    raw: &RawComponent,
) -> Result<ComponentSpec, AgentError> {
    let properties = match profile_type.as_str() {
        ProfileType::HELM_V3 => ComponentProperties::Helm(parse_properties(workload_id, raw)?),
        ProfileType::COMPOSE => ComponentProperties::Compose(parse_properties(workload_id, raw)?),
        _ => ComponentProperties::Opaque(raw.properties.clone()),
    };

    Ok(ComponentSpec {
        name: raw.name.clone(),
        profile_type: profile_type.clone(),
        properties,
    })
}

fn parse_properties<T>(workload_id: &str, raw: &RawComponent) -> Result<T, AgentError>
where
    T: serde::de::DeserializeOwned + Default,
{
    if raw.properties.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(raw.properties.clone()).map_err(|e| {
        AgentError::ProfileError(format!(
            "invalid properties for component '{}' of workload '{}': {}",
            raw.name, workload_id, e
        ))
    })
}
