//! Release name derivation
//!
//! Deployers and monitors both address backend resources through
//! [`release_name`], so the derivation must stay deterministic.

/// Longest release name the Helm backend accepts
pub const MAX_RELEASE_NAME_LEN: usize = 53;

/// Characters of the workload id kept when a name has to be shortened
const WORKLOAD_PREFIX_LEN: usize = 8;

/// Derive the backend release name for a workload component.
///
/// `{workload}-{component}`; when that exceeds [`MAX_RELEASE_NAME_LEN`], the
/// first 8 characters of the workload id are joined with the tail of the
/// component name that fits. The result is lower-cased with `_` turned into `-`.
pub fn release_name(workload_id: &str, component: &str) -> String {
    let workload_id = normalize(workload_id);
    let component = normalize(component);
    let joined = format!("{}-{}", workload_id, component);

    if joined.chars().count() <= MAX_RELEASE_NAME_LEN {
        return joined;
    }

    let prefix: String = workload_id.chars().take(WORKLOAD_PREFIX_LEN).collect();
    let budget = MAX_RELEASE_NAME_LEN - WORKLOAD_PREFIX_LEN - 1;
    let component_len = component.chars().count();
    let suffix: String = component
        .chars()
        .skip(component_len.saturating_sub(budget))
        .collect();
    format!("{}-{}", prefix, suffix)
}

/// Lower-casing can expand some characters, so it happens before measuring
fn normalize(part: &str) -> String {
    part.to_lowercase().replace('_', "-")
}
