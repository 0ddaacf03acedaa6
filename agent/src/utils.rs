//! Utility functions

use serde::{Deserialize, Serialize};

/// Version information for the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Convert a seconds setting into a duration, mapping 0 to `None`
pub fn optional_secs(secs: Option<u64>) -> Option<std::time::Duration> {
    secs.filter(|s| *s > 0).map(std::time::Duration::from_secs)
}
