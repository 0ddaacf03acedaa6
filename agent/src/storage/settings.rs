//! Settings file management

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::AgentError;
use crate::logs::LogLevel;

/// Agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Directory for rolling log files; stdout only when absent
    #[serde(default)]
    pub log_dir: Option<String>,

    #[serde(default)]
    pub helm: HelmSettings,

    #[serde(default)]
    pub monitor: MonitorSettings,

    #[serde(default)]
    pub reconciler: ReconcilerSettings,

    #[serde(default)]
    pub status_server: StatusServerSettings,

    #[serde(default)]
    pub watcher: WatcherSettings,

    #[serde(default)]
    pub lifecycle: LifecycleSettings,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            helm: HelmSettings::default(),
            monitor: MonitorSettings::default(),
            reconciler: ReconcilerSettings::default(),
            status_server: StatusServerSettings::default(),
            watcher: WatcherSettings::default(),
            lifecycle: LifecycleSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub async fn load(path: &Path) -> Result<Self, AgentError> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            AgentError::ConfigError(format!("unable to read {}: {}", path.display(), e))
        })?;
        let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
            AgentError::ConfigError(format!("unable to parse {}: {}", path.display(), e))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        if self.monitor.poll_interval_secs == 0 {
            return Err(AgentError::ConfigError(
                "monitor.poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.reconciler.enabled && self.reconciler.interval_secs == 0 {
            return Err(AgentError::ConfigError(
                "reconciler.interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.helm.binary.is_empty() {
            return Err(AgentError::ConfigError(
                "helm.binary must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Helm backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelmSettings {
    /// Path or name of the helm executable
    #[serde(default = "default_helm_binary")]
    pub binary: String,

    /// Namespace used when a component does not set one
    #[serde(default = "default_namespace")]
    pub default_namespace: String,
}

fn default_helm_binary() -> String {
    "helm".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

impl Default for HelmSettings {
    fn default() -> Self {
        Self {
            binary: default_helm_binary(),
            default_namespace: default_namespace(),
        }
    }
}

/// Status polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    30
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
        }
    }
}

/// Desired-state reconciler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_reconcile_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_desired_state_file")]
    pub desired_state_file: String,
}

fn default_reconcile_interval() -> u64 {
    60
}

fn default_desired_state_file() -> String {
    "/etc/edge-reconciler/desired.json".to_string()
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_reconcile_interval(),
            desired_state_file: default_desired_state_file(),
        }
    }
}

/// Local status server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusServerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for StatusServerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Workload watcher settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatcherSettings {
    /// Upper bound on waiting for polling tasks at stop; unbounded when absent
    #[serde(default)]
    pub stop_timeout_secs: Option<u64>,
}

/// Process lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleSettings {
    #[serde(default = "default_max_shutdown_delay")]
    pub max_shutdown_delay_secs: u64,
}

fn default_max_shutdown_delay() -> u64 {
    60
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            max_shutdown_delay_secs: default_max_shutdown_delay(),
        }
    }
}
