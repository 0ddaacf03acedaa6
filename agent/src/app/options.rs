//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use crate::monitor::poller;
use crate::storage::settings::Settings;
use crate::utils::optional_secs;
use crate::watcher::WatcherOptions;
use crate::workers::reconciler;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Helm backend configuration
    pub helm: HelmOptions,

    /// Enable the local status server
    pub enable_status_server: bool,

    /// Server configuration
    pub server: ServerOptions,

    /// Component poller options
    pub poller: poller::Options,

    /// Workload watcher options
    pub watcher: WatcherOptions,

    /// Enable the desired-state reconciler
    pub enable_reconciler: bool,

    /// Reconciler worker options
    pub reconciler: reconciler::Options,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            helm: HelmOptions::default(),
            enable_status_server: true,
            server: ServerOptions::default(),
            poller: poller::Options::default(),
            watcher: WatcherOptions::default(),
            enable_reconciler: true,
            reconciler: reconciler::Options::default(),
        }
    }
}

impl From<&Settings> for AppOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            lifecycle: LifecycleOptions {
                max_shutdown_delay: Duration::from_secs(settings.lifecycle.max_shutdown_delay_secs),
            },
            helm: HelmOptions {
                binary: settings.helm.binary.clone(),
                default_namespace: settings.helm.default_namespace.clone(),
            },
            enable_status_server: settings.status_server.enabled,
            server: ServerOptions {
                host: settings.status_server.host.clone(),
                port: settings.status_server.port,
            },
            poller: poller::Options {
                interval: Duration::from_secs(settings.monitor.poll_interval_secs),
            },
            watcher: WatcherOptions {
                stop_timeout: optional_secs(settings.watcher.stop_timeout_secs),
            },
            enable_reconciler: settings.reconciler.enabled,
            reconciler: reconciler::Options {
                interval: Duration::from_secs(settings.reconciler.interval_secs),
                desired_state_file: PathBuf::from(&settings.reconciler.desired_state_file),
                ..Default::default()
            },
        }
    }
}

/// Lifecycle options for the agent
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(60),
        }
    }
}

/// Helm backend options
#[derive(Debug, Clone)]
pub struct HelmOptions {
    /// Helm executable
    pub binary: String,

    /// Namespace for components that do not name one
    pub default_namespace: String,
}

impl Default for HelmOptions {
    fn default() -> Self {
        Self {
            binary: "helm".to_string(),
            default_namespace: "default".to_string(),
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}
