//! Edge Reconciler - Entry Point
//!
//! Deploys workloads described by a desired-state file and keeps the live
//! status of every component queryable over a local HTTP API.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use edge_reconciler::app::options::AppOptions;
use edge_reconciler::app::run::run;
use edge_reconciler::logs::{init_logging, LogOptions};
use edge_reconciler::storage::settings::Settings;
use edge_reconciler::utils::version_info;

use tracing::{error, info, warn};

const DEFAULT_SETTINGS_FILE: &str = "/etc/edge-reconciler/settings.json";

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{}", version.version),
        }
        return;
    }

    // Retrieve the settings file
    let settings_path = cli_args
        .get("settings")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
    let explicit_settings = cli_args.contains_key("settings");
    let (settings, settings_error) = if settings_path.exists() || explicit_settings {
        match Settings::load(&settings_path).await {
            Ok(settings) => (settings, None),
            Err(e) => {
                eprintln!("Unable to read settings file {}: {e}", settings_path.display());
                return;
            }
        }
    } else {
        (Settings::default(), Some(settings_path.display().to_string()))
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.log_json,
        log_dir: settings.log_dir.as_ref().map(PathBuf::from),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };
    if let Some(path) = settings_error {
        warn!("No settings file at {}, using defaults", path);
    }

    // Run the agent
    let options = AppOptions::from(&settings);
    info!(
        "Running edge reconciler {} with options: {:?}",
        version.version, options
    );
    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Failed to run the edge reconciler: {e}");
        std::process::exit(1);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Unable to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
