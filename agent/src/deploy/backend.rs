//! Helm backend
//!
//! The deployer and monitor only talk to Helm through [`HelmBackend`].
//! [`HelmCli`] drives the `helm` executable.

use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::errors::BackendFailure;

/// Everything needed to install or upgrade one release
#[derive(Debug, Clone, PartialEq)]
pub struct HelmRelease {
    pub name: String,
    /// Chart reference, or chart name when `repository` is set
    pub chart: String,
    /// Classic chart repository URL
    pub repository: Option<String>,
    pub version: Option<String>,
    pub namespace: String,
    pub values: Option<serde_json::Value>,
}

/// Operations the agent needs from Helm
#[async_trait]
pub trait HelmBackend: Send + Sync {
    async fn install(&self, release: &HelmRelease) -> Result<(), BackendFailure>;

    async fn upgrade(&self, release: &HelmRelease) -> Result<(), BackendFailure>;

    async fn uninstall(&self, name: &str, namespace: &str) -> Result<(), BackendFailure>;

    /// Whether a release of that name exists in the namespace, in any state
    async fn release_exists(&self, name: &str, namespace: &str) -> Result<bool, BackendFailure>;

    /// Native release status, e.g. "deployed" or "pending-upgrade"
    async fn status(&self, name: &str, namespace: &str) -> Result<String, BackendFailure>;
}

/// [`HelmBackend`] backed by the `helm` command line
#[derive(Debug, Clone)]
pub struct HelmCli {
    binary: String,
}

impl HelmCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[String], stdin: Option<Vec<u8>>) -> Result<Vec<u8>, BackendFailure> {
        let command = format!("{} {}", self.binary, args.first().map(String::as_str).unwrap_or(""));
        debug!("Running: {} {}", self.binary, args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BackendFailure::Spawn {
                command: command.clone(),
                source,
            })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(&input)
                .await
                .map_err(|source| BackendFailure::Spawn {
                    command: command.clone(),
                    source,
                })?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| BackendFailure::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(BackendFailure::CommandFailed {
                command,
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

fn values_input(release: &HelmRelease) -> Result<Option<Vec<u8>>, BackendFailure> {
    release
        .values
        .as_ref()
        .map(|v| serde_json::to_vec(v).map_err(|e| BackendFailure::Other(e.to_string())))
        .transpose()
}

/// Arguments for `helm install` / `helm upgrade`
pub fn release_args(action: &str, release: &HelmRelease) -> Vec<String> {
    let mut args = vec![
        action.to_string(),
        release.name.clone(),
        release.chart.clone(),
        "--namespace".to_string(),
        release.namespace.clone(),
    ];
    if action == "install" {
        args.push("--create-namespace".to_string());
    }
    if let Some(repository) = &release.repository {
        args.push("--repo".to_string());
        args.push(repository.clone());
    }
    if let Some(version) = &release.version {
        args.push("--version".to_string());
        args.push(version.clone());
    }
    if release.values.is_some() {
        // JSON is valid YAML, helm reads it from stdin
        args.push("--values".to_string());
        args.push("-".to_string());
    }
    args
}

#[derive(Debug, Deserialize)]
struct StatusOutput {
    info: StatusInfo,
}

#[derive(Debug, Deserialize)]
struct StatusInfo {
    status: String,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    name: String,
}

/// Whether `helm list --output json` contains the release
pub fn parse_list_contains(stdout: &[u8], name: &str) -> Result<bool, BackendFailure> {
    let entries: Vec<ListEntry> = serde_json::from_slice(stdout)
        .map_err(|e| BackendFailure::InvalidOutput(format!("helm list: {}", e)))?;
    Ok(entries.iter().any(|entry| entry.name == name))
}

/// Extract the release status from `helm status --output json`
pub fn parse_status(stdout: &[u8]) -> Result<String, BackendFailure> {
    let parsed: StatusOutput = serde_json::from_slice(stdout)
        .map_err(|e| BackendFailure::InvalidOutput(format!("helm status: {}", e)))?;
    Ok(parsed.info.status)
}

#[async_trait]
impl HelmBackend for HelmCli {
    async fn install(&self, release: &HelmRelease) -> Result<(), BackendFailure> {
        self.run(&release_args("install", release), values_input(release)?)
            .await
            .map(|_| ())
    }

    async fn upgrade(&self, release: &HelmRelease) -> Result<(), BackendFailure> {
        self.run(&release_args("upgrade", release), values_input(release)?)
            .await
            .map(|_| ())
    }

    async fn uninstall(&self, name: &str, namespace: &str) -> Result<(), BackendFailure> {
        let args = vec![
            "uninstall".to_string(),
            name.to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
        ];
        self.run(&args, None).await.map(|_| ())
    }

    async fn release_exists(&self, name: &str, namespace: &str) -> Result<bool, BackendFailure> {
        let args = vec![
            "list".to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
            "--filter".to_string(),
            format!("^{}$", name),
            "--all".to_string(),
            "--output".to_string(),
            "json".to_string(),
        ];
        let stdout = self.run(&args, None).await?;
        parse_list_contains(&stdout, name)
    }

    async fn status(&self, name: &str, namespace: &str) -> Result<String, BackendFailure> {
        let args = vec![
            "status".to_string(),
            name.to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
            "--output".to_string(),
            "json".to_string(),
        ];
        let stdout = self.run(&args, None).await?;
        parse_status(&stdout)
    }
}
