//! Error types for the reconciliation agent

use thiserror::Error;

/// Main error type for the agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(
        "Unsupported deployment profile type '{requested}' (available: [{}])",
        .available.join(", ")
    )]
    UnsupportedProfileType {
        requested: String,
        available: Vec<String>,
    },

    #[error("{operation} failed for workload '{workload_id}': {source}")]
    BackendError {
        operation: String,
        workload_id: String,
        #[source]
        source: BackendFailure,
    },

    #[error("failed to get deployment '{workload_id}': {source}")]
    GetDeployment {
        workload_id: String,
        #[source]
        source: Box<AgentError>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not yet implemented: {0}")]
    NotImplemented(String),

    #[error("Deployment profile error: {0}")]
    ProfileError(String),

    #[error("State store error: {0}")]
    StateStoreError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Wrap a backend failure with the operation and workload it belongs to
    pub fn backend(
        operation: impl Into<String>,
        workload_id: impl Into<String>,
        source: BackendFailure,
    ) -> Self {
        AgentError::BackendError {
            operation: operation.into(),
            workload_id: workload_id.into(),
            source,
        }
    }

    /// Wrap a state store read failure
    pub fn get_deployment(workload_id: impl Into<String>, source: AgentError) -> Self {
        AgentError::GetDeployment {
            workload_id: workload_id.into(),
            source: Box::new(source),
        }
    }

    /// Walk through `GetDeployment` wrappers to the underlying error
    pub fn root(&self) -> &AgentError {
        match self {
            AgentError::GetDeployment { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Internal(err.to_string())
    }
}

/// Failure reported by a deployment or monitoring backend
#[derive(Error, Debug)]
pub enum BackendFailure {
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with {}: {stderr}", exit_code_label(.exit_code))]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("invalid backend output: {0}")]
    InvalidOutput(String),

    #[error("{0}")]
    Other(String),
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "signal".to_string(),
    }
}
