//! HTTP request handlers

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::debug;

use crate::errors::AgentError;
use crate::models::deployment::ComponentStatus;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub watcher_started: bool,
}

/// Health check handler
pub async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "edge-reconciler".to_string(),
        version: version.version,
        watcher_started: state.watcher.is_started(),
    })
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Watched workloads response
#[derive(Debug, Serialize)]
pub struct WorkloadsResponse {
    pub workloads: Vec<String>,
    pub total: usize,
}

/// Lists workloads with an active watch
pub async fn workloads_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let workloads = state.watcher.active_watches();
    let total = workloads.len();
    Json(WorkloadsResponse { workloads, total })
}

/// Workload status response
#[derive(Debug, Serialize)]
pub struct WorkloadStatusResponse {
    pub workload_id: String,
    pub watched: bool,
    pub components: BTreeMap<String, ComponentStatus>,
}

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Live status of every component of one workload
pub async fn workload_status_handler(
    State(state): State<Arc<ServerState>>,
    Path(workload_id): Path<String>,
) -> Response {
    match state.watcher.get_deployment_status(&workload_id).await {
        Ok(components) => Json(WorkloadStatusResponse {
            watched: state.watcher.is_watching(&workload_id),
            workload_id,
            components,
        })
        .into_response(),
        Err(e) => {
            debug!("Status query for '{}' failed: {}", workload_id, e);
            (
                status_code_for(&e),
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// HTTP status for an agent error
pub fn status_code_for(err: &AgentError) -> StatusCode {
    match err.root() {
        AgentError::ValidationError(_) => StatusCode::BAD_REQUEST,
        AgentError::NotFound(_) => StatusCode::NOT_FOUND,
        AgentError::UnsupportedProfileType { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AgentError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
