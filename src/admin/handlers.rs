use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::health::{HealthError, TaintPolicy, Target};
use crate::http::server::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub scheduler_running: bool,
    pub policy: String,
    pub targets: usize,
    pub healthy_targets: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TargetStatus {
    pub index: usize,
    pub name: String,
    pub url: String,
    pub compression: bool,
    pub tainted: bool,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub failure_ratio: f64,
    pub window_observations: usize,
}

impl From<&Target> for TargetStatus {
    fn from(target: &Target) -> Self {
        let state = target.state();
        let window = target.rolling_window();
        Self {
            index: target.index(),
            name: target.name().to_string(),
            url: target.connection().http.url.clone(),
            compression: target.connection().http.compression,
            tainted: state.tainted,
            consecutive_failures: state.consecutive_failures,
            consecutive_successes: state.consecutive_successes,
            failure_ratio: window.failure_ratio(),
            window_observations: window.len(),
        }
    }
}

/// Result of a manual taint override.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaintChange {
    pub name: String,
    pub tainted: bool,
    pub changed: bool,
}

pub struct AdminError(HealthError);

impl From<HealthError> for AdminError {
    fn from(e: HealthError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            HealthError::UnknownTarget(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({ "error": { "message": self.0.to_string() } });
        (status, Json(body)).into_response()
    }
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let targets = state.manager.targets();
    let healthy = targets.iter().filter(|t| !t.is_tainted()).count();
    let policy = match state.manager.policy() {
        TaintPolicy::Consecutive { .. } => "consecutive",
        TaintPolicy::RollingWindow { .. } => "rolling_window",
    };

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: if healthy > 0 { "operational" } else { "degraded" }.to_string(),
        scheduler_running: state.manager.is_running(),
        policy: policy.to_string(),
        targets: targets.len(),
        healthy_targets: healthy,
    })
}

pub async fn get_targets(State(state): State<AppState>) -> Json<Vec<TargetStatus>> {
    Json(state.manager.targets().iter().map(TargetStatus::from).collect())
}

pub async fn taint_target(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<TaintChange>, AdminError> {
    let changed = state.manager.taint_target(&name)?;
    tracing::info!(target_name = %name, changed, "Admin taint");
    Ok(Json(TaintChange {
        name,
        tainted: true,
        changed,
    }))
}

pub async fn untaint_target(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<TaintChange>, AdminError> {
    let changed = state.manager.remove_target_taint(&name)?;
    tracing::info!(target_name = %name, changed, "Admin untaint");
    Ok(Json(TaintChange {
        name,
        tainted: false,
        changed,
    }))
}
