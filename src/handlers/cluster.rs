//! `/api/cluster/*`: the Cluster Coordinator's HTTP surface. The tick
//! itself stays synchronous and lock-only; post-scale validation is
//! run here, outside the coordinator lock, via `RunPendingValidation`.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::ForgeError;
use crate::models::TaskType;
use crate::AppState;

/// Runs a tick's pending validation hand-off: if a scale event left a
/// pending slot, clear it and execute `NetworkAfterScale` outside any lock.
async fn run_pending_validation(state: &AppState) {
    if let Some((trigger, replica_name)) = state.coordinator.take_pending_validation() {
        match state.validation.network_after_scale(&trigger, &replica_name).await {
            Ok(result) => state.coordinator.push_validation_result(result),
            Err(e) => tracing::warn!(error = %e, trigger, replica_name, "post-scale validation failed"),
        }
    }
}

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.coordinator.status())
}

pub async fn tick(State(state): State<AppState>) -> impl IntoResponse {
    let result = state.coordinator.tick();
    run_pending_validation(&state).await;
    Json(result)
}

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub service_name: String,
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub priority: i32,
}

fn parse_task_type(s: Option<&str>) -> TaskType {
    match s {
        Some("generate_insights") => TaskType::GenerateInsights,
        _ => TaskType::Analyze,
    }
}

pub async fn enqueue(State(state): State<AppState>, Json(body): Json<EnqueueRequest>) -> impl IntoResponse {
    state.coordinator.register_service(&body.service_name);
    let item = state.coordinator.enqueue(&body.service_name, parse_task_type(body.task_type.as_deref()), body.priority);
    Json(item)
}

#[derive(Debug, Deserialize)]
pub struct SimulateLoadRequest {
    #[serde(default = "default_simulate_count")]
    pub count: usize,
}

fn default_simulate_count() -> usize {
    5
}

/// `SimulateLoad(count)` demo-bypass: ticks up to `min(count, 4)`
/// times with cooldown zeroed between ticks, then runs the pending
/// validation hand-off once for whichever tick left a slot set.
pub async fn simulate_load(
    State(state): State<AppState>,
    Json(body): Json<SimulateLoadRequest>,
) -> impl IntoResponse {
    let ticks = state.coordinator.simulate_load(body.count);
    run_pending_validation(&state).await;
    Json(json!({"ticks": ticks, "replica_count": state.coordinator.replicas().len()}))
}

#[derive(Debug, Deserialize)]
pub struct ScaleRequest {
    pub direction: String,
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn scale(State(state): State<AppState>, Json(body): Json<ScaleRequest>) -> impl IntoResponse {
    let reason = body.reason.unwrap_or_else(|| format!("manual {} scale", body.direction));
    match state.coordinator.scale(&body.direction, &reason) {
        Ok(event) => {
            run_pending_validation(&state).await;
            Json(event).into_response()
        }
        Err(e) => ForgeError::not_found(e).into_response(),
    }
}

pub async fn validations(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({"validations": state.coordinator.validations()}))
}

/// Runs a one-off validation on demand, independent of any scale event.
pub async fn validate(State(state): State<AppState>) -> impl IntoResponse {
    match state.validation.network_after_scale("manual", "forge-primary").await {
        Ok(result) => {
            state.coordinator.push_validation_result(result.clone());
            Json(result).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn complete(State(state): State<AppState>, Path(id): Path<String>, Json(body): Json<CompleteRequest>) -> impl IntoResponse {
    let ok = state.coordinator.complete_work(&id, body.success);
    if ok {
        Json(json!({"id": id, "completed": true})).into_response()
    } else {
        ForgeError::not_found(format!("work item '{id}' not found")).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    #[serde(default = "default_success")]
    pub success: bool,
}

fn default_success() -> bool {
    true
}

pub async fn events(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({"events": state.coordinator.scale_events()}))
}

pub async fn report(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.coordinator.status();
    let validations = state.coordinator.validations();
    let events = state.coordinator.scale_events();
    Json(json!({
        "status": status,
        "recent_validations": validations,
        "recent_scale_events": events,
    }))
}
