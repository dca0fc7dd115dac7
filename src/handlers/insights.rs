//! `/api/insights/*`: the knowledge store's read/write surface for
//! insights, patterns, and recommendations.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::ForgeError;
use crate::models::InsightStatus;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct InsightsQuery {
    pub status: Option<String>,
    pub severity: Option<String>,
    pub category: Option<String>,
}

pub async fn index(State(state): State<AppState>, Query(q): Query<InsightsQuery>) -> impl IntoResponse {
    let status_filter = q.status.as_deref().and_then(InsightStatus::parse);
    let mut insights = state.store.get_all_insights(status_filter);

    if let Some(sev) = q.severity.as_deref() {
        insights.retain(|i| format!("{:?}", i.insight.severity).eq_ignore_ascii_case(sev));
    }
    if let Some(cat) = q.category.as_deref() {
        insights.retain(|i| format!("{:?}", i.insight.category).eq_ignore_ascii_case(cat));
    }

    Json(json!({"insights": insights, "count": insights.len()}))
}

pub async fn patterns(State(state): State<AppState>) -> impl IntoResponse {
    let patterns = state.store.get_all_patterns();
    Json(json!({"patterns": patterns}))
}

pub async fn recommendations(State(state): State<AppState>) -> impl IntoResponse {
    let recommendations = state.store.get_recommendations();
    Json(json!({"recommendations": recommendations}))
}

pub async fn service_memory(State(state): State<AppState>, Path(service): Path<String>) -> impl IntoResponse {
    let memory = state.store.get_service_memory(&service);
    Json(json!({"service": service, "memory": memory}))
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub service_name: Option<String>,
}

pub async fn generate(
    State(state): State<AppState>,
    Json(body): Json<GenerateRequest>,
) -> impl IntoResponse {
    match state.orchestrator.generate_insights(body.service_name).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> impl IntoResponse {
    // An unrecognized status is a malformed request, not a missing resource.
    let Some(status) = InsightStatus::parse(&body.status) else {
        let body = Json(json!({"error": "bad_request", "detail": format!("unknown insight status '{}'", body.status)}));
        return (StatusCode::BAD_REQUEST, body).into_response();
    };
    match state.store.update_insight_status(&id, status) {
        Ok(true) => Json(json!({"id": id, "status": body.status})).into_response(),
        Ok(false) => ForgeError::not_found(format!("insight '{id}' not found")).into_response(),
        Err(e) => e.into_response(),
    }
}
