//! `/api/agent/*`: on-demand analysis, the chat SSE feed, the activity
//! feed, and the per-service health summary consumed by dashboards.

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::{self, Stream};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;

use crate::models::AnalysisTrigger;
use crate::orchestrator::ChatFrame;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub service: String,
    #[serde(default = "default_trigger")]
    pub trigger: AnalysisTrigger,
}

fn default_trigger() -> AnalysisTrigger {
    AnalysisTrigger::Manual
}

pub async fn analyze(State(state): State<AppState>, Json(body): Json<AnalyzeRequest>) -> impl IntoResponse {
    state.coordinator.register_service(&body.service);
    match state.orchestrator.analyze_service(&body.service, body.trigger).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let frames = state.orchestrator.chat_stream(&body.message).await;
    let events = frames.map(|frame| {
        let event = match frame {
            ChatFrame::Text(content) => Event::default().json_data(json!({"type": "text", "content": content})),
            ChatFrame::Error(content) => Event::default().json_data(json!({"type": "error", "content": content})),
        };
        Ok(event.unwrap_or_else(|_| Event::default()))
    });
    let done = stream::once(async { Ok(Event::default().json_data(json!({"type": "done", "content": ""})).expect("static json")) });
    Sse::new(events.chain(done)).keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    #[serde(default)]
    pub since_id: u64,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

pub async fn activity(State(state): State<AppState>, Query(q): Query<ActivityQuery>) -> impl IntoResponse {
    let entries = state.activity_log.recent(q.since_id, q.limit);
    Json(json!({"activity": entries, "count": entries.len()}))
}

pub async fn agent_health(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.store.snapshot();
    let services: Vec<_> = snapshot
        .services
        .iter()
        .filter_map(|(name, mem)| {
            let baseline = mem.baseline_metrics.as_ref()?;
            Some(json!({
                "service": name,
                "health_score": baseline.health_score,
                "avg_latency_ms": baseline.avg_latency_ms,
                "p99_latency_ms": baseline.p99_latency_ms,
                "updated_at": baseline.measured_at,
            }))
        })
        .collect();
    Json(json!({"services": services, "timestamp": chrono::Utc::now()}))
}
