//! `/api/network-test/*`: the Network Test Strategy Engine's HTTP
//! surface. Strategies are derived from the knowledge store's current
//! insights and patterns on every request; execution runs the
//! previously generated set (or a caller-supplied subset) and streams the
//! aggregated reports.

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use futures::stream;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::AppState;

pub async fn strategies(State(state): State<AppState>) -> impl IntoResponse {
    let insights = state.store.get_all_insights(None);
    let patterns = state.store.get_all_patterns();
    let strategies = state.network_test.generate_strategies(&insights, &patterns);
    Json(json!({"strategies": strategies}))
}

#[derive(Debug, Deserialize, Default)]
pub struct RunRequest {
    #[serde(default)]
    pub strategy_ids: Option<Vec<String>>,
}

fn stream_json(value: &impl Serialize) -> impl IntoResponse {
    let bytes = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
    let body = Body::from_stream(stream::once(async move { Ok::<_, std::io::Error>(bytes) }));
    ([(header::CONTENT_TYPE, "application/json")], body)
}

pub async fn run(State(state): State<AppState>, Json(body): Json<RunRequest>) -> impl IntoResponse {
    if state.network_test.strategies().is_empty() {
        let insights = state.store.get_all_insights(None);
        let patterns = state.store.get_all_patterns();
        state.network_test.generate_strategies(&insights, &patterns);
    }
    match state.network_test.run_tests(body.strategy_ids.as_deref()).await {
        Ok(reports) => {
            let passed = reports.iter().filter(|r| matches!(r.verdict, crate::network_test::TestVerdict::Pass)).count();
            let failed = reports.iter().filter(|r| matches!(r.verdict, crate::network_test::TestVerdict::Fail)).count();
            let partial = reports.len() - passed - failed;
            let overall = if failed > 0 && passed == 0 {
                "fail"
            } else if failed == 0 && partial == 0 {
                "pass"
            } else {
                "partial"
            };
            stream_json(&json!({
                "overall": overall,
                "passed": passed,
                "failed": failed,
                "partial": partial,
                "reports": reports,
            }))
            .into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn results(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({"results": state.network_test.results()}))
}
