//! `/api/hooks/*`: webhook-style entry points for CI/CD deploy
//! notifications, the Datadog metrics-sync cron, and the full
//! scale-and-validate remediation pipeline.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::models::{BaselineMetrics, InsightCategory, Severity, TaskType};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DeployRequest {
    pub service: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default = "default_deploy_status")]
    pub status: String,
}

fn default_deploy_status() -> String {
    "success".to_string()
}

/// Records the deployment against the graph's topology (the deployment
/// record itself is owned by the graph adapter), then enqueues both an
/// `analyze` and a `generate_insights` work item so the next coordinator
/// tick picks up post-deploy analysis.
pub async fn deploy(State(state): State<AppState>, Json(body): Json<DeployRequest>) -> impl IntoResponse {
    let fields = json!({
        "last_deployment": {
            "version": body.version,
            "status": body.status,
            "deployed_at": chrono::Utc::now(),
        }
    });
    if let Err(e) = state.graph.write_metrics(&body.service, fields).await {
        tracing::warn!(error = %e, service = %body.service, "failed to record deployment on graph; continuing");
    }

    state.coordinator.register_service(&body.service);
    let analyze = state.coordinator.enqueue(&body.service, TaskType::Analyze, 10);
    let insights = state.coordinator.enqueue(&body.service, TaskType::GenerateInsights, 5);

    Json(json!({
        "service": body.service,
        "recorded": true,
        "enqueued": [analyze, insights],
    }))
}

#[derive(Debug, Deserialize)]
pub struct DatadogSyncRequest {
    #[serde(default)]
    pub services: Option<Vec<String>>,
}

/// For each service: pull `LiveMetricsForService`, write it back to both the
/// graph and the knowledge-store baseline, and auto-create a reliability
/// insight when the metrics look anomalous (health < 60 or p99 > 1000ms).
pub async fn datadog_sync(State(state): State<AppState>, Json(body): Json<DatadogSyncRequest>) -> impl IntoResponse {
    let services = body.services.unwrap_or_else(|| state.coordinator.known_services());
    let mut synced = Vec::new();
    let mut skipped = Vec::new();
    let mut insights_created = Vec::new();

    for service in &services {
        let live = match state.metrics.live_metrics_for_service(service).await {
            Ok(live) => live,
            Err(e) => {
                tracing::warn!(error = %e, service = %service, "metrics sync skipped service");
                skipped.push(service.clone());
                continue;
            }
        };

        let fields = json!({
            "health_score": live.health_score,
            "avg_latency_ms": live.avg_latency_ms,
            "p99_latency_ms": live.p99_latency_ms,
            "cpu_usage_percent": live.cpu_usage_percent,
            "mem_usage_percent": live.mem_usage_percent,
        });
        if let Err(e) = state.graph.write_metrics(service, fields).await {
            tracing::warn!(error = %e, service = %service, "failed to sync metrics back to graph");
        }

        let baseline_result = state.store.update_baseline(
            service,
            BaselineMetrics {
                p99_latency_ms: live.p99_latency_ms,
                avg_latency_ms: live.avg_latency_ms,
                health_score: live.health_score,
                cpu_usage_percent: live.cpu_usage_percent,
                rpm: 0,
                error_rate_percent: 0.0,
                measured_at: chrono::Utc::now(),
            },
        );
        if let Err(e) = baseline_result {
            return e.into_response();
        }

        if live.health_score < 60 || live.p99_latency_ms > 1000.0 {
            let insight = state.store.add_insight(
                service,
                InsightCategory::Reliability,
                Severity::High,
                format!("{service} showing degraded health after metrics sync"),
                format!(
                    "health_score={} p99_latency_ms={:.1} cpu={}% mem={}% alerting_monitors={}",
                    live.health_score, live.p99_latency_ms, live.cpu_usage_percent, live.mem_usage_percent, live.alerting_monitors
                ),
                serde_json::to_string(&live).unwrap_or_default(),
                "Investigate recent deploys and scale headroom for this service.",
            );
            match insight {
                Ok(id) => insights_created.push(id),
                Err(e) => return e.into_response(),
            }
        }

        synced.push(service.clone());
    }

    Json(json!({
        "synced": synced,
        "skipped": skipped,
        "insights_created": insights_created,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct ScaleHookRequest {
    pub service: String,
    pub cluster: String,
    pub direction: String,
    pub instance_count: u32,
    #[serde(default = "default_scale_reason")]
    pub reason: String,
    #[serde(default)]
    pub run_stability_test: bool,
    #[serde(default = "default_stabilization_wait")]
    pub stabilization_wait_seconds: u64,
}

fn default_scale_reason() -> String {
    "manual scale hook".to_string()
}

fn default_stabilization_wait() -> u64 {
    5
}

/// The full scale-and-validate pipeline: remediate via
/// `ScaleService`, then (when requested) a two-phase stability validation;
/// an unstable result records a new high-severity reliability insight.
pub async fn scale(State(state): State<AppState>, Json(body): Json<ScaleHookRequest>) -> impl IntoResponse {
    let before = body.instance_count;
    let after = match body.direction.as_str() {
        "up" => before + 1,
        "down" => before.saturating_sub(1),
        other => {
            let body = json!({"error": "bad_request", "detail": format!("unknown scale direction '{other}'")});
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    let action = match state.remediation.scale_service(&body.cluster, &body.service, after, &body.reason).await {
        Ok(action) => action,
        Err(e) => return e.into_response(),
    };

    let stability = if body.run_stability_test {
        match state
            .validation
            .validate_scale_stability(
                &body.service,
                &body.direction,
                before,
                after,
                body.stabilization_wait_seconds,
                "default",
            )
            .await
        {
            Ok(result) => {
                if !result.network_stable {
                    let _ = state.store.add_insight(
                        &body.service,
                        InsightCategory::Reliability,
                        Severity::High,
                        format!("Scale {} left {} network-unstable", body.direction, body.service),
                        format!(
                            "pre p99={:.1}ms post p99={:.1}ms pre_pass_rate={:.1}% post_pass_rate={:.1}%",
                            result.phase_1_pre_scale.p99_latency_ms,
                            result.phase_2_post_scale.p99_latency_ms,
                            result.phase_1_pre_scale.pass_rate,
                            result.phase_2_post_scale.pass_rate
                        ),
                        serde_json::to_string(&result).unwrap_or_default(),
                        "Consider rolling back the scale change or raising the target instance count further.",
                    );
                }
                Some(result)
            }
            Err(e) => {
                tracing::warn!(error = %e, service = %body.service, "stability validation failed");
                None
            }
        }
    } else {
        None
    };

    Json(json!({
        "action": action,
        "instances_before": before,
        "instances_after": after,
        "stability": stability,
    }))
    .into_response()
}
