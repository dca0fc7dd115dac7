//! `/api/graph/*`: the service-topology read surface consumed by the
//! dashboard's force-directed graph widget.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use futures::stream;
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Debug, Clone, Serialize)]
struct Node {
    id: String,
    label: String,
    #[serde(rename = "type")]
    kind: String,
    team: String,
    criticality: String,
    health_score: i32,
    avg_latency_ms: f64,
    p99_latency_ms: f64,
    color: &'static str,
    val: u32,
}

#[derive(Debug, Clone, Serialize)]
struct Link {
    source: String,
    target: String,
    avg_latency_ms: f64,
    p99_latency_ms: f64,
    rpm: i64,
}

#[derive(Debug, Clone, Serialize)]
struct GraphResponse {
    nodes: Vec<Node>,
    links: Vec<Link>,
    #[serde(skip_serializing_if = "Option::is_none")]
    center: Option<String>,
}

fn color_for(health_score: i32) -> &'static str {
    if health_score >= 80 {
        "green"
    } else if health_score >= 50 {
        "amber"
    } else {
        "red"
    }
}

fn val_for(criticality: &str) -> u32 {
    if criticality.eq_ignore_ascii_case("critical") {
        8
    } else {
        5
    }
}

fn node_from_health(name: &str, health: &crate::adapters::graph::ServiceHealth) -> Node {
    Node {
        id: name.to_string(),
        label: name.to_string(),
        kind: health.service_type.clone(),
        team: health.team.clone(),
        criticality: health.criticality.clone(),
        health_score: health.health_score,
        avg_latency_ms: health.avg_latency_ms,
        p99_latency_ms: health.p99_latency_ms,
        color: color_for(health.health_score),
        val: val_for(&health.criticality),
    }
}

/// Graph-adapter-backed nodes when an endpoint is configured; otherwise falls
/// back to the knowledge store's baseline metrics so the surface still
/// renders something in demo mode: graph failures leave an empty
/// topology, not a broken response.
async fn build_full_graph(state: &AppState) -> GraphResponse {
    match state.graph.list_services().await {
        Ok(names) => {
            let mut nodes = Vec::with_capacity(names.len());
            let mut links = Vec::new();
            for name in &names {
                if let Ok(health) = state.graph.service_health(name).await {
                    nodes.push(node_from_health(name, &health));
                }
                if let Ok(deps) = state.graph.dependencies(name).await {
                    for edge in deps.downstream {
                        if names.contains(&edge.name) {
                            links.push(Link {
                                source: name.clone(),
                                target: edge.name.clone(),
                                avg_latency_ms: edge.avg_latency_ms,
                                p99_latency_ms: edge.p99_latency_ms,
                                rpm: edge.requests_per_min,
                            });
                        }
                    }
                }
            }
            GraphResponse { nodes, links, center: None }
        }
        Err(e) => {
            tracing::warn!(error = %e, "graph adapter unavailable; serving knowledge-store fallback for /api/graph/");
            let snapshot = state.store.snapshot();
            let nodes = snapshot
                .services
                .iter()
                .map(|(name, mem)| {
                    let baseline = mem.baseline_metrics.as_ref();
                    let health_score = baseline.map(|b| b.health_score).unwrap_or(0);
                    Node {
                        id: name.clone(),
                        label: name.clone(),
                        kind: "unknown".to_string(),
                        team: "unknown".to_string(),
                        criticality: "medium".to_string(),
                        health_score,
                        avg_latency_ms: baseline.map(|b| b.avg_latency_ms).unwrap_or(0.0),
                        p99_latency_ms: baseline.map(|b| b.p99_latency_ms).unwrap_or(0.0),
                        color: color_for(health_score),
                        val: 5,
                    }
                })
                .collect();
            GraphResponse { nodes, links: Vec::new(), center: None }
        }
    }
}

/// Response body is built once and handed to a single-chunk stream so the
/// handler honors the streamed-body contract without a custom incremental
/// JSON encoder.
fn stream_json(value: &impl Serialize) -> impl IntoResponse {
    let bytes = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
    let body = Body::from_stream(stream::once(async move { Ok::<_, std::io::Error>(bytes) }));
    ([(header::CONTENT_TYPE, "application/json")], body)
}

pub async fn index(State(state): State<AppState>) -> impl IntoResponse {
    let graph = build_full_graph(&state).await;
    stream_json(&graph)
}

#[derive(Debug, Deserialize)]
pub struct EgoGraphQuery {
    #[serde(default = "default_hops")]
    pub hops: u32,
}

fn default_hops() -> u32 {
    2
}

pub async fn service_ego_graph(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(q): Query<EgoGraphQuery>,
) -> impl IntoResponse {
    let members = match state.graph.blast_radius(&name, q.hops).await {
        Ok(mut members) => {
            if !members.iter().any(|m| m == &name) {
                members.push(name.clone());
            }
            members
        }
        Err(e) => {
            tracing::warn!(error = %e, service = %name, "graph adapter unavailable; serving single-node ego graph");
            vec![name.clone()]
        }
    };

    let mut nodes = Vec::with_capacity(members.len());
    let mut links = Vec::new();
    for member in &members {
        match state.graph.service_health(member).await {
            Ok(health) => nodes.push(node_from_health(member, &health)),
            Err(_) => {
                let baseline = state.store.get_service_memory(member).baseline_metrics;
                let health_score = baseline.as_ref().map(|b| b.health_score).unwrap_or(0);
                nodes.push(Node {
                    id: member.clone(),
                    label: member.clone(),
                    kind: "unknown".to_string(),
                    team: "unknown".to_string(),
                    criticality: "medium".to_string(),
                    health_score,
                    avg_latency_ms: baseline.as_ref().map(|b| b.avg_latency_ms).unwrap_or(0.0),
                    p99_latency_ms: baseline.as_ref().map(|b| b.p99_latency_ms).unwrap_or(0.0),
                    color: color_for(health_score),
                    val: 5,
                });
            }
        }
        if let Ok(deps) = state.graph.dependencies(member).await {
            for edge in deps.downstream {
                if members.contains(&edge.name) {
                    links.push(Link {
                        source: member.clone(),
                        target: edge.name.clone(),
                        avg_latency_ms: edge.avg_latency_ms,
                        p99_latency_ms: edge.p99_latency_ms,
                        rpm: edge.requests_per_min,
                    });
                }
            }
        }
    }

    stream_json(&GraphResponse { nodes, links, center: Some(name) })
}
