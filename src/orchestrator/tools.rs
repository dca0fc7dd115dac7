//! The LLM tool-calling surface: one dispatch table mapping tool
//! name to an adapter operation or a Knowledge Store write, covering the
//! five graph tools, the metrics/event tools, the two remediation-
//! validation tools, and five memory tools. Grounded in
//! `agent/tools/memory_tools.py` and `agent/agent.py::build_agent`'s tool
//! assembly.

use crate::adapters::llm::ToolSpec;
use crate::adapters::{GraphAdapter, MetricsAdapter, RemediationAdapter, ValidationAdapter};
use crate::error::{ForgeError, ForgeResult};
use crate::store::KnowledgeStore;
use serde_json::{Value, json};
use std::sync::Arc;

pub fn tool_specs() -> Vec<ToolSpec> {
    let empty_params = json!({"type": "object", "properties": {}});
    let service_param = json!({
        "type": "object",
        "properties": { "service": { "type": "string" } },
        "required": ["service"],
    });
    vec![
        ToolSpec {
            name: "service_health".into(),
            description: "Look up a service's current health score, criticality, and latency from the topology graph.".into(),
            parameters: service_param.clone(),
        },
        ToolSpec {
            name: "get_dependencies".into(),
            description: "List a service's upstream and downstream CALLS edges.".into(),
            parameters: service_param.clone(),
        },
        ToolSpec {
            name: "blast_radius".into(),
            description: "Return the set of services that transitively call the target, capped at max_hops.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "service": {"type": "string"},
                    "max_hops": {"type": "integer", "default": 3},
                },
                "required": ["service"],
            }),
        },
        ToolSpec {
            name: "recent_changes".into(),
            description: "List recent deployments for a service within the lookback window.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"service": {"type": "string"}, "hours": {"type": "integer", "default": 24}},
                "required": ["service"],
            }),
        },
        ToolSpec {
            name: "slowest_dependencies".into(),
            description: "Rank a service's dependencies by p99 latency, slowest first.".into(),
            parameters: service_param.clone(),
        },
        ToolSpec {
            name: "monitors_snapshot".into(),
            description: "Summarize currently firing monitors/alerts across the fleet.".into(),
            parameters: empty_params.clone(),
        },
        ToolSpec {
            name: "recent_events".into(),
            description: "List recent observability events (deploys, alerts, config changes).".into(),
            parameters: json!({
                "type": "object",
                "properties": {"hours_back": {"type": "integer", "default": 24}, "tags": {"type": "string", "default": ""}},
            }),
        },
        ToolSpec {
            name: "validate_service_recovery".into(),
            description: "Run the recovery test suite against a service and compare to its latency baseline.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"service": {"type": "string"}, "baseline_p99_ms": {"type": "number"}},
                "required": ["service", "baseline_p99_ms"],
            }),
        },
        ToolSpec {
            name: "validate_scale_stability".into(),
            description: "Run the two-phase pre/post-scale stability check for a service.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "service": {"type": "string"},
                    "direction": {"type": "string", "enum": ["up", "down"]},
                    "before": {"type": "integer"},
                    "after": {"type": "integer"},
                },
                "required": ["service", "direction", "before", "after"],
            }),
        },
        ToolSpec {
            name: "store_insight".into(),
            description: "Persist a durable insight about a service into the knowledge store.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "service": {"type": "string"},
                    "category": {"type": "string", "enum": ["performance", "reliability", "cost", "optimization"]},
                    "severity": {"type": "string", "enum": ["low", "medium", "high", "critical"]},
                    "title": {"type": "string"},
                    "insight": {"type": "string"},
                    "recommendation": {"type": "string"},
                },
                "required": ["service", "category", "severity", "title", "insight"],
            }),
        },
        ToolSpec {
            name: "store_pattern".into(),
            description: "Persist (or merge into) a recurring behavioral pattern for a service.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "service": {"type": "string"},
                    "pattern_type": {"type": "string"},
                    "description": {"type": "string"},
                    "confidence": {"type": "number"},
                    "recommendation": {"type": "string"},
                },
                "required": ["service", "pattern_type", "description"],
            }),
        },
        ToolSpec {
            name: "recall_service_history".into(),
            description: "Recall the stored baseline, patterns, and insights for a service.".into(),
            parameters: service_param.clone(),
        },
        ToolSpec {
            name: "recall_similar_incidents".into(),
            description: "Recall patterns for a service that resemble a described incident.".into(),
            parameters: service_param.clone(),
        },
        ToolSpec {
            name: "get_optimization_recommendations".into(),
            description: "List open, high/critical-severity recommendations, optionally filtered to one service.".into(),
            parameters: json!({"type": "object", "properties": {"service": {"type": "string"}}}),
        },
    ]
}

/// Bundles the adapters/store the dispatcher needs; constructed once per
/// analysis so tool calls never need to thread individual references.
pub struct ToolContext<'a> {
    pub store: &'a Arc<KnowledgeStore>,
    pub graph: &'a Arc<dyn GraphAdapter>,
    pub metrics: &'a Arc<dyn MetricsAdapter>,
    pub remediation: &'a Arc<dyn RemediationAdapter>,
    pub validation: &'a Arc<dyn ValidationAdapter>,
}

pub async fn dispatch(ctx: &ToolContext<'_>, name: &str, args: &Value) -> ForgeResult<Value> {
    let arg_str = |key: &str| args.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let arg_u32 = |key: &str, default: u32| args.get(key).and_then(|v| v.as_u64()).map(|v| v as u32).unwrap_or(default);
    let arg_f64 = |key: &str| args.get(key).and_then(|v| v.as_f64()).unwrap_or_default();

    match name {
        "service_health" => {
            let health = ctx.graph.service_health(&arg_str("service")).await?;
            Ok(serde_json::to_value(health)?)
        }
        "get_dependencies" => {
            let deps = ctx.graph.dependencies(&arg_str("service")).await?;
            Ok(serde_json::to_value(deps)?)
        }
        "blast_radius" => {
            let nodes = ctx.graph.blast_radius(&arg_str("service"), arg_u32("max_hops", 3)).await?;
            Ok(json!({"affected": nodes}))
        }
        "recent_changes" => {
            let changes = ctx.graph.recent_changes(&arg_str("service"), arg_u32("hours", 24)).await?;
            Ok(serde_json::to_value(changes)?)
        }
        "slowest_dependencies" => {
            let deps = ctx.graph.slowest_dependencies(&arg_str("service")).await?;
            Ok(serde_json::to_value(deps)?)
        }
        "monitors_snapshot" => Ok(serde_json::to_value(ctx.metrics.monitors_snapshot().await?)?),
        "recent_events" => {
            let events = ctx.metrics.recent_events(arg_u32("hours_back", 24), &arg_str("tags"), 20).await?;
            Ok(serde_json::to_value(events)?)
        }
        "validate_service_recovery" => {
            let result = ctx.validation.validate_recovery(&arg_str("service"), arg_f64("baseline_p99_ms"), "tool-call").await?;
            Ok(serde_json::to_value(result)?)
        }
        "validate_scale_stability" => {
            let result = ctx
                .validation
                .validate_scale_stability(
                    &arg_str("service"),
                    &arg_str("direction"),
                    arg_u32("before", 1),
                    arg_u32("after", 2),
                    1,
                    "tool-call",
                )
                .await?;
            Ok(serde_json::to_value(result)?)
        }
        "store_insight" => {
            let category = crate::models::InsightCategory::Performance; // overwritten below if parseable
            let category = match arg_str("category").as_str() {
                "reliability" => crate::models::InsightCategory::Reliability,
                "cost" => crate::models::InsightCategory::Cost,
                "optimization" => crate::models::InsightCategory::Optimization,
                _ => category,
            };
            let severity = match arg_str("severity").as_str() {
                "low" => crate::models::Severity::Low,
                "high" => crate::models::Severity::High,
                "critical" => crate::models::Severity::Critical,
                _ => crate::models::Severity::Medium,
            };
            let id = ctx.store.add_insight(
                &arg_str("service"),
                category,
                severity,
                arg_str("title"),
                arg_str("insight"),
                "{}",
                arg_str("recommendation"),
            )?;
            Ok(json!({"id": id}))
        }
        "store_pattern" => {
            let id = ctx.store.add_pattern(
                &arg_str("service"),
                arg_str("pattern_type"),
                arg_str("description"),
                args.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.5),
                arg_str("recommendation"),
            )?;
            Ok(json!({"id": id}))
        }
        "recall_service_history" | "recall_similar_incidents" => {
            Ok(serde_json::to_value(ctx.store.get_service_memory(&arg_str("service")))?)
        }
        "get_optimization_recommendations" => {
            let service = arg_str("service");
            let mut recs = ctx.store.get_recommendations();
            if !service.is_empty() {
                recs.retain(|r| r.service == service);
            }
            Ok(serde_json::to_value(recs)?)
        }
        other => Err(ForgeError::Llm(format!("unknown tool: {other}"))),
    }
}
