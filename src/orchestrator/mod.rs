//! Agent Orchestrator: the per-analysis workflow. Combines topology
//! queries, live metrics, persistent memory recall, remediation execution,
//! validation, and insight capture into one structured [`Report`]. Falls
//! back to a deterministic synthetic report when the LLM is unavailable or
//! returns unparseable output. Grounded in `agent/agent.py`.

mod fallback;
mod library;
mod tools;

use crate::action_log::ActionLog;
use crate::activity_log::ActivityLog;
use crate::adapters::llm::{LlmAdapter, LlmResponse};
use crate::adapters::{GraphAdapter, MetricsAdapter, RemediationAdapter, ValidationAdapter};
use crate::error::ForgeResult;
use crate::models::{ActivityEventType, ActivitySource, AnalysisTrigger, BaselineMetrics};
use crate::store::KnowledgeStore;
use chrono::{DateTime, Utc};
use fallback::{ROOT_CAUSE_LIBRARY, SeededRng, chat_summary_template, seed_for, status_for_health};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tools::ToolContext;

/// One frame of a streamed chat reply (`/api/agent/chat`).
#[derive(Debug, Clone)]
pub enum ChatFrame {
    Text(String),
    Error(String),
}

const CHAT_SYSTEM_PROMPT: &str = "You are Forge, an autonomous SRE agent answering operator questions about \
    the fleet's health, recent incidents, and outstanding recommendations. Be concise.";

const MAX_TOOL_ITERATIONS: usize = 6;
const DEMO_SERVICE_ROSTER: [&str; 5] =
    ["api-gateway", "payment-service", "order-service", "inventory-service", "notification-service"];

#[derive(Debug, Clone, Serialize)]
pub struct Anomaly {
    #[serde(rename = "type")]
    pub kind: String,
    pub metric: String,
    pub current_value: f64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionTaken {
    pub action_type: String,
    pub service: String,
    pub result: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationSummary {
    pub recovered: bool,
    pub latency_p99_ms: f64,
    pub pass_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub health_score: i32,
    pub status: String,
    pub anomalies: Vec<Anomaly>,
    pub root_cause: String,
    pub root_cause_service: String,
    pub affected_upstream: Vec<String>,
    pub recommended_action: String,
    pub actions_taken: Vec<ActionTaken>,
    pub validation: ValidationSummary,
    pub chat_summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateInsightsSummary {
    pub services_analyzed: Vec<String>,
    pub insights_generated_count: usize,
    pub patterns_detected_count: usize,
    pub top_recommendations: Vec<String>,
}

pub struct Orchestrator {
    store: Arc<KnowledgeStore>,
    activity_log: Arc<ActivityLog>,
    #[allow(dead_code)]
    action_log: Arc<ActionLog>,
    graph: Arc<dyn GraphAdapter>,
    metrics: Arc<dyn MetricsAdapter>,
    remediation: Arc<dyn RemediationAdapter>,
    validation: Arc<dyn ValidationAdapter>,
    llm: Arc<dyn LlmAdapter>,
    background_llm: Arc<dyn LlmAdapter>,
    background_timeout: Duration,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<KnowledgeStore>,
        activity_log: Arc<ActivityLog>,
        action_log: Arc<ActionLog>,
        graph: Arc<dyn GraphAdapter>,
        metrics: Arc<dyn MetricsAdapter>,
        remediation: Arc<dyn RemediationAdapter>,
        validation: Arc<dyn ValidationAdapter>,
        llm: Arc<dyn LlmAdapter>,
        background_llm: Arc<dyn LlmAdapter>,
        background_timeout: Duration,
    ) -> Self {
        Self { store, activity_log, action_log, graph, metrics, remediation, validation, llm, background_llm, background_timeout }
    }

    fn tool_ctx(&self) -> ToolContext<'_> {
        ToolContext {
            store: &self.store,
            graph: &self.graph,
            metrics: &self.metrics,
            remediation: &self.remediation,
            validation: &self.validation,
        }
    }

    /// `AnalyzeService(name) -> Report`.
    pub async fn analyze_service(&self, service: &str, trigger: AnalysisTrigger) -> ForgeResult<Report> {
        self.activity_log.log(
            ActivityEventType::Analysis,
            ActivitySource::Primary,
            format!("analyzing {service}"),
            "",
            json!({"service": service, "trigger": format!("{trigger:?}")}),
        );

        let report = match self.run_llm_workflow(service).await {
            Some(report) => report,
            None => self.deterministic_fallback(service).await,
        };

        // Unconditional post-analysis deepening: every analysis leaves a
        // durable trace regardless of which path produced the report.
        let (insight_ids, pattern_count) = self.seed_demo_knowledge(service).await;

        self.spawn_background_deepening(service.to_string());

        let actions_summary: Vec<String> = report.actions_taken.iter().map(|a| a.action_type.clone()).collect();
        let session_id = self.store.record_analysis(
            trigger,
            vec![service.to_string()],
            report.chat_summary.clone(),
            actions_summary,
            insight_ids,
        )?;
        tracing::debug!(session_id, service, patterns = pattern_count, "analysis recorded");

        Ok(report)
    }

    /// Attempt the LLM-driven tool-calling workflow. Returns `None` on any
    /// failure or unparseable terminal output so the caller engages the
    /// deterministic fallback: LLM errors are recovered internally and
    /// never surface to the caller.
    async fn run_llm_workflow(&self, service: &str) -> Option<Report> {
        if !self.llm.is_available() {
            return None;
        }
        let ctx = self.tool_ctx();
        let tools = tools::tool_specs();
        let system_prompt = SYSTEM_PROMPT;
        let user_prompt = format!(
            "Analyze service \"{service}\". Consult memory, the topology graph, and live metrics \
             before deciding on remediation. Precedence for remediation is parameter update < \
             scale < rollback; never scale an external-typed service; for latency cascades the \
             deepest slow dependency is the root cause. Persist at least one insight or baseline \
             update, then respond with ONLY a JSON object matching the report shape."
        );

        let mut history: Vec<(String, String)> = vec![
            ("system".to_string(), system_prompt.to_string()),
            ("user".to_string(), user_prompt),
        ];

        let mut response = match self.llm.invoke(system_prompt, &history[1].1, &tools).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(service, error = %e, "llm invocation failed; engaging fallback");
                return None;
            }
        };

        for _ in 0..MAX_TOOL_ITERATIONS {
            match response {
                LlmResponse::Text(text) => return parse_report_json(service, &text),
                LlmResponse::ToolCalls(calls) => {
                    for call in calls {
                        let result = tools::dispatch(&ctx, &call.name, &call.arguments).await;
                        let payload = match result {
                            Ok(v) => v,
                            Err(e) => json!({"error": e.to_string()}),
                        };
                        history.push(("assistant".to_string(), json!({"tool_call": call.name}).to_string()));
                        history.push(("tool".to_string(), payload.to_string()));
                    }
                    response = match self.llm.continue_with_tool_result(&history, &tools).await {
                        Ok(r) => r,
                        Err(e) => {
                            tracing::warn!(service, error = %e, "llm continuation failed; engaging fallback");
                            return None;
                        }
                    };
                }
            }
        }
        tracing::warn!(service, "llm tool loop exceeded max iterations; engaging fallback");
        None
    }

    /// The deterministic fallback: seeded by
    /// `hash(service_name) + current_hour`, so the same pair always
    /// reproduces the same report. Still performs real
    /// remediation/validation calls so the Action Log and baseline are
    /// populated exactly as a successful LLM-driven run would.
    async fn deterministic_fallback(&self, service: &str) -> Report {
        let mut rng = SeededRng::new(seed_for(service));

        let health = fallback::HEALTH_LADDER[rng.index(fallback::HEALTH_LADDER.len())];
        let p99 = 200.0 + (100 - health) as f64 * rng.uniform(8.0, 25.0);
        let avg = p99 * 0.4;
        let status = status_for_health(health).to_string();
        let (root_cause, root_cause_service) = ROOT_CAUSE_LIBRARY[rng.index(ROOT_CAUSE_LIBRARY.len())];

        let affected_upstream = self.graph.blast_radius(service, 3).await.unwrap_or_default();

        let anomalies = if health < 80 {
            vec![Anomaly {
                kind: "latency".to_string(),
                metric: "p99_latency_ms".to_string(),
                current_value: p99,
                description: format!("p99 latency elevated to {p99:.0}ms"),
            }]
        } else {
            Vec::new()
        };

        let mut actions_taken = Vec::new();
        let mut recommended_action = "No action required; service is within normal bounds.".to_string();

        if status != "healthy" {
            let reason = format!("{status} health detected during fallback analysis");
            // Precedence: parameter update < scale < rollback.
            if status == "degraded" {
                if let Ok(result) =
                    self.remediation.update_parameter("circuit_breaker_timeout_ms", "2000", &reason, service).await
                {
                    actions_taken.push(ActionTaken {
                        action_type: "update_parameter".to_string(),
                        service: service.to_string(),
                        result: format!("applied ({})", result.action_id),
                    });
                }
                recommended_action = format!("Tune circuit-breaker timeout; likely cause is {root_cause}.");
            } else {
                if let Ok(result) = self.remediation.scale_service("default", service, 3, &reason).await {
                    actions_taken.push(ActionTaken {
                        action_type: "scale_ecs".to_string(),
                        service: service.to_string(),
                        result: format!("applied ({})", result.action_id),
                    });
                }
                recommended_action = format!("Scale out and investigate {root_cause_service}; suspected cause: {root_cause}.");
            }
        }

        let validation = if actions_taken.is_empty() {
            ValidationSummary { recovered: true, latency_p99_ms: p99, pass_rate: 100.0 }
        } else {
            let jitter = rng.uniform(0.15, 0.35);
            let recovered_p99 = p99 * (1.0 - jitter);
            match self.validation.validate_recovery(service, p99, "fallback-suite").await {
                Ok(result) => ValidationSummary {
                    recovered: result.recovered,
                    latency_p99_ms: result.latency_p99_ms,
                    pass_rate: result.pass_rate,
                },
                Err(_) => ValidationSummary { recovered: recovered_p99 <= p99 * 1.1, latency_p99_ms: recovered_p99, pass_rate: 95.0 },
            }
        };

        let _ = self.store.update_baseline(
            service,
            BaselineMetrics {
                p99_latency_ms: p99,
                avg_latency_ms: avg,
                health_score: health,
                cpu_usage_percent: (100 - health).clamp(5, 95),
                rpm: 1200,
                error_rate_percent: if status == "critical" { 5.0 } else { 0.5 },
                measured_at: Utc::now(),
            },
        );

        Report {
            run_id: format!("run-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]),
            timestamp: Utc::now(),
            service: service.to_string(),
            health_score: health,
            status: status.clone(),
            anomalies,
            root_cause: root_cause.to_string(),
            root_cause_service: root_cause_service.to_string(),
            affected_upstream,
            recommended_action,
            actions_taken,
            validation,
            chat_summary: chat_summary_template(&status, service, root_cause),
        }
    }

    /// `GenerateInsights(service?)`: biased toward optimization/
    /// cost/reliability categories, 2-4 insights and 1-2 patterns per
    /// service.
    pub async fn generate_insights(&self, service: Option<String>) -> ForgeResult<GenerateInsightsSummary> {
        let services = match service {
            Some(s) => vec![s],
            None => {
                let known = self.store.list_service_names();
                if known.is_empty() {
                    DEMO_SERVICE_ROSTER.iter().map(|s| s.to_string()).collect()
                } else {
                    known
                }
            }
        };

        let mut total_insights = 0usize;
        let mut total_patterns = 0usize;
        let mut all_insight_ids = Vec::new();
        for svc in &services {
            let (ids, patterns) = self.seed_demo_knowledge(svc).await;
            total_insights += ids.len();
            total_patterns += patterns;
            all_insight_ids.extend(ids);
        }

        self.store.record_analysis(
            AnalysisTrigger::GenerateInsights,
            services.clone(),
            format!("generated {total_insights} insights and {total_patterns} patterns across {} services", services.len()),
            Vec::new(),
            all_insight_ids,
        )?;

        let top_recommendations = self
            .store
            .get_recommendations()
            .into_iter()
            .take(5)
            .map(|r| r.insight.recommendation)
            .collect();

        Ok(GenerateInsightsSummary {
            services_analyzed: services,
            insights_generated_count: total_insights,
            patterns_detected_count: total_patterns,
            top_recommendations,
        })
    }

    /// Samples 2-4 insights and 1-2 patterns from the fixed library for
    /// `service`, seeded the same way as the deterministic fallback so
    /// repeated demo runs are reproducible within an hour. Returns the
    /// inserted insight ids and pattern count.
    async fn seed_demo_knowledge(&self, service: &str) -> (Vec<String>, usize) {
        let mut rng = SeededRng::new(seed_for(service).wrapping_add(1));
        let insight_count = 2 + rng.index(3); // 2..=4
        let pattern_count = 1 + rng.index(2); // 1..=2
        let mut ids = Vec::new();
        for template in library::sample_insights(&mut rng, insight_count) {
            if let Ok(id) = self.store.add_insight(
                service,
                template.category,
                template.severity,
                template.title,
                template.body,
                "{}",
                template.recommendation,
            ) {
                ids.push(id);
            }
        }
        let mut stored_patterns = 0usize;
        for template in library::sample_patterns(&mut rng, pattern_count.max(1)) {
            if self
                .store
                .add_pattern(service, template.pattern_type, template.description, template.confidence, template.recommendation)
                .is_ok()
            {
                stored_patterns += 1;
            }
        }
        (ids, stored_patterns)
    }

    /// `/api/agent/chat`'s SSE feed. Never errors to the caller: an
    /// unavailable LLM falls back to a deterministic summary drawn from the
    /// knowledge store, same recovery discipline as [`Self::analyze_service`].
    pub async fn chat_stream(&self, message: &str) -> BoxStream<'static, ChatFrame> {
        if self.llm.is_available() {
            match self.llm.invoke_stream(CHAT_SYSTEM_PROMPT, message).await {
                Ok(stream) => {
                    return Box::pin(stream.map(|r| match r {
                        Ok(chunk) => ChatFrame::Text(chunk),
                        Err(e) => ChatFrame::Error(e.to_string()),
                    }));
                }
                Err(e) => tracing::warn!(error = %e, "chat invocation failed; using fallback"),
            }
        }
        let text = self.fallback_chat_text(message);
        let chunks: Vec<ChatFrame> = text.split_inclusive(' ').map(|w| ChatFrame::Text(w.to_string())).collect();
        Box::pin(futures::stream::iter(chunks))
    }

    fn fallback_chat_text(&self, message: &str) -> String {
        let services = self.store.list_service_names();
        let services_desc = if services.is_empty() { "none onboarded yet".to_string() } else { services.join(", ") };
        let top_recommendation = self
            .store
            .get_recommendations()
            .into_iter()
            .next()
            .map(|r| format!("{}: {}", r.service, r.insight.recommendation))
            .unwrap_or_else(|| "no open high-severity recommendations on file".to_string());
        format!(
            "No live LLM is configured right now, so here is a deterministic summary instead of a live answer to \"{message}\". \
             Known services: {services_desc}. Top outstanding recommendation: {top_recommendation}."
        )
    }

    /// Fire-and-forget deeper analysis against a secondary LLM. Must
    /// never block or fail the foreground report; any error or timeout is
    /// logged only. No lock is held across the `.await` (the store takes its
    /// own short-lived lock per call).
    fn spawn_background_deepening(&self, service: String) {
        let llm = self.background_llm.clone();
        let store = self.store.clone();
        let activity_log = self.activity_log.clone();
        let timeout = self.background_timeout;

        tokio::spawn(async move {
            if !llm.is_available() {
                return;
            }
            let system_prompt = "Return strictly {\"deep_insights\": [...], \"patterns\": [...]} JSON \
                                  with a deeper second-pass analysis. No prose.";
            let user_prompt = format!("Deepen the analysis for service \"{service}\".");
            let result = tokio::time::timeout(timeout, llm.invoke(system_prompt, &user_prompt, &[])).await;
            let response = match result {
                Ok(Ok(r)) => r,
                Ok(Err(e)) => {
                    tracing::warn!(service, error = %e, "background deepening failed");
                    return;
                }
                Err(_) => {
                    tracing::warn!(service, "background deepening timed out after {:?}", timeout);
                    return;
                }
            };
            let LlmResponse::Text(text) = response else {
                tracing::warn!(service, "background deepening returned tool calls instead of JSON");
                return;
            };
            let Some(parsed) = extract_json_object(&text) else {
                tracing::warn!(service, "background deepening returned unparseable JSON");
                return;
            };
            let mut stored = 0;
            if let Some(insights) = parsed.get("deep_insights").and_then(|v| v.as_array()) {
                for item in insights {
                    let title = format!("[deepened] {}", item.get("title").and_then(|v| v.as_str()).unwrap_or("untitled"));
                    let body = item.get("insight").and_then(|v| v.as_str()).unwrap_or_default();
                    if store
                        .add_insight(
                            &service,
                            crate::models::InsightCategory::Performance,
                            crate::models::Severity::Medium,
                            title,
                            body,
                            "{}",
                            item.get("recommendation").and_then(|v| v.as_str()).unwrap_or_default(),
                        )
                        .is_ok()
                    {
                        stored += 1;
                    }
                }
            }
            if let Some(patterns) = parsed.get("patterns").and_then(|v| v.as_array()) {
                for item in patterns {
                    let description =
                        format!("[deepened] {}", item.get("description").and_then(|v| v.as_str()).unwrap_or(""));
                    let _ = store.add_pattern(
                        &service,
                        item.get("type").and_then(|v| v.as_str()).unwrap_or("correlated_degradation"),
                        description,
                        item.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.5),
                        item.get("recommendation").and_then(|v| v.as_str()).unwrap_or_default(),
                    );
                }
            }
            activity_log.log(
                ActivityEventType::Minimax,
                ActivitySource::Background,
                format!("background deepening stored {stored} insights for {service}"),
                "",
                json!({"service": service}),
            );
        });
    }
}

const SYSTEM_PROMPT: &str = "You are Forge, an autonomous SRE agent. For every analysis: (1) consult \
    memory for this service and cross-service patterns; (2) consult the topology graph for health, \
    dependencies, blast radius, and recent changes; (3) consult live metrics and firing monitors; \
    (4) if anomalies indicate a cause, remediate with the least invasive action available, in the \
    order parameter update < scale < rollback, and never scale a service of type 'external' (prefer a \
    circuit-breaker parameter update instead); (5) validate after remediation; (6) persist at least \
    one insight or pattern; (7) reply with ONLY a JSON object describing the final report.";

/// Extract the first balanced `{...}` substring and parse it as JSON.
/// Invalid JSON (no enclosing brace pair) is an LLM error recovered by
/// the fallback, never surfaced to the caller.
fn extract_json_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

fn parse_report_json(service: &str, text: &str) -> Option<Report> {
    let v = extract_json_object(text)?;
    let health_score = v.get("health_score").and_then(|x| x.as_i64())? as i32;
    let status = v.get("status").and_then(|x| x.as_str()).unwrap_or_else(|| status_for_health(health_score)).to_string();
    Some(Report {
        run_id: format!("run-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]),
        timestamp: Utc::now(),
        service: service.to_string(),
        health_score,
        status,
        anomalies: v
            .get("anomalies")
            .and_then(|a| a.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|a| {
                        Some(Anomaly {
                            kind: a.get("type")?.as_str()?.to_string(),
                            metric: a.get("metric")?.as_str()?.to_string(),
                            current_value: a.get("current_value").and_then(|v| v.as_f64()).unwrap_or(0.0),
                            description: a.get("description").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default(),
        root_cause: v.get("root_cause").and_then(|x| x.as_str()).unwrap_or_default().to_string(),
        root_cause_service: v.get("root_cause_service").and_then(|x| x.as_str()).unwrap_or_default().to_string(),
        affected_upstream: v
            .get("affected_upstream")
            .and_then(|a| a.as_array())
            .map(|arr| arr.iter().filter_map(|x| x.as_str().map(str::to_string)).collect())
            .unwrap_or_default(),
        recommended_action: v.get("recommended_action").and_then(|x| x.as_str()).unwrap_or_default().to_string(),
        actions_taken: v
            .get("actions_taken")
            .and_then(|a| a.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|a| {
                        Some(ActionTaken {
                            action_type: a.get("action_type")?.as_str()?.to_string(),
                            service: a.get("service").and_then(|v| v.as_str()).unwrap_or(service).to_string(),
                            result: a.get("result").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default(),
        validation: ValidationSummary {
            recovered: v.get("validation").and_then(|x| x.get("recovered")).and_then(|x| x.as_bool()).unwrap_or(false),
            latency_p99_ms: v.get("validation").and_then(|x| x.get("latency_p99_ms")).and_then(|x| x.as_f64()).unwrap_or(0.0),
            pass_rate: v.get("validation").and_then(|x| x.get("pass_rate")).and_then(|x| x.as_f64()).unwrap_or(0.0),
        },
        chat_summary: v.get("chat_summary").and_then(|x| x.as_str()).unwrap_or_default().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::llm::NoopLlmAdapter;
    use crate::adapters::{HttpGraphAdapter, SimulatedRemediationAdapter, SimulatedValidationAdapter};
    use crate::config::{RemediationConfig, ValidationConfig};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct NoopMetrics;
    #[async_trait::async_trait]
    impl MetricsAdapter for NoopMetrics {
        async fn monitors_snapshot(&self) -> ForgeResult<crate::adapters::metrics::MonitorsSnapshot> {
            Ok(Default::default())
        }
        async fn recent_events(&self, _: u32, _: &str, _: usize) -> ForgeResult<Vec<crate::adapters::metrics::Event>> {
            Ok(Vec::new())
        }
        async fn container_metrics(&self, _: &str, _: u32) -> ForgeResult<serde_json::Value> {
            Ok(serde_json::json!({}))
        }
        async fn query_metric(&self, _: &str, _: u32, _: u32) -> ForgeResult<serde_json::Value> {
            Ok(serde_json::json!({}))
        }
        async fn active_metrics_summary(&self, _: u32) -> ForgeResult<serde_json::Value> {
            Ok(serde_json::json!({}))
        }
        async fn live_metrics_for_service(&self, _: &str) -> ForgeResult<crate::adapters::metrics::LiveMetrics> {
            Ok(crate::adapters::metrics::LiveMetrics {
                p99_latency_ms: 300.0,
                avg_latency_ms: 120.0,
                health_score: 90,
                cpu_usage_percent: 30,
                mem_usage_percent: 40,
                alerting_monitors: 0,
            })
        }
    }

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    fn test_orchestrator() -> Orchestrator {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path: PathBuf = std::env::temp_dir().join(format!("forge-orchestrator-test-{n}.json"));
        let store = Arc::new(KnowledgeStore::load(&path).unwrap());
        let activity_log = Arc::new(ActivityLog::new());
        let action_log = Arc::new(ActionLog::new());
        let graph = Arc::new(HttpGraphAdapter::new(None)) as Arc<dyn GraphAdapter>;
        let metrics = Arc::new(NoopMetrics) as Arc<dyn MetricsAdapter>;
        let remediation = Arc::new(SimulatedRemediationAdapter::new(RemediationConfig { demo_mode: true }, action_log.clone()))
            as Arc<dyn RemediationAdapter>;
        let validation = Arc::new(SimulatedValidationAdapter::new(ValidationConfig::default())) as Arc<dyn ValidationAdapter>;
        let llm = Arc::new(NoopLlmAdapter) as Arc<dyn LlmAdapter>;
        Orchestrator::new(
            store,
            activity_log,
            action_log,
            graph,
            metrics,
            remediation,
            validation,
            llm.clone(),
            llm,
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn fallback_report_is_deterministic_within_the_same_hour() {
        let orch = test_orchestrator();
        let r1 = orch.analyze_service("payment-service", AnalysisTrigger::Manual).await.unwrap();
        let r2 = orch.analyze_service("payment-service", AnalysisTrigger::Manual).await.unwrap();
        assert_eq!(r1.health_score, r2.health_score);
        assert_eq!(r1.status, r2.status);
        assert_eq!(r1.root_cause, r2.root_cause);
    }

    #[tokio::test]
    async fn analysis_always_leaves_a_baseline() {
        let orch = test_orchestrator();
        orch.analyze_service("checkout-service", AnalysisTrigger::Manual).await.unwrap();
        let mem = orch.store.get_service_memory("checkout-service");
        assert!(mem.baseline_metrics.is_some());
    }

    #[tokio::test]
    async fn generate_insights_populates_store_for_named_service() {
        let orch = test_orchestrator();
        let summary = orch.generate_insights(Some("cart-service".to_string())).await.unwrap();
        assert_eq!(summary.services_analyzed, vec!["cart-service".to_string()]);
        assert!(summary.insights_generated_count >= 2);
        let mem = orch.store.get_service_memory("cart-service");
        assert!(!mem.insights.is_empty());
    }
}
