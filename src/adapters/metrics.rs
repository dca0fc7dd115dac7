//! MetricsAdapter: observability backend queries. Grounded in
//! `agent/tools/datadog_tools.py`.

use super::{display_latency_from_health, health_score_heuristic};
use crate::config::MetricsConfig;
use crate::error::{ForgeError, ForgeResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorStateSummary {
    #[serde(rename = "OK")]
    pub ok: u32,
    #[serde(rename = "Alert")]
    pub alert: u32,
    #[serde(rename = "No Data")]
    pub no_data: u32,
    #[serde(rename = "Warn")]
    pub warn: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorsSnapshot {
    pub total: u32,
    pub state_summary: MonitorStateSummary,
    pub alerts: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: String,
    pub title: String,
    pub source: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveMetrics {
    pub p99_latency_ms: f64,
    pub avg_latency_ms: f64,
    pub health_score: i32,
    pub cpu_usage_percent: i32,
    pub mem_usage_percent: i32,
    pub alerting_monitors: u32,
}

#[async_trait]
pub trait MetricsAdapter: Send + Sync {
    async fn monitors_snapshot(&self) -> ForgeResult<MonitorsSnapshot>;
    async fn recent_events(&self, hours_back: u32, filter_tags: &str, max: usize) -> ForgeResult<Vec<Event>>;
    async fn container_metrics(&self, namespace: &str, window_min: u32) -> ForgeResult<serde_json::Value>;
    async fn query_metric(&self, query: &str, from_min: u32, to_min: u32) -> ForgeResult<serde_json::Value>;
    async fn active_metrics_summary(&self, window_min: u32) -> ForgeResult<serde_json::Value>;
    /// Convenience op: CPU + memory from queries, health derived by a
    /// coarse heuristic (exists to give a non-null baseline when upstream
    /// telemetry is sparse).
    async fn live_metrics_for_service(&self, name: &str) -> ForgeResult<LiveMetrics>;
}

pub struct DatadogMetricsAdapter {
    client: reqwest::Client,
    config: MetricsConfig,
}

fn metrics_err(e: reqwest::Error) -> ForgeError {
    ForgeError::Metrics(e.to_string())
}

impl DatadogMetricsAdapter {
    pub fn new(config: MetricsConfig) -> Self {
        Self { client: reqwest::Client::new(), config }
    }

    fn base(&self) -> ForgeResult<&str> {
        self.config.api_base.as_deref().ok_or_else(|| ForgeError::Metrics("datadog not configured".into()))
    }

    fn headers(&self) -> ForgeResult<reqwest::header::HeaderMap> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("DD-API-KEY", self.config.api_key.parse().map_err(|_| ForgeError::Metrics("invalid api key".into()))?);
        headers.insert(
            "DD-APPLICATION-KEY",
            self.config.app_key.parse().map_err(|_| ForgeError::Metrics("invalid app key".into()))?,
        );
        Ok(headers)
    }
}

#[async_trait]
impl MetricsAdapter for DatadogMetricsAdapter {
    async fn monitors_snapshot(&self) -> ForgeResult<MonitorsSnapshot> {
        if !self.config.is_available() {
            return Ok(MonitorsSnapshot::default());
        }
        let base = self.base()?;
        let resp = self
            .client
            .get(format!("{base}/api/v1/monitor"))
            .headers(self.headers()?)
            .query(&[("page", "0"), ("page_size", "50")])
            .send()
            .await
            .map_err(metrics_err)?;
        let monitors: Vec<serde_json::Value> = resp.json().await.unwrap_or_default();
        let mut summary = MonitorStateSummary::default();
        let mut alerts = Vec::new();
        for m in &monitors {
            match m.get("overall_state").and_then(|v| v.as_str()).unwrap_or("Unknown") {
                "OK" => summary.ok += 1,
                "Alert" => {
                    summary.alert += 1;
                    alerts.push(m.clone());
                }
                "No Data" => summary.no_data += 1,
                "Warn" => summary.warn += 1,
                _ => {}
            }
        }
        Ok(MonitorsSnapshot { total: monitors.len() as u32, state_summary: summary, alerts })
    }

    async fn recent_events(&self, hours_back: u32, filter_tags: &str, max: usize) -> ForgeResult<Vec<Event>> {
        if !self.config.is_available() {
            return Ok(Vec::new());
        }
        let base = self.base()?;
        let resp: serde_json::Value = self
            .client
            .get(format!("{base}/api/v1/events"))
            .headers(self.headers()?)
            .query(&[("hours_back", hours_back.to_string()), ("tags", filter_tags.to_string())])
            .send()
            .await
            .map_err(metrics_err)?
            .json()
            .await
            .map_err(metrics_err)?;
        let events = resp
            .get("events")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .take(max)
                    .map(|e| Event {
                        timestamp: e.get("date_happened").map(|v| v.to_string()).unwrap_or_default(),
                        title: e.get("title").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                        source: e.get("source").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                        tags: e
                            .get("tags")
                            .and_then(|v| v.as_array())
                            .map(|t| t.iter().filter_map(|x| x.as_str().map(str::to_string)).collect())
                            .unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(events)
    }

    async fn container_metrics(&self, namespace: &str, window_min: u32) -> ForgeResult<serde_json::Value> {
        self.query_metric(&format!("avg:container.cpu.usage{{kube_namespace:{namespace}}}"), window_min, 0).await
    }

    async fn query_metric(&self, query: &str, from_min: u32, to_min: u32) -> ForgeResult<serde_json::Value> {
        if !self.config.is_available() {
            return Ok(serde_json::json!({ "query": query, "series": [] }));
        }
        let base = self.base()?;
        let resp: serde_json::Value = self
            .client
            .get(format!("{base}/api/v1/query"))
            .headers(self.headers()?)
            .query(&[("from_minutes_ago", from_min), ("to_minutes_ago", to_min)])
            .query(&[("query", query)])
            .send()
            .await
            .map_err(metrics_err)?
            .json()
            .await
            .map_err(metrics_err)?;
        Ok(resp)
    }

    async fn active_metrics_summary(&self, window_min: u32) -> ForgeResult<serde_json::Value> {
        if !self.config.is_available() {
            return Ok(serde_json::json!({ "window_minutes": window_min, "namespaces": {} }));
        }
        let base = self.base()?;
        let resp: serde_json::Value = self
            .client
            .get(format!("{base}/api/v1/metrics"))
            .headers(self.headers()?)
            .send()
            .await
            .map_err(metrics_err)?
            .json()
            .await
            .map_err(metrics_err)?;
        Ok(resp)
    }

    async fn live_metrics_for_service(&self, name: &str) -> ForgeResult<LiveMetrics> {
        if !self.config.is_available() {
            tracing::debug!("datadog not configured; using heuristic baseline for {name}");
            let health = 85;
            let (p99, avg) = display_latency_from_health(health);
            return Ok(LiveMetrics {
                p99_latency_ms: p99,
                avg_latency_ms: avg,
                health_score: health,
                cpu_usage_percent: 35,
                mem_usage_percent: 45,
                alerting_monitors: 0,
            });
        }
        let cpu = self
            .query_metric(&format!("avg:container.cpu.usage{{service:{name}}}"), 15, 0)
            .await
            .ok()
            .and_then(|v| v.get("series").and_then(|s| s.as_array()).and_then(|a| a.first()).cloned())
            .and_then(|s| s.get("latest_value").and_then(|v| v.as_f64()))
            .unwrap_or(40.0);
        let mem = self
            .query_metric(&format!("avg:container.memory.usage{{service:{name}}}"), 15, 0)
            .await
            .ok()
            .and_then(|v| v.get("series").and_then(|s| s.as_array()).and_then(|a| a.first()).cloned())
            .and_then(|s| s.get("latest_value").and_then(|v| v.as_f64()))
            .unwrap_or(50.0);
        let alerting = self.monitors_snapshot().await.map(|s| s.state_summary.alert).unwrap_or(0);
        let health = health_score_heuristic(cpu, mem, alerting);
        let (p99, avg) = display_latency_from_health(health);
        Ok(LiveMetrics {
            p99_latency_ms: p99,
            avg_latency_ms: avg,
            health_score: health,
            cpu_usage_percent: cpu as i32,
            mem_usage_percent: mem as i32,
            alerting_monitors: alerting,
        })
    }
}
