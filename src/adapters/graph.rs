//! GraphAdapter: the service-topology query surface. The graph database
//! itself is out of scope; this is the read/write client contract the
//! core depends on. Grounded in `agent/tools/neo4j_tools.py`'s five query
//! shapes.

use crate::error::{ForgeError, ForgeResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub service: String,
    pub health_score: i32,
    pub avg_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub criticality: String,
    #[serde(default)]
    pub team: String,
    #[serde(default, rename = "type")]
    pub service_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub name: String,
    pub avg_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub requests_per_min: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dependencies {
    pub upstream: Vec<DependencyEdge>,
    pub downstream: Vec<DependencyEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentChange {
    pub service: String,
    pub version: Option<String>,
    pub status: String,
    pub deployed_at: String,
}

#[async_trait]
pub trait GraphAdapter: Send + Sync {
    async fn service_health(&self, name: &str) -> ForgeResult<ServiceHealth>;
    async fn dependencies(&self, name: &str) -> ForgeResult<Dependencies>;
    /// Cap at `max_hops`, dedupe visited nodes (cycles are legal topology).
    async fn blast_radius(&self, name: &str, max_hops: u32) -> ForgeResult<Vec<String>>;
    async fn recent_changes(&self, name: &str, hours: u32) -> ForgeResult<Vec<RecentChange>>;
    async fn slowest_dependencies(&self, name: &str) -> ForgeResult<Vec<DependencyEdge>>;
    async fn write_metrics(&self, name: &str, fields: Value) -> ForgeResult<()>;
    async fn list_services(&self) -> ForgeResult<Vec<String>>;
}

/// Queries a graph query-service over HTTP. Absent configuration degrades
/// every call to a `Graph` error rather than panicking at startup: graph
/// unreachable at startup logs a warning and continues, individual queries
/// then error.
pub struct HttpGraphAdapter {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl HttpGraphAdapter {
    pub fn new(endpoint: Option<String>) -> Self {
        if endpoint.is_none() {
            tracing::warn!("graph adapter has no endpoint configured; queries will fail until set");
        }
        Self { client: reqwest::Client::new(), endpoint }
    }

    fn base(&self) -> ForgeResult<&str> {
        self.endpoint.as_deref().ok_or_else(|| ForgeError::Graph("no graph endpoint configured".into()))
    }
}

#[async_trait]
impl GraphAdapter for HttpGraphAdapter {
    async fn service_health(&self, name: &str) -> ForgeResult<ServiceHealth> {
        let base = self.base()?;
        let resp: ServiceHealth = self
            .client
            .get(format!("{base}/service/{name}/health"))
            .send()
            .await?
            .json()
            .await?;
        Ok(resp)
    }

    async fn dependencies(&self, name: &str) -> ForgeResult<Dependencies> {
        let base = self.base()?;
        let resp: Dependencies =
            self.client.get(format!("{base}/service/{name}/dependencies")).send().await?.json().await?;
        Ok(resp)
    }

    async fn blast_radius(&self, name: &str, max_hops: u32) -> ForgeResult<Vec<String>> {
        let base = self.base()?;
        let resp: Vec<String> = self
            .client
            .get(format!("{base}/service/{name}/blast-radius"))
            .query(&[("max_hops", max_hops)])
            .send()
            .await?
            .json()
            .await?;
        Ok(resp)
    }

    async fn recent_changes(&self, name: &str, hours: u32) -> ForgeResult<Vec<RecentChange>> {
        let base = self.base()?;
        let resp: Vec<RecentChange> = self
            .client
            .get(format!("{base}/service/{name}/recent-changes"))
            .query(&[("hours", hours)])
            .send()
            .await?
            .json()
            .await?;
        Ok(resp)
    }

    async fn slowest_dependencies(&self, name: &str) -> ForgeResult<Vec<DependencyEdge>> {
        let base = self.base()?;
        let resp: Vec<DependencyEdge> = self
            .client
            .get(format!("{base}/service/{name}/slowest-dependencies"))
            .send()
            .await?
            .json()
            .await?;
        Ok(resp)
    }

    async fn write_metrics(&self, name: &str, fields: Value) -> ForgeResult<()> {
        let base = self.base()?;
        self.client.post(format!("{base}/service/{name}/metrics")).json(&fields).send().await?;
        Ok(())
    }

    async fn list_services(&self) -> ForgeResult<Vec<String>> {
        let base = self.base()?;
        let resp: Vec<String> = self.client.get(format!("{base}/services")).send().await?.json().await?;
        Ok(resp)
    }
}
