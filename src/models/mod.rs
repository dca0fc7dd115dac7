//! Core data model shared by the knowledge store, orchestrator, coordinator,
//! and HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn now() -> DateTime<Utc> {
    Utc::now()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    Critical,
    High,
    Medium,
    Low,
}

/// A service record as tracked by the topology graph and synced into the
/// knowledge store's baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub team: String,
    pub criticality: Criticality,
    pub health_score: i32,
    pub avg_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub cpu_usage_percent: i32,
    pub mem_usage_percent: i32,
    pub data_source: String,
    pub updated_at: DateTime<Utc>,
}

/// `CALLS(src -> tgt)` edge owned by the graph adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub source: String,
    pub target: String,
    pub avg_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub requests_per_min: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    pub version: Option<String>,
    pub status: String,
    pub deployed_at: DateTime<Utc>,
    pub deployed_by: String,
}

/// Last-observed metrics for a service; overwritten wholesale on each sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineMetrics {
    pub p99_latency_ms: f64,
    pub avg_latency_ms: f64,
    pub health_score: i32,
    pub cpu_usage_percent: i32,
    pub rpm: i64,
    pub error_rate_percent: f64,
    pub measured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    #[serde(rename = "type")]
    pub pattern_type: String,
    pub description: String,
    pub confidence: f64,
    pub recommendation: String,
    pub first_detected: DateTime<Utc>,
    pub last_confirmed: DateTime<Utc>,
    pub occurrences: u32,
}

/// A cross-service pattern with no single owning service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalPattern {
    pub id: String,
    #[serde(rename = "type")]
    pub pattern_type: String,
    pub description: String,
    pub confidence: f64,
    pub recommendation: String,
    pub services_involved: Vec<String>,
    pub first_detected: DateTime<Utc>,
    pub last_confirmed: DateTime<Utc>,
    pub occurrences: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightCategory {
    Performance,
    Reliability,
    Cost,
    Optimization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightStatus {
    Open,
    Acknowledged,
    Resolved,
}

impl InsightStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "acknowledged" => Some(Self::Acknowledged),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub category: InsightCategory,
    pub severity: Severity,
    pub title: String,
    pub insight: String,
    pub evidence: String,
    pub recommendation: String,
    pub status: InsightStatus,
    pub timestamp: DateTime<Utc>,
}

/// An insight flattened together with its owning service name, as returned
/// by `GetAllInsights`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightWithService {
    pub service: String,
    #[serde(flatten)]
    pub insight: Insight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisTrigger {
    Manual,
    Alert,
    Scheduled,
    GenerateInsights,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSession {
    pub session_id: String,
    pub trigger: AnalysisTrigger,
    pub services_analyzed: Vec<String>,
    pub findings_summary: String,
    pub actions_taken: Vec<String>,
    pub insights_generated: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Per-service memory record held inside the knowledge store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceMemory {
    pub baseline_metrics: Option<BaselineMetrics>,
    pub patterns: Vec<Pattern>,
    pub insights: Vec<Insight>,
}

/// The single JSON document persisted by the knowledge store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub version: String,
    pub last_updated: DateTime<Utc>,
    pub services: HashMap<String, ServiceMemory>,
    pub global_patterns: Vec<GlobalPattern>,
    pub analysis_history: Vec<AnalysisSession>,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            last_updated: now(),
            services: HashMap::new(),
            global_patterns: Vec::new(),
            analysis_history: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicaStatus {
    Running,
    Draining,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReplica {
    pub replica_id: String,
    pub name: String,
    pub status: ReplicaStatus,
    pub assigned_services: Vec<String>,
    pub analyses_completed: u64,
    pub current_task: Option<String>,
    pub spawned_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub cpu_load: f64,
    pub memory_mb: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Analyze,
    GenerateInsights,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::GenerateInsights => "generate_insights",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub service_name: String,
    pub task_type: TaskType,
    pub priority: i32,
    pub enqueued_at: DateTime<Utc>,
    pub assigned_to: Option<String>,
    pub status: WorkStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleEventKind {
    Spawn,
    Kill,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleEvent {
    pub event: ScaleEventKind,
    pub replica_id: String,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub total_replicas: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityEventType {
    ToolCall,
    InsightStored,
    PatternStored,
    Analysis,
    Error,
    Minimax,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivitySource {
    Primary,
    Background,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: u64,
    pub ts: DateTime<Utc>,
    pub event_type: ActivityEventType,
    pub source: ActivitySource,
    pub summary: String,
    pub detail: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    ScaleEcs,
    RollbackDeployment,
    UpdateParameter,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScaleEcs => "scale_ecs",
            Self::RollbackDeployment => "rollback_deployment",
            Self::UpdateParameter => "update_parameter",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEntry {
    pub action_id: String,
    pub action_type: ActionType,
    pub service: String,
    pub cluster: Option<String>,
    pub status: ActionStatus,
    pub detail: serde_json::Value,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}
