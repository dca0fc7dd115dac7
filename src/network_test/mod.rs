//! Network Test Strategy Engine: derives executable test plans from
//! the knowledge store's contents, then executes them against the
//! platform's own HTTP surface. Grounded in `agent/tools/network_tester.py`.

use crate::error::ForgeResult;
use crate::models::InsightWithService;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// The platform's own read-only surface, probed by `health_sweep`,
/// `cascade_sim`, and `dependency_chain`, grounded in
/// `network_tester.py::CORE_ENDPOINTS`.
pub const CORE_ENDPOINTS: &[&str] =
    &["/health", "/api/agent/health", "/api/cluster/status", "/api/graph/", "/api/insights/", "/api/network-test/strategies"];

const LATENCY_KEYWORDS: [&str; 5] = ["latency", "p99", "slow", "timeout", "response time"];
const OVERLOAD_KEYWORDS: [&str; 6] = ["overload", "cpu", "spike", "scale", "capacity", "traffic"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    HealthSweep,
    LatencyProbe,
    LoadBurst,
    CascadeSim,
    DependencyChain,
}

impl StrategyType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::HealthSweep => "health_sweep",
            Self::LatencyProbe => "latency_probe",
            Self::LoadBurst => "load_burst",
            Self::CascadeSim => "cascade_sim",
            Self::DependencyChain => "dependency_chain",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Strategy {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub strategy_type: StrategyType,
    pub description: String,
    pub target: String,
    pub derived_from: String,
    pub severity: String,
    pub endpoints: Vec<String>,
    pub concurrency: u32,
    pub samples: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestVerdict {
    Pass,
    Partial,
    Fail,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeSample {
    pub endpoint: String,
    pub status_code: Option<u16>,
    pub latency_ms: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    pub strategy_id: String,
    pub strategy_type: StrategyType,
    pub target: String,
    pub verdict: TestVerdict,
    pub samples: Vec<ProbeSample>,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub error_rate_pct: f64,
    pub recommendation: String,
    pub executed_at: DateTime<Utc>,
}

/// Classical percentile index: `max(0, floor(n*p/100) - 1)` on the sorted
/// sample. Returns 0.0 for an empty sample.
fn percentile(sorted_ms: &[f64], p: f64) -> f64 {
    if sorted_ms.is_empty() {
        return 0.0;
    }
    let n = sorted_ms.len();
    let idx = ((n as f64 * p / 100.0).floor() as i64 - 1).max(0) as usize;
    sorted_ms[idx.min(n - 1)]
}

fn error_rate(samples: &[ProbeSample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    100.0 * samples.iter().filter(|s| !s.passed).count() as f64 / samples.len() as f64
}

pub struct NetworkTestEngine {
    http: reqwest::Client,
    base_url: String,
    strategies: Mutex<Vec<Strategy>>,
    results: Mutex<Vec<TestReport>>,
}

impl NetworkTestEngine {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::builder().timeout(Duration::from_secs(8)).build().unwrap_or_default(),
            base_url,
            strategies: Mutex::new(Vec::new()),
            results: Mutex::new(Vec::new()),
        }
    }

    pub fn strategies(&self) -> Vec<Strategy> {
        self.strategies.lock().expect("network test mutex poisoned").clone()
    }

    pub fn results(&self) -> Vec<TestReport> {
        self.results.lock().expect("network test mutex poisoned").clone()
    }

    /// `GenerateStrategies(insights, patterns)`: five rules applied
    /// once in order, each dedup'd by its own composite key.
    pub fn generate_strategies(&self, insights: &[InsightWithService], patterns: &[serde_json::Value]) -> Vec<Strategy> {
        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();

        // Rule 1: always one health_sweep.
        out.push(Strategy {
            id: next_id("strat"),
            name: "Core surface health sweep".to_string(),
            strategy_type: StrategyType::HealthSweep,
            description: "Checks every core endpoint returns a successful status.".to_string(),
            target: "platform".to_string(),
            derived_from: "baseline".to_string(),
            severity: "low".to_string(),
            endpoints: CORE_ENDPOINTS.iter().map(|e| e.to_string()).collect(),
            concurrency: 1,
            samples: CORE_ENDPOINTS.len() as u32,
        });
        seen.insert("health-sweep".to_string());

        // Rule 2: latency_probe per insight matching latency keywords, one per service.
        for insight in insights {
            let text = format!("{} {}", insight.insight.title, insight.insight.insight).to_lowercase();
            if !LATENCY_KEYWORDS.iter().any(|k| text.contains(k)) {
                continue;
            }
            let key = format!("latency-{}", insight.service);
            if !seen.insert(key) {
                continue;
            }
            out.push(Strategy {
                id: next_id("strat"),
                name: format!("Latency probe: {}", insight.service),
                strategy_type: StrategyType::LatencyProbe,
                description: format!("Ten sequential samples against the core surface, flagged by insight {}.", insight.insight.id),
                target: insight.service.clone(),
                derived_from: insight.insight.id.clone(),
                severity: severity_str(insight.insight.severity),
                endpoints: vec![CORE_ENDPOINTS[0].to_string()],
                concurrency: 1,
                samples: 10,
            });
        }

        // Rule 3: load_burst per insight matching overload keywords.
        for insight in insights {
            let text = format!("{} {}", insight.insight.title, insight.insight.insight).to_lowercase();
            if !OVERLOAD_KEYWORDS.iter().any(|k| text.contains(k)) {
                continue;
            }
            let key = format!("load-{}", insight.service);
            if !seen.insert(key) {
                continue;
            }
            out.push(Strategy {
                id: next_id("strat"),
                name: format!("Load burst: {}", insight.service),
                strategy_type: StrategyType::LoadBurst,
                description: format!("Twenty concurrent requests against the core surface, flagged by insight {}.", insight.insight.id),
                target: insight.service.clone(),
                derived_from: insight.insight.id.clone(),
                severity: severity_str(insight.insight.severity),
                endpoints: CORE_ENDPOINTS.iter().map(|e| e.to_string()).collect(),
                concurrency: 20,
                samples: 20,
            });
        }

        // Rule 4: cascade_sim per pattern whose type contains "cascade".
        for pattern in patterns {
            let pattern_type = pattern.get("type").and_then(|v| v.as_str()).unwrap_or_default();
            if !pattern_type.contains("cascade") {
                continue;
            }
            let service = pattern_target(pattern);
            let key = format!("cascade-{service}");
            if !seen.insert(key) {
                continue;
            }
            out.push(Strategy {
                id: next_id("strat"),
                name: format!("Cascade simulation: {service}"),
                strategy_type: StrategyType::CascadeSim,
                description: "Sequential probes over the core endpoints to detect cascading failure.".to_string(),
                target: service,
                derived_from: pattern.get("id").and_then(|v| v.as_str()).unwrap_or("unknown").to_string(),
                severity: "medium".to_string(),
                endpoints: CORE_ENDPOINTS.iter().map(|e| e.to_string()).collect(),
                concurrency: 1,
                samples: CORE_ENDPOINTS.len() as u32,
            });
        }

        // Rule 5: dependency_chain per pattern whose type contains "dependency" or "bottleneck".
        for pattern in patterns {
            let pattern_type = pattern.get("type").and_then(|v| v.as_str()).unwrap_or_default();
            if !(pattern_type.contains("dependency") || pattern_type.contains("bottleneck")) {
                continue;
            }
            let service = pattern_target(pattern);
            // Same composite-key discipline as rules 2-4, applied here too.
            let key = format!("dep-{service}");
            if !seen.insert(key) {
                continue;
            }
            out.push(Strategy {
                id: next_id("strat"),
                name: format!("Dependency chain check: {service}"),
                strategy_type: StrategyType::DependencyChain,
                description: "Sequential probes over the core endpoints, same execution model as a cascade simulation."
                    .to_string(),
                target: service,
                derived_from: pattern.get("id").and_then(|v| v.as_str()).unwrap_or("unknown").to_string(),
                severity: "medium".to_string(),
                endpoints: CORE_ENDPOINTS.iter().map(|e| e.to_string()).collect(),
                concurrency: 1,
                samples: CORE_ENDPOINTS.len() as u32,
            });
        }

        *self.strategies.lock().expect("network test mutex poisoned") = out.clone();
        out
    }

    /// `RunTests(strategy_ids?)`: dispatch by type, execute against
    /// `self.base_url`, and append each report to the results log.
    pub async fn run_tests(&self, strategy_ids: Option<&[String]>) -> ForgeResult<Vec<TestReport>> {
        let strategies = self.strategies();
        let selected: Vec<&Strategy> = match strategy_ids {
            Some(ids) => strategies.iter().filter(|s| ids.iter().any(|id| id == &s.id)).collect(),
            None => strategies.iter().collect(),
        };

        let mut reports = Vec::with_capacity(selected.len());
        for strategy in selected {
            let report = match strategy.strategy_type {
                StrategyType::HealthSweep => self.run_health_sweep(strategy).await,
                StrategyType::LatencyProbe => self.run_latency_probe(strategy).await,
                StrategyType::LoadBurst => self.run_load_burst(strategy).await,
                StrategyType::CascadeSim | StrategyType::DependencyChain => self.run_cascade(strategy).await,
            };
            reports.push(report);
        }

        let mut results = self.results.lock().expect("network test mutex poisoned");
        results.extend(reports.iter().cloned());
        Ok(reports)
    }

    async fn probe(&self, endpoint: &str) -> ProbeSample {
        let url = format!("{}{}", self.base_url, endpoint);
        let start = Instant::now();
        match self.http.get(&url).send().await {
            Ok(resp) => {
                let status = resp.status();
                let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
                ProbeSample { endpoint: endpoint.to_string(), status_code: Some(status.as_u16()), latency_ms, passed: status.is_success() || status.is_redirection() }
            }
            Err(_) => ProbeSample { endpoint: endpoint.to_string(), status_code: None, latency_ms: start.elapsed().as_secs_f64() * 1000.0, passed: false },
        }
    }

    async fn run_health_sweep(&self, strategy: &Strategy) -> TestReport {
        let mut samples = Vec::with_capacity(strategy.endpoints.len());
        for endpoint in &strategy.endpoints {
            samples.push(self.probe(endpoint).await);
        }
        let passed = samples.iter().filter(|s| s.passed).count();
        let verdict = if passed == samples.len() {
            TestVerdict::Pass
        } else if passed == 0 {
            TestVerdict::Fail
        } else {
            TestVerdict::Partial
        };
        self.finish(strategy, samples, verdict)
    }

    async fn run_latency_probe(&self, strategy: &Strategy) -> TestReport {
        let endpoint = strategy.endpoints.first().cloned().unwrap_or_else(|| CORE_ENDPOINTS[0].to_string());
        let mut samples = Vec::with_capacity(strategy.samples as usize);
        for _ in 0..strategy.samples {
            samples.push(self.probe(&endpoint).await);
        }
        let mut sorted: Vec<f64> = samples.iter().map(|s| s.latency_ms).collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let p99 = percentile(&sorted, 99.0);
        let err_pct = error_rate(&samples);
        let verdict = if p99 <= 500.0 && err_pct == 0.0 {
            TestVerdict::Pass
        } else if p99 <= 1000.0 && err_pct <= 10.0 {
            TestVerdict::Partial
        } else {
            TestVerdict::Fail
        };
        self.finish(strategy, samples, verdict)
    }

    async fn run_load_burst(&self, strategy: &Strategy) -> TestReport {
        let futures = (0..strategy.concurrency).map(|i| {
            let endpoint = strategy
                .endpoints
                .get(i as usize % strategy.endpoints.len().max(1))
                .cloned()
                .unwrap_or_else(|| CORE_ENDPOINTS[0].to_string());
            async move { self.probe(&endpoint).await }
        });
        let samples: Vec<ProbeSample> = futures::future::join_all(futures).await;
        let mut sorted: Vec<f64> = samples.iter().map(|s| s.latency_ms).collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let p95 = percentile(&sorted, 95.0);
        let err_pct = error_rate(&samples);
        let verdict = if err_pct <= 5.0 && p95 <= 800.0 {
            TestVerdict::Pass
        } else if err_pct <= 20.0 {
            TestVerdict::Partial
        } else {
            TestVerdict::Fail
        };
        self.finish(strategy, samples, verdict)
    }

    async fn run_cascade(&self, strategy: &Strategy) -> TestReport {
        let mut samples = Vec::with_capacity(strategy.endpoints.len());
        for endpoint in &strategy.endpoints {
            samples.push(self.probe(endpoint).await);
        }
        let passed = samples.iter().filter(|s| s.passed).count();
        let verdict = if passed == samples.len() {
            TestVerdict::Pass
        } else if passed > 0 {
            TestVerdict::Partial
        } else {
            TestVerdict::Fail
        };
        self.finish(strategy, samples, verdict)
    }

    fn finish(&self, strategy: &Strategy, samples: Vec<ProbeSample>, verdict: TestVerdict) -> TestReport {
        let mut sorted: Vec<f64> = samples.iter().map(|s| s.latency_ms).collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        TestReport {
            strategy_id: strategy.id.clone(),
            strategy_type: strategy.strategy_type,
            target: strategy.target.clone(),
            verdict,
            error_rate_pct: error_rate(&samples),
            p50_ms: percentile(&sorted, 50.0),
            p95_ms: percentile(&sorted, 95.0),
            p99_ms: percentile(&sorted, 99.0),
            recommendation: recommendation_for(strategy.strategy_type, verdict, &strategy.target),
            samples,
            executed_at: Utc::now(),
        }
    }
}

fn severity_str(s: crate::models::Severity) -> String {
    match s {
        crate::models::Severity::Low => "low",
        crate::models::Severity::Medium => "medium",
        crate::models::Severity::High => "high",
        crate::models::Severity::Critical => "critical",
    }
    .to_string()
}

fn pattern_target(pattern: &serde_json::Value) -> String {
    if let Some(service) = pattern.get("service").and_then(|v| v.as_str()) {
        return service.to_string();
    }
    pattern
        .get("services_involved")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string()
}

fn recommendation_for(strategy_type: StrategyType, verdict: TestVerdict, target: &str) -> String {
    if verdict == TestVerdict::Pass {
        return format!("{target} is within normal bounds on this check, no action needed.");
    }
    match strategy_type {
        StrategyType::HealthSweep => format!("Investigate which core endpoint is unreachable before trusting other reads for {target}."),
        StrategyType::LatencyProbe => format!("Review recent deployments and DB query plans for {target}."),
        StrategyType::LoadBurst => format!("Provision additional capacity or shed load ahead of peak traffic for {target}."),
        StrategyType::CascadeSim | StrategyType::DependencyChain => {
            format!("Add a circuit breaker in front of {target}'s slowest dependency.")
        }
    }
}

fn next_id(prefix: &str) -> String {
    format!("{prefix}-{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Insight, InsightCategory, InsightStatus, Severity};

    fn insight(service: &str, title: &str, body: &str) -> InsightWithService {
        InsightWithService {
            service: service.to_string(),
            insight: Insight {
                id: next_id("ins"),
                category: InsightCategory::Performance,
                severity: Severity::Medium,
                title: title.to_string(),
                insight: body.to_string(),
                evidence: "{}".to_string(),
                recommendation: String::new(),
                status: InsightStatus::Open,
                timestamp: Utc::now(),
            },
        }
    }

    #[test]
    fn percentile_matches_classical_index() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 100.0), 5.0);
        assert_eq!(percentile(&sorted, 50.0), 2.0); // floor(5*50/100)-1 = 1
        assert_eq!(percentile(&[], 99.0), 0.0);
    }

    #[test]
    fn generate_strategies_produces_exactly_the_expected_set() {
        let engine = NetworkTestEngine::new("http://localhost:8000".to_string());
        let insights = vec![insight("checkout-service", "P99 latency regression", "steady increase in tail latency")];
        let patterns = vec![serde_json::json!({
            "id": "gpat-1",
            "type": "cascade_risk",
            "services_involved": ["billing-service"],
        })];
        let strategies = engine.generate_strategies(&insights, &patterns);
        assert_eq!(strategies.len(), 3);
        assert!(strategies.iter().any(|s| s.strategy_type == StrategyType::HealthSweep));
        assert!(strategies.iter().any(|s| s.strategy_type == StrategyType::LatencyProbe && s.target == "checkout-service"));
        assert!(strategies.iter().any(|s| s.strategy_type == StrategyType::CascadeSim && s.target == "billing-service"));
    }

    #[test]
    fn generate_strategies_deduplicates_per_service() {
        let engine = NetworkTestEngine::new("http://localhost:8000".to_string());
        let insights = vec![
            insight("checkout-service", "Latency spike", "p99 rising"),
            insight("checkout-service", "Timeout errors", "response time degraded, timeouts observed"),
        ];
        let strategies = engine.generate_strategies(&insights, &[]);
        let latency_count = strategies.iter().filter(|s| s.strategy_type == StrategyType::LatencyProbe).count();
        assert_eq!(latency_count, 1);
    }
}
