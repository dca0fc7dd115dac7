//! ValidationAdapter: post-remediation and post-scale network checks.
//! Grounded in `agent/tools/testsprite.py` (recovery / scale-stability) and
//! `cluster/validation.py` (post-scale endpoint sweep).

use crate::config::ValidationConfig;
use crate::error::ForgeResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryResult {
    pub service: String,
    pub test_suite: String,
    pub passed: u32,
    pub failed: u32,
    pub pass_rate: f64,
    pub latency_p99_ms: f64,
    pub baseline_p99_ms: f64,
    pub recovered: bool,
    pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityPhase {
    pub passed: u32,
    pub failed: u32,
    pub pass_rate: f64,
    pub p99_latency_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityResult {
    pub service: String,
    pub scale_direction: String,
    pub instance_before: u32,
    pub instance_after: u32,
    pub phase_1_pre_scale: StabilityPhase,
    pub phase_2_post_scale: StabilityPhase,
    pub network_stable: bool,
    pub verdict: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointResult {
    pub endpoint: String,
    pub name: String,
    pub status_code: u16,
    pub latency_ms: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkValidationResult {
    pub validation_id: String,
    pub trigger_event: String,
    pub trigger_replica: String,
    pub endpoints_tested: u32,
    pub endpoints_passed: u32,
    pub endpoints_failed: u32,
    pub status: String,
    pub details: Vec<EndpointResult>,
}

const ENDPOINTS_TO_TEST: &[(&str, &str)] = &[
    ("/health", "Health Check"),
    ("/api/agent/health", "Agent Health"),
    ("/api/cluster/status", "Cluster Status"),
    ("/api/graph/", "Service Graph"),
];

#[async_trait]
pub trait ValidationAdapter: Send + Sync {
    async fn validate_recovery(&self, service: &str, baseline_p99_ms: f64, suite: &str) -> ForgeResult<RecoveryResult>;
    async fn validate_scale_stability(
        &self,
        service: &str,
        direction: &str,
        before: u32,
        after: u32,
        wait_secs: u64,
        suite: &str,
    ) -> ForgeResult<StabilityResult>;
    async fn network_after_scale(&self, trigger: &str, replica_name: &str) -> ForgeResult<NetworkValidationResult>;
}

pub struct SimulatedValidationAdapter {
    client: reqwest::Client,
    config: ValidationConfig,
}

impl SimulatedValidationAdapter {
    pub fn new(config: ValidationConfig) -> Self {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(8)).build().unwrap_or_default();
        Self { client, config }
    }
}

#[async_trait]
impl ValidationAdapter for SimulatedValidationAdapter {
    async fn validate_recovery(&self, service: &str, baseline_p99_ms: f64, suite: &str) -> ForgeResult<RecoveryResult> {
        // Demo/simulated path: service has recovered to ~95% of baseline.
        let current_p99 = baseline_p99_ms * 0.95;
        let passed = 47;
        let total = 50;
        Ok(RecoveryResult {
            service: service.to_string(),
            test_suite: suite.to_string(),
            passed,
            failed: total - passed,
            pass_rate: (passed as f64 / total as f64 * 100.0 * 10.0).round() / 10.0,
            latency_p99_ms: current_p99,
            baseline_p99_ms,
            recovered: current_p99 <= baseline_p99_ms * 1.1,
            details: format!(
                "TestSprite ran {total} tests against {service}. p99 latency now {current_p99:.1}ms (baseline {baseline_p99_ms:.1}ms)."
            ),
        })
    }

    async fn validate_scale_stability(
        &self,
        service: &str,
        direction: &str,
        before: u32,
        after: u32,
        wait_secs: u64,
        _suite: &str,
    ) -> ForgeResult<StabilityResult> {
        let pre_p99 = 320.0;
        let pre_pass = 49u32;
        let pre_total = 50u32;

        tokio::time::sleep(Duration::from_secs(wait_secs.min(3))).await;

        let (post_p99, post_pass) =
            if direction == "up" { (pre_p99 * 0.85, 50u32) } else { (pre_p99 * 1.08, 48u32) };
        let post_total = 50u32;

        let pre_rate = pre_pass as f64 / pre_total as f64 * 100.0;
        let post_rate = post_pass as f64 / post_total as f64 * 100.0;
        let network_stable = post_rate >= pre_rate * 0.95 && post_p99 <= pre_p99 * 1.20;

        Ok(StabilityResult {
            service: service.to_string(),
            scale_direction: direction.to_string(),
            instance_before: before,
            instance_after: after,
            phase_1_pre_scale: StabilityPhase {
                passed: pre_pass,
                failed: pre_total - pre_pass,
                pass_rate: pre_rate,
                p99_latency_ms: pre_p99,
            },
            phase_2_post_scale: StabilityPhase {
                passed: post_pass,
                failed: post_total - post_pass,
                pass_rate: post_rate,
                p99_latency_ms: post_p99,
            },
            network_stable,
            verdict: if network_stable { "STABLE".to_string() } else { "UNSTABLE - regression detected".to_string() },
        })
    }

    async fn network_after_scale(&self, trigger: &str, replica_name: &str) -> ForgeResult<NetworkValidationResult> {
        let validation_id = format!("val-{}", &uuid::Uuid::new_v4().simple().to_string()[..6]);
        let mut details = Vec::new();
        let mut passed = 0u32;
        let mut failed = 0u32;

        for (path, name) in ENDPOINTS_TO_TEST {
            let start = std::time::Instant::now();
            let url = format!("{}{}", self.config.base_url, path);
            let result = self.client.get(&url).send().await;
            let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
            match result {
                Ok(resp) if resp.status().is_success() || resp.status().is_redirection() => {
                    passed += 1;
                    details.push(EndpointResult {
                        endpoint: path.to_string(),
                        name: name.to_string(),
                        status_code: resp.status().as_u16(),
                        latency_ms,
                        passed: true,
                    });
                }
                Ok(resp) => {
                    failed += 1;
                    details.push(EndpointResult {
                        endpoint: path.to_string(),
                        name: name.to_string(),
                        status_code: resp.status().as_u16(),
                        latency_ms,
                        passed: false,
                    });
                }
                Err(_) => {
                    failed += 1;
                    details.push(EndpointResult {
                        endpoint: path.to_string(),
                        name: name.to_string(),
                        status_code: 0,
                        latency_ms,
                        passed: false,
                    });
                }
            }
        }

        let status = if failed == 0 {
            "passed"
        } else if passed == 0 {
            "failed"
        } else {
            "partial"
        };

        Ok(NetworkValidationResult {
            validation_id,
            trigger_event: trigger.to_string(),
            trigger_replica: replica_name.to_string(),
            endpoints_tested: passed + failed,
            endpoints_passed: passed,
            endpoints_failed: failed,
            status: status.to_string(),
            details,
        })
    }
}
