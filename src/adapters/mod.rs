//! External Adapters: explicit, swappable interfaces over everything
//! outside the core: the topology graph, the metrics/events backend,
//! remediation actions, validation probes, and the LLM. Concrete
//! implementations hit real HTTP endpoints; `demo_mode` (or an absent
//! endpoint) makes each adapter degrade to a deterministic simulated
//! response instead of failing outright.

pub mod graph;
pub mod llm;
pub mod metrics;
pub mod remediation;
pub mod validation;

pub use graph::{GraphAdapter, HttpGraphAdapter};
pub use llm::{LlmAdapter, LlmToolCall, NoopLlmAdapter, OpenAiLlmAdapter};
pub use metrics::{DatadogMetricsAdapter, LiveMetrics, MetricsAdapter};
pub use remediation::{RemediationAdapter, RemediationResult, SimulatedRemediationAdapter};
pub use validation::{SimulatedValidationAdapter, ValidationAdapter};

/// Start at 100. Subtract 30 if cpu%>80 else 15 if >60. Subtract 20 if
/// mem%>85 else 10 if >70. Subtract 5 per alerting monitor. Clamp to
/// [5,100]. Used by `LiveMetricsForService`.
pub fn health_score_heuristic(cpu_percent: f64, mem_percent: f64, alerting_monitors: u32) -> i32 {
    let mut score: f64 = 100.0;
    score -= if cpu_percent > 80.0 {
        30.0
    } else if cpu_percent > 60.0 {
        15.0
    } else {
        0.0
    };
    score -= if mem_percent > 85.0 {
        20.0
    } else if mem_percent > 70.0 {
        10.0
    } else {
        0.0
    };
    score -= 5.0 * alerting_monitors as f64;
    score.clamp(5.0, 100.0) as i32
}

/// `p99_latency_ms = 200 + (100 - health) * 15`, `avg ~= 0.4 * p99`.
pub fn display_latency_from_health(health: i32) -> (f64, f64) {
    let p99 = 200.0 + (100 - health) as f64 * 15.0;
    (p99, p99 * 0.4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_heuristic_clamps_to_floor() {
        assert_eq!(health_score_heuristic(95.0, 90.0, 10), 5);
    }

    #[test]
    fn health_heuristic_full_score_when_nominal() {
        assert_eq!(health_score_heuristic(10.0, 10.0, 0), 100);
    }
}
