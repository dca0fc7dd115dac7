//! Fixed insight/pattern libraries sampled by `GenerateInsights` and by the
//! orchestrator's unconditional post-analysis deepening. Grounded in
//! `agent.py::_generate_demo_insights_for_service`'s fixed catalogue.

use crate::models::{InsightCategory, Severity};
use crate::orchestrator::fallback::SeededRng;

pub struct InsightTemplate {
    pub category: InsightCategory,
    pub severity: Severity,
    pub title: &'static str,
    pub body: &'static str,
    pub recommendation: &'static str,
}

pub const INSIGHT_LIBRARY: &[InsightTemplate] = &[
    InsightTemplate {
        category: InsightCategory::Performance,
        severity: Severity::Medium,
        title: "P99 latency trending upward",
        body: "Tail latency has crept up over the observation window, consistent with queueing \
               rather than a single slow call.",
        recommendation: "Add a connection-pool timeout and review thread-pool sizing.",
    },
    InsightTemplate {
        category: InsightCategory::Cost,
        severity: Severity::Low,
        title: "CPU headroom underutilized",
        body: "Average CPU utilization sits well below the configured autoscaling target \
               for most of the day.",
        recommendation: "Lower the minimum replica count or right-size the instance type.",
    },
    InsightTemplate {
        category: InsightCategory::Reliability,
        severity: Severity::High,
        title: "Elevated error rate on downstream calls",
        body: "A measurable fraction of outbound calls to dependencies are failing or timing \
               out, enough to risk cascading retries.",
        recommendation: "Wrap the dependency call in a circuit breaker with a conservative \
               timeout.",
    },
    InsightTemplate {
        category: InsightCategory::Optimization,
        severity: Severity::Low,
        title: "Duplicate queries within a single request",
        body: "The same read query appears to run multiple times per inbound request, \
               suggesting a missing request-scoped cache.",
        recommendation: "Introduce a request-scoped memoization layer for repeated reads.",
    },
    InsightTemplate {
        category: InsightCategory::Performance,
        severity: Severity::Medium,
        title: "Periodic load spikes correlate with batch jobs",
        body: "Latency and CPU both spike on a roughly periodic cadence that lines up with a \
               scheduled batch job on a shared dependency.",
        recommendation: "Stagger the batch schedule or isolate it onto separate capacity.",
    },
    InsightTemplate {
        category: InsightCategory::Reliability,
        severity: Severity::Critical,
        title: "Health score crossed the critical threshold",
        body: "Health score dropped below the critical threshold within the observation \
               window, with no corresponding recovery.",
        recommendation: "Escalate to on-call and consider an immediate rollback of the last \
               deployment.",
    },
    InsightTemplate {
        category: InsightCategory::Cost,
        severity: Severity::Medium,
        title: "Over-provisioned memory reservation",
        body: "Memory usage rarely exceeds half of the reserved amount, even under peak load.",
        recommendation: "Reduce the memory reservation and re-validate under a load test.",
    },
    InsightTemplate {
        category: InsightCategory::Optimization,
        severity: Severity::Medium,
        title: "Synchronous call chain to a slow dependency",
        body: "A significant share of this service's latency budget is spent blocked on a \
               single downstream call that could be made asynchronous.",
        recommendation: "Move the call off the hot path or introduce a cache in front of it.",
    },
];

pub struct PatternTemplate {
    pub pattern_type: &'static str,
    pub description: &'static str,
    pub confidence: f64,
    pub recommendation: &'static str,
}

pub const PATTERN_LIBRARY: &[PatternTemplate] = &[
    PatternTemplate {
        pattern_type: "periodic_overload",
        description: "Load and latency both spike on a recurring schedule, consistent with a \
            batch job or cron-triggered fan-out.",
        confidence: 0.55,
        recommendation: "Stagger the triggering job or provision burst capacity ahead of it.",
    },
    PatternTemplate {
        pattern_type: "latency_spike",
        description: "P99 latency spikes intermittently without a corresponding change in \
            request volume.",
        confidence: 0.5,
        recommendation: "Correlate with GC pauses or downstream dependency latency.",
    },
    PatternTemplate {
        pattern_type: "dependency_bottleneck",
        description: "A single downstream dependency accounts for most of the observed tail \
            latency across multiple upstream callers.",
        confidence: 0.6,
        recommendation: "Add a cache or a circuit breaker in front of the bottleneck \
            dependency.",
    },
    PatternTemplate {
        pattern_type: "deployment_risk",
        description: "Health score dips measurably in the hour following recent deployments.",
        confidence: 0.45,
        recommendation: "Add a canary stage with automatic rollback on health regression.",
    },
    PatternTemplate {
        pattern_type: "correlated_degradation",
        description: "Degradation in this service correlates closely with degradation in a \
            sibling service on the same team.",
        confidence: 0.5,
        recommendation: "Check for a shared dependency or shared infrastructure fault domain.",
    },
];

/// Sample `count` distinct templates deterministically from `rng`.
pub fn sample_insights(rng: &mut SeededRng, count: usize) -> Vec<&'static InsightTemplate> {
    let mut indices: Vec<usize> = (0..INSIGHT_LIBRARY.len()).collect();
    let mut out = Vec::new();
    for _ in 0..count.min(INSIGHT_LIBRARY.len()) {
        let pick = rng.index(indices.len());
        out.push(&INSIGHT_LIBRARY[indices.remove(pick)]);
    }
    out
}

pub fn sample_patterns(rng: &mut SeededRng, count: usize) -> Vec<&'static PatternTemplate> {
    let mut indices: Vec<usize> = (0..PATTERN_LIBRARY.len()).collect();
    let mut out = Vec::new();
    for _ in 0..count.min(PATTERN_LIBRARY.len()) {
        let pick = rng.index(indices.len());
        out.push(&PATTERN_LIBRARY[indices.remove(pick)]);
    }
    out
}
