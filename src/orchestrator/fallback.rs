//! Deterministic synthetic report, engaged when the LLM is unavailable or
//! returns unparseable output. Seeded by `hash(service_name) +
//! current_hour` so repeated calls within the same wall-clock hour for the
//! same service reproduce the same report.

use chrono::{Timelike, Utc};

/// splitmix64: small, fast, and gives a well-mixed stream from a single
/// integer seed. Exact bit-for-bit reproduction of the Python reference's
/// `random.Random` stream is not required; reproducing determinism for the
/// same `(service, hour)` pair within this process is.
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E3779B97F4A7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }

    /// Uniform float in `[0, 1)`.
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform float in `[lo, hi)`.
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.next_f64() * (hi - lo)
    }

    /// Index into `[0, len)`.
    pub fn index(&mut self, len: usize) -> usize {
        (self.next_f64() * len as f64) as usize % len.max(1)
    }
}

/// FNV-1a over the bytes of `s`, matching "hash(service_name)" loosely
/// (language-portable, deterministic, cheap).
fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in s.as_bytes() {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

pub fn seed_for(service: &str) -> u64 {
    fnv1a(service).wrapping_add(Utc::now().hour() as u64)
}

/// Fixed ladder the fallback draws `health_score` from.
pub const HEALTH_LADDER: [i32; 7] = [95, 88, 72, 65, 42, 38, 25];

/// `(description, plausible dependency/service name)` library the fallback
/// draws a root cause from.
pub const ROOT_CAUSE_LIBRARY: [(&str, &str); 6] = [
    ("database connection pool exhaustion", "postgres-primary"),
    ("downstream timeout cascades from a slow dependency", "payment-gateway"),
    ("memory leak in the request handler", "order-service"),
    ("cache stampede after a cold cache restart", "redis-cache"),
    ("expired TLS certificate triggering retry storms", "auth-service"),
    ("noisy-neighbor CPU contention on a shared host", "shared-compute-pool"),
];

pub fn status_for_health(health: i32) -> &'static str {
    if health >= 80 {
        "healthy"
    } else if health >= 50 {
        "degraded"
    } else {
        "critical"
    }
}

pub fn chat_summary_template(status: &str, service: &str, root_cause: &str) -> String {
    match status {
        "healthy" => format!(
            "{service} is operating within normal bounds. No remediation was required; \
             memory and baselines were refreshed for future comparisons."
        ),
        "degraded" => format!(
            "{service} is showing early signs of degradation, most likely {root_cause}. \
             A low-risk parameter adjustment was applied and recovery is being tracked."
        ),
        _ => format!(
            "{service} is in a critical state, most likely due to {root_cause}. \
             Remediation was executed and validation is in progress to confirm recovery."
        ),
    }
}
