//! Pattern "similarity" rule used by the merge invariant. Kept as tunable
//! constants rather than inlined magic numbers so the thresholds stay
//! visible at a glance.

use std::collections::HashSet;

/// Window over which the case-folded prefix comparison runs.
const PREFIX_CHARS: usize = 40;

/// Word-set Jaccard overlap threshold above which two descriptions are
/// considered the same recurring pattern.
const JACCARD_THRESHOLD: f64 = 0.6;

/// Same `type` AND (first `PREFIX_CHARS` chars equal case-insensitive OR
/// word-Jaccard overlap > `JACCARD_THRESHOLD`).
pub fn is_similar(a: &str, b: &str) -> bool {
    if prefix_equal(a, b) {
        return true;
    }
    jaccard(a, b) > JACCARD_THRESHOLD
}

fn prefix_equal(a: &str, b: &str) -> bool {
    let pa: String = a.chars().take(PREFIX_CHARS).flat_map(|c| c.to_lowercase()).collect();
    let pb: String = b.chars().take(PREFIX_CHARS).flat_map(|c| c.to_lowercase()).collect();
    pa == pb
}

fn jaccard(a: &str, b: &str) -> f64 {
    let words_a: HashSet<String> = a.split_whitespace().map(|w| w.to_lowercase()).collect();
    let words_b: HashSet<String> = b.split_whitespace().map(|w| w.to_lowercase()).collect();
    let denom = words_a.len().max(words_b.len());
    if denom == 0 {
        return 0.0;
    }
    let inter = words_a.intersection(&words_b).count();
    inter as f64 / denom as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_descriptions_are_similar() {
        assert!(is_similar("P99 latency spikes every 4 hours", "P99 latency spikes every 4 hours"));
    }

    #[test]
    fn unrelated_descriptions_are_not_similar() {
        assert!(!is_similar(
            "P99 latency spikes every 4 hours",
            "Memory usage grows unbounded over the weekend"
        ));
    }

    #[test]
    fn jaccard_over_threshold_counts_as_similar_even_with_different_prefix() {
        let a = "elevated error rate detected across downstream calls";
        let b = "elevated error rate seen across downstream service calls";
        assert!(is_similar(a, b));
    }
}
