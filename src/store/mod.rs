//! Persistent Knowledge Store.
//!
//! A single JSON document (`Memory`), serialized under a mutex, persisted by
//! an atomic tmp-write-then-rename so a crash mid-write never corrupts the
//! canonical file. Grounded in `memory/store.py` of the reference
//! implementation.

mod similarity;

pub use similarity::is_similar;

use crate::error::{ForgeError, ForgeResult};
use crate::models::*;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const ANALYSIS_HISTORY_CAP: usize = 100;

pub struct KnowledgeStore {
    path: PathBuf,
    memory: Mutex<Memory>,
}

impl KnowledgeStore {
    /// `LoadMemory`: read the document at `path`, initializing a default
    /// (version "1.0", empty maps) if it does not yet exist.
    pub fn load(path: impl AsRef<Path>) -> ForgeResult<Self> {
        let path = path.as_ref().to_path_buf();
        let memory = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(ForgeError::from)?;
            serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("memory document at {:?} failed to parse ({e}); starting fresh", path);
                Memory::default()
            })
        } else {
            Memory::default()
        };
        let mut memory = memory;
        memory.last_updated = Utc::now();
        Self::write_to_disk(&path, &memory)?;
        Ok(Self { path, memory: Mutex::new(memory) })
    }

    /// Atomic tmp-write + rename of `memory` to `path`. A pure function of
    /// its arguments: never touches `self.memory`, so a failed write never
    /// leaves a half-applied mutation visible to readers.
    fn write_to_disk(path: &Path, memory: &Memory) -> ForgeResult<()> {
        let serialized = serde_json::to_string_pretty(memory).map_err(ForgeError::from)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(ForgeError::from)?;
        }
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, serialized).map_err(ForgeError::from)?;
        fs::rename(&tmp_path, path).map_err(ForgeError::from)?;
        Ok(())
    }

    /// Applies `f` to a clone of the current document, persists the clone,
    /// and only swaps it into the live guard once the write succeeds. On a
    /// `Storage` error the live document is left byte-for-byte as it was
    /// before the call -- no reader can observe a mutation that failed to
    /// persist. The lock is held for the full clone-mutate-write-swap
    /// sequence, consistent with the single-writer/single-mutex model: every
    /// operation serializes, not just the in-memory mutation.
    fn mutate_and_persist<T>(&self, f: impl FnOnce(&mut Memory) -> T) -> ForgeResult<T> {
        let mut guard = self.memory.lock().expect("memory mutex poisoned");
        let mut candidate = guard.clone();
        let result = f(&mut candidate);
        candidate.last_updated = Utc::now();
        Self::write_to_disk(&self.path, &candidate)?;
        *guard = candidate;
        Ok(result)
    }

    fn ensure_service<'a>(memory: &'a mut Memory, service: &str) -> &'a mut ServiceMemory {
        memory.services.entry(service.to_string()).or_default()
    }

    /// `AddInsight(service, insight) -> id`.
    pub fn add_insight(
        &self,
        service: &str,
        category: InsightCategory,
        severity: Severity,
        title: impl Into<String>,
        body: impl Into<String>,
        evidence: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> ForgeResult<String> {
        let id = format!("ins-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
        let title = title.into();
        let body = body.into();
        let evidence = evidence.into();
        let recommendation = recommendation.into();
        let insight_id = id.clone();
        self.mutate_and_persist(move |memory| {
            let svc = Self::ensure_service(memory, service);
            svc.insights.push(Insight {
                id: insight_id,
                category,
                severity,
                title,
                insight: body,
                evidence,
                recommendation,
                status: InsightStatus::Open,
                timestamp: Utc::now(),
            });
        })?;
        Ok(id)
    }

    /// `GetAllInsights(status?) -> [insight+service]`, newest first.
    pub fn get_all_insights(&self, status: Option<InsightStatus>) -> Vec<InsightWithService> {
        let guard = self.memory.lock().expect("memory mutex poisoned");
        let mut out: Vec<InsightWithService> = guard
            .services
            .iter()
            .flat_map(|(name, mem)| {
                mem.insights
                    .iter()
                    .filter(|i| status.is_none_or(|s| i.status == s))
                    .map(move |i| InsightWithService { service: name.clone(), insight: i.clone() })
            })
            .collect();
        out.sort_by(|a, b| b.insight.timestamp.cmp(&a.insight.timestamp));
        out
    }

    /// `UpdateInsightStatus(id, status) -> bool`; first match across all
    /// services wins. A repeat call with the same status is a no-op that
    /// still returns true (found, unchanged).
    pub fn update_insight_status(&self, id: &str, status: InsightStatus) -> ForgeResult<bool> {
        self.mutate_and_persist(|memory| {
            for svc in memory.services.values_mut() {
                if let Some(insight) = svc.insights.iter_mut().find(|i| i.id == id) {
                    insight.status = status;
                    return true;
                }
            }
            false
        })
    }

    /// `AddPattern(service, pattern) -> id`, applying the merge invariant:
    /// same `type` AND similar description merges instead of inserting.
    pub fn add_pattern(
        &self,
        service: &str,
        pattern_type: impl Into<String>,
        description: impl Into<String>,
        confidence: f64,
        recommendation: impl Into<String>,
    ) -> ForgeResult<String> {
        let pattern_type = pattern_type.into();
        let description = description.into();
        let recommendation = recommendation.into();
        let new_id = format!("pat-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
        self.mutate_and_persist(move |memory| {
            let svc = Self::ensure_service(memory, service);
            let existing =
                svc.patterns.iter_mut().find(|p| p.pattern_type == pattern_type && is_similar(&p.description, &description));
            match existing {
                Some(p) => {
                    p.last_confirmed = Utc::now();
                    p.occurrences += 1;
                    p.confidence = (p.confidence + 0.02).min(0.99);
                    if !recommendation.is_empty() {
                        p.recommendation = recommendation;
                    }
                    p.id.clone()
                }
                None => {
                    let now = Utc::now();
                    svc.patterns.push(Pattern {
                        id: new_id.clone(),
                        pattern_type,
                        description,
                        confidence: confidence.clamp(0.0, 0.99),
                        recommendation,
                        first_detected: now,
                        last_confirmed: now,
                        occurrences: 1,
                    });
                    new_id
                }
            }
        })
    }

    /// `AddGlobalPattern(pattern) -> id`; simple append (the reference shows
    /// no merge for cross-service patterns).
    pub fn add_global_pattern(
        &self,
        pattern_type: impl Into<String>,
        description: impl Into<String>,
        confidence: f64,
        recommendation: impl Into<String>,
        services_involved: Vec<String>,
    ) -> ForgeResult<String> {
        let id = format!("gpat-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
        let pattern_type = pattern_type.into();
        let description = description.into();
        let recommendation = recommendation.into();
        let new_id = id.clone();
        self.mutate_and_persist(move |memory| {
            let now = Utc::now();
            memory.global_patterns.push(GlobalPattern {
                id: new_id,
                pattern_type,
                description,
                confidence: confidence.clamp(0.0, 0.99),
                recommendation,
                services_involved,
                first_detected: now,
                last_confirmed: now,
                occurrences: 1,
            });
        })?;
        Ok(id)
    }

    /// `GetAllPatterns() -> [pattern+{service|scope:"global"}]`, flattened.
    pub fn get_all_patterns(&self) -> Vec<serde_json::Value> {
        let guard = self.memory.lock().expect("memory mutex poisoned");
        let mut out = Vec::new();
        for (name, mem) in &guard.services {
            for p in &mem.patterns {
                let mut v = serde_json::to_value(p).expect("pattern serializes");
                v["service"] = serde_json::Value::String(name.clone());
                out.push(v);
            }
        }
        for p in &guard.global_patterns {
            let mut v = serde_json::to_value(p).expect("global pattern serializes");
            v["scope"] = serde_json::Value::String("global".to_string());
            out.push(v);
        }
        out
    }

    /// `GetServiceMemory(service) -> {baseline, patterns, insights}`.
    pub fn get_service_memory(&self, service: &str) -> ServiceMemory {
        let guard = self.memory.lock().expect("memory mutex poisoned");
        guard.services.get(service).cloned().unwrap_or_default()
    }

    /// `UpdateBaseline(service, metrics)`; replaces the baseline wholesale.
    pub fn update_baseline(&self, service: &str, mut metrics: BaselineMetrics) -> ForgeResult<()> {
        metrics.measured_at = Utc::now();
        self.mutate_and_persist(move |memory| {
            Self::ensure_service(memory, service).baseline_metrics = Some(metrics);
        })
    }

    /// `RecordAnalysis(session) -> id`; ring of 100.
    pub fn record_analysis(
        &self,
        trigger: AnalysisTrigger,
        services_analyzed: Vec<String>,
        findings_summary: impl Into<String>,
        actions_taken: Vec<String>,
        insights_generated: Vec<String>,
    ) -> ForgeResult<String> {
        let session_id = format!("sess-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
        let findings_summary = findings_summary.into();
        let new_id = session_id.clone();
        self.mutate_and_persist(move |memory| {
            memory.analysis_history.push(AnalysisSession {
                session_id: new_id,
                trigger,
                services_analyzed,
                findings_summary,
                actions_taken,
                insights_generated,
                timestamp: Utc::now(),
            });
            let len = memory.analysis_history.len();
            if len > ANALYSIS_HISTORY_CAP {
                memory.analysis_history.drain(0..len - ANALYSIS_HISTORY_CAP);
            }
        })?;
        Ok(session_id)
    }

    /// `GetRecommendations() -> [insight]`: open, high/critical severity,
    /// with a non-empty recommendation.
    pub fn get_recommendations(&self) -> Vec<InsightWithService> {
        let guard = self.memory.lock().expect("memory mutex poisoned");
        let mut out: Vec<InsightWithService> = guard
            .services
            .iter()
            .flat_map(|(name, mem)| {
                mem.insights
                    .iter()
                    .filter(|i| {
                        i.status == InsightStatus::Open
                            && matches!(i.severity, Severity::High | Severity::Critical)
                            && !i.recommendation.is_empty()
                    })
                    .map(move |i| InsightWithService { service: name.clone(), insight: i.clone() })
            })
            .collect();
        out.sort_by(|a, b| b.insight.timestamp.cmp(&a.insight.timestamp));
        out
    }

    /// `ListServiceNames() -> [name]`.
    pub fn list_service_names(&self) -> Vec<String> {
        let guard = self.memory.lock().expect("memory mutex poisoned");
        guard.services.keys().cloned().collect()
    }

    pub fn snapshot(&self) -> Memory {
        self.memory.lock().expect("memory mutex poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile_like_dir::temp_path;

    mod tempfile_like_dir {
        use std::path::PathBuf;
        use std::sync::atomic::{AtomicU64, Ordering};

        static COUNTER: AtomicU64 = AtomicU64::new(0);

        pub fn temp_path(name: &str) -> PathBuf {
            let n = COUNTER.fetch_add(1, Ordering::Relaxed);
            std::env::temp_dir().join(format!("forge-store-test-{name}-{n}.json"))
        }
    }

    #[test]
    fn add_insight_then_get_all_returns_one_open_entry() {
        let path = temp_path("add-insight");
        let store = KnowledgeStore::load(&path).unwrap();
        let id = store
            .add_insight(
                "svc-a",
                InsightCategory::Performance,
                Severity::High,
                "title",
                "body",
                "{}",
                "do something",
            )
            .unwrap();
        let all = store.get_all_insights(None);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].insight.id, id);
        assert_eq!(all[0].service, "svc-a");
        assert_eq!(all[0].insight.status, InsightStatus::Open);
        let _ = fs::remove_file(&path);
        let _ = fs::remove_file(path.with_extension("json.tmp"));
    }

    #[test]
    fn add_pattern_twice_merges_and_clamps_confidence() {
        let path = temp_path("pattern-merge");
        let store = KnowledgeStore::load(&path).unwrap();
        let id1 = store
            .add_pattern("svc-a", "latency_spike", "P99 latency spikes every 4 hours", 0.5, "")
            .unwrap();
        let id2 = store
            .add_pattern("svc-a", "latency_spike", "P99 latency spikes every 4 hours", 0.5, "")
            .unwrap();
        assert_eq!(id1, id2);
        let patterns = store.get_all_patterns();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0]["occurrences"], 2);
        let confidence = patterns[0]["confidence"].as_f64().unwrap();
        assert!((confidence - 0.52).abs() < 1e-9);
        let _ = fs::remove_file(&path);
        let _ = fs::remove_file(path.with_extension("json.tmp"));
    }

    #[test]
    fn update_insight_status_is_idempotent() {
        let path = temp_path("status-idempotent");
        let store = KnowledgeStore::load(&path).unwrap();
        let id = store
            .add_insight("svc-a", InsightCategory::Reliability, Severity::Low, "t", "b", "{}", "")
            .unwrap();
        assert!(store.update_insight_status(&id, InsightStatus::Acknowledged).unwrap());
        assert!(store.update_insight_status(&id, InsightStatus::Acknowledged).unwrap());
        let all = store.get_all_insights(Some(InsightStatus::Acknowledged));
        assert_eq!(all.len(), 1);
        let _ = fs::remove_file(&path);
        let _ = fs::remove_file(path.with_extension("json.tmp"));
    }

    #[test]
    fn failed_persist_leaves_in_memory_document_untouched() {
        let dir = temp_path("rollback-dir");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("memory.json");
        let store = KnowledgeStore::load(&path).unwrap();
        let id = store
            .add_insight("svc-a", InsightCategory::Reliability, Severity::Low, "t", "b", "{}", "")
            .unwrap();

        // Replace the store's directory with a plain file: the next
        // mutation's tmp-write can no longer land inside it, so `persist`
        // fails regardless of the test process's privileges.
        fs::remove_dir_all(&dir).unwrap();
        fs::write(&dir, b"not a directory").unwrap();

        let result = store.add_insight("svc-b", InsightCategory::Cost, Severity::Low, "t2", "b2", "{}", "");
        assert!(result.is_err());

        let all = store.get_all_insights(None);
        assert_eq!(all.len(), 1, "failed mutation must not be observable");
        assert_eq!(all[0].insight.id, id);

        let _ = fs::remove_file(&dir);
    }
}
