//! Activity Log: a bounded ring of the most recent tool calls and
//! analysis events, polled by the chat/dashboard surface. Grounded in
//! `agent/activity_log.py`.

use crate::models::{ActivityEntry, ActivityEventType, ActivitySource};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Mutex;

const MAX_ENTRIES: usize = 200;

#[derive(Default)]
struct Inner {
    entries: VecDeque<ActivityEntry>,
    counter: u64,
}

pub struct ActivityLog {
    inner: Mutex<Inner>,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityLog {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()) }
    }

    /// `AddEntry`: appends, assigning a strictly monotonic id.
    pub fn log(
        &self,
        event_type: ActivityEventType,
        source: ActivitySource,
        summary: impl Into<String>,
        detail: impl Into<String>,
        metadata: serde_json::Value,
    ) -> u64 {
        let detail = detail.into();
        let detail: String = if detail.chars().count() > 500 { detail.chars().take(500).collect() } else { detail };
        let mut inner = self.inner.lock().expect("activity log mutex poisoned");
        inner.counter += 1;
        let id = inner.counter;
        let entry = ActivityEntry { id, ts: Utc::now(), event_type, source, summary: summary.into(), detail, metadata };
        inner.entries.push_back(entry);
        if inner.entries.len() > MAX_ENTRIES {
            inner.entries.pop_front();
        }
        id
    }

    /// Entries with `id > since_id`, newest first, capped at `limit`.
    pub fn recent(&self, since_id: u64, limit: usize) -> Vec<ActivityEntry> {
        let inner = self.inner.lock().expect("activity log mutex poisoned");
        let mut out: Vec<ActivityEntry> =
            inner.entries.iter().filter(|e| e.id > since_id).cloned().collect();
        out.sort_by(|a, b| b.id.cmp(&a.id));
        out.truncate(limit);
        out
    }

    pub fn all(&self, limit: usize) -> Vec<ActivityEntry> {
        self.recent(0, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_strictly_increasing() {
        let log = ActivityLog::new();
        let a = log.log(ActivityEventType::ToolCall, ActivitySource::Primary, "s1", "", serde_json::json!({}));
        let b = log.log(ActivityEventType::Analysis, ActivitySource::System, "s2", "", serde_json::json!({}));
        assert!(b > a);
    }

    #[test]
    fn since_id_cursor_excludes_older_entries() {
        let log = ActivityLog::new();
        let a = log.log(ActivityEventType::ToolCall, ActivitySource::Primary, "s1", "", serde_json::json!({}));
        let _b = log.log(ActivityEventType::Analysis, ActivitySource::System, "s2", "", serde_json::json!({}));
        let recent = log.recent(a, 10);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].summary, "s2");
    }

    #[test]
    fn multibyte_detail_over_the_char_cap_truncates_without_panicking() {
        let log = ActivityLog::new();
        let detail: String = std::iter::repeat('\u{1F600}').take(600).collect();
        let id = log.log(ActivityEventType::ToolCall, ActivitySource::Primary, "s", detail, serde_json::json!({}));
        let entry = log.recent(0, 1).into_iter().find(|e| e.id == id).unwrap();
        assert_eq!(entry.detail.chars().count(), 500);
    }

    #[test]
    fn ring_is_bounded() {
        let log = ActivityLog::new();
        for i in 0..(MAX_ENTRIES + 10) {
            log.log(ActivityEventType::ToolCall, ActivitySource::Primary, format!("s{i}"), "", serde_json::json!({}));
        }
        assert_eq!(log.all(usize::MAX).len(), MAX_ENTRIES);
    }
}
