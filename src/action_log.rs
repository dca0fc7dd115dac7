//! Action Log: the append-only, unbounded record of every
//! remediation action taken, journaled regardless of success/failure.
//! Grounded in `agent/tools/aws_tools.py`'s `_action_log`/`_record_action`.

use crate::models::{ActionEntry, ActionStatus, ActionType};
use chrono::Utc;
use std::sync::Mutex;

#[derive(Default)]
pub struct ActionLog {
    entries: Mutex<Vec<ActionEntry>>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &self,
        action_type: ActionType,
        service: impl Into<String>,
        cluster: Option<String>,
        status: ActionStatus,
        detail: serde_json::Value,
        reason: impl Into<String>,
    ) -> String {
        let action_id = format!("act-{}", &uuid::Uuid::new_v4().simple().to_string()[..6]);
        let entry = ActionEntry {
            action_id: action_id.clone(),
            action_type,
            service: service.into(),
            cluster,
            status,
            detail,
            reason: reason.into(),
            timestamp: Utc::now(),
        };
        self.entries.lock().expect("action log mutex poisoned").push(entry);
        action_id
    }

    /// Most-recent-first, matching `get_action_log` in the reference.
    pub fn all(&self) -> Vec<ActionEntry> {
        let mut out: Vec<ActionEntry> = self.entries.lock().expect("action log mutex poisoned").clone();
        out.reverse();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_returns_distinct_ids_and_all_is_reversed() {
        let log = ActionLog::new();
        let id1 = log.record(
            ActionType::ScaleEcs,
            "svc-a",
            Some("default".into()),
            ActionStatus::Success,
            serde_json::json!({}),
            "queue depth",
        );
        let id2 = log.record(
            ActionType::RollbackDeployment,
            "svc-b",
            None,
            ActionStatus::Failed,
            serde_json::json!({}),
            "bad deploy",
        );
        assert_ne!(id1, id2);
        let all = log.all();
        assert_eq!(all[0].action_id, id2);
        assert_eq!(all[1].action_id, id1);
    }
}
