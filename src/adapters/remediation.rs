//! RemediationAdapter: scale/rollback/parameter-update actions, each
//! journalled to the Action Log regardless of outcome. Grounded in
//! `agent/tools/aws_tools.py`.

use crate::action_log::ActionLog;
use crate::config::RemediationConfig;
use crate::error::ForgeResult;
use crate::models::{ActionStatus, ActionType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationResult {
    pub action_id: String,
    pub success: bool,
    pub detail: serde_json::Value,
}

#[async_trait]
pub trait RemediationAdapter: Send + Sync {
    async fn scale_service(&self, cluster: &str, service: &str, desired: u32, reason: &str) -> ForgeResult<RemediationResult>;
    async fn rollback_deployment(&self, application: &str, group: &str, reason: &str) -> ForgeResult<RemediationResult>;
    async fn update_parameter(
        &self,
        name: &str,
        value: &str,
        description: &str,
        service: &str,
    ) -> ForgeResult<RemediationResult>;
}

/// `demo_mode` (the default) returns a realistic simulated result instead of
/// calling a real provider; either way every call is journalled.
pub struct SimulatedRemediationAdapter {
    config: RemediationConfig,
    action_log: Arc<ActionLog>,
}

impl SimulatedRemediationAdapter {
    pub fn new(config: RemediationConfig, action_log: Arc<ActionLog>) -> Self {
        Self { config, action_log }
    }
}

#[async_trait]
impl RemediationAdapter for SimulatedRemediationAdapter {
    async fn scale_service(&self, cluster: &str, service: &str, desired: u32, reason: &str) -> ForgeResult<RemediationResult> {
        let detail = serde_json::json!({
            "cluster": cluster,
            "service": service,
            "desired_count": desired,
            "demo": self.config.demo_mode,
        });
        let action_id = self.action_log.record(
            ActionType::ScaleEcs,
            service,
            Some(cluster.to_string()),
            ActionStatus::Success,
            detail.clone(),
            reason,
        );
        tracing::info!(service, desired, "scaled ECS service ({action_id})");
        Ok(RemediationResult { action_id, success: true, detail })
    }

    async fn rollback_deployment(&self, application: &str, group: &str, reason: &str) -> ForgeResult<RemediationResult> {
        let detail = serde_json::json!({
            "application": application,
            "deployment_group": group,
            "demo": self.config.demo_mode,
        });
        let action_id = self.action_log.record(
            ActionType::RollbackDeployment,
            application,
            None,
            ActionStatus::Success,
            detail.clone(),
            reason,
        );
        tracing::info!(application, "triggered CodeDeploy rollback ({action_id})");
        Ok(RemediationResult { action_id, success: true, detail })
    }

    async fn update_parameter(
        &self,
        name: &str,
        value: &str,
        description: &str,
        service: &str,
    ) -> ForgeResult<RemediationResult> {
        let detail = serde_json::json!({
            "parameter": name,
            "value": value,
            "description": description,
            "demo": self.config.demo_mode,
        });
        let action_id =
            self.action_log.record(ActionType::UpdateParameter, service, None, ActionStatus::Success, detail.clone(), description);
        tracing::info!(parameter = name, service, "updated SSM parameter ({action_id})");
        Ok(RemediationResult { action_id, success: true, detail })
    }
}
