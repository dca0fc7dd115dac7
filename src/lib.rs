//! Forge: an autonomous SRE agent platform.
//!
//! Composes the Persistent Knowledge Store, Activity/Action logs, the
//! external adapter contracts, the Agent Orchestrator, the Cluster
//! Coordinator, and the Network Test Strategy Engine behind one shared
//! [`AppState`].

use std::sync::Arc;

pub mod action_log;
pub mod activity_log;
pub mod adapters;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod handlers;
pub mod models;
pub mod network_test;
pub mod orchestrator;
pub mod store;

pub use action_log::ActionLog;
pub use activity_log::ActivityLog;
pub use config::Config;
pub use coordinator::Coordinator;
pub use network_test::NetworkTestEngine;
pub use orchestrator::Orchestrator;
pub use store::KnowledgeStore;

/// Application shared state. Every component is wrapped in `Arc` for cheap
/// cloning into `axum` handlers; each owns its own internal mutex rather
/// than sharing one giant lock.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<KnowledgeStore>,
    pub activity_log: Arc<ActivityLog>,
    pub action_log: Arc<ActionLog>,
    pub orchestrator: Arc<Orchestrator>,
    pub coordinator: Arc<Coordinator>,
    pub network_test: Arc<NetworkTestEngine>,
    pub graph: Arc<dyn adapters::GraphAdapter>,
    pub metrics: Arc<dyn adapters::MetricsAdapter>,
    pub remediation: Arc<dyn adapters::RemediationAdapter>,
    pub validation: Arc<dyn adapters::ValidationAdapter>,
}
