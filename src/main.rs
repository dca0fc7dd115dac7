use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use forge::adapters::{
    DatadogMetricsAdapter, HttpGraphAdapter, NoopLlmAdapter, OpenAiLlmAdapter, SimulatedRemediationAdapter,
    SimulatedValidationAdapter,
};
use forge::{handlers, ActionLog, ActivityLog, AppState, Config, Coordinator, KnowledgeStore, NetworkTestEngine, Orchestrator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);
    let registry = tracing_subscriber::registry().with(log_filter);

    if config.logging.file_enabled {
        let log_dir = config.logging.directory.clone().unwrap_or_else(|| "logs".to_string());
        let _ = std::fs::create_dir_all(&log_dir);
        let file_appender = tracing_appender::rolling::daily(&log_dir, "forge.log");
        let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
            .with(tracing_subscriber::fmt::layer())
            .init();
        // Leak the guard: it must live for the process lifetime to keep flushing.
        Box::leak(Box::new(_guard));
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Forge starting up");
    tracing::info!("Configuration loaded successfully");

    // Knowledge Store. A write failure here is fatal at startup per
    // the exit-code contract ("nonzero on storage write failure").
    let store = Arc::new(KnowledgeStore::load(&config.storage.memory_path).map_err(|e| {
        tracing::error!(error = %e, "failed to initialize knowledge store");
        e
    })?);
    tracing::info!(path = %config.storage.memory_path, "knowledge store ready");

    let activity_log = Arc::new(ActivityLog::new());
    let action_log = Arc::new(ActionLog::new());

    // External adapters. Each degrades to a deterministic simulated
    // response rather than panicking when unconfigured: absent endpoints
    // log a warning and error per call.
    let graph: Arc<dyn forge::adapters::GraphAdapter> = Arc::new(HttpGraphAdapter::new(config.graph.endpoint.clone()));
    let metrics: Arc<dyn forge::adapters::MetricsAdapter> = Arc::new(DatadogMetricsAdapter::new(config.metrics.clone()));
    let remediation: Arc<dyn forge::adapters::RemediationAdapter> =
        Arc::new(SimulatedRemediationAdapter::new(config.remediation.clone(), Arc::clone(&action_log)));
    let validation: Arc<dyn forge::adapters::ValidationAdapter> = Arc::new(SimulatedValidationAdapter::new(config.validation.clone()));

    let llm: Arc<dyn forge::adapters::LlmAdapter> = if config.llm.is_available() {
        tracing::info!(model = %config.llm.model, "LLM provider configured");
        Arc::new(OpenAiLlmAdapter::new(config.llm.clone()))
    } else {
        tracing::warn!("no LLM provider configured; orchestrator will use the deterministic fallback");
        Arc::new(NoopLlmAdapter)
    };
    let background_llm: Arc<dyn forge::adapters::LlmAdapter> =
        if config.llm.is_available() { Arc::new(OpenAiLlmAdapter::new(config.llm.clone())) } else { Arc::new(NoopLlmAdapter) };

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&store),
        Arc::clone(&activity_log),
        Arc::clone(&action_log),
        Arc::clone(&graph),
        Arc::clone(&metrics),
        Arc::clone(&remediation),
        Arc::clone(&validation),
        Arc::clone(&llm),
        background_llm,
        Duration::from_secs(config.llm.background_timeout_secs),
    ));

    let coordinator = Arc::new(Coordinator::new(config.cluster.clone()));

    let base_url = format!("http://{}:{}", config.server.host, config.server.port);
    let network_test = Arc::new(NetworkTestEngine::new(base_url));

    let app_state = AppState {
        config: Arc::new(config.clone()),
        store,
        activity_log,
        action_log,
        orchestrator,
        coordinator,
        network_test,
        graph,
        metrics,
        remediation,
        validation,
    };

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/agent/analyze", post(handlers::agent::analyze))
        .route("/api/agent/chat", post(handlers::agent::chat))
        .route("/api/agent/activity", get(handlers::agent::activity))
        .route("/api/agent/health", get(handlers::agent::agent_health))
        .route("/api/graph/", get(handlers::graph::index))
        .route("/api/graph/service/:name", get(handlers::graph::service_ego_graph))
        .route("/api/insights/", get(handlers::insights::index))
        .route("/api/insights/patterns", get(handlers::insights::patterns))
        .route("/api/insights/recommendations", get(handlers::insights::recommendations))
        .route("/api/insights/generate", post(handlers::insights::generate))
        .route(
            "/api/insights/:service",
            get(handlers::insights::service_memory).patch(handlers::insights::update_status),
        )
        .route("/api/cluster/status", get(handlers::cluster::status))
        .route("/api/cluster/tick", post(handlers::cluster::tick))
        .route("/api/cluster/enqueue", post(handlers::cluster::enqueue))
        .route("/api/cluster/simulate-load", post(handlers::cluster::simulate_load))
        .route("/api/cluster/validate", post(handlers::cluster::validate))
        .route("/api/cluster/validations", get(handlers::cluster::validations))
        .route("/api/cluster/complete/:id", post(handlers::cluster::complete))
        .route("/api/cluster/events", get(handlers::cluster::events))
        .route("/api/cluster/report", get(handlers::cluster::report))
        .route("/api/cluster/scale", post(handlers::cluster::scale))
        .route("/api/network-test/strategies", get(handlers::network_test::strategies))
        .route("/api/network-test/run", post(handlers::network_test::run))
        .route("/api/network-test/results", get(handlers::network_test::results))
        .route("/api/hooks/deploy", post(handlers::hooks::deploy))
        .route("/api/hooks/datadog-sync", post(handlers::hooks::datadog_sync))
        .route("/api/hooks/scale", post(handlers::hooks::scale))
        .with_state(app_state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer({
            let origin = std::env::var("FRONTEND_URL").ok().and_then(|v| v.parse::<axum::http::HeaderValue>().ok());
            let cors = tower_http::cors::CorsLayer::new().allow_methods(tower_http::cors::Any).allow_headers(tower_http::cors::Any);
            match origin {
                Some(origin) => cors.allow_origin(tower_http::cors::AllowOrigin::exact(origin)),
                None => cors.allow_origin(tower_http::cors::AllowOrigin::any()),
            }
        });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Forge is ready to serve requests");

    axum::serve(listener, app).await?;

    Ok(())
}
