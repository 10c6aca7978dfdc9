use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use axum::Router;
use payment_orchestrator::config::AppConfig;
use payment_orchestrator::gateways::simulator::SimulatorGateway;
use payment_orchestrator::gateways::remote::RemoteGateway;
use payment_orchestrator::gateways::{GatewayAdapter, GatewayRegistry};
use payment_orchestrator::health::monitor::{probe_loop, HealthMonitor};
use payment_orchestrator::service::payment_service::PaymentService;
use payment_orchestrator::service::webhook::WebhookWorker;
use payment_orchestrator::store::postgres::PgStore;
use payment_orchestrator::store::OrchestratorStore;
use payment_orchestrator::AppState;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Registers a remote gateway when its `<PREFIX>_BASE_URL` is set.
fn remote_from_env(gateway_name: &str, prefix: &str, timeout_ms: u64) -> Option<RemoteGateway> {
    let base_url = std::env::var(format!("{prefix}_BASE_URL")).ok()?;
    Some(RemoteGateway {
        gateway_name: gateway_name.to_string(),
        base_url,
        key_id: std::env::var(format!("{prefix}_KEY_ID")).unwrap_or_default(),
        key_secret: std::env::var(format!("{prefix}_KEY_SECRET")).unwrap_or_default(),
        timeout_ms,
        client: reqwest::Client::new(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let store: Arc<dyn OrchestratorStore> = Arc::new(PgStore::new(pool.clone()));

    let mut registry = GatewayRegistry::new();
    let simulator = SimulatorGateway {
        fraud_ceiling: cfg.simulator_fraud_ceiling,
        latency: Duration::from_millis(cfg.simulator_latency_ms),
    };
    registry.insert(simulator.name().to_string(), Arc::new(simulator));
    for (name, prefix) in [("alphapay", "ALPHAPAY"), ("betapay", "BETAPAY")] {
        if let Some(remote) = remote_from_env(name, prefix, cfg.gateway_timeout_ms) {
            registry.insert(name.to_string(), Arc::new(remote));
        }
    }
    let registry = Arc::new(registry);

    let monitor = Arc::new(HealthMonitor::new(cfg.health_window_size));
    tokio::spawn(probe_loop(
        monitor.clone(),
        registry.clone(),
        Duration::from_secs(cfg.health_probe_interval_secs),
    ));

    let worker = WebhookWorker::new(
        store.clone(),
        reqwest::Client::new(),
        cfg.webhook_max_attempts,
        Duration::from_secs(cfg.webhook_poll_interval_secs),
    );
    tokio::spawn(worker.run());

    let payment_service = PaymentService::new(
        store.clone(),
        registry.clone(),
        monitor.clone(),
        Duration::from_millis(cfg.gateway_timeout_ms),
    );

    let state = AppState {
        payment_service,
        store,
        monitor,
        registry,
        pool,
    };

    let admin_routes = Router::new()
        .route(
            "/admin/gateways/:gateway_name/toggle",
            post(payment_orchestrator::http::handlers::admin::toggle_gateway),
        )
        .route(
            "/admin/gateways/health",
            get(payment_orchestrator::http::handlers::admin::all_gateway_health),
        )
        .layer(from_fn_with_state(
            cfg.admin_api_key.clone(),
            payment_orchestrator::http::middleware::admin_auth::require_admin_key,
        ));

    let merchant_routes = Router::new()
        .route(
            "/payments",
            post(payment_orchestrator::http::handlers::payments::create_intent)
                .get(payment_orchestrator::http::handlers::payments::list_intents),
        )
        .route(
            "/payments/stats",
            get(payment_orchestrator::http::handlers::payments::intent_stats),
        )
        .route(
            "/payments/:intent_id",
            get(payment_orchestrator::http::handlers::payments::get_intent),
        )
        .route(
            "/payments/:intent_id/process",
            post(payment_orchestrator::http::handlers::payments::process_intent),
        )
        .route(
            "/payments/:intent_id/cancel",
            post(payment_orchestrator::http::handlers::payments::cancel_intent),
        )
        .route(
            "/gateways",
            get(payment_orchestrator::http::handlers::gateways::list_gateway_configs),
        )
        .route(
            "/gateways/health",
            get(payment_orchestrator::http::handlers::gateways::gateway_health),
        )
        .route(
            "/gateways/:gateway_name",
            put(payment_orchestrator::http::handlers::gateways::upsert_gateway_config),
        )
        .route(
            "/rules",
            post(payment_orchestrator::http::handlers::rules::create_rule)
                .get(payment_orchestrator::http::handlers::rules::list_rules),
        )
        .route(
            "/rules/:rule_id",
            delete(payment_orchestrator::http::handlers::rules::delete_rule),
        )
        .layer(from_fn_with_state(
            state.clone(),
            payment_orchestrator::http::middleware::merchant_auth::require_merchant,
        ));

    let app = Router::new()
        .route("/health", get(payment_orchestrator::http::handlers::ops::liveness))
        .route(
            "/ops/readiness",
            get(payment_orchestrator::http::handlers::ops::readiness),
        )
        .merge(merchant_routes)
        .merge(admin_routes)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
