pub mod config;
pub mod error;
pub mod domain {
    pub mod intent;
    pub mod rule;
    pub mod trace;
}
pub mod gateways;
pub mod health {
    pub mod monitor;
    pub mod window;
}
pub mod http {
    pub mod handlers {
        pub mod admin;
        pub mod gateways;
        pub mod ops;
        pub mod payments;
        pub mod rules;
    }
    pub mod middleware {
        pub mod admin_auth;
        pub mod merchant_auth;
    }
}
pub mod routing {
    pub mod engine;
}
pub mod service {
    pub mod executor;
    pub mod idempotency;
    pub mod payment_service;
    pub mod webhook;
}
pub mod store;

use crate::gateways::GatewayRegistry;
use crate::health::monitor::HealthMonitor;
use crate::service::payment_service::PaymentService;
use crate::store::OrchestratorStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub payment_service: PaymentService,
    pub store: Arc<dyn OrchestratorStore>,
    pub monitor: Arc<HealthMonitor>,
    pub registry: Arc<GatewayRegistry>,
    pub pool: sqlx::PgPool,
}
