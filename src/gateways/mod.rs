use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub mod remote;
pub mod simulator;

pub const SIMULATOR_GATEWAY: &str = "simulator";

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub card_token: String,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BankDecision {
    Approve,
    Decline,
}

impl BankDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            BankDecision::Approve => "approve",
            BankDecision::Decline => "decline",
        }
    }
}

/// Normalized authorization outcome. A decline is a definitive answer from
/// the issuing side, not a gateway failure.
#[derive(Debug, Clone)]
pub struct Authorization {
    pub decision: BankDecision,
    pub reason: String,
    pub transaction_id: Option<String>,
}

/// Transient adapter-level failures. These are the only outcomes the
/// failover executor retries on a different gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayFault {
    #[error("gateway timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("upstream returned HTTP {0}")]
    Http(u16),
}

#[derive(Debug, Clone)]
pub struct HealthProbe {
    pub healthy: bool,
    pub latency_ms: f64,
    pub message: String,
}

#[async_trait::async_trait]
pub trait GatewayAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn authorize(&self, request: &ChargeRequest) -> Result<Authorization, GatewayFault>;

    async fn health_check(&self) -> HealthProbe;
}

pub type GatewayRegistry = HashMap<String, Arc<dyn GatewayAdapter>>;
