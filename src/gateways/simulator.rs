use crate::gateways::{
    Authorization, BankDecision, ChargeRequest, GatewayAdapter, GatewayFault, HealthProbe,
    SIMULATOR_GATEWAY,
};
use std::time::Duration;

pub const REASON_APPROVED: &str = "approved";
pub const REASON_INSUFFICIENT_FUNDS: &str = "insufficient_funds";
pub const REASON_FRAUD_SUSPECTED: &str = "fraud_suspected";

/// Deterministic in-process acquiring bank. Mirrors the decision shape of a
/// real processor so the executor cannot tell it apart from a remote
/// adapter.
pub struct SimulatorGateway {
    pub fraud_ceiling: i64,
    pub latency: Duration,
}

impl Default for SimulatorGateway {
    fn default() -> Self {
        Self {
            fraud_ceiling: 100_000,
            latency: Duration::ZERO,
        }
    }
}

#[async_trait::async_trait]
impl GatewayAdapter for SimulatorGateway {
    fn name(&self) -> &str {
        SIMULATOR_GATEWAY
    }

    async fn authorize(&self, request: &ChargeRequest) -> Result<Authorization, GatewayFault> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if request.card_token.ends_with("0000") {
            return Ok(Authorization {
                decision: BankDecision::Decline,
                reason: REASON_INSUFFICIENT_FUNDS.to_string(),
                transaction_id: None,
            });
        }

        if request.amount_minor > self.fraud_ceiling {
            return Ok(Authorization {
                decision: BankDecision::Decline,
                reason: REASON_FRAUD_SUSPECTED.to_string(),
                transaction_id: None,
            });
        }

        let suffix: String = request.idempotency_key.chars().take(16).collect();
        Ok(Authorization {
            decision: BankDecision::Approve,
            reason: REASON_APPROVED.to_string(),
            transaction_id: Some(format!("sim_{suffix}")),
        })
    }

    async fn health_check(&self) -> HealthProbe {
        HealthProbe {
            healthy: true,
            latency_ms: self.latency.as_millis() as f64,
            message: "simulator is always available".to_string(),
        }
    }
}
