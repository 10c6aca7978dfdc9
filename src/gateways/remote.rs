use crate::gateways::{
    Authorization, BankDecision, ChargeRequest, GatewayAdapter, GatewayFault, HealthProbe,
};
use reqwest::StatusCode;
use serde_json::json;
use std::time::{Duration, Instant};

/// Adapter for an external card processor speaking a charge API over HTTP.
/// 2xx is an approval, 402 is a decline, anything else is a fault the
/// executor may fail over on.
pub struct RemoteGateway {
    pub gateway_name: String,
    pub base_url: String,
    pub key_id: String,
    pub key_secret: String,
    pub timeout_ms: u64,
    pub client: reqwest::Client,
}

#[async_trait::async_trait]
impl GatewayAdapter for RemoteGateway {
    fn name(&self) -> &str {
        &self.gateway_name
    }

    async fn authorize(&self, request: &ChargeRequest) -> Result<Authorization, GatewayFault> {
        let charge_url = format!("{}/v1/charges", self.base_url);
        let body = json!({
            "amount": request.amount_minor,
            "currency": request.currency,
            "card_token": request.card_token,
            "reference": request.idempotency_key,
        });

        let resp = self
            .client
            .post(charge_url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .timeout(Duration::from_millis(self.timeout_ms))
            .send()
            .await;

        match resp {
            Ok(r) if r.status().is_success() => {
                let v: serde_json::Value = r.json().await.unwrap_or_default();
                Ok(Authorization {
                    decision: BankDecision::Approve,
                    reason: "approved".to_string(),
                    transaction_id: v
                        .get("id")
                        .and_then(|id| id.as_str())
                        .map(ToString::to_string),
                })
            }
            Ok(r) if r.status() == StatusCode::PAYMENT_REQUIRED => {
                let v: serde_json::Value = r.json().await.unwrap_or_default();
                let reason = v
                    .get("reason")
                    .and_then(|m| m.as_str())
                    .unwrap_or("card_declined")
                    .to_string();
                Ok(Authorization {
                    decision: BankDecision::Decline,
                    reason,
                    transaction_id: None,
                })
            }
            Ok(r) => Err(GatewayFault::Http(r.status().as_u16())),
            Err(e) if e.is_timeout() => Err(GatewayFault::Timeout),
            Err(e) => Err(GatewayFault::Network(e.to_string())),
        }
    }

    async fn health_check(&self) -> HealthProbe {
        let start = Instant::now();
        let resp = self
            .client
            .get(format!("{}/v1/ping", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .timeout(Duration::from_millis(self.timeout_ms))
            .send()
            .await;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        match resp {
            Ok(r) if r.status().is_success() => HealthProbe {
                healthy: true,
                latency_ms,
                message: "ok".to_string(),
            },
            Ok(r) => HealthProbe {
                healthy: false,
                latency_ms,
                message: format!("ping returned HTTP {}", r.status().as_u16()),
            },
            Err(e) => HealthProbe {
                healthy: false,
                latency_ms,
                message: e.to_string(),
            },
        }
    }
}
