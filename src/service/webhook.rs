use crate::domain::intent::{IntentStatus, PaymentIntent};
use crate::store::{OrchestratorStore, WebhookEventRecord};
use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;

pub const EVENT_PAYMENT_SUCCEEDED: &str = "payment.succeeded";
pub const EVENT_PAYMENT_FAILED: &str = "payment.failed";
pub const EVENT_PAYMENT_CANCELLED: &str = "payment.cancelled";

pub const SIGNATURE_HEADER: &str = "X-Signature";
pub const EVENT_TYPE_HEADER: &str = "X-Event-Type";

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 over the exact payload bytes, hex encoded with a scheme
/// prefix. Receivers recompute this with their shared secret.
pub fn sign_payload(payload: &str, secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take a key of any size");
    mac.update(payload.as_bytes());
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

#[derive(Serialize)]
struct EventEnvelope<'a> {
    #[serde(rename = "type")]
    event_type: &'a str,
    data: EventData<'a>,
    created_at: String,
}

#[derive(Serialize)]
struct EventData<'a> {
    intent_id: &'a str,
    merchant_id: &'a str,
    amount: i64,
    currency: &'a str,
    status: IntentStatus,
    gateway_used: &'a Option<String>,
    bank_decision: &'a Option<String>,
    bank_reason: &'a Option<String>,
}

pub fn event_type_for(status: IntentStatus) -> Option<&'static str> {
    match status {
        IntentStatus::Succeeded => Some(EVENT_PAYMENT_SUCCEEDED),
        IntentStatus::Failed => Some(EVENT_PAYMENT_FAILED),
        IntentStatus::Cancelled => Some(EVENT_PAYMENT_CANCELLED),
        _ => None,
    }
}

/// Canonical compact JSON for one terminal intent. The signature is computed
/// over these exact bytes, so the payload is serialized once at enqueue time
/// and never re-rendered.
pub fn build_event_payload(event_type: &str, intent: &PaymentIntent) -> Result<String> {
    let envelope = EventEnvelope {
        event_type,
        data: EventData {
            intent_id: &intent.id,
            merchant_id: &intent.merchant_id,
            amount: intent.amount,
            currency: &intent.currency,
            status: intent.status,
            gateway_used: &intent.gateway_used,
            bank_decision: &intent.bank_decision,
            bank_reason: &intent.bank_reason,
        },
        created_at: Utc::now().to_rfc3339(),
    };
    serde_json::to_string(&envelope).context("serialize webhook payload")
}

/// Exponential backoff capped at five minutes.
pub fn backoff_seconds(attempts: i32) -> i64 {
    i64::min(300, 2_i64.pow(attempts.clamp(0, 16) as u32))
}

/// Background delivery loop. Polls the store for due pending events, POSTs
/// each with its stored signature, and reschedules failures until the
/// attempt cap marks them dead.
pub struct WebhookWorker {
    store: Arc<dyn OrchestratorStore>,
    client: reqwest::Client,
    max_attempts: i32,
    poll_interval: Duration,
    batch_size: i64,
}

impl WebhookWorker {
    pub fn new(
        store: Arc<dyn OrchestratorStore>,
        client: reqwest::Client,
        max_attempts: i32,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            client,
            max_attempts,
            poll_interval,
            batch_size: 50,
        }
    }

    pub async fn run(self) {
        tracing::info!("webhook worker started");
        loop {
            if let Err(e) = self.tick().await {
                tracing::error!(error = %e, "webhook tick failed");
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    pub async fn tick(&self) -> Result<()> {
        let due = self.store.due_webhooks(self.batch_size, Utc::now()).await?;
        for event in due {
            // one bad row must not stall the rest of the batch
            let event_id = event.id.clone();
            if let Err(e) = self.deliver(event).await {
                tracing::error!(event_id = %event_id, error = %e, "webhook bookkeeping failed");
            }
        }
        Ok(())
    }

    async fn deliver(&self, event: WebhookEventRecord) -> Result<()> {
        let response = self
            .client
            .post(&event.target_url)
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, &event.signature)
            .header(EVENT_TYPE_HEADER, &event.event_type)
            .body(event.payload.clone())
            .send()
            .await;

        let delivered = matches!(&response, Ok(r) if r.status().is_success());
        if delivered {
            self.store.mark_webhook_delivered(&event.id).await?;
            tracing::info!(event_id = %event.id, intent_id = %event.intent_id, "webhook delivered");
            return Ok(());
        }

        let attempts = event.attempts + 1;
        let dead = attempts >= self.max_attempts;
        let next_attempt_at = Utc::now() + ChronoDuration::seconds(backoff_seconds(attempts));
        self.store
            .mark_webhook_retry(&event.id, attempts, next_attempt_at, dead)
            .await?;

        match response {
            Ok(r) => tracing::warn!(
                event_id = %event.id,
                status = %r.status(),
                attempts,
                dead,
                "webhook endpoint rejected delivery"
            ),
            Err(e) => tracing::warn!(
                event_id = %event.id,
                error = %e,
                attempts,
                dead,
                "webhook delivery failed"
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_has_scheme_prefix_and_is_deterministic() {
        let sig = sign_payload(r#"{"type":"payment.succeeded"}"#, "whsec_test");
        assert!(sig.starts_with("sha256="));
        assert_eq!(sig.len(), "sha256=".len() + 64);
        assert_eq!(sig, sign_payload(r#"{"type":"payment.succeeded"}"#, "whsec_test"));
    }

    #[test]
    fn signature_varies_with_secret_and_payload() {
        let base = sign_payload("payload", "secret-a");
        assert_ne!(base, sign_payload("payload", "secret-b"));
        assert_ne!(base, sign_payload("payload2", "secret-a"));
    }

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff_seconds(0), 1);
        assert_eq!(backoff_seconds(1), 2);
        assert_eq!(backoff_seconds(3), 8);
        assert_eq!(backoff_seconds(8), 256);
        assert_eq!(backoff_seconds(9), 300);
        assert_eq!(backoff_seconds(100), 300);
    }

    #[test]
    fn terminal_statuses_map_to_event_types() {
        assert_eq!(
            event_type_for(IntentStatus::Succeeded),
            Some(EVENT_PAYMENT_SUCCEEDED)
        );
        assert_eq!(event_type_for(IntentStatus::Failed), Some(EVENT_PAYMENT_FAILED));
        assert_eq!(
            event_type_for(IntentStatus::Cancelled),
            Some(EVENT_PAYMENT_CANCELLED)
        );
        assert_eq!(event_type_for(IntentStatus::Created), None);
        assert_eq!(event_type_for(IntentStatus::Processing), None);
    }
}
