use crate::domain::intent::{IntentStatus, PaymentIntent};
use crate::domain::rule::RoutingRule;
use crate::gateways::SIMULATOR_GATEWAY;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated")]
    UniqueViolation,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct MerchantRecord {
    pub id: String,
    pub name: String,
    pub api_key_hash: String,
    pub webhook_url: Option<String>,
    pub webhook_secret: String,
    pub is_disabled: bool,
}

#[derive(Debug, Clone)]
pub struct GatewayConfigRecord {
    pub merchant_id: String,
    pub gateway_name: String,
    pub enabled: bool,
    pub credential_ref: Option<String>,
}

impl GatewayConfigRecord {
    /// The simulator needs no credentials; every other gateway does.
    pub fn has_credential(&self) -> bool {
        self.credential_ref.is_some() || self.gateway_name == SIMULATOR_GATEWAY
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IntentSort {
    #[default]
    Newest,
    AmountDesc,
    AmountAsc,
}

#[derive(Debug, Clone)]
pub struct IntentFilter {
    pub status: Option<IntentStatus>,
    pub currency: Option<String>,
    pub sort: IntentSort,
    pub page: i64,
    pub limit: i64,
}

impl Default for IntentFilter {
    fn default() -> Self {
        Self {
            status: None,
            currency: None,
            sort: IntentSort::Newest,
            page: 1,
            limit: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IntentStats {
    pub total_all: i64,
    pub total_succeeded: i64,
    pub total_failed: i64,
    pub total_cancelled: i64,
    /// Sum of succeeded amounts, minor units.
    pub total_volume: i64,
    /// Succeeded volume per gateway.
    pub gateway_breakdown: HashMap<String, i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookStatus {
    Pending,
    Delivered,
    Dead,
}

impl WebhookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookStatus::Pending => "pending",
            WebhookStatus::Delivered => "delivered",
            WebhookStatus::Dead => "dead",
        }
    }

    pub fn parse(s: &str) -> Option<WebhookStatus> {
        match s {
            "pending" => Some(WebhookStatus::Pending),
            "delivered" => Some(WebhookStatus::Delivered),
            "dead" => Some(WebhookStatus::Dead),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebhookEventRecord {
    pub id: String,
    pub merchant_id: String,
    pub intent_id: String,
    pub event_type: String,
    pub target_url: String,
    pub payload: String,
    pub signature: String,
    pub attempts: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub status: WebhookStatus,
}

impl WebhookEventRecord {
    pub fn new(
        merchant_id: &str,
        intent_id: &str,
        event_type: &str,
        target_url: &str,
        payload: String,
        signature: String,
    ) -> Self {
        Self {
            id: format!("whe_{}", Uuid::new_v4().simple()),
            merchant_id: merchant_id.to_string(),
            intent_id: intent_id.to_string(),
            event_type: event_type.to_string(),
            target_url: target_url.to_string(),
            payload,
            signature,
            attempts: 0,
            next_attempt_at: Utc::now(),
            status: WebhookStatus::Pending,
        }
    }
}

/// Durable row store consumed by the orchestration core. Postgres in
/// production, in-memory for tests.
#[async_trait::async_trait]
pub trait OrchestratorStore: Send + Sync {
    async fn merchant(&self, merchant_id: &str) -> Result<Option<MerchantRecord>, StoreError>;

    async fn merchant_by_api_key_hash(
        &self,
        hash: &str,
    ) -> Result<Option<MerchantRecord>, StoreError>;

    /// Fails with `StoreError::UniqueViolation` when another intent already
    /// holds this (merchant_id, idempotency_key).
    async fn insert_intent(&self, intent: &PaymentIntent) -> Result<(), StoreError>;

    async fn intent(&self, intent_id: &str) -> Result<Option<PaymentIntent>, StoreError>;

    async fn intent_by_idempotency(
        &self,
        merchant_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<PaymentIntent>, StoreError>;

    /// Compare-and-set status change. Returns false when the stored status
    /// no longer matches `from`.
    async fn transition_intent(
        &self,
        intent_id: &str,
        from: IntentStatus,
        to: IntentStatus,
    ) -> Result<bool, StoreError>;

    /// Writes the terminal fields (status, gateway_used, decision, reason,
    /// trace) guarded on the expected current status. Returns false when the
    /// guard misses.
    async fn finalize_intent(
        &self,
        intent: &PaymentIntent,
        expected: IntentStatus,
    ) -> Result<bool, StoreError>;

    async fn list_intents(
        &self,
        merchant_id: &str,
        filter: &IntentFilter,
    ) -> Result<(Vec<PaymentIntent>, i64), StoreError>;

    async fn intent_stats(&self, merchant_id: &str) -> Result<IntentStats, StoreError>;

    async fn gateway_configs(
        &self,
        merchant_id: &str,
    ) -> Result<Vec<GatewayConfigRecord>, StoreError>;

    async fn upsert_gateway_config(&self, config: &GatewayConfigRecord)
        -> Result<(), StoreError>;

    async fn routing_rules(&self, merchant_id: &str) -> Result<Vec<RoutingRule>, StoreError>;

    async fn insert_rule(&self, rule: &RoutingRule) -> Result<(), StoreError>;

    async fn delete_rule(&self, merchant_id: &str, rule_id: &str) -> Result<bool, StoreError>;

    async fn enqueue_webhook(&self, event: &WebhookEventRecord) -> Result<(), StoreError>;

    async fn due_webhooks(
        &self,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<WebhookEventRecord>, StoreError>;

    async fn mark_webhook_delivered(&self, event_id: &str) -> Result<(), StoreError>;

    async fn mark_webhook_retry(
        &self,
        event_id: &str,
        attempts: i32,
        next_attempt_at: DateTime<Utc>,
        dead: bool,
    ) -> Result<(), StoreError>;
}
