use crate::domain::intent::{IntentStatus, PaymentIntent};
use crate::domain::rule::RoutingRule;
use crate::store::{
    GatewayConfigRecord, IntentFilter, IntentSort, IntentStats, MerchantRecord,
    OrchestratorStore, StoreError, WebhookEventRecord, WebhookStatus,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    merchants: HashMap<String, MerchantRecord>,
    intents: HashMap<String, PaymentIntent>,
    configs: Vec<GatewayConfigRecord>,
    rules: Vec<RoutingRule>,
    webhooks: HashMap<String, WebhookEventRecord>,
}

/// In-memory store with the same unique-constraint and compare-and-set
/// semantics as the Postgres implementation. Used by the test suite.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_merchant(&self, merchant: MerchantRecord) {
        let mut inner = self.inner.write().await;
        inner.merchants.insert(merchant.id.clone(), merchant);
    }

    pub async fn add_gateway_config(&self, config: GatewayConfigRecord) {
        let mut inner = self.inner.write().await;
        inner
            .configs
            .retain(|c| !(c.merchant_id == config.merchant_id && c.gateway_name == config.gateway_name));
        inner.configs.push(config);
    }

    pub async fn add_rule(&self, rule: RoutingRule) {
        let mut inner = self.inner.write().await;
        inner.rules.push(rule);
    }

    pub async fn webhook_events(&self) -> Vec<WebhookEventRecord> {
        let inner = self.inner.read().await;
        let mut events: Vec<WebhookEventRecord> = inner.webhooks.values().cloned().collect();
        events.sort_by(|a, b| a.id.cmp(&b.id));
        events
    }
}

#[async_trait::async_trait]
impl OrchestratorStore for InMemoryStore {
    async fn merchant(&self, merchant_id: &str) -> Result<Option<MerchantRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.merchants.get(merchant_id).cloned())
    }

    async fn merchant_by_api_key_hash(
        &self,
        hash: &str,
    ) -> Result<Option<MerchantRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .merchants
            .values()
            .find(|m| m.api_key_hash == hash)
            .cloned())
    }

    async fn insert_intent(&self, intent: &PaymentIntent) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let duplicate = inner.intents.values().any(|i| {
            i.merchant_id == intent.merchant_id && i.idempotency_key == intent.idempotency_key
        });
        if duplicate || inner.intents.contains_key(&intent.id) {
            return Err(StoreError::UniqueViolation);
        }
        inner.intents.insert(intent.id.clone(), intent.clone());
        Ok(())
    }

    async fn intent(&self, intent_id: &str) -> Result<Option<PaymentIntent>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.intents.get(intent_id).cloned())
    }

    async fn intent_by_idempotency(
        &self,
        merchant_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<PaymentIntent>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .intents
            .values()
            .find(|i| i.merchant_id == merchant_id && i.idempotency_key == idempotency_key)
            .cloned())
    }

    async fn transition_intent(
        &self,
        intent_id: &str,
        from: IntentStatus,
        to: IntentStatus,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.intents.get_mut(intent_id) {
            Some(intent) if intent.status == from => {
                intent.status = to;
                intent.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn finalize_intent(
        &self,
        intent: &PaymentIntent,
        expected: IntentStatus,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.intents.get_mut(&intent.id) {
            Some(stored) if stored.status == expected => {
                stored.status = intent.status;
                stored.gateway_used = intent.gateway_used.clone();
                stored.bank_decision = intent.bank_decision.clone();
                stored.bank_reason = intent.bank_reason.clone();
                stored.trace_log = intent.trace_log.clone();
                stored.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_intents(
        &self,
        merchant_id: &str,
        filter: &IntentFilter,
    ) -> Result<(Vec<PaymentIntent>, i64), StoreError> {
        let inner = self.inner.read().await;
        let mut items: Vec<PaymentIntent> = inner
            .intents
            .values()
            .filter(|i| i.merchant_id == merchant_id)
            .filter(|i| filter.status.map_or(true, |s| i.status == s))
            .filter(|i| {
                filter
                    .currency
                    .as_ref()
                    .map_or(true, |c| i.currency.eq_ignore_ascii_case(c))
            })
            .cloned()
            .collect();
        match filter.sort {
            IntentSort::Newest => {
                items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)))
            }
            IntentSort::AmountDesc => {
                items.sort_by(|a, b| b.amount.cmp(&a.amount).then(b.id.cmp(&a.id)))
            }
            IntentSort::AmountAsc => {
                items.sort_by(|a, b| a.amount.cmp(&b.amount).then(a.id.cmp(&b.id)))
            }
        }
        let total = items.len() as i64;
        let limit = filter.limit.clamp(1, 100);
        // page is caller-supplied; saturate instead of overflowing
        let offset = filter
            .page
            .max(1)
            .saturating_sub(1)
            .saturating_mul(limit)
            .min(total) as usize;
        let page: Vec<PaymentIntent> = items
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn intent_stats(&self, merchant_id: &str) -> Result<IntentStats, StoreError> {
        let inner = self.inner.read().await;
        let mut stats = IntentStats::default();
        for intent in inner.intents.values() {
            if intent.merchant_id != merchant_id {
                continue;
            }
            stats.total_all += 1;
            match intent.status {
                IntentStatus::Succeeded => {
                    stats.total_succeeded += 1;
                    stats.total_volume += intent.amount;
                    if let Some(gateway) = &intent.gateway_used {
                        *stats.gateway_breakdown.entry(gateway.clone()).or_insert(0) +=
                            intent.amount;
                    }
                }
                IntentStatus::Failed => stats.total_failed += 1,
                IntentStatus::Cancelled => stats.total_cancelled += 1,
                _ => {}
            }
        }
        Ok(stats)
    }

    async fn gateway_configs(
        &self,
        merchant_id: &str,
    ) -> Result<Vec<GatewayConfigRecord>, StoreError> {
        let inner = self.inner.read().await;
        let mut configs: Vec<GatewayConfigRecord> = inner
            .configs
            .iter()
            .filter(|c| c.merchant_id == merchant_id)
            .cloned()
            .collect();
        configs.sort_by(|a, b| a.gateway_name.cmp(&b.gateway_name));
        Ok(configs)
    }

    async fn upsert_gateway_config(
        &self,
        config: &GatewayConfigRecord,
    ) -> Result<(), StoreError> {
        self.add_gateway_config(config.clone()).await;
        Ok(())
    }

    async fn routing_rules(&self, merchant_id: &str) -> Result<Vec<RoutingRule>, StoreError> {
        let inner = self.inner.read().await;
        let mut rules: Vec<RoutingRule> = inner
            .rules
            .iter()
            .filter(|r| r.merchant_id == merchant_id)
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.id.cmp(&b.id)));
        Ok(rules)
    }

    async fn insert_rule(&self, rule: &RoutingRule) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.rules.push(rule.clone());
        Ok(())
    }

    async fn delete_rule(&self, merchant_id: &str, rule_id: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.rules.len();
        inner
            .rules
            .retain(|r| !(r.id == rule_id && r.merchant_id == merchant_id));
        Ok(inner.rules.len() < before)
    }

    async fn enqueue_webhook(&self, event: &WebhookEventRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.webhooks.insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn due_webhooks(
        &self,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<WebhookEventRecord>, StoreError> {
        let inner = self.inner.read().await;
        let mut due: Vec<WebhookEventRecord> = inner
            .webhooks
            .values()
            .filter(|e| e.status == WebhookStatus::Pending && e.next_attempt_at <= now)
            .cloned()
            .collect();
        due.sort_by(|a, b| a.next_attempt_at.cmp(&b.next_attempt_at).then(a.id.cmp(&b.id)));
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn mark_webhook_delivered(&self, event_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(event) = inner.webhooks.get_mut(event_id) {
            event.status = WebhookStatus::Delivered;
        }
        Ok(())
    }

    async fn mark_webhook_retry(
        &self,
        event_id: &str,
        attempts: i32,
        next_attempt_at: DateTime<Utc>,
        dead: bool,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(event) = inner.webhooks.get_mut(event_id) {
            event.attempts = attempts;
            event.next_attempt_at = next_attempt_at;
            event.status = if dead {
                WebhookStatus::Dead
            } else {
                WebhookStatus::Pending
            };
        }
        Ok(())
    }
}
