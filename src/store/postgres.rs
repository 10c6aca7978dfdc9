use crate::domain::intent::{IntentStatus, PaymentIntent};
use crate::domain::rule::{RoutingRule, RuleCondition};
use crate::domain::trace::TraceEntry;
use crate::store::{
    GatewayConfigRecord, IntentFilter, IntentSort, IntentStats, MerchantRecord,
    OrchestratorStore, StoreError, WebhookEventRecord, WebhookStatus,
};
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::HashMap;

#[derive(Clone)]
pub struct PgStore {
    pub pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_store_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::UniqueViolation;
        }
    }
    StoreError::Backend(e.into())
}

fn parse_status(s: &str) -> Result<IntentStatus, StoreError> {
    IntentStatus::parse(s).ok_or_else(|| StoreError::Backend(anyhow!("unknown intent status {s}")))
}

fn map_merchant(row: &PgRow) -> MerchantRecord {
    MerchantRecord {
        id: row.get("id"),
        name: row.get("name"),
        api_key_hash: row.get("api_key_hash"),
        webhook_url: row.get("webhook_url"),
        webhook_secret: row.get("webhook_secret"),
        is_disabled: row.get("is_disabled"),
    }
}

fn map_intent(row: &PgRow) -> Result<PaymentIntent, StoreError> {
    let status: String = row.get("status");
    let trace_json: serde_json::Value = row.get("trace_log");
    let trace_log: Vec<TraceEntry> =
        serde_json::from_value(trace_json).map_err(|e| StoreError::Backend(e.into()))?;
    Ok(PaymentIntent {
        id: row.get("id"),
        merchant_id: row.get("merchant_id"),
        amount: row.get("amount"),
        currency: row.get("currency"),
        status: parse_status(&status)?,
        idempotency_key: row.get("idempotency_key"),
        gateway_used: row.get("gateway_used"),
        bank_decision: row.get("bank_decision"),
        bank_reason: row.get("bank_reason"),
        trace_log,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn map_webhook(row: &PgRow) -> Result<WebhookEventRecord, StoreError> {
    let status: String = row.get("status");
    Ok(WebhookEventRecord {
        id: row.get("id"),
        merchant_id: row.get("merchant_id"),
        intent_id: row.get("intent_id"),
        event_type: row.get("event_type"),
        target_url: row.get("target_url"),
        payload: row.get("payload"),
        signature: row.get("signature"),
        attempts: row.get("attempts"),
        next_attempt_at: row.get("next_attempt_at"),
        status: WebhookStatus::parse(&status)
            .ok_or_else(|| StoreError::Backend(anyhow!("unknown webhook status {status}")))?,
    })
}

const INTENT_COLUMNS: &str = "id, merchant_id, amount, currency, status, idempotency_key, \
     gateway_used, bank_decision, bank_reason, trace_log, created_at, updated_at";

#[async_trait::async_trait]
impl OrchestratorStore for PgStore {
    async fn merchant(&self, merchant_id: &str) -> Result<Option<MerchantRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, api_key_hash, webhook_url, webhook_secret, is_disabled FROM merchants WHERE id = $1",
        )
        .bind(merchant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_store_err)?;
        Ok(row.as_ref().map(map_merchant))
    }

    async fn merchant_by_api_key_hash(
        &self,
        hash: &str,
    ) -> Result<Option<MerchantRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, api_key_hash, webhook_url, webhook_secret, is_disabled FROM merchants WHERE api_key_hash = $1",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_store_err)?;
        Ok(row.as_ref().map(map_merchant))
    }

    async fn insert_intent(&self, intent: &PaymentIntent) -> Result<(), StoreError> {
        let trace_json =
            serde_json::to_value(&intent.trace_log).map_err(|e| StoreError::Backend(e.into()))?;
        sqlx::query(
            r#"
            INSERT INTO payment_intents (
                id, merchant_id, amount, currency, status, idempotency_key,
                gateway_used, bank_decision, bank_reason, trace_log, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(&intent.id)
        .bind(&intent.merchant_id)
        .bind(intent.amount)
        .bind(&intent.currency)
        .bind(intent.status.as_str())
        .bind(&intent.idempotency_key)
        .bind(&intent.gateway_used)
        .bind(&intent.bank_decision)
        .bind(&intent.bank_reason)
        .bind(trace_json)
        .bind(intent.created_at)
        .bind(intent.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_store_err)?;
        Ok(())
    }

    async fn intent(&self, intent_id: &str) -> Result<Option<PaymentIntent>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {INTENT_COLUMNS} FROM payment_intents WHERE id = $1"
        ))
        .bind(intent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_store_err)?;
        row.as_ref().map(map_intent).transpose()
    }

    async fn intent_by_idempotency(
        &self,
        merchant_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<PaymentIntent>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {INTENT_COLUMNS} FROM payment_intents WHERE merchant_id = $1 AND idempotency_key = $2"
        ))
        .bind(merchant_id)
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_store_err)?;
        row.as_ref().map(map_intent).transpose()
    }

    async fn transition_intent(
        &self,
        intent_id: &str,
        from: IntentStatus,
        to: IntentStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE payment_intents SET status = $3, updated_at = now() WHERE id = $1 AND status = $2",
        )
        .bind(intent_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_store_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn finalize_intent(
        &self,
        intent: &PaymentIntent,
        expected: IntentStatus,
    ) -> Result<bool, StoreError> {
        let trace_json =
            serde_json::to_value(&intent.trace_log).map_err(|e| StoreError::Backend(e.into()))?;
        let result = sqlx::query(
            r#"
            UPDATE payment_intents
            SET status = $3, gateway_used = $4, bank_decision = $5, bank_reason = $6,
                trace_log = $7, updated_at = now()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(&intent.id)
        .bind(expected.as_str())
        .bind(intent.status.as_str())
        .bind(&intent.gateway_used)
        .bind(&intent.bank_decision)
        .bind(&intent.bank_reason)
        .bind(trace_json)
        .execute(&self.pool)
        .await
        .map_err(map_store_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_intents(
        &self,
        merchant_id: &str,
        filter: &IntentFilter,
    ) -> Result<(Vec<PaymentIntent>, i64), StoreError> {
        let order = match filter.sort {
            IntentSort::Newest => "created_at DESC, id DESC",
            IntentSort::AmountDesc => "amount DESC, id DESC",
            IntentSort::AmountAsc => "amount ASC, id ASC",
        };
        let limit = filter.limit.clamp(1, 100);
        // page is caller-supplied; saturate instead of overflowing
        let offset = filter.page.max(1).saturating_sub(1).saturating_mul(limit);

        let query = format!(
            r#"
            SELECT {INTENT_COLUMNS} FROM payment_intents
            WHERE merchant_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR currency = $3)
            ORDER BY {order}
            LIMIT $4 OFFSET $5
            "#
        );
        let status = filter.status.map(|s| s.as_str().to_string());
        let currency = filter.currency.as_ref().map(|c| c.to_uppercase());

        let rows = sqlx::query(&query)
            .bind(merchant_id)
            .bind(&status)
            .bind(&currency)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(map_store_err)?;
        let items = rows
            .iter()
            .map(map_intent)
            .collect::<Result<Vec<_>, _>>()?;

        let total: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS total FROM payment_intents
            WHERE merchant_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR currency = $3)
            "#,
        )
        .bind(merchant_id)
        .bind(&status)
        .bind(&currency)
        .fetch_one(&self.pool)
        .await
        .map_err(map_store_err)?
        .get("total");

        Ok((items, total))
    }

    async fn intent_stats(&self, merchant_id: &str) -> Result<IntentStats, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_all,
                COUNT(*) FILTER (WHERE status = 'succeeded') AS total_succeeded,
                COUNT(*) FILTER (WHERE status = 'failed') AS total_failed,
                COUNT(*) FILTER (WHERE status = 'cancelled') AS total_cancelled,
                COALESCE(SUM(amount) FILTER (WHERE status = 'succeeded'), 0) AS total_volume
            FROM payment_intents WHERE merchant_id = $1
            "#,
        )
        .bind(merchant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_store_err)?;

        let breakdown_rows = sqlx::query(
            r#"
            SELECT gateway_used, SUM(amount) AS volume FROM payment_intents
            WHERE merchant_id = $1 AND status = 'succeeded' AND gateway_used IS NOT NULL
            GROUP BY gateway_used
            "#,
        )
        .bind(merchant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_store_err)?;

        let mut gateway_breakdown = HashMap::new();
        for r in breakdown_rows {
            let gateway: String = r.get("gateway_used");
            let volume: i64 = r.get("volume");
            gateway_breakdown.insert(gateway, volume);
        }

        Ok(IntentStats {
            total_all: row.get("total_all"),
            total_succeeded: row.get("total_succeeded"),
            total_failed: row.get("total_failed"),
            total_cancelled: row.get("total_cancelled"),
            total_volume: row.get("total_volume"),
            gateway_breakdown,
        })
    }

    async fn gateway_configs(
        &self,
        merchant_id: &str,
    ) -> Result<Vec<GatewayConfigRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT merchant_id, gateway_name, enabled, credential_ref FROM gateway_configs WHERE merchant_id = $1 ORDER BY gateway_name ASC",
        )
        .bind(merchant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_store_err)?;
        Ok(rows
            .into_iter()
            .map(|r| GatewayConfigRecord {
                merchant_id: r.get("merchant_id"),
                gateway_name: r.get("gateway_name"),
                enabled: r.get("enabled"),
                credential_ref: r.get("credential_ref"),
            })
            .collect())
    }

    async fn upsert_gateway_config(
        &self,
        config: &GatewayConfigRecord,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO gateway_configs (merchant_id, gateway_name, enabled, credential_ref, updated_at)
            VALUES ($1, $2, $3, $4, now())
            ON CONFLICT (merchant_id, gateway_name)
            DO UPDATE SET enabled = $3, credential_ref = $4, updated_at = now()
            "#,
        )
        .bind(&config.merchant_id)
        .bind(&config.gateway_name)
        .bind(config.enabled)
        .bind(&config.credential_ref)
        .execute(&self.pool)
        .await
        .map_err(map_store_err)?;
        Ok(())
    }

    async fn routing_rules(&self, merchant_id: &str) -> Result<Vec<RoutingRule>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, merchant_id, target_gateway, priority, condition FROM routing_rules WHERE merchant_id = $1 ORDER BY priority ASC, id ASC",
        )
        .bind(merchant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_store_err)?;
        rows.into_iter()
            .map(|r| {
                let condition_json: serde_json::Value = r.get("condition");
                let condition: RuleCondition = serde_json::from_value(condition_json)
                    .map_err(|e| StoreError::Backend(e.into()))?;
                Ok(RoutingRule {
                    id: r.get("id"),
                    merchant_id: r.get("merchant_id"),
                    target_gateway: r.get("target_gateway"),
                    priority: r.get("priority"),
                    condition,
                })
            })
            .collect()
    }

    async fn insert_rule(&self, rule: &RoutingRule) -> Result<(), StoreError> {
        let condition_json =
            serde_json::to_value(&rule.condition).map_err(|e| StoreError::Backend(e.into()))?;
        sqlx::query(
            r#"
            INSERT INTO routing_rules (id, merchant_id, rule_type, target_gateway, condition, priority)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&rule.id)
        .bind(&rule.merchant_id)
        .bind(rule.condition.rule_type())
        .bind(&rule.target_gateway)
        .bind(condition_json)
        .bind(rule.priority)
        .execute(&self.pool)
        .await
        .map_err(map_store_err)?;
        Ok(())
    }

    async fn delete_rule(&self, merchant_id: &str, rule_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM routing_rules WHERE id = $1 AND merchant_id = $2")
            .bind(rule_id)
            .bind(merchant_id)
            .execute(&self.pool)
            .await
            .map_err(map_store_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn enqueue_webhook(&self, event: &WebhookEventRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO webhook_events (
                id, merchant_id, intent_id, event_type, target_url,
                payload, signature, attempts, next_attempt_at, status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&event.id)
        .bind(&event.merchant_id)
        .bind(&event.intent_id)
        .bind(&event.event_type)
        .bind(&event.target_url)
        .bind(&event.payload)
        .bind(&event.signature)
        .bind(event.attempts)
        .bind(event.next_attempt_at)
        .bind(event.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_store_err)?;
        Ok(())
    }

    async fn due_webhooks(
        &self,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<WebhookEventRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, merchant_id, intent_id, event_type, target_url,
                   payload, signature, attempts, next_attempt_at, status
            FROM webhook_events
            WHERE status = 'pending' AND next_attempt_at <= $1
            ORDER BY next_attempt_at ASC, id ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_store_err)?;
        rows.iter().map(map_webhook).collect()
    }

    async fn mark_webhook_delivered(&self, event_id: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE webhook_events SET status = 'delivered' WHERE id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await
            .map_err(map_store_err)?;
        Ok(())
    }

    async fn mark_webhook_retry(
        &self,
        event_id: &str,
        attempts: i32,
        next_attempt_at: DateTime<Utc>,
        dead: bool,
    ) -> Result<(), StoreError> {
        let status = if dead { "dead" } else { "pending" };
        sqlx::query(
            "UPDATE webhook_events SET attempts = $2, next_attempt_at = $3, status = $4 WHERE id = $1",
        )
        .bind(event_id)
        .bind(attempts)
        .bind(next_attempt_at)
        .bind(status)
        .execute(&self.pool)
        .await
        .map_err(map_store_err)?;
        Ok(())
    }
}
