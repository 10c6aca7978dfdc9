use crate::domain::intent::{IntentStatus, PaymentIntent};
use crate::domain::trace::{Trace, TraceSource};
use crate::error::OrchestratorError;
use crate::gateways::{ChargeRequest, GatewayAdapter, GatewayRegistry};
use crate::health::monitor::HealthMonitor;
use crate::routing::engine::route;
use crate::service::executor::run_failover;
use crate::service::idempotency::{BeginOutcome, IdempotencyLayer};
use crate::service::webhook::{build_event_payload, event_type_for, sign_payload};
use crate::store::{MerchantRecord, OrchestratorStore, WebhookEventRecord};
use anyhow::anyhow;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub intent: PaymentIntent,
    /// True when the intent was already terminal and we returned the stored
    /// result instead of executing again.
    pub replayed: bool,
}

/// Orchestration core: intent lifecycle, routing, failover execution and
/// webhook enqueueing. HTTP handlers stay thin on top of this.
#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn OrchestratorStore>,
    registry: Arc<GatewayRegistry>,
    health: Arc<HealthMonitor>,
    idempotency: IdempotencyLayer,
    attempt_timeout: Duration,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn OrchestratorStore>,
        registry: Arc<GatewayRegistry>,
        health: Arc<HealthMonitor>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            idempotency: IdempotencyLayer::new(store.clone()),
            store,
            registry,
            health,
            attempt_timeout,
        }
    }

    pub async fn create_intent(
        &self,
        merchant: &MerchantRecord,
        amount: i64,
        currency: &str,
        idempotency_key: &str,
    ) -> Result<BeginOutcome, OrchestratorError> {
        if amount <= 0 {
            return Err(OrchestratorError::InvalidRequest(
                "amount must be a positive number of minor units".to_string(),
            ));
        }
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(OrchestratorError::InvalidRequest(
                "currency must be a three-letter ISO code".to_string(),
            ));
        }
        if idempotency_key.is_empty() || idempotency_key.len() > 255 {
            return Err(OrchestratorError::InvalidRequest(
                "idempotency key must be between 1 and 255 characters".to_string(),
            ));
        }
        self.idempotency
            .begin(&merchant.id, idempotency_key, amount, currency)
            .await
    }

    pub async fn get_intent(
        &self,
        merchant: &MerchantRecord,
        intent_id: &str,
    ) -> Result<PaymentIntent, OrchestratorError> {
        self.owned_intent(merchant, intent_id).await
    }

    /// Run one intent through routing and failover. Reprocessing a terminal
    /// intent replays the stored outcome. The claim and the execution happen
    /// inside a spawned task so a caller disconnecting mid-request cannot
    /// strand the intent in `processing`.
    pub async fn process(
        &self,
        merchant: &MerchantRecord,
        intent_id: &str,
        card_token: &str,
    ) -> Result<ProcessOutcome, OrchestratorError> {
        if card_token.is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "card_token is required".to_string(),
            ));
        }
        let intent = self.owned_intent(merchant, intent_id).await?;
        if intent.status.is_terminal() {
            return Ok(ProcessOutcome {
                intent,
                replayed: true,
            });
        }
        if intent.status == IntentStatus::Processing {
            return Err(OrchestratorError::ProcessingInProgress);
        }

        // route before claiming: with no gateway available the intent stays
        // in `created` and the merchant can retry after fixing config
        let configs = self.store.gateway_configs(&merchant.id).await?;
        let rules = self.store.routing_rules(&merchant.id).await?;
        let names: Vec<String> = configs.iter().map(|c| c.gateway_name.clone()).collect();
        let health = self.health.snapshot_map(&names);
        let plan = route(intent.amount, &intent.currency, &configs, &rules, &health)?;

        let service = self.clone();
        let merchant = merchant.clone();
        let card_token = card_token.to_string();
        let handle = tokio::spawn(async move {
            service.claim_and_execute(merchant, intent, plan, card_token).await
        });
        handle
            .await
            .map_err(|e| OrchestratorError::Internal(anyhow!("execution task failed: {e}")))?
    }

    async fn claim_and_execute(
        &self,
        merchant: MerchantRecord,
        intent: PaymentIntent,
        plan: crate::routing::engine::RoutePlan,
        card_token: String,
    ) -> Result<ProcessOutcome, OrchestratorError> {
        let claimed = self
            .store
            .transition_intent(&intent.id, IntentStatus::Created, IntentStatus::Processing)
            .await?;
        if !claimed {
            // someone else moved it first; report whatever they made of it
            let current = self.owned_intent(&merchant, &intent.id).await?;
            if current.status.is_terminal() {
                return Ok(ProcessOutcome {
                    intent: current,
                    replayed: true,
                });
            }
            return Err(OrchestratorError::ProcessingInProgress);
        }

        let mut trace = Trace::default();
        match &plan.rule_applied {
            Some(rule) => trace.push(TraceSource::Router, format!("applied {rule}")),
            None => trace.push(TraceSource::Router, "no routing rule matched, using health order"),
        }
        trace.push(
            TraceSource::Router,
            format!("candidate order: {}", plan.candidates.join(", ")),
        );

        let mut adapters: Vec<Arc<dyn GatewayAdapter>> = Vec::new();
        for name in &plan.candidates {
            match self.registry.get(name) {
                Some(adapter) => adapters.push(adapter.clone()),
                None => trace.push(
                    TraceSource::System,
                    format!("no adapter registered for {name}, skipping"),
                ),
            }
        }

        let request = ChargeRequest {
            amount_minor: intent.amount,
            currency: intent.currency.clone(),
            card_token,
            idempotency_key: intent.idempotency_key.clone(),
        };
        let outcome = run_failover(
            &adapters,
            &request,
            self.attempt_timeout,
            &self.health,
            &mut trace,
        )
        .await;

        if !IntentStatus::Processing.can_transition_to(outcome.status) {
            return Err(OrchestratorError::InvalidStateTransition {
                from: IntentStatus::Processing,
                to: outcome.status,
            });
        }

        let mut finished = intent.clone();
        finished.status = outcome.status;
        finished.gateway_used = outcome.gateway_used;
        finished.bank_decision = Some(outcome.bank_decision);
        finished.bank_reason = Some(outcome.bank_reason);
        finished.trace_log = trace.into_entries();

        let finalized = self
            .store
            .finalize_intent(&finished, IntentStatus::Processing)
            .await?;
        if !finalized {
            // a cancel won the race; the stored row is the truth
            let current = self.owned_intent(&merchant, &intent.id).await?;
            return Ok(ProcessOutcome {
                intent: current,
                replayed: false,
            });
        }

        tracing::info!(
            intent_id = %finished.id,
            merchant_id = %merchant.id,
            status = %finished.status,
            gateway = finished.gateway_used.as_deref().unwrap_or("-"),
            "payment intent settled"
        );
        self.enqueue_terminal_webhook(&merchant, &finished).await?;
        Ok(ProcessOutcome {
            intent: finished,
            replayed: false,
        })
    }

    /// Cancel is idempotent: cancelling a cancelled intent returns the stored
    /// row. Succeeded and failed intents cannot be cancelled.
    pub async fn cancel(
        &self,
        merchant: &MerchantRecord,
        intent_id: &str,
    ) -> Result<PaymentIntent, OrchestratorError> {
        for _ in 0..2 {
            let intent = self.owned_intent(merchant, intent_id).await?;
            match intent.status {
                IntentStatus::Cancelled => return Ok(intent),
                IntentStatus::Succeeded | IntentStatus::Failed => {
                    return Err(OrchestratorError::InvalidRequest(format!(
                        "cannot cancel a {} payment intent",
                        intent.status
                    )))
                }
                current => {
                    let mut cancelled = intent.clone();
                    cancelled.status = IntentStatus::Cancelled;
                    let mut trace = Trace::default();
                    trace.push(TraceSource::System, "cancelled by merchant request");
                    cancelled.trace_log.extend(trace.into_entries());
                    if self.store.finalize_intent(&cancelled, current).await? {
                        self.enqueue_terminal_webhook(merchant, &cancelled).await?;
                        return Ok(cancelled);
                    }
                    // status moved under us, re-read and try once more
                }
            }
        }
        let intent = self.owned_intent(merchant, intent_id).await?;
        if intent.status == IntentStatus::Cancelled {
            return Ok(intent);
        }
        Err(OrchestratorError::InvalidRequest(format!(
            "cannot cancel a {} payment intent",
            intent.status
        )))
    }

    async fn owned_intent(
        &self,
        merchant: &MerchantRecord,
        intent_id: &str,
    ) -> Result<PaymentIntent, OrchestratorError> {
        match self.store.intent(intent_id).await? {
            Some(intent) if intent.merchant_id == merchant.id => Ok(intent),
            // hide other merchants' intents behind the same 404
            _ => Err(OrchestratorError::NotFound("payment intent".to_string())),
        }
    }

    async fn enqueue_terminal_webhook(
        &self,
        merchant: &MerchantRecord,
        intent: &PaymentIntent,
    ) -> Result<(), OrchestratorError> {
        let Some(target_url) = &merchant.webhook_url else {
            return Ok(());
        };
        let Some(event_type) = event_type_for(intent.status) else {
            return Ok(());
        };
        let payload = build_event_payload(event_type, intent)?;
        let signature = sign_payload(&payload, &merchant.webhook_secret);
        let event = WebhookEventRecord::new(
            &merchant.id,
            &intent.id,
            event_type,
            target_url,
            payload,
            signature,
        );
        self.store.enqueue_webhook(&event).await?;
        tracing::debug!(event_id = %event.id, intent_id = %intent.id, event_type, "webhook enqueued");
        Ok(())
    }
}
