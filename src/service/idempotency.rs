use crate::domain::intent::PaymentIntent;
use crate::error::OrchestratorError;
use crate::store::{OrchestratorStore, StoreError};
use anyhow::anyhow;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-(merchant, key) gate so concurrent identical creates collapse into a
/// single in-flight creation instead of racing on the unique constraint.
#[derive(Clone, Default)]
pub struct SingleFlight {
    gates: Arc<Mutex<HashMap<(String, String), Arc<Mutex<()>>>>>,
}

impl SingleFlight {
    pub async fn acquire(&self, merchant_id: &str, key: &str) -> OwnedMutexGuard<()> {
        let gate = {
            let mut gates = self.gates.lock().await;
            // drop gates nobody holds or waits on anymore
            gates.retain(|_, g| Arc::strong_count(g) > 1);
            gates
                .entry((merchant_id.to_string(), key.to_string()))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        gate.lock_owned().await
    }
}

#[derive(Debug, Clone)]
pub struct BeginOutcome {
    pub intent: PaymentIntent,
    pub created: bool,
}

#[derive(Clone)]
pub struct IdempotencyLayer {
    store: Arc<dyn OrchestratorStore>,
    single_flight: SingleFlight,
}

impl IdempotencyLayer {
    pub fn new(store: Arc<dyn OrchestratorStore>) -> Self {
        Self {
            store,
            single_flight: SingleFlight::default(),
        }
    }

    /// At-most-one intent per (merchant, idempotency key). A replay with the
    /// same payload returns the stored intent; a replay with a different
    /// payload is a conflict.
    pub async fn begin(
        &self,
        merchant_id: &str,
        idempotency_key: &str,
        amount: i64,
        currency: &str,
    ) -> Result<BeginOutcome, OrchestratorError> {
        let _gate = self.single_flight.acquire(merchant_id, idempotency_key).await;

        if let Some(existing) = self
            .store
            .intent_by_idempotency(merchant_id, idempotency_key)
            .await?
        {
            return Self::replay(existing, amount, currency);
        }

        let intent = PaymentIntent::new(merchant_id, amount, currency, idempotency_key);
        match self.store.insert_intent(&intent).await {
            Ok(()) => Ok(BeginOutcome {
                intent,
                created: true,
            }),
            // lost a cross-process race on the unique constraint
            Err(StoreError::UniqueViolation) => {
                let existing = self
                    .store
                    .intent_by_idempotency(merchant_id, idempotency_key)
                    .await?
                    .ok_or_else(|| {
                        OrchestratorError::Internal(anyhow!(
                            "unique violation but no row for idempotency key"
                        ))
                    })?;
                Self::replay(existing, amount, currency)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn replay(
        existing: PaymentIntent,
        amount: i64,
        currency: &str,
    ) -> Result<BeginOutcome, OrchestratorError> {
        if existing.amount != amount || !existing.currency.eq_ignore_ascii_case(currency) {
            return Err(OrchestratorError::Conflict);
        }
        Ok(BeginOutcome {
            intent: existing,
            created: false,
        })
    }
}
