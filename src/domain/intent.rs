use crate::domain::trace::TraceEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentStatus {
    Created,
    Processing,
    Succeeded,
    Failed,
    Cancelled,
}

impl IntentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IntentStatus::Succeeded | IntentStatus::Failed | IntentStatus::Cancelled
        )
    }

    /// Legal lifecycle moves. Terminal states accept nothing.
    pub fn can_transition_to(&self, to: IntentStatus) -> bool {
        match self {
            IntentStatus::Created => {
                matches!(to, IntentStatus::Processing | IntentStatus::Cancelled)
            }
            IntentStatus::Processing => matches!(
                to,
                IntentStatus::Succeeded | IntentStatus::Failed | IntentStatus::Cancelled
            ),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::Created => "created",
            IntentStatus::Processing => "processing",
            IntentStatus::Succeeded => "succeeded",
            IntentStatus::Failed => "failed",
            IntentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<IntentStatus> {
        match s {
            "created" => Some(IntentStatus::Created),
            "processing" => Some(IntentStatus::Processing),
            "succeeded" => Some(IntentStatus::Succeeded),
            "failed" => Some(IntentStatus::Failed),
            "cancelled" => Some(IntentStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    #[serde(rename = "intent_id")]
    pub id: String,
    pub merchant_id: String,
    pub amount: i64,
    pub currency: String,
    pub status: IntentStatus,
    pub idempotency_key: String,
    pub gateway_used: Option<String>,
    pub bank_decision: Option<String>,
    pub bank_reason: Option<String>,
    pub trace_log: Vec<TraceEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentIntent {
    pub fn new(merchant_id: &str, amount: i64, currency: &str, idempotency_key: &str) -> Self {
        let now = Utc::now();
        Self {
            id: format!("pi_{}", Uuid::new_v4().simple()),
            merchant_id: merchant_id.to_string(),
            amount,
            currency: currency.to_uppercase(),
            status: IntentStatus::Created,
            idempotency_key: idempotency_key.to_string(),
            gateway_used: None,
            bank_decision: None,
            bank_reason: None,
            trace_log: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_moves_to_processing_or_cancelled() {
        assert!(IntentStatus::Created.can_transition_to(IntentStatus::Processing));
        assert!(IntentStatus::Created.can_transition_to(IntentStatus::Cancelled));
        assert!(!IntentStatus::Created.can_transition_to(IntentStatus::Succeeded));
        assert!(!IntentStatus::Created.can_transition_to(IntentStatus::Failed));
    }

    #[test]
    fn processing_moves_to_terminal_only() {
        assert!(IntentStatus::Processing.can_transition_to(IntentStatus::Succeeded));
        assert!(IntentStatus::Processing.can_transition_to(IntentStatus::Failed));
        assert!(IntentStatus::Processing.can_transition_to(IntentStatus::Cancelled));
        assert!(!IntentStatus::Processing.can_transition_to(IntentStatus::Created));
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [
            IntentStatus::Succeeded,
            IntentStatus::Failed,
            IntentStatus::Cancelled,
        ] {
            assert!(terminal.is_terminal());
            for next in [
                IntentStatus::Created,
                IntentStatus::Processing,
                IntentStatus::Succeeded,
                IntentStatus::Failed,
                IntentStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn new_intent_gets_prefixed_id_and_uppercased_currency() {
        let intent = PaymentIntent::new("m1", 5000, "inr", "key-1");
        assert!(intent.id.starts_with("pi_"));
        assert_eq!(intent.currency, "INR");
        assert_eq!(intent.status, IntentStatus::Created);
    }

    #[test]
    fn intent_serializes_id_as_intent_id() {
        let intent = PaymentIntent::new("m1", 5000, "INR", "key-1");
        let json = serde_json::to_value(&intent).expect("serialize");
        assert_eq!(json["intent_id"], intent.id.as_str());
        assert!(json.get("id").is_none());
        assert_eq!(json["status"], "created");
    }
}
