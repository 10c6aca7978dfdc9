use serde::{Deserialize, Serialize};

/// Closed set of rule predicates. Keeping this a tagged enum (rather than
/// free-form JSON conditions) keeps evaluation total: an unknown rule type
/// cannot exist past deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule_type", rename_all = "snake_case")]
pub enum RuleCondition {
    /// Unconditional, only sets ordering.
    Priority,
    Currency { currency: String },
    AmountThreshold { min_amount: i64 },
}

impl RuleCondition {
    pub fn matches(&self, amount: i64, currency: &str) -> bool {
        match self {
            RuleCondition::Priority => true,
            RuleCondition::Currency { currency: want } => want.eq_ignore_ascii_case(currency),
            RuleCondition::AmountThreshold { min_amount } => amount >= *min_amount,
        }
    }

    pub fn rule_type(&self) -> &'static str {
        match self {
            RuleCondition::Priority => "priority",
            RuleCondition::Currency { .. } => "currency",
            RuleCondition::AmountThreshold { .. } => "amount_threshold",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: String,
    pub merchant_id: String,
    pub target_gateway: String,
    /// Lower number = evaluated earlier.
    pub priority: i32,
    pub condition: RuleCondition,
}

impl RoutingRule {
    pub fn new(
        merchant_id: &str,
        target_gateway: &str,
        priority: i32,
        condition: RuleCondition,
    ) -> Self {
        Self {
            id: format!("rr_{}", uuid::Uuid::new_v4().simple()),
            merchant_id: merchant_id.to_string(),
            target_gateway: target_gateway.to_string(),
            priority,
            condition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_rule_always_matches() {
        assert!(RuleCondition::Priority.matches(1, "INR"));
        assert!(RuleCondition::Priority.matches(i64::MAX, "XYZ"));
    }

    #[test]
    fn currency_rule_is_case_insensitive() {
        let rule = RuleCondition::Currency {
            currency: "inr".to_string(),
        };
        assert!(rule.matches(100, "INR"));
        assert!(!rule.matches(100, "USD"));
    }

    #[test]
    fn amount_threshold_is_inclusive() {
        let rule = RuleCondition::AmountThreshold { min_amount: 10_000 };
        assert!(rule.matches(10_000, "INR"));
        assert!(rule.matches(10_001, "INR"));
        assert!(!rule.matches(9_999, "INR"));
    }

    #[test]
    fn condition_round_trips_as_tagged_json() {
        let rule = RuleCondition::AmountThreshold { min_amount: 500 };
        let json = serde_json::to_value(&rule).expect("serialize");
        assert_eq!(json["rule_type"], "amount_threshold");
        assert_eq!(json["min_amount"], 500);
        let back: RuleCondition = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, rule);
    }
}
