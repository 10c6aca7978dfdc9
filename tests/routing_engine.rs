use payment_orchestrator::domain::rule::{RoutingRule, RuleCondition};
use payment_orchestrator::error::OrchestratorError;
use payment_orchestrator::health::monitor::HealthSnapshot;
use payment_orchestrator::routing::engine::route;
use payment_orchestrator::store::GatewayConfigRecord;
use std::collections::HashMap;

#[test]
fn no_enabled_gateway_is_an_error() {
    let configs = vec![config("simulator", false, None)];
    let err = route(1000, "INR", &configs, &[], &HashMap::new()).unwrap_err();
    assert!(matches!(err, OrchestratorError::NoGatewayAvailable));
}

#[test]
fn gateway_without_credentials_is_excluded() {
    // the simulator needs no credential_ref; a remote gateway does
    let configs = vec![config("alphapay", true, None)];
    let err = route(1000, "INR", &configs, &[], &HashMap::new()).unwrap_err();
    assert!(matches!(err, OrchestratorError::NoGatewayAvailable));

    let configs = vec![config("alphapay", true, Some("cred-1"))];
    let plan = route(1000, "INR", &configs, &[], &HashMap::new()).unwrap();
    assert_eq!(plan.candidates, vec!["alphapay"]);
}

#[test]
fn candidates_are_ordered_by_health_then_name() {
    let configs = vec![
        config("alphapay", true, Some("c1")),
        config("betapay", true, Some("c2")),
        config("simulator", true, None),
    ];
    let mut health = HashMap::new();
    health.insert("alphapay".to_string(), snapshot("alphapay", 0.6, 50.0, false));
    health.insert("betapay".to_string(), snapshot("betapay", 0.99, 120.0, false));
    health.insert("simulator".to_string(), snapshot("simulator", 0.99, 10.0, false));

    let plan = route(1000, "INR", &configs, &[], &health).unwrap();
    // equal success rates break ties on latency
    assert_eq!(plan.candidates, vec!["simulator", "betapay", "alphapay"]);
    assert!(plan.rule_applied.is_none());
}

#[test]
fn plan_is_deterministic_for_identical_inputs() {
    let configs = vec![
        config("alphapay", true, Some("c1")),
        config("betapay", true, Some("c2")),
    ];
    let health = HashMap::new();
    let first = route(5000, "USD", &configs, &[], &health).unwrap();
    for _ in 0..10 {
        assert_eq!(route(5000, "USD", &configs, &[], &health).unwrap(), first);
    }
}

#[test]
fn matching_rule_moves_target_to_front() {
    let configs = vec![
        config("alphapay", true, Some("c1")),
        config("betapay", true, Some("c2")),
    ];
    let rules = vec![rule(
        "rr_1",
        "betapay",
        5,
        RuleCondition::Currency {
            currency: "USD".to_string(),
        },
    )];
    let mut health = HashMap::new();
    health.insert("alphapay".to_string(), snapshot("alphapay", 1.0, 5.0, false));
    health.insert("betapay".to_string(), snapshot("betapay", 0.8, 90.0, false));

    let plan = route(1000, "USD", &configs, &rules, &health).unwrap();
    assert_eq!(plan.candidates, vec!["betapay", "alphapay"]);
    assert_eq!(plan.rule_applied.as_deref(), Some("currency rule -> betapay"));

    // the same rule does not fire for another currency
    let plan = route(1000, "INR", &configs, &rules, &health).unwrap();
    assert_eq!(plan.candidates, vec!["alphapay", "betapay"]);
    assert!(plan.rule_applied.is_none());
}

#[test]
fn lower_priority_number_wins_between_matching_rules() {
    let configs = vec![
        config("alphapay", true, Some("c1")),
        config("betapay", true, Some("c2")),
    ];
    let rules = vec![
        rule("rr_b", "betapay", 10, RuleCondition::Priority),
        rule("rr_a", "alphapay", 1, RuleCondition::Priority),
    ];
    let plan = route(1000, "INR", &configs, &rules, &HashMap::new()).unwrap();
    assert_eq!(plan.candidates[0], "alphapay");
    assert_eq!(plan.rule_applied.as_deref(), Some("priority rule -> alphapay"));
}

#[test]
fn amount_threshold_rule_is_inclusive() {
    let configs = vec![
        config("alphapay", true, Some("c1")),
        config("simulator", true, None),
    ];
    let rules = vec![rule(
        "rr_big",
        "alphapay",
        1,
        RuleCondition::AmountThreshold { min_amount: 50_000 },
    )];
    let plan = route(50_000, "INR", &configs, &rules, &HashMap::new()).unwrap();
    assert_eq!(plan.candidates[0], "alphapay");

    let plan = route(49_999, "INR", &configs, &rules, &HashMap::new()).unwrap();
    assert_eq!(plan.candidates[0], "simulator");
}

#[test]
fn outage_gateways_are_excluded() {
    let configs = vec![
        config("alphapay", true, Some("c1")),
        config("betapay", true, Some("c2")),
    ];
    let mut health = HashMap::new();
    health.insert("alphapay".to_string(), snapshot("alphapay", 0.2, 10.0, true));
    let plan = route(1000, "INR", &configs, &[], &health).unwrap();
    assert_eq!(plan.candidates, vec!["betapay"]);
}

#[test]
fn rule_targeting_outage_gateway_is_skipped_for_next_rule() {
    let configs = vec![
        config("alphapay", true, Some("c1")),
        config("betapay", true, Some("c2")),
        config("simulator", true, None),
    ];
    let rules = vec![
        rule("rr_1", "alphapay", 1, RuleCondition::Priority),
        rule("rr_2", "betapay", 2, RuleCondition::Priority),
    ];
    let mut health = HashMap::new();
    health.insert("alphapay".to_string(), snapshot("alphapay", 0.1, 10.0, true));

    let plan = route(1000, "INR", &configs, &rules, &health).unwrap();
    assert_eq!(plan.candidates[0], "betapay");
    assert_eq!(plan.rule_applied.as_deref(), Some("priority rule -> betapay"));
    assert!(!plan.candidates.contains(&"alphapay".to_string()));
}

#[test]
fn all_outage_keeps_least_unhealthy_as_last_resort() {
    let configs = vec![
        config("alphapay", true, Some("c1")),
        config("betapay", true, Some("c2")),
    ];
    let mut health = HashMap::new();
    health.insert("alphapay".to_string(), snapshot("alphapay", 0.4, 10.0, true));
    health.insert("betapay".to_string(), snapshot("betapay", 0.1, 10.0, true));

    let plan = route(1000, "INR", &configs, &[], &health).unwrap();
    assert_eq!(plan.candidates, vec!["alphapay"]);
}

fn config(name: &str, enabled: bool, credential_ref: Option<&str>) -> GatewayConfigRecord {
    GatewayConfigRecord {
        merchant_id: "m1".to_string(),
        gateway_name: name.to_string(),
        enabled,
        credential_ref: credential_ref.map(str::to_string),
    }
}

fn rule(id: &str, target: &str, priority: i32, condition: RuleCondition) -> RoutingRule {
    RoutingRule {
        id: id.to_string(),
        merchant_id: "m1".to_string(),
        target_gateway: target.to_string(),
        priority,
        condition,
    }
}

fn snapshot(name: &str, success_rate: f64, avg_latency_ms: f64, is_outage: bool) -> HealthSnapshot {
    HealthSnapshot {
        gateway_name: name.to_string(),
        success_rate,
        avg_latency_ms,
        error_rate: 1.0 - success_rate,
        sample_count: 20,
        is_outage,
        last_checked_at: None,
        message: String::new(),
    }
}
