use payment_orchestrator::gateways::simulator::{
    SimulatorGateway, REASON_FRAUD_SUSPECTED, REASON_INSUFFICIENT_FUNDS,
};
use payment_orchestrator::gateways::{BankDecision, ChargeRequest, GatewayAdapter};

fn charge(amount: i64, card_token: &str) -> ChargeRequest {
    ChargeRequest {
        amount_minor: amount,
        currency: "INR".to_string(),
        card_token: card_token.to_string(),
        idempotency_key: "key-abc-123".to_string(),
    }
}

#[tokio::test]
async fn card_ending_in_zeros_is_declined_for_insufficient_funds() {
    let gateway = SimulatorGateway::default();
    let auth = gateway.authorize(&charge(5000, "tok_410000")).await.unwrap();
    assert_eq!(auth.decision, BankDecision::Decline);
    assert_eq!(auth.reason, REASON_INSUFFICIENT_FUNDS);
    assert!(auth.transaction_id.is_none());
}

#[tokio::test]
async fn amount_over_ceiling_is_declined_as_fraud() {
    let gateway = SimulatorGateway::default();
    let auth = gateway.authorize(&charge(100_001, "tok_4242")).await.unwrap();
    assert_eq!(auth.decision, BankDecision::Decline);
    assert_eq!(auth.reason, REASON_FRAUD_SUSPECTED);
}

#[tokio::test]
async fn amount_at_ceiling_is_approved() {
    let gateway = SimulatorGateway::default();
    let auth = gateway.authorize(&charge(100_000, "tok_4242")).await.unwrap();
    assert_eq!(auth.decision, BankDecision::Approve);
}

#[tokio::test]
async fn approval_carries_a_simulator_transaction_id() {
    let gateway = SimulatorGateway::default();
    let auth = gateway.authorize(&charge(5000, "tok_4242")).await.unwrap();
    assert_eq!(auth.decision, BankDecision::Approve);
    let txn = auth.transaction_id.unwrap();
    assert!(txn.starts_with("sim_"));
}

#[tokio::test]
async fn insufficient_funds_takes_precedence_over_fraud_check() {
    let gateway = SimulatorGateway::default();
    let auth = gateway
        .authorize(&charge(200_000, "tok_410000"))
        .await
        .unwrap();
    assert_eq!(auth.reason, REASON_INSUFFICIENT_FUNDS);
}

#[tokio::test]
async fn custom_fraud_ceiling_is_respected() {
    let gateway = SimulatorGateway {
        fraud_ceiling: 1000,
        ..SimulatorGateway::default()
    };
    let auth = gateway.authorize(&charge(1001, "tok_4242")).await.unwrap();
    assert_eq!(auth.reason, REASON_FRAUD_SUSPECTED);
}
