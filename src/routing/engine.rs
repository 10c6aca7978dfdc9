use crate::domain::rule::RoutingRule;
use crate::error::OrchestratorError;
use crate::health::monitor::HealthSnapshot;
use crate::store::GatewayConfigRecord;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Ranked candidate list plus the rule that pinned the front entry, if any.
/// The failover executor consumes this blindly; all routing knowledge stays
/// here.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePlan {
    pub candidates: Vec<String>,
    pub rule_applied: Option<String>,
}

/// Rank a merchant's gateways for one payment. Pure over its inputs:
/// identical config, rules and health snapshot produce an identical plan.
pub fn route(
    amount: i64,
    currency: &str,
    configs: &[GatewayConfigRecord],
    rules: &[RoutingRule],
    health: &HashMap<String, HealthSnapshot>,
) -> Result<RoutePlan, OrchestratorError> {
    let snapshot = |name: &str| -> HealthSnapshot {
        health
            .get(name)
            .cloned()
            .unwrap_or_else(|| HealthSnapshot::assume_healthy(name))
    };

    let eligible: Vec<String> = configs
        .iter()
        .filter(|c| c.enabled && c.has_credential())
        .map(|c| c.gateway_name.clone())
        .collect();
    if eligible.is_empty() {
        return Err(OrchestratorError::NoGatewayAvailable);
    }

    let by_health = |a: &String, b: &String| -> Ordering {
        let (sa, sb) = (snapshot(a), snapshot(b));
        sb.success_rate
            .partial_cmp(&sa.success_rate)
            .unwrap_or(Ordering::Equal)
            .then(
                sa.avg_latency_ms
                    .partial_cmp(&sb.avg_latency_ms)
                    .unwrap_or(Ordering::Equal),
            )
            .then(a.cmp(b))
    };

    let mut candidates: Vec<String> = eligible
        .iter()
        .filter(|name| !snapshot(name).is_outage)
        .cloned()
        .collect();
    if candidates.is_empty() {
        // everything is flagged; keep the least-unhealthy gateway as a
        // last resort rather than refusing outright
        let mut all = eligible.clone();
        all.sort_by(by_health);
        candidates = vec![all[0].clone()];
    }

    candidates.sort_by(by_health);

    let mut ordered_rules: Vec<&RoutingRule> = rules.iter().collect();
    ordered_rules.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.id.cmp(&b.id)));

    let mut rule_applied = None;
    for rule in ordered_rules {
        if !rule.condition.matches(amount, currency) {
            continue;
        }
        // a matching rule whose target was excluded (outage, disabled) is
        // skipped; later rules still get a chance
        if let Some(pos) = candidates.iter().position(|n| n == &rule.target_gateway) {
            let target = candidates.remove(pos);
            candidates.insert(0, target);
            rule_applied = Some(format!(
                "{} rule -> {}",
                rule.condition.rule_type(),
                rule.target_gateway
            ));
            break;
        }
    }

    Ok(RoutePlan {
        candidates,
        rule_applied,
    })
}
