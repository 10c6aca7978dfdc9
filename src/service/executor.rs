use crate::domain::intent::IntentStatus;
use crate::domain::trace::{Trace, TraceSource};
use crate::gateways::{BankDecision, ChargeRequest, GatewayAdapter, GatewayFault};
use crate::health::monitor::HealthMonitor;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const ALL_GATEWAYS_EXHAUSTED: &str = "all_gateways_exhausted";
pub const DECISION_ERROR: &str = "error";

#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub status: IntentStatus,
    pub gateway_used: Option<String>,
    pub bank_decision: String,
    pub bank_reason: String,
}

/// Walk the ranked candidates until one gives a definitive answer. Faults
/// (timeouts, network errors, 5xx) move on to the next gateway. An approve
/// or a decline stops the walk: a decline is the bank's answer, not ours
/// to second-guess on another gateway.
pub async fn run_failover(
    adapters: &[Arc<dyn GatewayAdapter>],
    request: &ChargeRequest,
    attempt_timeout: Duration,
    health: &HealthMonitor,
    trace: &mut Trace,
) -> ExecutionOutcome {
    for adapter in adapters {
        let name = adapter.name().to_string();
        trace.push(TraceSource::Gateway, format!("attempting {name}"));

        let started = Instant::now();
        let attempt = tokio::time::timeout(attempt_timeout, adapter.authorize(request)).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        let result = match attempt {
            Ok(r) => r,
            Err(_) => Err(GatewayFault::Timeout),
        };

        match result {
            Ok(auth) => {
                // the gateway answered; it is healthy even when the bank
                // declines
                health.record(&name, true, latency_ms);
                match auth.decision {
                    BankDecision::Approve => {
                        trace.push(
                            TraceSource::Gateway,
                            format!("{name} approved the charge ({})", auth.reason),
                        );
                        return ExecutionOutcome {
                            status: IntentStatus::Succeeded,
                            gateway_used: Some(name),
                            bank_decision: BankDecision::Approve.as_str().to_string(),
                            bank_reason: auth.reason,
                        };
                    }
                    BankDecision::Decline => {
                        trace.push(
                            TraceSource::Gateway,
                            format!("{name} declined the charge ({})", auth.reason),
                        );
                        return ExecutionOutcome {
                            status: IntentStatus::Failed,
                            gateway_used: Some(name),
                            bank_decision: BankDecision::Decline.as_str().to_string(),
                            bank_reason: auth.reason,
                        };
                    }
                }
            }
            Err(fault) => {
                health.record(&name, false, latency_ms);
                trace.push(
                    TraceSource::Failover,
                    format!("{name} fault: {fault}; moving to next candidate"),
                );
            }
        }
    }

    trace.push(TraceSource::System, "all gateways exhausted, payment failed");
    ExecutionOutcome {
        status: IntentStatus::Failed,
        gateway_used: None,
        bank_decision: DECISION_ERROR.to_string(),
        bank_reason: ALL_GATEWAYS_EXHAUSTED.to_string(),
    }
}
