use crate::gateways::{GatewayRegistry, HealthProbe};
use crate::health::window::RollingWindow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

pub const DEFAULT_WINDOW_SIZE: usize = 50;
pub const OUTAGE_SUCCESS_THRESHOLD: f64 = 0.5;
pub const OUTAGE_MIN_SAMPLES: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub gateway_name: String,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub error_rate: f64,
    pub sample_count: usize,
    pub is_outage: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub message: String,
}

impl HealthSnapshot {
    /// A gateway nobody has observed yet.
    pub fn assume_healthy(gateway_name: &str) -> Self {
        Self {
            gateway_name: gateway_name.to_string(),
            success_rate: 1.0,
            avg_latency_ms: 0.0,
            error_rate: 0.0,
            sample_count: 0,
            is_outage: false,
            last_checked_at: None,
            message: String::new(),
        }
    }

    pub fn status_label(&self) -> &'static str {
        if self.is_outage {
            "down"
        } else if self.sample_count > 0 && self.success_rate < 0.9 {
            "degraded"
        } else {
            "healthy"
        }
    }
}

struct GatewayHealthState {
    window: RollingWindow,
    forced_outage: bool,
    auto_outage: bool,
    last_checked_at: Option<DateTime<Utc>>,
    message: String,
}

impl GatewayHealthState {
    fn new(window_size: usize) -> Self {
        Self {
            window: RollingWindow::new(window_size),
            forced_outage: false,
            auto_outage: false,
            last_checked_at: None,
            message: String::new(),
        }
    }

    fn is_outage(&self) -> bool {
        self.forced_outage || self.auto_outage
    }
}

/// Per-gateway health registry. The outer lock only guards map topology;
/// every update takes the one gateway's mutex, so traffic on unrelated
/// gateways never serializes.
pub struct HealthMonitor {
    entries: RwLock<HashMap<String, Arc<Mutex<GatewayHealthState>>>>,
    window_size: usize,
    outage_success_threshold: f64,
    outage_min_samples: usize,
}

impl HealthMonitor {
    pub fn new(window_size: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            window_size,
            outage_success_threshold: OUTAGE_SUCCESS_THRESHOLD,
            outage_min_samples: OUTAGE_MIN_SAMPLES,
        }
    }

    fn entry(&self, gateway_name: &str) -> Arc<Mutex<GatewayHealthState>> {
        if let Some(entry) = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(gateway_name)
        {
            return entry.clone();
        }
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries
            .entry(gateway_name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(GatewayHealthState::new(self.window_size))))
            .clone()
    }

    /// Record a transaction or probe outcome. Auto-outage is sticky: once
    /// the success rate drops under the threshold with enough samples, only
    /// an explicit revive clears it.
    pub fn record(&self, gateway_name: &str, ok: bool, latency_ms: f64) {
        let entry = self.entry(gateway_name);
        let mut state = entry.lock().unwrap_or_else(|e| e.into_inner());
        state.window.push(ok, latency_ms);
        if state.window.len() >= self.outage_min_samples
            && state.window.success_rate() < self.outage_success_threshold
        {
            if !state.auto_outage {
                tracing::warn!(
                    gateway = gateway_name,
                    success_rate = state.window.success_rate(),
                    "auto outage detected"
                );
            }
            state.auto_outage = true;
        }
    }

    pub fn record_probe(&self, gateway_name: &str, probe: &HealthProbe) {
        let entry = self.entry(gateway_name);
        {
            let mut state = entry.lock().unwrap_or_else(|e| e.into_inner());
            state.last_checked_at = Some(Utc::now());
            state.message = probe.message.clone();
        }
        self.record(gateway_name, probe.healthy, probe.latency_ms);
    }

    pub fn force_outage(&self, gateway_name: &str) {
        let entry = self.entry(gateway_name);
        let mut state = entry.lock().unwrap_or_else(|e| e.into_inner());
        state.forced_outage = true;
    }

    /// Clears both the forced and the sticky auto-detected flag.
    pub fn revive(&self, gateway_name: &str) {
        let entry = self.entry(gateway_name);
        let mut state = entry.lock().unwrap_or_else(|e| e.into_inner());
        state.forced_outage = false;
        state.auto_outage = false;
    }

    pub fn is_outage(&self, gateway_name: &str) -> bool {
        let entry = self.entry(gateway_name);
        let state = entry.lock().unwrap_or_else(|e| e.into_inner());
        state.is_outage()
    }

    pub fn snapshot(&self, gateway_name: &str) -> HealthSnapshot {
        let entry = self.entry(gateway_name);
        let state = entry.lock().unwrap_or_else(|e| e.into_inner());
        HealthSnapshot {
            gateway_name: gateway_name.to_string(),
            success_rate: state.window.success_rate(),
            avg_latency_ms: state.window.avg_latency_ms(),
            error_rate: state.window.error_rate(),
            sample_count: state.window.len(),
            is_outage: state.is_outage(),
            last_checked_at: state.last_checked_at,
            message: state.message.clone(),
        }
    }

    pub fn snapshot_map(&self, gateway_names: &[String]) -> HashMap<String, HealthSnapshot> {
        gateway_names
            .iter()
            .map(|name| (name.clone(), self.snapshot(name)))
            .collect()
    }

    pub fn snapshot_all(&self) -> Vec<HealthSnapshot> {
        let names: Vec<String> = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            entries.keys().cloned().collect()
        };
        let mut snapshots: Vec<HealthSnapshot> =
            names.iter().map(|n| self.snapshot(n)).collect();
        snapshots.sort_by(|a, b| a.gateway_name.cmp(&b.gateway_name));
        snapshots
    }
}

/// Background probe loop, independent of request traffic.
pub async fn probe_loop(
    monitor: Arc<HealthMonitor>,
    registry: Arc<GatewayRegistry>,
    interval: Duration,
) {
    loop {
        tokio::time::sleep(interval).await;
        for (name, adapter) in registry.iter() {
            let probe = adapter.health_check().await;
            monitor.record_probe(name, &probe);
            tracing::debug!(
                gateway = name.as_str(),
                healthy = probe.healthy,
                latency_ms = probe.latency_ms,
                "health probe"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_outage_needs_minimum_samples() {
        let monitor = HealthMonitor::new(10);
        monitor.record("g1", false, 10.0);
        monitor.record("g1", false, 10.0);
        assert!(!monitor.is_outage("g1"));
        for _ in 0..3 {
            monitor.record("g1", false, 10.0);
        }
        assert!(monitor.is_outage("g1"));
    }

    #[test]
    fn auto_outage_is_sticky_until_revive() {
        let monitor = HealthMonitor::new(10);
        for _ in 0..5 {
            monitor.record("g1", false, 10.0);
        }
        assert!(monitor.is_outage("g1"));
        // recovery alone does not clear the flag
        for _ in 0..5 {
            monitor.record("g1", true, 10.0);
        }
        assert!(monitor.is_outage("g1"));
        monitor.revive("g1");
        assert!(!monitor.is_outage("g1"));
    }

    #[test]
    fn forced_outage_and_revive() {
        let monitor = HealthMonitor::new(10);
        assert!(!monitor.is_outage("g1"));
        monitor.force_outage("g1");
        assert!(monitor.is_outage("g1"));
        monitor.revive("g1");
        assert!(!monitor.is_outage("g1"));
    }

    #[test]
    fn snapshot_all_is_sorted_by_name() {
        let monitor = HealthMonitor::new(10);
        monitor.record("zeta", true, 10.0);
        monitor.record("alpha", true, 10.0);
        let all = monitor.snapshot_all();
        let names: Vec<&str> = all.iter().map(|s| s.gateway_name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
