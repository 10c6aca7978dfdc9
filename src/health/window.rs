use std::collections::VecDeque;

#[derive(Debug, Clone, Copy)]
pub struct HealthSample {
    pub ok: bool,
    pub latency_ms: f64,
}

/// Fixed-size window of the most recent probe/transaction outcomes for one
/// gateway. Aggregates are recomputed on read over whatever is in the
/// window.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<HealthSample>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, ok: bool, latency_ms: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(HealthSample { ok, latency_ms });
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// 1.0 for an empty window: an unobserved gateway is assumed healthy.
    pub fn success_rate(&self) -> f64 {
        if self.samples.is_empty() {
            return 1.0;
        }
        let ok = self.samples.iter().filter(|s| s.ok).count();
        ok as f64 / self.samples.len() as f64
    }

    pub fn error_rate(&self) -> f64 {
        1.0 - self.success_rate()
    }

    pub fn avg_latency_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let total: f64 = self.samples.iter().map(|s| s.latency_ms).sum();
        total / self.samples.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_is_assumed_healthy() {
        let w = RollingWindow::new(10);
        assert_eq!(w.success_rate(), 1.0);
        assert_eq!(w.error_rate(), 0.0);
        assert_eq!(w.avg_latency_ms(), 0.0);
    }

    #[test]
    fn aggregates_reflect_contents() {
        let mut w = RollingWindow::new(10);
        w.push(true, 100.0);
        w.push(true, 200.0);
        w.push(false, 300.0);
        w.push(false, 400.0);
        assert_eq!(w.success_rate(), 0.5);
        assert_eq!(w.error_rate(), 0.5);
        assert_eq!(w.avg_latency_ms(), 250.0);
    }

    #[test]
    fn old_samples_fall_out_of_the_window() {
        let mut w = RollingWindow::new(3);
        w.push(false, 10.0);
        for _ in 0..3 {
            w.push(true, 10.0);
        }
        assert_eq!(w.len(), 3);
        assert_eq!(w.success_rate(), 1.0);
    }
}
