//! Per-provider counters (C6). Independent atomics per provider avoid
//! cross-provider contention (§5 "Shared mutable state").

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Request/error/latency/cost counters for a single provider.
#[derive(Default)]
pub struct ProviderMetrics {
    request_count: AtomicU64,
    error_count: AtomicU64,
    total_latency_micros: AtomicU64,
    tokens_used: AtomicU64,
    /// Cost accumulated in hundredths-of-a-cent, to keep this an integer
    /// atomic rather than a locked float.
    estimated_cost_centicents: AtomicU64,
}

impl ProviderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, latency: Duration, tokens_used: u64, estimated_cost: f64) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_micros
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        self.tokens_used.fetch_add(tokens_used, Ordering::Relaxed);
        self.estimated_cost_centicents
            .fetch_add((estimated_cost * 10_000.0).round() as u64, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn average_latency(&self) -> Duration {
        let requests = self.request_count();
        if requests == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.total_latency_micros.load(Ordering::Relaxed) / requests)
    }

    pub fn tokens_used(&self) -> u64 {
        self.tokens_used.load(Ordering::Relaxed)
    }

    pub fn estimated_cost(&self) -> f64 {
        self.estimated_cost_centicents.load(Ordering::Relaxed) as f64 / 10_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_success_and_error_independently() {
        let m = ProviderMetrics::new();
        m.record_success(Duration::from_millis(10), 100, 0.002);
        m.record_error();
        assert_eq!(m.request_count(), 1);
        assert_eq!(m.error_count(), 1);
        assert_eq!(m.tokens_used(), 100);
    }

    #[test]
    fn average_latency_with_no_requests_is_zero() {
        let m = ProviderMetrics::new();
        assert_eq!(m.average_latency(), Duration::ZERO);
    }

    #[test]
    fn estimated_cost_accumulates() {
        let m = ProviderMetrics::new();
        m.record_success(Duration::from_millis(1), 10, 0.01);
        m.record_success(Duration::from_millis(1), 10, 0.02);
        assert!((m.estimated_cost() - 0.03).abs() < 1e-9);
    }
}
