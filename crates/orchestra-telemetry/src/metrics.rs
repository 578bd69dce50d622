//! Metrics aggregation (C13): per-request-type and per-provider counters,
//! rolling-window percentile estimation, and risk buckets. Every record
//! call also mirrors onto the `metrics` facade so a gateway that installs
//! `metrics-exporter-prometheus` scrapes the same numbers (§10 "Metrics").

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Bounded ring buffer of recent latency samples, used for percentile
/// estimation without unbounded memory growth.
const ROLLING_WINDOW: usize = 512;

struct RequestTypeCounters {
    total_requests: AtomicU64,
    risk_low: AtomicU64,
    risk_medium: AtomicU64,
    risk_high: AtomicU64,
    latencies_us: Mutex<Vec<u64>>,
}

impl RequestTypeCounters {
    fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            risk_low: AtomicU64::new(0),
            risk_medium: AtomicU64::new(0),
            risk_high: AtomicU64::new(0),
            latencies_us: Mutex::new(Vec::with_capacity(ROLLING_WINDOW)),
        }
    }

    fn record(&self, risk_score: f32, latency_us: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        match risk_bucket(risk_score) {
            RiskBucket::Low => self.risk_low.fetch_add(1, Ordering::Relaxed),
            RiskBucket::Medium => self.risk_medium.fetch_add(1, Ordering::Relaxed),
            RiskBucket::High => self.risk_high.fetch_add(1, Ordering::Relaxed),
        };
        let mut samples = self.latencies_us.lock();
        if samples.len() >= ROLLING_WINDOW {
            samples.remove(0);
        }
        samples.push(latency_us);
    }

    fn snapshot(&self) -> RequestTypeSnapshot {
        let samples = self.latencies_us.lock();
        RequestTypeSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            risk_low: self.risk_low.load(Ordering::Relaxed),
            risk_medium: self.risk_medium.load(Ordering::Relaxed),
            risk_high: self.risk_high.load(Ordering::Relaxed),
            p50_latency_us: percentile(&samples, 0.50),
            p95_latency_us: percentile(&samples, 0.95),
            p99_latency_us: percentile(&samples, 0.99),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RiskBucket {
    Low,
    Medium,
    High,
}

fn risk_bucket(score: f32) -> RiskBucket {
    if score >= 0.8 {
        RiskBucket::High
    } else if score >= 0.4 {
        RiskBucket::Medium
    } else {
        RiskBucket::Low
    }
}

fn percentile(sorted_source: &[u64], p: f64) -> u64 {
    if sorted_source.is_empty() {
        return 0;
    }
    let mut samples = sorted_source.to_vec();
    samples.sort_unstable();
    let rank = ((samples.len() - 1) as f64 * p).round() as usize;
    samples[rank]
}

struct ProviderCounters {
    requests: AtomicU64,
    errors: AtomicU64,
    total_latency_us: AtomicU64,
}

impl ProviderCounters {
    fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
        }
    }
}

/// Aggregates request-type and provider metrics across the process,
/// cheap to clone (an `Arc` handle) and safe to share across tasks.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<Inner>,
}

struct Inner {
    by_request_type: Mutex<HashMap<String, Arc<RequestTypeCounters>>>,
    by_provider: Mutex<HashMap<String, Arc<ProviderCounters>>>,
    policy_decisions_blocked: AtomicU64,
    policy_decisions_allowed: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                by_request_type: Mutex::new(HashMap::new()),
                by_provider: Mutex::new(HashMap::new()),
                policy_decisions_blocked: AtomicU64::new(0),
                policy_decisions_allowed: AtomicU64::new(0),
            }),
        }
    }

    /// Record a completed request: risk score and end-to-end latency,
    /// bucketed by `request_type`.
    pub fn record_request(&self, request_type: &str, risk_score: f32, latency_us: u64) {
        metrics::counter!("orchestra_requests_total", "request_type" => request_type.to_string()).increment(1);
        let counters = {
            let mut map = self.inner.by_request_type.lock();
            map.entry(request_type.to_string())
                .or_insert_with(|| Arc::new(RequestTypeCounters::new()))
                .clone()
        };
        counters.record(risk_score, latency_us);
    }

    /// Record a policy decision (`allowed` vs. `blocked`).
    pub fn record_policy_decision(&self, allowed: bool) {
        let outcome = if allowed { "allowed" } else { "blocked" };
        metrics::counter!("orchestra_policy_decisions_total", "outcome" => outcome).increment(1);
        if allowed {
            self.inner.policy_decisions_allowed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.policy_decisions_blocked.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a workflow step's processing latency.
    pub fn record_step_latency(&self, step_type: &str, latency_us: u64) {
        metrics::histogram!("orchestra_workflow_step_latency_us", "step_type" => step_type.to_string())
            .record(latency_us as f64);
    }

    /// Record a provider call outcome and latency.
    pub fn record_provider_call(&self, provider: &str, success: bool, latency_us: u64) {
        if !success {
            metrics::counter!("orchestra_provider_errors_total", "provider" => provider.to_string()).increment(1);
        }
        let counters = {
            let mut map = self.inner.by_provider.lock();
            map.entry(provider.to_string())
                .or_insert_with(|| Arc::new(ProviderCounters::new()))
                .clone()
        };
        counters.requests.fetch_add(1, Ordering::Relaxed);
        if !success {
            counters.errors.fetch_add(1, Ordering::Relaxed);
        }
        counters.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let by_request_type = self
            .inner
            .by_request_type
            .lock()
            .iter()
            .map(|(name, counters)| (name.clone(), counters.snapshot()))
            .collect();

        let by_provider = self
            .inner
            .by_provider
            .lock()
            .iter()
            .map(|(name, counters)| {
                let requests = counters.requests.load(Ordering::Relaxed);
                let errors = counters.errors.load(Ordering::Relaxed);
                let total_latency_us = counters.total_latency_us.load(Ordering::Relaxed);
                (
                    name.clone(),
                    ProviderSnapshot {
                        requests,
                        errors,
                        avg_latency_us: if requests == 0 { 0 } else { total_latency_us / requests },
                    },
                )
            })
            .collect();

        MetricsSnapshot {
            by_request_type,
            by_provider,
            policy_decisions_allowed: self.inner.policy_decisions_allowed.load(Ordering::Relaxed),
            policy_decisions_blocked: self.inner.policy_decisions_blocked.load(Ordering::Relaxed),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct RequestTypeSnapshot {
    pub total_requests: u64,
    pub risk_low: u64,
    pub risk_medium: u64,
    pub risk_high: u64,
    pub p50_latency_us: u64,
    pub p95_latency_us: u64,
    pub p99_latency_us: u64,
}

#[derive(Debug, Clone)]
pub struct ProviderSnapshot {
    pub requests: u64,
    pub errors: u64,
    pub avg_latency_us: u64,
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub by_request_type: HashMap<String, RequestTypeSnapshot>,
    pub by_provider: HashMap<String, ProviderSnapshot>,
    pub policy_decisions_allowed: u64,
    pub policy_decisions_blocked: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_per_request_type_and_computes_percentiles() {
        let metrics = MetricsCollector::new();
        for latency in [10, 20, 30, 40, 50] {
            metrics.record_request("chat", 0.1, latency);
        }
        let snapshot = metrics.snapshot();
        let chat = snapshot.by_request_type.get("chat").unwrap();
        assert_eq!(chat.total_requests, 5);
        assert_eq!(chat.risk_low, 5);
        assert!(chat.p50_latency_us > 0);
        assert!(chat.p99_latency_us >= chat.p50_latency_us);
    }

    #[test]
    fn buckets_risk_scores() {
        let metrics = MetricsCollector::new();
        metrics.record_request("chat", 0.1, 10);
        metrics.record_request("chat", 0.5, 10);
        metrics.record_request("chat", 0.9, 10);
        let snapshot = metrics.snapshot();
        let chat = snapshot.by_request_type.get("chat").unwrap();
        assert_eq!(chat.risk_low, 1);
        assert_eq!(chat.risk_medium, 1);
        assert_eq!(chat.risk_high, 1);
    }

    #[test]
    fn tracks_provider_errors_independently() {
        let metrics = MetricsCollector::new();
        metrics.record_provider_call("openai", true, 100);
        metrics.record_provider_call("openai", false, 200);
        let snapshot = metrics.snapshot();
        let openai = snapshot.by_provider.get("openai").unwrap();
        assert_eq!(openai.requests, 2);
        assert_eq!(openai.errors, 1);
        assert_eq!(openai.avg_latency_us, 150);
    }

    #[test]
    fn policy_decisions_count_separately() {
        let metrics = MetricsCollector::new();
        metrics.record_policy_decision(true);
        metrics.record_policy_decision(true);
        metrics.record_policy_decision(false);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.policy_decisions_allowed, 2);
        assert_eq!(snapshot.policy_decisions_blocked, 1);
    }
}
