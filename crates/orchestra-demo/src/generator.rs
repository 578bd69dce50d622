//! Drives synthetic `Request`s at a running gateway, recording
//! client-side latency/outcome stats with the same `MetricsCollector`
//! the gateway uses internally for its own aggregation.

use std::time::{Duration, Instant};

use orchestra_core::{value_map, ClientContext, Request, Response, UserContext, Value};
use orchestra_telemetry::MetricsCollector;
use tracing::{info, warn};
use uuid::Uuid;

use crate::templates::RequestTemplates;

pub struct TrafficGenerator {
    client: reqwest::Client,
    target: String,
    service_secret: Option<String>,
    templates: RequestTemplates,
    metrics: MetricsCollector,
}

impl TrafficGenerator {
    pub fn new(target: impl Into<String>, service_secret: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            target: target.into(),
            service_secret,
            templates: RequestTemplates::new(),
            metrics: MetricsCollector::new(),
        }
    }

    /// Run at `rate` requests/second for `duration` seconds (0 = forever,
    /// until the caller cancels), then print a summary snapshot.
    pub async fn run(&self, rate: u32, duration_secs: u64, categories: Vec<String>) {
        let interval = Duration::from_secs_f64(1.0 / rate.max(1) as f64);
        let start = Instant::now();
        let mut sent = 0u64;

        loop {
            if duration_secs > 0 && start.elapsed() >= Duration::from_secs(duration_secs) {
                break;
            }

            self.send_one(&categories).await;
            sent += 1;
            tokio::time::sleep(interval).await;
        }

        info!(sent, elapsed_s = start.elapsed().as_secs_f64(), "traffic run finished");
        self.print_summary();
    }

    async fn send_one(&self, categories: &[String]) {
        let (request_type, query) = self.templates.generate_from(categories);
        let request = self.build_request(request_type, query);
        let started = Instant::now();

        let mut builder = self.client.post(format!("{}/v1/requests", self.target)).json(&request);
        if let Some(secret) = &self.service_secret {
            builder = builder.header("x-internal-service-secret", secret);
        }

        match builder.send().await {
            Ok(resp) => {
                let status = resp.status();
                let latency_us = started.elapsed().as_micros() as u64;
                match resp.json::<Response>().await {
                    Ok(body) => {
                        self.metrics.record_request(request_type, body.policy_info.risk_score, latency_us);
                        self.metrics.record_policy_decision(body.success);
                        if !body.success {
                            warn!(request_id = %body.request_id, error = ?body.error, "request blocked");
                        }
                    }
                    Err(err) => warn!(status = %status, error = %err, "failed to parse gateway response"),
                }
            }
            Err(err) => warn!(error = %err, "gateway request failed"),
        }
    }

    fn build_request(&self, request_type: &str, query: String) -> Request {
        Request {
            request_id: Uuid::new_v4().to_string(),
            request_type: request_type.to_string(),
            query,
            user: UserContext {
                id: "demo-user".to_string(),
                email: "demo@orchestra.local".to_string(),
                role: "user".to_string(),
                tenant_id: String::new(),
                permissions: Default::default(),
            },
            client: ClientContext {
                id: "orchestra-demo".to_string(),
                name: "orchestra-demo".to_string(),
                org_id: String::new(),
            },
            context: value_map([("source", Value::string("traffic-generator"))]),
        }
    }

    fn print_summary(&self) {
        let snapshot = self.metrics.snapshot();
        println!("\n=== orchestra-demo traffic summary ===");
        println!(
            "policy decisions: {} allowed, {} blocked",
            snapshot.policy_decisions_allowed, snapshot.policy_decisions_blocked
        );
        for (request_type, stats) in snapshot.by_request_type {
            println!(
                "{request_type}: {} requests, p50={}us p95={}us p99={}us, risk(low/med/high)={}/{}/{}",
                stats.total_requests,
                stats.p50_latency_us,
                stats.p95_latency_us,
                stats.p99_latency_us,
                stats.risk_low,
                stats.risk_medium,
                stats.risk_high,
            );
        }
    }
}
