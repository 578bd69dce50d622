//! Shared application state (§9 "Global mutable state": the step-processor
//! registry and provider router are constructed once in `main` and
//! injected everywhere they're needed; nothing here is process-wide
//! mutable statics).

use std::collections::HashMap;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use orchestra_policy::PolicyEngine;
use orchestra_redaction::ResponseProcessor;
use orchestra_router::ProviderRouter;
use orchestra_telemetry::MetricsCollector;
use orchestra_workflow::{ExecutionStore, Workflow, WorkflowEngine};

/// Everything a request handler needs, cloned cheaply (every field is an
/// `Arc`) into each axum handler invocation.
#[derive(Clone)]
pub struct AppState {
    pub policy_engine: Arc<PolicyEngine>,
    pub workflow_engine: Arc<WorkflowEngine>,
    pub router: Arc<ProviderRouter>,
    pub redaction: Arc<ResponseProcessor>,
    pub execution_store: Arc<dyn ExecutionStore>,
    pub metrics: Arc<MetricsCollector>,
    pub prometheus_handle: PrometheusHandle,
    pub workflows: Arc<HashMap<String, Workflow>>,
    pub approvals: Arc<crate::policy_bridge::InMemoryApprovalService>,
}
