//! The `AuditSink` trait that the policy engine and workflow engine emit
//! best-effort audit events through. The concrete, durable implementation
//! (hash-chained, file-persisted) lives in `orchestra-telemetry`; this
//! crate only defines the seam so `orchestra-policy` and
//! `orchestra-workflow` don't need to depend on the telemetry crate.

use serde::{Deserialize, Serialize};

/// Severity of an audit event, independent of the policy action that
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// A single audit event. `context` carries a free-form JSON blob (matched
/// content, modifier values, approval identifiers, etc.) because the
/// shape varies by source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub category: String,
    pub message: String,
    pub severity: AuditSeverity,
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl AuditEvent {
    pub fn new(category: impl Into<String>, message: impl Into<String>, severity: AuditSeverity) -> Self {
        Self {
            category: category.into(),
            message: message.into(),
            severity,
            request_id: None,
            context: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }
}

/// Best-effort audit sink. Implementations must never block policy
/// evaluation or workflow execution on their own failure (§7: "Audit
/// emission is best-effort and never raises back to the caller").
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// An `AuditSink` that discards every event. Used as the default when no
/// sink is configured, and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: AuditEvent) {}
}
