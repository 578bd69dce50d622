//! The outcome of a single policy evaluation.

use serde::{Deserialize, Serialize};

/// Result of evaluating all applicable policies against one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub allowed: bool,
    /// Names of policies whose conditions all matched, in evaluation
    /// order (priority desc, created_at desc, policy_id asc).
    pub applied_policies: Vec<String>,
    /// Human-readable action descriptions, e.g. `"blocked: <reason>"`,
    /// `"redact: <fields>"`.
    pub required_actions: Vec<String>,
    pub risk_score: f32,
    pub processing_time_ms: u64,
    /// Set when a `require_approval` action fired; the HITL state machine
    /// reads this instead of treating `allowed=false` as a hard failure.
    pub requires_approval: bool,
    pub approval_reason: Option<String>,
    /// Field names named by a `redact` action, flattened across every
    /// matched policy, in the order they were declared.
    pub redact_fields: Vec<String>,
}

impl EvaluationResult {
    pub fn new(risk_score: f32) -> Self {
        Self {
            allowed: true,
            applied_policies: Vec::new(),
            required_actions: Vec::new(),
            risk_score,
            processing_time_ms: 0,
            requires_approval: false,
            approval_reason: None,
            redact_fields: Vec::new(),
        }
    }
}
