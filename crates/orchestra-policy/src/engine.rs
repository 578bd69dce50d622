//! The dynamic policy engine (C4): ties together selection, condition
//! matching, ordered action application, risk scoring, and caching.

use std::sync::Arc;
use std::time::Instant;

use orchestra_core::{AuditEvent, AuditSeverity, AuditSink, NullAuditSink, Request, Value};
use tracing::debug;

use crate::action::PolicyAction;
use crate::cache::PolicyCache;
use crate::policy::Policy;
use crate::repository::PolicySnapshot;
use crate::result::EvaluationResult;
use crate::risk::{self, DefaultScanner, Scanner};

/// Evaluates policies against requests. Cheap to clone (every field is an
/// `Arc`); the gateway holds one instance shared across all request tasks.
pub struct PolicyEngine {
    snapshot: Arc<PolicySnapshot>,
    cache: Arc<PolicyCache>,
    scanner: Arc<dyn Scanner>,
    audit: Arc<dyn AuditSink>,
}

impl PolicyEngine {
    pub fn new(snapshot: Arc<PolicySnapshot>) -> Self {
        Self {
            snapshot,
            cache: Arc::new(PolicyCache::new()),
            scanner: Arc::new(DefaultScanner),
            audit: Arc::new(NullAuditSink),
        }
    }

    pub fn with_scanner(mut self, scanner: Arc<dyn Scanner>) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_cache(mut self, cache: Arc<PolicyCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Evaluate all applicable policies against `request` (§4.1).
    pub fn evaluate(&self, request: &Request) -> EvaluationResult {
        let started = Instant::now();

        let fingerprint = PolicyCache::fingerprint(
            &request.user.email,
            &request.user.role,
            &request.request_type,
            &request.query,
        );

        if let Some(cached) = self.cache.get(&fingerprint) {
            debug!(request_id = %request.request_id, "policy cache hit");
            return cached;
        }

        let risk_score = risk::score(request, self.scanner.as_ref());
        let mut result = EvaluationResult::new(risk_score);

        let policies = self.select_applicable(request);

        for policy in policies.iter() {
            if !self.conditions_match(policy, request, result.risk_score) {
                continue;
            }

            result.applied_policies.push(policy.name.clone());
            self.apply_actions(policy, &mut result, request);
        }

        result.risk_score = result.risk_score.clamp(0.0, 1.0);
        result.processing_time_ms = started.elapsed().as_millis() as u64;
        self.cache.insert(fingerprint, result.clone());
        result
    }

    /// Selection: enabled, tenant-scoped, non-empty conditions, ordered by
    /// priority desc, then created_at desc, tie-broken by policy_id asc.
    fn select_applicable(&self, request: &Request) -> Vec<Arc<Policy>> {
        let snapshot = self.snapshot.get();
        let mut selected: Vec<Arc<Policy>> = snapshot
            .iter()
            .filter(|p| p.is_selectable(&request.user.tenant_id))
            .cloned()
            .map(Arc::new)
            .collect();

        selected.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.policy_id.cmp(&b.policy_id))
        });

        selected
    }

    fn conditions_match(&self, policy: &Policy, request: &Request, risk_score: f32) -> bool {
        policy.conditions.iter().all(|condition| {
            let field_value = self.resolve_field(&condition.field, request, risk_score);
            condition.matches(field_value.as_ref())
        })
    }

    fn resolve_field(&self, field: &str, request: &Request, risk_score: f32) -> Option<Value> {
        if field == "risk_score" {
            return Some(Value::Float(risk_score as f64));
        }
        request.field(field)
    }

    fn apply_actions(&self, policy: &Policy, result: &mut EvaluationResult, request: &Request) {
        for action in policy.actions.iter() {
            match action {
                PolicyAction::Block { reason } => {
                    result.allowed = false;
                    result
                        .required_actions
                        .push(format!("blocked: {reason}"));
                }
                PolicyAction::Redact { fields } => {
                    result
                        .required_actions
                        .push(format!("redact: {}", fields.join(",")));
                    result.redact_fields.extend(fields.iter().cloned());
                }
                PolicyAction::ModifyRisk { modifier } => {
                    result.risk_score *= modifier;
                }
                PolicyAction::RequireApproval { reason } => {
                    result.allowed = false;
                    result.requires_approval = true;
                    result.approval_reason = Some(reason.clone());
                }
                PolicyAction::Alert { category, severity } => {
                    self.audit.record(
                        AuditEvent::new(
                            category.clone(),
                            format!("alert: {category}"),
                            map_alert_severity(*severity),
                        )
                        .with_request_id(request.request_id.clone()),
                    );
                }
                PolicyAction::Log { message, level } => {
                    self.audit.record(
                        AuditEvent::new("policy_log", message.clone(), map_log_severity(*level))
                            .with_request_id(request.request_id.clone()),
                    );
                }
            }
        }
    }
}

fn map_alert_severity(severity: crate::action::AlertSeverity) -> AuditSeverity {
    use crate::action::AlertSeverity as A;
    match severity {
        A::Low => AuditSeverity::Low,
        A::Medium => AuditSeverity::Medium,
        A::High => AuditSeverity::High,
        A::Critical => AuditSeverity::Critical,
    }
}

fn map_log_severity(level: crate::action::LogLevel) -> AuditSeverity {
    use crate::action::LogLevel as L;
    match level {
        L::Debug | L::Info => AuditSeverity::Low,
        L::Warn => AuditSeverity::Medium,
        L::Error => AuditSeverity::High,
    }
}
