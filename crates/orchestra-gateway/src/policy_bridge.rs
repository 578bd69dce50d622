//! Adapts `orchestra-policy`'s request-shaped `PolicyEngine` to the
//! step-shaped `PolicyChecker` seam the workflow engine's HITL state
//! machine (C11) calls before every step (§4.6).

use async_trait::async_trait;
use orchestra_core::{ClientContext, Request};
use orchestra_policy::PolicyEngine;
use orchestra_workflow::{ApprovalService, ApprovalStatus, CheckVerdict, PolicyChecker, WorkflowExecution, WorkflowStep};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a synthetic per-step `Request` (the step's resolved prompt/
/// condition as `query`, the workflow's name as `request_type`) and runs
/// it through the policy engine, translating the result into a
/// `CheckVerdict`.
pub struct GatewayPolicyChecker {
    engine: Arc<PolicyEngine>,
}

impl GatewayPolicyChecker {
    pub fn new(engine: Arc<PolicyEngine>) -> Self {
        Self { engine }
    }

    fn synthetic_request(step: &WorkflowStep, execution: &WorkflowExecution) -> Request {
        let query = step
            .prompt
            .clone()
            .or_else(|| step.condition.clone())
            .or_else(|| step.statement.clone())
            .unwrap_or_default();
        Request {
            request_id: format!("{}:{}", execution.id, step.name),
            request_type: execution.workflow_name.clone(),
            query,
            user: execution.user.clone(),
            client: ClientContext {
                id: "orchestra-gateway".to_string(),
                name: "orchestra-gateway".to_string(),
                org_id: String::new(),
            },
            context: execution.input.clone(),
        }
    }
}

#[async_trait]
impl PolicyChecker for GatewayPolicyChecker {
    async fn check(&self, step: &WorkflowStep, execution: &WorkflowExecution) -> orchestra_workflow::Result<CheckVerdict> {
        let request = Self::synthetic_request(step, execution);
        let result = self.engine.evaluate(&request);

        if result.requires_approval {
            let policy = result.applied_policies.last().cloned().unwrap_or_default();
            let reason = result.approval_reason.clone().unwrap_or_else(|| "approval required".to_string());
            return Ok(CheckVerdict::RequireApproval { policy, reason });
        }

        if !result.allowed {
            let policy = result.applied_policies.last().cloned().unwrap_or_default();
            let reason = result
                .required_actions
                .iter()
                .find_map(|a| a.strip_prefix("blocked: "))
                .unwrap_or("blocked by policy")
                .to_string();
            return Ok(CheckVerdict::Block { policy, reason });
        }

        if result.risk_score >= 0.7 {
            return Ok(CheckVerdict::Warn(format!("elevated risk score {:.2}", result.risk_score)));
        }

        Ok(CheckVerdict::Allow)
    }
}

/// In-memory `ApprovalService`: approvals are created pending and must be
/// resolved out-of-band (via `POST /v1/approvals/{id}`) before `Resume`
/// will grant continuation (§4.6, §6 "HITL approval records").
#[derive(Default)]
pub struct InMemoryApprovalService {
    approvals: Mutex<HashMap<String, ApprovalStatus>>,
}

impl InMemoryApprovalService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a pending approval to `status` (used by the
    /// `/v1/approvals/{id}` handler).
    pub fn resolve(&self, approval_id: &str, status: ApprovalStatus) -> bool {
        let mut approvals = self.approvals.lock();
        match approvals.get_mut(approval_id) {
            Some(existing) => {
                *existing = status;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl ApprovalService for InMemoryApprovalService {
    async fn create(&self, execution_id: &str, step: &str, _reason: &str) -> orchestra_workflow::Result<String> {
        let id = format!("approval-{execution_id}-{step}");
        self.approvals.lock().insert(id.clone(), ApprovalStatus::Pending);
        Ok(id)
    }

    async fn get(&self, approval_id: &str) -> orchestra_workflow::Result<ApprovalStatus> {
        Ok(*self.approvals.lock().get(approval_id).unwrap_or(&ApprovalStatus::Pending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestra_core::{value_map, UserContext};
    use orchestra_policy::PolicySnapshot;
    use std::collections::BTreeSet;

    fn user() -> UserContext {
        UserContext {
            id: "u1".into(),
            email: "u@x.com".into(),
            role: "user".into(),
            tenant_id: String::new(),
            permissions: BTreeSet::new(),
        }
    }

    #[tokio::test]
    async fn allow_by_default_with_empty_snapshot() {
        let engine = Arc::new(PolicyEngine::new(Arc::new(PolicySnapshot::new(vec![]))));
        let checker = GatewayPolicyChecker::new(engine);
        let step = WorkflowStep::new("s1", "llm");
        let execution = WorkflowExecution::new("w", value_map([]), user());
        let verdict = checker.check(&step, &execution).await.unwrap();
        assert_eq!(verdict, CheckVerdict::Allow);
    }

    #[tokio::test]
    async fn approval_resolution_round_trips() {
        let service = InMemoryApprovalService::new();
        let id = service.create("exec1", "step1", "needs review").await.unwrap();
        assert_eq!(service.get(&id).await.unwrap(), ApprovalStatus::Pending);
        assert!(service.resolve(&id, ApprovalStatus::Approved));
        assert_eq!(service.get(&id).await.unwrap(), ApprovalStatus::Approved);
        assert!(!service.resolve("unknown", ApprovalStatus::Approved));
    }
}
