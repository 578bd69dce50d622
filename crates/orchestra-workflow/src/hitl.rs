//! Human-in-the-loop pause/resume/abort state machine (C11).
//!
//! `running → paused → {running (resumed) → completed, aborted}`.
//! The engine calls `PolicyChecker::check` before every step; a
//! `require_approval` verdict pauses the execution instead of failing
//! it, and the caller later resumes or aborts it out-of-band.

use async_trait::async_trait;

use crate::execution::WorkflowExecution;
use crate::step::WorkflowStep;

/// Outcome of a pre-step policy check (§4.6). Mirrors the policy engine's
/// action vocabulary without depending on `orchestra-policy` directly, so
/// a deployment can wire in any decision source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckVerdict {
    Allow,
    Warn(String),
    Log(String),
    Block { policy: String, reason: String },
    RequireApproval { policy: String, reason: String },
}

/// Injected before each step. Errors are fail-open by design (the engine
/// proceeds as if `Allow` was returned) — availability over enforcement.
/// A deployment that wants fail-closed wires a `PolicyChecker` whose
/// `check` returns `Block` on its own internal error instead of
/// propagating one.
#[async_trait]
pub trait PolicyChecker: Send + Sync {
    async fn check(&self, step: &WorkflowStep, execution: &WorkflowExecution) -> crate::Result<CheckVerdict>;
}

/// The default checker: every step is allowed. Used when no policy
/// gating is wired into the workflow engine.
pub struct NullPolicyChecker;

#[async_trait]
impl PolicyChecker for NullPolicyChecker {
    async fn check(&self, _step: &WorkflowStep, _execution: &WorkflowExecution) -> crate::Result<CheckVerdict> {
        Ok(CheckVerdict::Allow)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Overridden,
    Rejected,
    Expired,
}

impl ApprovalStatus {
    fn grants_resume(self) -> bool {
        matches!(self, ApprovalStatus::Approved | ApprovalStatus::Overridden)
    }
}

/// Out-of-band approval tracking, consulted by `Resume`.
#[async_trait]
pub trait ApprovalService: Send + Sync {
    async fn create(&self, execution_id: &str, step: &str, reason: &str) -> crate::Result<String>;
    async fn get(&self, approval_id: &str) -> crate::Result<ApprovalStatus>;
}

/// Runs the pre-step check and folds its verdict into the execution,
/// returning `Some(execution)` immediately (non-blocking) when the
/// execution has paused.
pub async fn run_check(
    checker: &dyn PolicyChecker,
    approvals: &dyn ApprovalService,
    step: &WorkflowStep,
    step_index: usize,
    execution: &mut WorkflowExecution,
) -> crate::Result<bool> {
    let verdict = match checker.check(step, execution).await {
        Ok(v) => v,
        Err(err) => {
            tracing::warn!(error = %err, step = %step.name, "policy checker failed, proceeding fail-open");
            CheckVerdict::Allow
        }
    };

    match verdict {
        CheckVerdict::Allow => Ok(true),
        CheckVerdict::Warn(msg) => {
            tracing::warn!(step = %step.name, message = %msg, "step proceeding with warning");
            Ok(true)
        }
        CheckVerdict::Log(msg) => {
            tracing::info!(step = %step.name, message = %msg, "step policy log");
            Ok(true)
        }
        CheckVerdict::Block { policy, reason } => {
            execution.mark_failed(format!("blocked by policy {policy}: {reason}"));
            Ok(false)
        }
        CheckVerdict::RequireApproval { policy, reason } => {
            let approval_id = approvals.create(&execution.id, &step.name, &reason).await?;
            execution.pause(step_index, Some(approval_id), format!("{policy}: {reason}"));
            Ok(false)
        }
    }
}

/// `Resume(execution, ...)` (§4.6): requires `status == paused`, requires
/// the associated approval to have landed in an approved/overridden
/// state, then hands control back to the engine to continue from
/// `paused_at_step`.
pub async fn resume(
    approvals: &dyn ApprovalService,
    execution: &mut WorkflowExecution,
) -> crate::Result<usize> {
    if execution.status != crate::execution::ExecutionStatus::Paused {
        return Err(crate::Error::NotPaused);
    }
    let approval_id = execution
        .approval_id
        .clone()
        .ok_or_else(|| crate::Error::invalid_input("paused execution has no approval_id"))?;
    let status = approvals.get(&approval_id).await?;
    if !status.grants_resume() {
        return Err(crate::Error::NotApproved(approval_id));
    }
    execution.approval_status = Some(format!("{status:?}").to_lowercase());
    let resume_at = execution.paused_at_step.unwrap_or(0);
    execution.resume();
    Ok(resume_at)
}

/// `Abort(execution, reason)` (§4.6): requires `status == paused`.
pub fn abort(execution: &mut WorkflowExecution, reason: impl Into<String>) -> crate::Result<()> {
    if execution.status != crate::execution::ExecutionStatus::Paused {
        return Err(crate::Error::NotPaused);
    }
    execution.mark_aborted(reason.into());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestra_core::{value_map, UserContext};
    use parking_lot::Mutex;
    use std::collections::{BTreeSet, HashMap};

    fn user() -> UserContext {
        UserContext {
            id: "u1".into(),
            email: "u@x.com".into(),
            role: "user".into(),
            tenant_id: String::new(),
            permissions: BTreeSet::new(),
        }
    }

    struct FixedChecker(CheckVerdict);

    #[async_trait]
    impl PolicyChecker for FixedChecker {
        async fn check(&self, _step: &WorkflowStep, _execution: &WorkflowExecution) -> crate::Result<CheckVerdict> {
            Ok(self.0.clone())
        }
    }

    struct InMemoryApprovals {
        statuses: Mutex<HashMap<String, ApprovalStatus>>,
    }

    impl InMemoryApprovals {
        fn new() -> Self {
            Self {
                statuses: Mutex::new(HashMap::new()),
            }
        }

        fn set(&self, id: &str, status: ApprovalStatus) {
            self.statuses.lock().insert(id.to_string(), status);
        }
    }

    #[async_trait]
    impl ApprovalService for InMemoryApprovals {
        async fn create(&self, _execution_id: &str, _step: &str, _reason: &str) -> crate::Result<String> {
            let id = "A1".to_string();
            self.statuses.lock().insert(id.clone(), ApprovalStatus::Pending);
            Ok(id)
        }

        async fn get(&self, approval_id: &str) -> crate::Result<ApprovalStatus> {
            Ok(*self.statuses.lock().get(approval_id).unwrap_or(&ApprovalStatus::Pending))
        }
    }

    #[tokio::test]
    async fn require_approval_pauses_execution() {
        let checker = FixedChecker(CheckVerdict::RequireApproval {
            policy: "P1".into(),
            reason: "needs review".into(),
        });
        let approvals = InMemoryApprovals::new();
        let mut execution = WorkflowExecution::new("w", value_map([]), user());
        let step = WorkflowStep::new("s1", "llm");

        let proceed = run_check(&checker, &approvals, &step, 0, &mut execution).await.unwrap();
        assert!(!proceed);
        assert_eq!(execution.status, crate::execution::ExecutionStatus::Paused);
        assert_eq!(execution.approval_id, Some("A1".to_string()));
    }

    #[tokio::test]
    async fn resume_requires_approved_status() {
        let approvals = InMemoryApprovals::new();
        let mut execution = WorkflowExecution::new("w", value_map([]), user());
        execution.pause(1, Some("A1".into()), "needs review");
        approvals.set("A1", ApprovalStatus::Pending);

        let err = resume(&approvals, &mut execution).await.unwrap_err();
        assert!(matches!(err, crate::Error::NotApproved(_)));

        approvals.set("A1", ApprovalStatus::Approved);
        let resume_at = resume(&approvals, &mut execution).await.unwrap();
        assert_eq!(resume_at, 1);
        assert_eq!(execution.status, crate::execution::ExecutionStatus::Running);
    }

    #[tokio::test]
    async fn expired_approval_does_not_grant_resume() {
        let approvals = InMemoryApprovals::new();
        let mut execution = WorkflowExecution::new("w", value_map([]), user());
        execution.pause(1, Some("A1".into()), "needs review");
        approvals.set("A1", ApprovalStatus::Expired);

        let err = resume(&approvals, &mut execution).await.unwrap_err();
        assert!(matches!(err, crate::Error::NotApproved(_)));
        assert_eq!(execution.status, crate::execution::ExecutionStatus::Paused);
    }

    #[tokio::test]
    async fn abort_requires_paused_status() {
        let mut execution = WorkflowExecution::new("w", value_map([]), user());
        let err = abort(&mut execution, "cancelled").unwrap_err();
        assert!(matches!(err, crate::Error::NotPaused));

        execution.pause(0, None, "needs review");
        abort(&mut execution, "cancelled").unwrap();
        assert_eq!(execution.status, crate::execution::ExecutionStatus::Aborted);
    }

    #[tokio::test]
    async fn block_verdict_fails_execution() {
        let checker = FixedChecker(CheckVerdict::Block {
            policy: "P2".into(),
            reason: "disallowed".into(),
        });
        let approvals = InMemoryApprovals::new();
        let mut execution = WorkflowExecution::new("w", value_map([]), user());
        let step = WorkflowStep::new("s1", "llm");

        let proceed = run_check(&checker, &approvals, &step, 0, &mut execution).await.unwrap();
        assert!(!proceed);
        assert_eq!(execution.status, crate::execution::ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn checker_error_is_fail_open() {
        struct FailingChecker;
        #[async_trait]
        impl PolicyChecker for FailingChecker {
            async fn check(&self, _step: &WorkflowStep, _execution: &WorkflowExecution) -> crate::Result<CheckVerdict> {
                Err(crate::Error::invalid_input("checker unavailable"))
            }
        }

        let approvals = InMemoryApprovals::new();
        let mut execution = WorkflowExecution::new("w", value_map([]), user());
        let step = WorkflowStep::new("s1", "llm");
        let proceed = run_check(&FailingChecker, &approvals, &step, 0, &mut execution).await.unwrap();
        assert!(proceed);
    }
}
