//! Workflow engine (C10): drives sequential or fan-out/fan-in execution,
//! propagates step outputs, and resolves the final output template.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use orchestra_core::{UserContext, Value, ValueMap};

use crate::error::{Error, Result};
use crate::execution::{ExecutionStatus, StepExecution, WorkflowExecution};
use crate::hitl::{self, ApprovalService, PolicyChecker};
use crate::processor::StepProcessorRegistry;
use crate::step::Workflow;
use crate::template::TemplateResolver;

/// Drives workflow runs against a shared step-processor registry, policy
/// checker, and approval service. One instance is built per deployment
/// and shared across concurrent executions — it owns no per-run state.
pub struct WorkflowEngine {
    processors: StepProcessorRegistry,
    checker: Arc<dyn PolicyChecker>,
    approvals: Arc<dyn ApprovalService>,
    template: TemplateResolver,
}

impl WorkflowEngine {
    pub fn new(
        processors: StepProcessorRegistry,
        checker: Arc<dyn PolicyChecker>,
        approvals: Arc<dyn ApprovalService>,
    ) -> Self {
        Self {
            processors,
            checker,
            approvals,
            template: TemplateResolver::new(),
        }
    }

    /// `Execute(workflow, input, user) → WorkflowExecution` (§4.5).
    pub async fn execute(&self, workflow: &Workflow, input: ValueMap, user: UserContext) -> Result<WorkflowExecution> {
        let mut merged = workflow.input.clone();
        merged.extend(input);
        let mut execution = WorkflowExecution::new(workflow.name.clone(), merged, user);

        if workflow.parallel && workflow.steps.len() > 1 {
            self.run_parallel(workflow, &mut execution).await?;
        } else {
            self.run_sequential(workflow, &mut execution, 0).await?;
        }

        if execution.status == ExecutionStatus::Running {
            self.resolve_output(workflow, &mut execution);
            execution.mark_completed();
        }
        Ok(execution)
    }

    /// `Resume(execution, workflow, input)` (§4.6): continues iteration
    /// from `paused_at_step` to end. A pause raised inside the fan-out
    /// group of a parallel workflow re-enters `run_parallel` (the whole
    /// group re-runs its pre-step checks and, for steps that clear them,
    /// executes concurrently again) rather than replaying the group
    /// sequentially, mirroring `execute()`'s mode selection.
    pub async fn resume(
        &self,
        workflow: &Workflow,
        execution: &mut WorkflowExecution,
    ) -> Result<()> {
        let resume_at = hitl::resume(self.approvals.as_ref(), execution).await?;
        if workflow.parallel && workflow.steps.len() > 1 {
            self.run_parallel(workflow, execution).await?;
        } else {
            self.run_sequential(workflow, execution, resume_at).await?;
        }
        if execution.status == ExecutionStatus::Running {
            self.resolve_output(workflow, execution);
            execution.mark_completed();
        }
        Ok(())
    }

    pub fn abort(&self, execution: &mut WorkflowExecution, reason: impl Into<String>) -> Result<()> {
        hitl::abort(execution, reason.into())
    }

    async fn run_sequential(
        &self,
        workflow: &Workflow,
        execution: &mut WorkflowExecution,
        start_at: usize,
    ) -> Result<()> {
        let mut skip: HashSet<String> = HashSet::new();

        for (index, step) in workflow.steps.iter().enumerate().skip(start_at) {
            if skip.contains(&step.name) {
                let mut skipped = StepExecution::pending(step.name.clone(), execution.input.clone());
                skipped.skip();
                execution.steps.push(skipped);
                continue;
            }

            let proceed = hitl::run_check(
                self.checker.as_ref(),
                self.approvals.as_ref(),
                step,
                index,
                execution,
            )
            .await?;
            if !proceed {
                return Ok(());
            }

            let prompt_input = execution.input.clone();
            let resolved_parameters = self.template.resolve_parameters(&step.parameters, &prompt_input, execution);
            let resolved_prompt = step
                .prompt
                .as_ref()
                .map(|p| self.template.resolve(p, &prompt_input, execution));

            let mut resolved_step = step.clone();
            resolved_step.parameters = resolved_parameters;
            resolved_step.prompt = resolved_prompt;

            let processor = self
                .processors
                .get(&step.step_type)
                .ok_or_else(|| Error::unknown_step_type(step.step_type.clone()))?;

            let started = Instant::now();
            let mut step_execution = StepExecution::pending(step.name.clone(), prompt_input.clone());

            match processor.process(&resolved_step, &prompt_input, execution).await {
                Ok(output) => {
                    if let Some(untaken) = untaken_branch(step, &output) {
                        skip.insert(untaken);
                    }
                    merge_output(&mut execution.input, &step.name, &output);
                    step_execution.complete(output, started);
                    execution.steps.push(step_execution);
                }
                Err(err) => {
                    step_execution.fail(err.to_string(), started);
                    execution.steps.push(step_execution);
                    execution.mark_failed(format!("step '{}' failed: {err}", step.name));
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    /// Parallel fan-out/fan-in (§4.5 "Parallel mode"): the first N-1
    /// steps run concurrently against a snapshot of `input`; the final
    /// step (usually a synthesizer) runs sequentially after join.
    async fn run_parallel(&self, workflow: &Workflow, execution: &mut WorkflowExecution) -> Result<()> {
        let (group, tail) = workflow.steps.split_at(workflow.steps.len() - 1);
        let snapshot = execution.input.clone();

        let mut futures = Vec::with_capacity(group.len());
        for step in group {
            let proceed = hitl::run_check(self.checker.as_ref(), self.approvals.as_ref(), step, 0, execution).await?;
            if !proceed {
                return Ok(());
            }
            let resolved_parameters = self.template.resolve_parameters(&step.parameters, &snapshot, execution);
            let resolved_prompt = step.prompt.as_ref().map(|p| self.template.resolve(p, &snapshot, execution));
            let mut resolved_step = step.clone();
            resolved_step.parameters = resolved_parameters;
            resolved_step.prompt = resolved_prompt;

            let processor = self
                .processors
                .get(&step.step_type)
                .ok_or_else(|| Error::unknown_step_type(step.step_type.clone()))?;

            let snapshot_input = snapshot.clone();
            let execution_snapshot = execution.clone();
            futures.push(async move {
                let started = Instant::now();
                let result = processor.process(&resolved_step, &snapshot_input, &execution_snapshot).await;
                (step.clone(), started, result)
            });
        }

        let results = join_all(futures).await;

        let total = results.len();
        let mut failed_count = 0;
        let mut critical_failed = 0;
        let mut critical_total = 0;

        for (step, started, result) in results {
            let mut step_execution = StepExecution::pending(step.name.clone(), snapshot.clone());
            if step.critical {
                critical_total += 1;
            }
            match result {
                Ok(output) => {
                    merge_output(&mut execution.input, &step.name, &output);
                    step_execution.complete(output, started);
                }
                Err(err) => {
                    failed_count += 1;
                    if step.critical {
                        critical_failed += 1;
                    }
                    step_execution.fail(err.to_string(), started);
                }
            }
            execution.steps.push(step_execution);
        }

        let all_failed = failed_count == total;
        let all_critical_failed = critical_total > 0 && critical_failed == critical_total;
        if all_failed || all_critical_failed {
            execution.mark_failed("parallel step group failed");
            return Ok(());
        }

        if let Some(final_step) = tail.first() {
            self.run_single_step(workflow, execution, final_step).await?;
        }

        Ok(())
    }

    async fn run_single_step(
        &self,
        _workflow: &Workflow,
        execution: &mut WorkflowExecution,
        step: &crate::step::WorkflowStep,
    ) -> Result<()> {
        let proceed = hitl::run_check(self.checker.as_ref(), self.approvals.as_ref(), step, 0, execution).await?;
        if !proceed {
            return Ok(());
        }

        let prompt_input = execution.input.clone();
        let resolved_parameters = self.template.resolve_parameters(&step.parameters, &prompt_input, execution);
        let resolved_prompt = step.prompt.as_ref().map(|p| self.template.resolve(p, &prompt_input, execution));
        let mut resolved_step = step.clone();
        resolved_step.parameters = resolved_parameters;
        resolved_step.prompt = resolved_prompt;

        let processor = self
            .processors
            .get(&step.step_type)
            .ok_or_else(|| Error::unknown_step_type(step.step_type.clone()))?;

        let started = Instant::now();
        let mut step_execution = StepExecution::pending(step.name.clone(), prompt_input.clone());
        match processor.process(&resolved_step, &prompt_input, execution).await {
            Ok(output) => {
                merge_output(&mut execution.input, &step.name, &output);
                step_execution.complete(output, started);
                execution.steps.push(step_execution);
            }
            Err(err) => {
                step_execution.fail(err.to_string(), started);
                execution.steps.push(step_execution);
                execution.mark_failed(format!("step '{}' failed: {err}", step.name));
            }
        }
        Ok(())
    }

    /// Output template resolution (§4.5): for each `(output_key →
    /// template)` pair, substitute against the final execution state.
    fn resolve_output(&self, workflow: &Workflow, execution: &mut WorkflowExecution) {
        let input_snapshot = execution.input.clone();
        let mut resolved = ValueMap::new();
        for (key, template) in &workflow.output {
            let value = self.template.resolve_output(template, &input_snapshot, execution);
            resolved.insert(key.clone(), Value::String(value));
        }
        execution.output = resolved;
    }
}

/// Merges a step's output into the shared input map under
/// `step_<name>_<k>` keys (§4.5 "On success, merge outputs ...").
fn merge_output(input: &mut ValueMap, step_name: &str, output: &ValueMap) {
    for (key, value) in output {
        input.insert(format!("step_{step_name}_{key}"), value.clone());
    }
}

/// If a just-completed conditional step produced a `branch` field naming
/// the untaken side, return that step name so the caller can mark it
/// skipped rather than executed.
fn untaken_branch(step: &crate::step::WorkflowStep, output: &ValueMap) -> Option<String> {
    if step.step_type != "conditional" {
        return None;
    }
    let taken = output.get("taken")?.as_bool()?;
    let untaken = if taken { step.if_false.clone() } else { step.if_true.clone() };
    untaken
}
