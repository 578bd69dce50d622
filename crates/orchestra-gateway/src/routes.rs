//! The gateway HTTP surface (§6 "Gateway HTTP surface"): `POST
//! /v1/requests`, `POST /v1/workflows/{name}/execute`, `POST
//! /v1/executions/{id}/resume`, `POST /v1/executions/{id}/abort`, `GET
//! /v1/executions/{id}`, `GET /health`, `GET /metrics`.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use orchestra_core::{value_map, PolicyInfo, Request, Response, UserContext, Value, ValueMap};
use orchestra_workflow::{ApprovalStatus, ExecutionStore, WorkflowExecution};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AppError;
use crate::security::{self, ServiceSecret};
use crate::state::AppState;

/// `/health` and `/metrics` stay open so orchestration tooling (load
/// balancer probes, scrape jobs) never needs the service secret; every
/// `/v1/*` endpoint is gated by it when one is configured.
pub fn create_router(state: AppState, secret: ServiceSecret) -> Router {
    let protected = Router::new()
        .route("/v1/requests", post(submit_request))
        .route("/v1/workflows/:name/execute", post(execute_workflow))
        .route("/v1/executions/:id", get(get_execution))
        .route("/v1/executions/:id/resume", post(resume_execution))
        .route("/v1/executions/:id/abort", post(abort_execution))
        .route("/v1/approvals/:id", post(resolve_approval))
        .route_layer(axum::middleware::from_fn_with_state(secret, security::require_service_secret));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .merge(protected)
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

/// Renders the installed Prometheus recorder's exposition text (§10
/// "Metrics") alongside the in-process `MetricsCollector` JSON summary,
/// the way the source keeps a dashboard-facing aggregate next to the
/// scrape-facing histogram/counter surface.
async fn metrics(State(state): State<AppState>) -> String {
    state.prometheus_handle.render()
}

/// `POST /v1/requests`: runs `Request` through the policy engine and,
/// when `context.workflow` names a registered workflow, the workflow
/// engine too.
async fn submit_request(State(state): State<AppState>, Json(request): Json<Request>) -> Result<Json<Response>, AppError> {
    let started = Instant::now();
    let evaluation = state.policy_engine.evaluate(&request);

    state
        .metrics
        .record_request(&request.request_type, evaluation.risk_score, started.elapsed().as_micros() as u64);
    state.metrics.record_policy_decision(evaluation.allowed || evaluation.requires_approval);

    let policy_info = PolicyInfo {
        applied_policies: evaluation.applied_policies.clone(),
        risk_score: evaluation.risk_score,
        processing_time_ms: evaluation.processing_time_ms,
    };

    if !evaluation.allowed && !evaluation.requires_approval {
        let reason = evaluation
            .required_actions
            .iter()
            .find_map(|a| a.strip_prefix("blocked: "))
            .unwrap_or("blocked by policy")
            .to_string();
        warn!(request_id = %request.request_id, reason = %reason, "request blocked by policy");
        return Ok(Json(Response::blocked(request.request_id.clone(), reason, policy_info)));
    }

    let workflow_name = match request.context.get("workflow") {
        Some(Value::String(name)) => Some(name.clone()),
        _ => None,
    };

    let data = if let Some(name) = workflow_name {
        let workflow = state
            .workflows
            .get(&name)
            .ok_or_else(|| AppError::InvalidInput(format!("unknown workflow: {name}")))?;
        let input = value_map([("query", Value::String(request.query.clone()))]);
        let execution = state.workflow_engine.execute(workflow, input, request.user.clone()).await?;
        let (redacted, _info) = state
            .redaction
            .process(&Value::Map(execution.output.clone()), &request.user, &evaluation.redact_fields);
        state.execution_store.put(execution).await;
        redacted
    } else {
        let (response, provider_info) = state.router.route(&request).await?;
        state.metrics.record_provider_call(&provider_info.name, true, started.elapsed().as_micros() as u64);
        let (redacted, _info) = state.redaction.process(&response.data, &request.user, &evaluation.redact_fields);
        redacted
    };

    Ok(Json(Response::ok(
        request.request_id,
        data,
        policy_info,
        started.elapsed().as_millis() as u64,
    )))
}

#[derive(Debug, Deserialize)]
struct ExecuteWorkflowBody {
    #[serde(default)]
    input: ValueMap,
    user: UserContext,
}

#[derive(Debug, Serialize)]
struct ExecuteWorkflowResponse {
    execution: WorkflowExecution,
}

async fn execute_workflow(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<ExecuteWorkflowBody>,
) -> Result<Json<ExecuteWorkflowResponse>, AppError> {
    let workflow = state
        .workflows
        .get(&name)
        .ok_or_else(|| AppError::InvalidInput(format!("unknown workflow: {name}")))?;

    let execution = state.workflow_engine.execute(workflow, body.input, body.user).await?;
    info!(execution_id = %execution.id, workflow = %name, status = ?execution.status, "workflow execution finished");
    state.execution_store.put(execution.clone()).await;
    Ok(Json(ExecuteWorkflowResponse { execution }))
}

async fn get_execution(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<WorkflowExecution>, AppError> {
    let execution = state.execution_store.get(&id).await?;
    Ok(Json(execution))
}

#[derive(Debug, Deserialize)]
struct ResumeBody {
    workflow_name: Option<String>,
}

async fn resume_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ResumeBody>>,
) -> Result<Json<WorkflowExecution>, AppError> {
    let mut execution = state.execution_store.get(&id).await?;

    let workflow_name = body
        .and_then(|b| b.0.workflow_name)
        .unwrap_or_else(|| execution.workflow_name.clone());
    let workflow = state
        .workflows
        .get(&workflow_name)
        .ok_or_else(|| AppError::InvalidInput(format!("unknown workflow: {workflow_name}")))?;

    state.workflow_engine.resume(workflow, &mut execution).await?;
    state.execution_store.put(execution.clone()).await;
    Ok(Json(execution))
}

#[derive(Debug, Deserialize)]
struct AbortBody {
    reason: String,
}

async fn abort_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AbortBody>,
) -> Result<Json<WorkflowExecution>, AppError> {
    let mut execution = state.execution_store.get(&id).await?;
    state.workflow_engine.abort(&mut execution, body.reason)?;
    state.execution_store.put(execution.clone()).await;
    Ok(Json(execution))
}

#[derive(Debug, Deserialize)]
struct ResolveApprovalBody {
    status: ApprovalStatusWire,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ApprovalStatusWire {
    Approved,
    Rejected,
    Overridden,
    Expired,
}

/// Stands in for an external human-approval system (§6 "HITL approval
/// records" are read, not defined, by the core) so `Resume` has
/// something to poll against in this self-contained deployment.
async fn resolve_approval(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ResolveApprovalBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let status = match body.status {
        ApprovalStatusWire::Approved => ApprovalStatus::Approved,
        ApprovalStatusWire::Rejected => ApprovalStatus::Rejected,
        ApprovalStatusWire::Overridden => ApprovalStatus::Overridden,
        ApprovalStatusWire::Expired => ApprovalStatus::Expired,
    };
    let found = state.approvals.resolve(&id, status);
    if !found {
        return Err(AppError::InvalidInput(format!("unknown approval: {id}")));
    }
    Ok(Json(serde_json::json!({ "approval_id": id, "resolved": true })))
}
