//! Runtime execution state (§3 "WorkflowExecution", "StepExecution").
//!
//! §9 "Cyclic references": rather than wrapping a base execution with an
//! additional HITL header (the source's inheritance shape), every
//! approval-related field lives directly on `WorkflowExecution` as
//! `Option`s that are only ever populated for a paused/resumed execution.

use std::time::Duration;

use chrono::{DateTime, Utc};
use orchestra_core::{UserContext, ValueMap};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepExecution {
    pub name: String,
    pub status: StepStatus,
    pub input: ValueMap,
    #[serde(default)]
    pub output: Option<ValueMap>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(with = "duration_millis", default)]
    pub process_time: Duration,
    #[serde(default)]
    pub error: Option<String>,
}

impl StepExecution {
    pub fn pending(name: impl Into<String>, input: ValueMap) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Pending,
            input,
            output: None,
            start_time: Utc::now(),
            end_time: None,
            process_time: Duration::ZERO,
            error: None,
        }
    }

    pub fn complete(&mut self, output: ValueMap, started: std::time::Instant) {
        self.status = StepStatus::Completed;
        self.output = Some(output);
        self.end_time = Some(Utc::now());
        self.process_time = started.elapsed();
    }

    pub fn fail(&mut self, error: impl Into<String>, started: std::time::Instant) {
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
        self.end_time = Some(Utc::now());
        self.process_time = started.elapsed();
    }

    pub fn skip(&mut self) {
        self.status = StepStatus::Skipped;
        self.end_time = Some(Utc::now());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Paused,
    Completed,
    Failed,
    Aborted,
}

/// A single workflow run. Exclusively owned by the engine for the
/// duration of a call; `steps` is appended to monotonically (§3
/// "Ownership & lifecycle").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: String,
    pub workflow_name: String,
    pub status: ExecutionStatus,
    pub input: ValueMap,
    #[serde(default)]
    pub output: ValueMap,
    #[serde(default)]
    pub steps: Vec<StepExecution>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub user: UserContext,
    #[serde(default)]
    pub error: Option<String>,

    // HITL fields, populated only when a `require_approval` check paused
    // this execution.
    #[serde(default)]
    pub approval_id: Option<String>,
    #[serde(default)]
    pub approval_status: Option<String>,
    #[serde(default)]
    pub paused_at_step: Option<usize>,
    #[serde(default)]
    pub paused_reason: Option<String>,
    #[serde(default)]
    pub resumed_at: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    pub fn new(workflow_name: impl Into<String>, input: ValueMap, user: UserContext) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            workflow_name: workflow_name.into(),
            status: ExecutionStatus::Running,
            input,
            output: ValueMap::new(),
            steps: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
            user,
            error: None,
            approval_id: None,
            approval_status: None,
            paused_at_step: None,
            paused_reason: None,
            resumed_at: None,
        }
    }

    pub fn step(&self, name: &str) -> Option<&StepExecution> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn mark_completed(&mut self) {
        self.status = ExecutionStatus::Completed;
        self.end_time = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = ExecutionStatus::Failed;
        self.error = Some(error.into());
        self.end_time = Some(Utc::now());
    }

    pub fn mark_aborted(&mut self, reason: impl Into<String>) {
        self.status = ExecutionStatus::Aborted;
        self.error = Some(reason.into());
        self.end_time = Some(Utc::now());
    }

    pub fn pause(&mut self, at_step: usize, approval_id: Option<String>, reason: impl Into<String>) {
        self.status = ExecutionStatus::Paused;
        self.paused_at_step = Some(at_step);
        self.approval_id = approval_id;
        self.approval_status = Some("pending".to_string());
        self.paused_reason = Some(reason.into());
    }

    pub fn resume(&mut self) {
        self.status = ExecutionStatus::Running;
        self.resumed_at = Some(Utc::now());
    }
}

mod duration_millis {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
