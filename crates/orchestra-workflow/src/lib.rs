//! Workflow execution engine: template resolution, sequential and
//! fan-out/fan-in parallel step execution, a human-in-the-loop
//! pause/resume/abort state machine, and cross-step result synthesis.

pub mod aggregator;
pub mod engine;
pub mod error;
pub mod execution;
pub mod hitl;
pub mod processor;
pub mod step;
pub mod store;
pub mod template;

pub use aggregator::{AggregationStats, ResultAggregator};
pub use engine::WorkflowEngine;
pub use error::{Error, Result};
pub use execution::{ExecutionStatus, StepExecution, StepStatus, WorkflowExecution};
pub use hitl::{ApprovalService, ApprovalStatus, CheckVerdict, NullPolicyChecker, PolicyChecker};
pub use processor::{
    Connector, ConditionalStepProcessor, ConnectorStepProcessor, FunctionStepProcessor, LlmStepProcessor,
    StepFunction, StepProcessor, StepProcessorRegistry, SynthesizerStepProcessor,
};
pub use step::{StepRole, Workflow, WorkflowStep};
pub use store::{ExecutionStore, InMemoryExecutionStore};
pub use template::TemplateResolver;

pub mod prelude {
    pub use crate::engine::WorkflowEngine;
    pub use crate::error::{Error, Result};
    pub use crate::execution::{ExecutionStatus, StepExecution, StepStatus, WorkflowExecution};
    pub use crate::hitl::{ApprovalService, CheckVerdict, PolicyChecker};
    pub use crate::processor::{StepProcessor, StepProcessorRegistry};
    pub use crate::step::{Workflow, WorkflowStep};
}
