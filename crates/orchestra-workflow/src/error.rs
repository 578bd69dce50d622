//! Error taxonomy for workflow execution (§7).

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("missing required field: {0}")]
    InvalidInput(String),

    #[error("unknown step type: {0}")]
    UnknownStepType(String),

    #[error("blocked by policy: {policy} ({reason})")]
    BlockedByPolicy { policy: String, reason: String },

    #[error("step failed: {0}")]
    StepFailed(String),

    #[error("execution is not paused")]
    NotPaused,

    #[error("approval not granted: {0}")]
    NotApproved(String),

    #[error("execution not found")]
    NotFound,

    #[error(transparent)]
    Router(#[from] orchestra_router::Error),

    #[error(transparent)]
    Core(#[from] orchestra_core::Error),
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn unknown_step_type(type_name: impl Into<String>) -> Self {
        Self::UnknownStepType(type_name.into())
    }

    pub fn blocked(policy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BlockedByPolicy {
            policy: policy.into(),
            reason: reason.into(),
        }
    }

    pub fn step_failed(msg: impl Into<String>) -> Self {
        Self::StepFailed(msg.into())
    }
}
