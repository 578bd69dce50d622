//! Error types for Orchestra

/// Result type alias using Orchestra's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Orchestra operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Policy evaluation errors
    #[error("policy error: {0}")]
    Policy(String),

    /// Workflow execution errors
    #[error("workflow error: {0}")]
    Workflow(String),

    /// Provider routing errors
    #[error("router error: {0}")]
    Router(String),

    /// Redaction/response-processing errors
    #[error("redaction error: {0}")]
    Redaction(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Value coercion failures (e.g. a condition expects a number)
    #[error("coercion error: {0}")]
    Coercion(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Timeout errors
    #[error("operation timed out")]
    Timeout,

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new policy error
    pub fn policy(msg: impl Into<String>) -> Self {
        Self::Policy(msg.into())
    }

    /// Create a new workflow error
    pub fn workflow(msg: impl Into<String>) -> Self {
        Self::Workflow(msg.into())
    }

    /// Create a new router error
    pub fn router(msg: impl Into<String>) -> Self {
        Self::Router(msg.into())
    }

    /// Create a new redaction error
    pub fn redaction(msg: impl Into<String>) -> Self {
        Self::Redaction(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new coercion error
    pub fn coercion(msg: impl Into<String>) -> Self {
        Self::Coercion(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
