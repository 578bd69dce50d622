//! Error types for orchestra-router

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no healthy provider available")]
    NoHealthyProvider,

    #[error("all providers failed")]
    AllProvidersFailed,

    #[error("provider error: {0}")]
    Provider(String),

    #[error("invalid provider weights: {0}")]
    InvalidWeights(String),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn invalid_weights(msg: impl Into<String>) -> Self {
        Self::InvalidWeights(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
