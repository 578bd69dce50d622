//! Maps library error taxonomies onto HTTP status codes (§7) through a
//! single `AppError` union, the same shape used elsewhere in this
//! codebase for collapsing library errors to axum responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Workflow(#[from] orchestra_workflow::Error),

    #[error(transparent)]
    Router(#[from] orchestra_router::Error),

    #[error(transparent)]
    Core(#[from] orchestra_core::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Workflow(orchestra_workflow::Error::UnknownStepType(_)) => StatusCode::BAD_REQUEST,
            AppError::Workflow(orchestra_workflow::Error::BlockedByPolicy { .. }) => StatusCode::FORBIDDEN,
            AppError::Workflow(orchestra_workflow::Error::NotPaused) => StatusCode::CONFLICT,
            AppError::Workflow(orchestra_workflow::Error::NotApproved(_)) => StatusCode::CONFLICT,
            AppError::Workflow(orchestra_workflow::Error::NotFound) => StatusCode::NOT_FOUND,
            AppError::Router(orchestra_router::Error::NoHealthyProvider) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Router(orchestra_router::Error::AllProvidersFailed) => StatusCode::BAD_GATEWAY,
            AppError::Core(_) | AppError::Workflow(_) | AppError::Router(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({
            "error": {
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}
