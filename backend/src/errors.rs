use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use thiserror::Error;
use zk_credentials::{ErrorKind, ZkError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// The request was well formed but the credential does not satisfy the policy.
    #[error("unprocessable: {0}")]
    Unprocessable(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("internal error")]
    Internal,
}

impl From<ZkError> for ApiError {
    fn from(err: ZkError) -> Self {
        match err.kind() {
            ErrorKind::InputValidation => ApiError::BadRequest(err.to_string()),
            ErrorKind::StructuralFailure => ApiError::Conflict(err.to_string()),
            ErrorKind::ConstraintFailure => ApiError::Unprocessable(err.to_string()),
            ErrorKind::Infrastructure => {
                tracing::error!(error = %err, "zk infrastructure failure");
                ApiError::Internal
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            ApiError::Unprocessable(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
            ApiError::Config(_) | ApiError::Internal => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        (status, Json(ErrorBody { error: msg })).into_response()
    }
}
