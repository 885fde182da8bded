use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

/// Error taxonomy for the indexing and retrieval pipeline. Each variant maps to
/// a disposition at the HTTP boundary; internal callers match on the variant
/// directly instead of inspecting status codes.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InputValidation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("embedding failure: {0}")]
    EmbeddingFailure(String),

    #[error("vector store failure: {0}")]
    VectorStoreFailure(String),

    #[error("configuration failure: {0}")]
    ConfigurationFailure(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("registry error: {0}")]
    Registry(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, details) = match &self {
            AppError::InputValidation(_) => (StatusCode::BAD_REQUEST, Some(self.to_string())),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, Some(self.to_string())),
            AppError::EmbeddingFailure(_) => (StatusCode::INTERNAL_SERVER_ERROR, Some(self.to_string())),
            AppError::VectorStoreFailure(_) => (StatusCode::INTERNAL_SERVER_ERROR, Some(self.to_string())),
            AppError::ConfigurationFailure(_) => (StatusCode::INTERNAL_SERVER_ERROR, Some(self.to_string())),
            AppError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, Some(self.to_string())),
            AppError::Serde(_) => (StatusCode::BAD_REQUEST, Some(self.to_string())),
            AppError::Registry(_) => (StatusCode::INTERNAL_SERVER_ERROR, Some(self.to_string())),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };

        let body = json!({
            "error": status.canonical_reason().unwrap_or("error"),
            "details": details,
        });

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
