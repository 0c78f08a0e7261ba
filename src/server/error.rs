//! Mapping of service errors onto HTTP responses.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::generator::{GenerationFailure, ValidationError};
use crate::service::WorkflowStage;
use crate::storage::StorageError;

#[derive(Debug)]
pub enum ApiError {
    /// Rejected input; nothing was attempted.
    BadRequest(String),
    NotFound(String),
    /// Every attempt failed.
    Generation {
        failure: GenerationFailure,
        stage: Option<WorkflowStage>,
    },
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Generation { .. } | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidPath(_)
            | StorageError::UnknownMediaType(_)
            | StorageError::UnsupportedFile(_) => ApiError::BadRequest(err.to_string()),
            StorageError::NotFound(_) => ApiError::NotFound(err.to_string()),
            StorageError::Io { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest(error) | ApiError::NotFound(error) | ApiError::Internal(error) => {
                if status.is_server_error() {
                    log::error!("{}", error);
                } else {
                    log::warn!("{}", error);
                }
                json!({ "error": error })
            }
            ApiError::Generation { failure, stage } => {
                log::error!("Generation failed: {}", failure.error);
                let mut body = json!({
                    "error": failure.error,
                    "previous_errors": failure.previous_errors,
                });
                if let Some(generator) = failure.generator {
                    body["generator"] = json!(generator);
                }
                if let Some(stage) = stage {
                    body["stage"] = json!(stage);
                }
                body
            }
        };
        (status, Json(body)).into_response()
    }
}
