use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use json_depot_api::api::{CommandFailureBody, Envelope, ErrorBody};

use crate::process::ExecError;
use crate::store::StoreError;

/// Failure of a request handler, rendered as a `{"success": false, ...}` envelope.
#[derive(Debug)]
pub enum ApiError {
    /// Bad client input: 400.
    Validation(String),
    /// 404.
    NotFound(String),
    /// The command ran (or tried to) but did not succeed: 500 with its output.
    Execution { error: ExecError, command: String },
    /// Anything else: 500.
    Internal(String),
}

impl ApiError {
    pub fn internal(error: impl std::fmt::Display) -> Self {
        ApiError::Internal(error.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::InvalidSplit(_) | StoreError::InvalidSplitCount(_) => {
                ApiError::Validation(error.to_string())
            }
            StoreError::NotFound { .. } => ApiError::NotFound(error.to_string()),
            _ => ApiError::internal(error),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::Validation(error) => (StatusCode::BAD_REQUEST, error),
            ApiError::NotFound(error) => (StatusCode::NOT_FOUND, error),
            ApiError::Internal(error) => {
                log::error!("internal error: {error}");
                (StatusCode::INTERNAL_SERVER_ERROR, error)
            }
            ApiError::Execution { error, command } => {
                let output = error.output().cloned().unwrap_or_default();
                let body = CommandFailureBody {
                    error: error.to_string(),
                    stdout: output.stdout,
                    stderr: output.stderr,
                    command,
                };
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(Envelope::failed(body)),
                )
                    .into_response();
            }
        };
        (status, Json(Envelope::failed(ErrorBody { error }))).into_response()
    }
}

/// Last resort for handlers that panicked, used with `CatchPanicLayer`.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        String::from("Internal server error")
    };
    ApiError::Internal(message).into_response()
}
