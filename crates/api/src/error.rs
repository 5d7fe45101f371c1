use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::stores::CodeError;

pub enum AppError {
    /// Internal errors - logged but return generic 500 to user
    Internal(anyhow::Error),
    /// User-facing errors - message is safe to show
    External(StatusCode, &'static str),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Internal(err) => {
                tracing::error!("internal error: {:?}", err);

                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::External(status, msg) => (status, msg.to_string()),
        };

        let body = serde_json::json!({ "message": message });

        (status, Json(body)).into_response()
    }
}

/// Every verification failure is the client's to fix by retrying or
/// requesting a new code.
impl From<CodeError> for AppError {
    fn from(err: CodeError) -> Self {
        AppError::External(StatusCode::BAD_REQUEST, err.message())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}
