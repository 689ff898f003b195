//! Error translation for HTTP handlers.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

/// Handler error. `Status` carries its own status and payload; anything else is a generic 500.
#[derive(Debug)]
pub enum ApiError {
    Status { status: StatusCode, payload: Value },
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn status(status: StatusCode, payload: Value) -> Self {
        Self::Status { status, payload }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::status(StatusCode::BAD_REQUEST, json!({ "error": message }))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Status { status, payload } => (status, Json(payload)).into_response(),
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "unhandled handler error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal Server Error" })),
                )
                    .into_response()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::status(
            StatusCode::BAD_REQUEST,
            json!({ "error": "Invalid JSON body", "details": rejection.body_text() }),
        )
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e)
    }
}
