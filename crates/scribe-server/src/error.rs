//! API error types and JSON error response formatting.
//!
//! Every failure leaves the server as a fixed, generic message. Internal
//! detail is logged by the handler before it gets here.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

pub const NO_QUESTION: &str = "No question provided";
pub const NOT_READY: &str = "Server is not ready, initialization failed.";
pub const PROCESSING_FAILED: &str = "Failed to process the request";

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - the caller sent no usable question.
    BadRequest(String),
    /// 500 Internal Server Error - retrieval or generation failed.
    Internal(String),
    /// 503 Service Unavailable - the pipeline could not be initialized.
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn no_question() -> Self {
        ApiError::BadRequest(NO_QUESTION.to_string())
    }

    pub fn not_ready() -> Self {
        ApiError::ServiceUnavailable(NOT_READY.to_string())
    }

    pub fn processing_failed() -> Self {
        ApiError::Internal(PROCESSING_FAILED.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
