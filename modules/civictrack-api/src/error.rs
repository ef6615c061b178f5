//! Mapping of core errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::error;

use civictrack_common::CivicError;

#[derive(Debug)]
pub enum ApiError {
    Civic(CivicError),
    /// Missing, malformed or expired credentials.
    Unauthorized(&'static str),
    /// Authenticated but not allowed.
    Forbidden(&'static str),
    /// Request body could not be read at all.
    BadRequest(String),
}

impl From<CivicError> for ApiError {
    fn from(err: CivicError) -> Self {
        ApiError::Civic(err)
    }
}

impl From<civictrack_store::StoreError> for ApiError {
    fn from(err: civictrack_store::StoreError) -> Self {
        ApiError::Civic(err.into())
    }
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Civic(CivicError::Validation(errors)) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "errors": errors }))).into_response()
            }
            ApiError::Civic(CivicError::NotFound(_)) => {
                error_body(StatusCode::NOT_FOUND, "Issue not found")
            }
            ApiError::Civic(CivicError::UserNotFound(_)) => {
                error_body(StatusCode::NOT_FOUND, "User not found")
            }
            ApiError::Civic(CivicError::AlreadyFlagged { .. }) => {
                error_body(StatusCode::CONFLICT, "Issue already flagged by user")
            }
            ApiError::Civic(CivicError::Store(source)) => {
                error!(error = %source, "Store failure");
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            ApiError::Unauthorized(message) => error_body(StatusCode::UNAUTHORIZED, message),
            ApiError::Forbidden(message) => error_body(StatusCode::FORBIDDEN, message),
            ApiError::BadRequest(message) => error_body(StatusCode::BAD_REQUEST, &message),
        }
    }
}
