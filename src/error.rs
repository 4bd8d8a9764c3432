//! HTTP-facing error type shared by all route handlers.
//!
//! Every variant maps to one status code and renders as
//! `{"error": "<message>"}`. Database failures are logged with their cause
//! and reported to the client without it.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde_json::json;

use crate::models::ValidationError;
use crate::stats::RangeError;

// ---

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Authentication failed: {0}")]
    Unauthorized(&'static str),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<RangeError> for ApiError {
    fn from(err: RangeError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let message = match &self {
            ApiError::Database(e) => {
                tracing::error!("{}", e);
                "Internal server error".to_string()
            }
            ApiError::Unauthorized(reason) => {
                tracing::warn!("Rejected device request: {}", reason);
                self.to_string()
            }
            other => other.to_string(),
        };

        (self.status(), Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_status_codes() {
        // ---
        assert_eq!(
            ApiError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthorized("no token").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::NotFound("Device 'x'".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Database(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_conversions_are_bad_requests() {
        // ---
        let err: ApiError = RangeError::UnknownPeriod("decade".into()).into();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m.contains("decade")));

        let err: ApiError = ValidationError {
            field: "speed",
            reason: "must not be negative".into(),
        }
        .into();
        assert_eq!(err.to_string(), "speed: must not be negative");
    }

    #[test]
    fn test_response_status() {
        // ---
        let response = ApiError::NotFound("GPS record 7".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ApiError::Database(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
