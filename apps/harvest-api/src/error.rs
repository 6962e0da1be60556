//! # API Error Type
//!
//! Unified error type for route handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Harvest API                            │
//! │                                                                         │
//! │  Route handler: Result<T, ApiError>                                     │
//! │        │                                                                │
//! │        ├── SyncError::NotAuthenticated ──────────► 401 UNAUTHORIZED     │
//! │        ├── SyncError::TokenExchangeFailed ───────► 400 TOKEN_EXCHANGE   │
//! │        ├── SyncError::SyncInProgress ────────────► 409 SYNC_IN_PROGRESS │
//! │        ├── SyncError::Upstream ──────────────────► 502 UPSTREAM_ERROR   │
//! │        ├── CoreError::UnknownName ───────────────► 400 BAD_REQUEST      │
//! │        ├── DbError::InvalidInput ────────────────► 400 VALIDATION_ERROR │
//! │        └── everything else ──────────────────────► 500                  │
//! │                                                                         │
//! │  Body: { "error": "<message>", "code": "<CODE>" }                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use harvest_core::CoreError;
use harvest_db::DbError;
use harvest_sync::SyncError;
use serde::Serialize;
use thiserror::Error;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Not authenticated with the vendor")]
    Unauthorized,

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("A sync run is already in progress")]
    Conflict,

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Database operation failed")]
    Database,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) | ApiError::TokenExchange(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Database | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::TokenExchange(_) => "TOKEN_EXCHANGE_FAILED",
            ApiError::Conflict => "SYNC_IN_PROGRESS",
            ApiError::Upstream(_) => "UPSTREAM_ERROR",
            ApiError::Database => "DATABASE_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code(),
        };
        (self.status(), Json(body)).into_response()
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} not found: {}", entity, id))
            }
            DbError::InvalidInput(message) => ApiError::Validation(message),
            DbError::UniqueViolation { field, value } => {
                ApiError::Validation(format!("{} '{}' already exists", field, value))
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::Validation("Invalid reference".to_string())
            }
            other => {
                // Log the actual error but return a generic message
                tracing::error!(error = %other, "Database operation failed");
                ApiError::Database
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnknownName { .. } => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Converts sync errors to API errors.
impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::NotAuthenticated => ApiError::Unauthorized,
            SyncError::TokenExchangeFailed(message) => ApiError::TokenExchange(message),
            SyncError::SyncInProgress => ApiError::Conflict,
            SyncError::Upstream(e) => ApiError::Upstream(e.to_string()),
            SyncError::Core(e) => e.into(),
            SyncError::Database(e) => e.into(),
            other => {
                tracing::error!(error = %other, "Request failed");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_sync::UpstreamError;

    #[test]
    fn test_sync_error_status_mapping() {
        let cases = [
            (SyncError::NotAuthenticated, StatusCode::UNAUTHORIZED),
            (SyncError::SyncInProgress, StatusCode::CONFLICT),
            (
                SyncError::TokenExchangeFailed("HTTP 400: invalid_grant".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                SyncError::Upstream(UpstreamError::new(503, "down")),
                StatusCode::BAD_GATEWAY,
            ),
            (
                SyncError::Database(DbError::PoolExhausted),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_unknown_names_are_bad_requests() {
        let err = ApiError::from(CoreError::unknown("table", "tractors"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "BAD_REQUEST");
    }

    #[test]
    fn test_invalid_input_is_validation() {
        let err = ApiError::from(DbError::InvalidInput("product name is required".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "product name is required");
    }
}
