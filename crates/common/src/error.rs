//! Error types for agora.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};
use serde_json::json;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
///
/// Every engine operation fails with exactly one of these kinds; callers
/// decide what to show the end user.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors ===
    /// Unknown vote, choice or member reference.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input: empty question, no choices, foreign choice id.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation not legal for the vote's current lifecycle state.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Caller is not allowed to act on this vote (e.g. not a committee member).
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// No caller identity was supplied.
    #[error("Unauthorized")]
    Unauthorized,

    /// Lost a race on a lifecycle flip or a uniqueness constraint.
    #[error("Conflict: {0}")]
    Conflict(String),

    // === Server Errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // 4xx Client Errors
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::IllegalState(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,

            // 5xx Server Errors
            Self::Database(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::IllegalState(_) => "ILLEGAL_STATE",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Whether the failed operation may succeed when repeated as a whole.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

// === From implementations ===

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => Self::Conflict(detail),
            _ if is_lock_contention(&err) => Self::Conflict(err.to_string()),
            _ => Self::Database(err.to_string()),
        }
    }
}

/// Transient failures caused by a competing transaction: `SQLite` busy or
/// locked, `PostgreSQL` deadlock or serialization failure.
fn is_lock_contention(err: &DbErr) -> bool {
    let message = err.to_string();
    [
        "database is locked",
        "database table is locked",
        "(code: 5)",
        "(code: 6)",
        "(code: 517)",
        "deadlock detected",
        "could not serialize access",
    ]
    .iter()
    .any(|needle| message.contains(needle))
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_error_kind() {
        assert_eq!(
            AppError::Validation("empty question".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::IllegalState("vote has ended".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Forbidden("not a member".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::NotFound("vote".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Database("down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_codes_distinguish_state_from_conflict() {
        assert_eq!(AppError::IllegalState(String::new()).error_code(), "ILLEGAL_STATE");
        assert_eq!(AppError::Conflict(String::new()).error_code(), "CONFLICT");
    }

    #[test]
    fn test_only_conflicts_are_retryable() {
        assert!(AppError::Conflict("race".into()).is_retryable());
        assert!(!AppError::IllegalState("ended".into()).is_retryable());
        assert!(!AppError::Database("io".into()).is_retryable());
    }

    #[test]
    fn test_plain_db_error_maps_to_database() {
        let err: AppError = DbErr::Custom("boom".to_string()).into();
        assert!(matches!(err, AppError::Database(_)));
        assert!(err.is_server_error());
    }

    #[test]
    fn test_lock_contention_maps_to_retryable_conflict() {
        let busy: AppError = DbErr::Custom(
            "error returned from database: (code: 5) database is locked".to_string(),
        )
        .into();
        assert!(matches!(busy, AppError::Conflict(_)));
        assert!(busy.is_retryable());
        assert!(!busy.is_server_error());

        let deadlock: AppError = DbErr::Custom("deadlock detected".to_string()).into();
        assert!(deadlock.is_retryable());
    }
}
