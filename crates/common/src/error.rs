//! Error types for aniseg.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Illegal transition: {0}")]
    IllegalTransition(String),

    #[error("Wrong stage: {0}")]
    WrongStage(String),

    #[error("Unknown status: {0}")]
    UnknownStatus(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // === Server Errors ===
    /// Store I/O fault. The payload is kept for logs only and never rendered.
    #[error("Storage unavailable")]
    StorageUnavailable(String),

    #[error("Storage operation timed out after {0} ms")]
    StoreTimeout(u64),

    /// A write timed out and could not be confirmed either way.
    #[error("Write outcome unknown: {0}")]
    WriteOutcomeUnknown(String),

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
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) | Self::Validation(_) | Self::UnknownStatus(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::IllegalTransition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::WrongStage(_) | Self::Conflict(_) => StatusCode::CONFLICT,

            // 5xx Server Errors
            Self::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::StoreTimeout(_) | Self::WriteOutcomeUnknown(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::IllegalTransition(_) => "ILLEGAL_TRANSITION",
            Self::WrongStage(_) => "WRONG_STAGE",
            Self::UnknownStatus(_) => "UNKNOWN_STATUS",
            Self::Conflict(_) => "CONFLICT",
            Self::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            Self::StoreTimeout(_) => "STORE_TIMEOUT",
            Self::WriteOutcomeUnknown(_) => "WRITE_OUTCOME_UNKNOWN",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Returns whether the caller may retry the same request unchanged.
    ///
    /// Only an expired store read qualifies. A write that may have landed is
    /// reported as [`AppError::WriteOutcomeUnknown`] instead.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreTimeout(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if let Self::StorageUnavailable(detail) = &self {
            tracing::error!(detail = %detail, code = code, "Storage fault");
        } else if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
                "retryable": self.is_retryable(),
            }
        }));

        (status, body).into_response()
    }
}

// === From implementations ===

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

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
