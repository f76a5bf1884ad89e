//! Error types for the routing service
//!
//! Provides:
//! - Distinct error types for each failure mode of the routing workflow
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,

    // Authentication errors (2xxx)
    Unauthorized,

    // Authorization errors (3xxx)
    Forbidden,

    // Resource errors (4xxx)
    NotFound,

    // State errors (5xxx)
    InvalidState,

    // Database / storage errors (7xxx)
    DatabaseError,
    StorageError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::Unauthorized => 2001,
            ErrorCode::Forbidden => 3001,
            ErrorCode::NotFound => 4001,
            ErrorCode::InvalidState => 5001,
            ErrorCode::DatabaseError => 7001,
            ErrorCode::StorageError => 7002,
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors: malformed or missing input, rejected before any mutation
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    // Authorization errors
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    // Resource errors
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    // State errors: entity exists but is not in the state the operation requires
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    // File storage errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a validation error without a field reference
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Shorthand for a forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden {
            message: message.into(),
        }
    }

    /// Shorthand for an invalid-state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        AppError::InvalidState {
            message: message.into(),
        }
    }

    /// Shorthand for a not-found error
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        AppError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::Forbidden { .. } => ErrorCode::Forbidden,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::InvalidState { .. } => ErrorCode::InvalidState,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::Storage { .. } => ErrorCode::StorageError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::InvalidState { .. } => StatusCode::CONFLICT,
            AppError::Database(_)
            | AppError::Storage { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for the API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    /// Numeric form of `code`, stable for client dispatch
    pub error_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let field = match self {
            AppError::Validation { field, .. } => field,
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                error_code: code.as_code(),
                message,
                field,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::not_found("schedule", "abc");
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.code().as_code(), 4001);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        assert_eq!(ErrorCode::ValidationError.as_code(), 1001);
        assert_eq!(ErrorCode::InvalidState.as_code(), 5001);
        assert_eq!(ErrorCode::DatabaseError.as_code(), 7001);
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "Reviewers must be unique".into(),
            field: Some("reviewer_ids".into()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_invalid_state_is_conflict() {
        let err = AppError::invalid_state("Thesis is not pending archive approval");
        assert_eq!(err.code(), ErrorCode::InvalidState);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_server_error() {
        let err = AppError::Internal {
            message: "Something went wrong".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
    }
}
