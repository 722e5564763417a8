//! # CLI Error Types
//!
//! [`ApiError`] is what a failed command prints: a machine-readable code
//! and a human-readable message.
//!
//! ## Code Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ServiceError                    ErrorCode                 exit         │
//! │  ────────────                    ─────────                 ────         │
//! │  Validation                 ──►  VALIDATION_ERROR (400)     2           │
//! │  NotFound                   ──►  NOT_FOUND (404)            2           │
//! │  TaxCalculationFailed       ──►  TAX_CALCULATION_FAILED     2           │
//! │                                  (422)                                  │
//! │  Persistence                ──►  SERVICE_UNAVAILABLE (503)  1           │
//! │  Persistence(CorruptRow)    ──►  INTERNAL (500)             1           │
//! │  Persistence(Check/FK)      ──►  INTERNAL (500)             1           │
//! │  ConsistencyViolation       ──►  INTERNAL (500)             1           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Server-side failures are logged in full; the printed message stays
//! generic.

use std::path::PathBuf;

use nytax_core::CoreError;
use nytax_db::DbError;
use nytax_service::ServiceError;
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;

/// Error printed by a failed command.
///
/// ```json
/// { "code": "TAX_CALCULATION_FAILED",
///   "message": "point outside jurisdiction boundaries",
///   "order_id": 12 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// The stored order, for a rejected manual order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i64>,
}

/// Error codes for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed (400)
    ValidationError,

    /// Resource not found (404)
    NotFound,

    /// Order stored with a failed tax (422)
    TaxCalculationFailed,

    /// Storage unavailable (503)
    ServiceUnavailable,

    /// Internal invariant broken (500)
    Internal,
}

impl ErrorCode {
    /// HTTP-equivalent status.
    pub const fn status(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 400,
            ErrorCode::NotFound => 404,
            ErrorCode::TaxCalculationFailed => 422,
            ErrorCode::ServiceUnavailable => 503,
            ErrorCode::Internal => 500,
        }
    }

    /// True when the caller's input caused the failure.
    pub const fn is_client_error(&self) -> bool {
        self.status() < 500
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            order_id: None,
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(e) => ApiError::validation(e.to_string()),
            ServiceError::NotFound { entity, id } => {
                ApiError::new(ErrorCode::NotFound, format!("{entity} not found: {id}"))
            }
            ServiceError::TaxCalculationFailed { order_id, reason } => ApiError {
                code: ErrorCode::TaxCalculationFailed,
                message: reason,
                order_id: Some(order_id),
            },
            ServiceError::Persistence(e) => ApiError::from(e),
            ServiceError::ConsistencyViolation(message) => {
                tracing::error!("Consistency violation: {}", message);
                ApiError::internal("Internal consistency error")
            }
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::CorruptRow { .. } => {
                tracing::error!("Stored data is corrupt: {}", err);
                ApiError::internal("Stored data is corrupt")
            }
            // Validation runs before any write, so a constraint failure is a bug.
            DbError::CheckViolation(_) | DbError::ForeignKeyViolation(_) => {
                tracing::error!("Write rejected by schema: {}", err);
                ApiError::internal("Write rejected by schema")
            }
            other => {
                tracing::error!("Database operation failed: {}", other);
                ApiError::new(ErrorCode::ServiceUnavailable, "Storage unavailable")
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Failures while building the application state. Always fatal.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid document {path}: {source}")]
    Document { path: PathBuf, source: CoreError },

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}
