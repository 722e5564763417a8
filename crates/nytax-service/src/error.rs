//! # Service Error Types
//!
//! Request-level failures.
//!
//! ## Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Condition                      Surfaced as                             │
//! │  ─────────                      ───────────                             │
//! │  Bad single-order input         ServiceError::Validation                │
//! │  Bad import row                 counted in failed_rows, never an error  │
//! │  File already imported          ImportOutcome::AlreadyImported (Ok)     │
//! │  Point outside coverage  ┐      failed OrderTax; for a manual order     │
//! │  County without a rate   ┘      also ServiceError::TaxCalculationFailed │
//! │  Storage erroring               ServiceError::Persistence, rolled back  │
//! │  Joined row missing post-write  ServiceError::ConsistencyViolation      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use nytax_core::ValidationError;
use nytax_db::DbError;
use thiserror::Error;

/// Errors returned by the service layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input rejected before anything was written.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The order was stored with a failed tax record.
    ///
    /// ## When This Occurs
    /// - The delivery point lies outside every county boundary
    /// - The resolved county has no configured rate
    #[error("Tax calculation failed for order {order_id}: {reason}")]
    TaxCalculationFailed { order_id: i64, reason: String },

    /// A requested record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// Storage failed; the request's writes were rolled back.
    #[error("Persistence failure: {0}")]
    Persistence(#[from] DbError),

    /// A write sequence succeeded but its result is not where it should be.
    ///
    /// ## When This Occurs
    /// - The order just written has no joined tax row
    /// - Batch resolution returned a different number of orders than inserted
    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),
}

impl ServiceError {
    pub(crate) fn consistency(message: impl Into<String>) -> Self {
        ServiceError::ConsistencyViolation(message.into())
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
