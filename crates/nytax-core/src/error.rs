//! # Error Types
//!
//! Domain-specific error types for nytax-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  nytax-core errors (this file)                                         │
//! │  ├── CoreError        - General domain errors                          │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  ├── RateTableError   - Fatal rate table loading failures              │
//! │  └── BoundaryError    - Boundary document failures                     │
//! │                                                                         │
//! │  nytax-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  nytax-service errors (separate crate)                                 │
//! │  └── ServiceError     - Request-level failures                         │
//! │                                                                         │
//! │  Flow: ValidationError → ServiceError → ApiError → CLI output          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Points outside coverage and counties without a configured rate are NOT
//! errors here. They become failed tax records (see [`crate::calculator`]).

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Rate table could not be loaded.
    #[error("Rate table error: {0}")]
    RateTable(#[from] RateTableError),

    /// Boundary document could not be loaded.
    #[error("Boundary error: {0}")]
    Boundary(#[from] BoundaryError),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// A single order failing validation is rejected outright. A bulk import row
/// failing validation is dropped and counted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Value is larger than storage and tax arithmetic support.
    #[error("{field} must not exceed {max}")]
    TooLarge { field: String, max: String },

    /// Invalid format (e.g., unparsable number, invalid timestamp).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    pub(crate) fn invalid_format(field: &str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Rate Table Error
// =============================================================================

/// Rate table loading errors.
///
/// Any of these is fatal at startup. There is no partially loaded table.
#[derive(Debug, Error)]
pub enum RateTableError {
    /// The document is not valid JSON.
    #[error("rate table is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A required key is absent.
    #[error("rate table is missing required key '{key}'")]
    MissingKey { key: String },

    /// A rate is present but not a number.
    #[error("rate table value at '{key}' is not numeric: {value}")]
    NotNumeric { key: String, value: String },

    /// A rate is negative.
    #[error("rate table value at '{key}' must not be negative")]
    NegativeRate { key: String },

    /// A section has the wrong shape.
    #[error("rate table entry at '{key}' is malformed: {reason}")]
    Malformed { key: String, reason: String },
}

// =============================================================================
// Boundary Error
// =============================================================================

/// Boundary (GeoJSON) loading errors.
#[derive(Debug, Error)]
pub enum BoundaryError {
    /// The document is not valid JSON.
    #[error("boundary document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The document is not a FeatureCollection.
    #[error("boundary document must be a GeoJSON FeatureCollection")]
    NotFeatureCollection,

    /// A feature has no usable name property.
    #[error("feature {index} has no NAME or name property")]
    MissingName { index: usize },

    /// A feature's geometry cannot be used.
    #[error("feature {index} has invalid geometry: {reason}")]
    InvalidGeometry { index: usize, reason: String },
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "latitude".to_string(),
        };
        assert_eq!(err.to_string(), "latitude is required");

        let err = ValidationError::OutOfRange {
            field: "latitude".to_string(),
            min: -90,
            max: 90,
        };
        assert_eq!(err.to_string(), "latitude must be between -90 and 90");
    }

    #[test]
    fn test_rate_table_error_messages() {
        let err = RateTableError::MissingKey {
            key: "consts.state_rate".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "rate table is missing required key 'consts.state_rate'"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Negative {
            field: "subtotal".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
