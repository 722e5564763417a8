//! # Validation Module
//!
//! Input validation for orders, import rows and list queries.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Text decoding (CSV cell / CLI argument)                      │
//! │  ├── parse_* helpers: number and timestamp formats                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE: range rules                                     │
//! │  ├── latitude ∈ [-90, 90], longitude ∈ [-180, 180]                     │
//! │  ├── subtotal ≥ 0                                                       │
//! │  └── limit ∈ [1, 200], offset ≥ 0                                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints on coordinates and status                       │
//! │  └── UNIQUE content hash, 1:1 order ↔ tax                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use nytax_core::validation::{validate_latitude, parse_timestamp};
//!
//! validate_latitude(40.7128).unwrap();
//! let ts = parse_timestamp("2025-11-04T10:17:04Z").unwrap();
//! assert_eq!(ts.to_rfc3339(), "2025-11-04T10:17:04+00:00");
//! ```

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::types::NewOrder;
use crate::MAX_PAGE_LIMIT;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Range Validators
// =============================================================================

/// Validates a latitude in degrees.
///
/// ## Example
/// ```rust
/// use nytax_core::validation::validate_latitude;
///
/// assert!(validate_latitude(90.0).is_ok());
/// assert!(validate_latitude(90.0001).is_err());
/// assert!(validate_latitude(f64::NAN).is_err());
/// ```
pub fn validate_latitude(latitude: f64) -> ValidationResult<()> {
    validate_degrees("latitude", latitude, 90)
}

/// Validates a longitude in degrees.
pub fn validate_longitude(longitude: f64) -> ValidationResult<()> {
    validate_degrees("longitude", longitude, 180)
}

fn validate_degrees(field: &str, value: f64, limit: i64) -> ValidationResult<()> {
    // NaN fails both comparisons, so it lands here too.
    if !(value >= -(limit as f64) && value <= limit as f64) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: -limit,
            max: limit,
        });
    }
    Ok(())
}

/// Largest accepted subtotal: ten digits with two decimals.
pub const MAX_SUBTOTAL: Decimal = Decimal::from_parts(0x540B_E3FF, 2, 0, false, 2); // 99_999_999.99

/// Validates an order subtotal.
///
/// Zero is allowed; negative values and values above [`MAX_SUBTOTAL`] are
/// not.
pub fn validate_subtotal(subtotal: Decimal) -> ValidationResult<()> {
    if subtotal.is_sign_negative() && !subtotal.is_zero() {
        return Err(ValidationError::Negative {
            field: "subtotal".to_string(),
        });
    }
    if subtotal > MAX_SUBTOTAL {
        return Err(ValidationError::TooLarge {
            field: "subtotal".to_string(),
            max: MAX_SUBTOTAL.to_string(),
        });
    }
    Ok(())
}

/// Validates every field of a new order.
pub fn validate_new_order(order: &NewOrder) -> ValidationResult<()> {
    validate_latitude(order.latitude)?;
    validate_longitude(order.longitude)?;
    validate_subtotal(order.subtotal)?;
    Ok(())
}

/// Validates list paging parameters.
///
/// ## Rules
/// - `limit` must be between 1 and [`MAX_PAGE_LIMIT`]
/// - `offset` must not be negative
pub fn validate_page(limit: i64, offset: i64) -> ValidationResult<()> {
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(ValidationError::OutOfRange {
            field: "limit".to_string(),
            min: 1,
            max: MAX_PAGE_LIMIT,
        });
    }

    if offset < 0 {
        return Err(ValidationError::Negative {
            field: "offset".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Text Parsers
// =============================================================================

fn required<'a>(field: &str, raw: &'a str) -> ValidationResult<&'a str> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(value)
}

/// Parses an integer identifier.
pub fn parse_order_id(raw: &str) -> ValidationResult<i64> {
    let value = required("id", raw)?;
    value
        .parse::<i64>()
        .map_err(|_| ValidationError::invalid_format("id", format!("'{value}' is not an integer")))
}

/// Parses a finite coordinate. Range checks are separate.
pub fn parse_coordinate(field: &str, raw: &str) -> ValidationResult<f64> {
    let value = required(field, raw)?;
    match value.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Ok(parsed),
        _ => Err(ValidationError::invalid_format(
            field,
            format!("'{value}' is not a number"),
        )),
    }
}

/// Parses and validates a subtotal, keeping its exact decimal value.
///
/// ## Example
/// ```rust
/// use nytax_core::validation::parse_subtotal;
///
/// assert_eq!(parse_subtotal("33.335").unwrap().to_string(), "33.335");
/// assert!(parse_subtotal("-1").is_err());
/// assert!(parse_subtotal("ten").is_err());
/// ```
pub fn parse_subtotal(raw: &str) -> ValidationResult<Decimal> {
    let value = required("subtotal", raw)?;
    let subtotal = Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|_| {
            ValidationError::invalid_format("subtotal", format!("'{value}' is not a decimal"))
        })?;
    validate_subtotal(subtotal)?;
    Ok(subtotal)
}

/// Parses an ISO-8601 timestamp into UTC.
///
/// ## Accepted Forms
/// - RFC 3339 with `Z` or a numeric offset (`2025-11-04T10:17:04.5+02:00`)
/// - No offset, `T` or space separated; taken as UTC
///
/// Fractional seconds up to nanoseconds are kept.
pub fn parse_timestamp(raw: &str) -> ValidationResult<DateTime<Utc>> {
    let value = required("timestamp", raw)?;

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            ValidationError::invalid_format(
                "timestamp",
                format!("'{value}' is not an ISO-8601 timestamp"),
            )
        })
}

// =============================================================================
// Unit Tests
// =============================================================================
