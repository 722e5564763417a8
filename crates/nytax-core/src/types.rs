//! # Domain Types
//!
//! Core domain types used throughout NY Tax.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Import      │   │      Order      │   │    OrderTax     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │◄──│  import_id?     │◄──│  order_id (1:1) │       │
//! │  │  content_hash   │   │  source         │   │  outcome        │       │
//! │  │  row stats      │   │  lat / lon      │   │                 │       │
//! │  └─────────────────┘   │  subtotal       │   └────────┬────────┘       │
//! │                        └─────────────────┘            │                 │
//! │                                                       ▼                 │
//! │                        ┌──────────────────────────────────────────┐    │
//! │                        │              TaxOutcome                  │    │
//! │                        │  Calculated { breakdown, jurisdictions } │    │
//! │                        │  Failed     { error, jurisdictions }     │    │
//! │                        └──────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Money on the Wire
//! Every `Decimal` serializes as a JSON string (`"8.50"`, `"0.08875"`) so no
//! consumer ever sees a float.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Order Source
// =============================================================================

/// How an order entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderSource {
    /// Created one at a time through the order creation flow.
    Manual,
    /// Created by a bulk import; always carries an `import_id`.
    Import,
}

impl OrderSource {
    /// Returns the stored column value.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderSource::Manual => "manual",
            OrderSource::Import => "import",
        }
    }
}

// =============================================================================
// Tax Status
// =============================================================================

/// Whether a tax record carries a computed breakdown or a failure reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TaxStatus {
    Calculated,
    Failed,
}

impl TaxStatus {
    /// Returns the stored column value.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TaxStatus::Calculated => "calculated",
            TaxStatus::Failed => "failed",
        }
    }
}

// =============================================================================
// Import
// =============================================================================

/// One bulk import attempt, keyed by the SHA-256 of the uploaded bytes.
///
/// The row statistics stay `None` until the import's final write, so a
/// reader can tell an in-flight import from a finished one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Import {
    pub id: i64,

    /// Original file name as supplied by the caller.
    pub file_name: String,

    /// Lowercase hex SHA-256 of the raw file bytes.
    pub content_hash: String,

    /// Data rows seen in the file (header excluded).
    pub total_rows: Option<i64>,

    /// Rows that became orders.
    pub inserted_rows: Option<i64>,

    /// Rows dropped during parsing or validation.
    pub failed_rows: Option<i64>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Import {
    /// True once the import's statistics have been written.
    pub fn is_complete(&self) -> bool {
        self.total_rows.is_some()
    }
}

// =============================================================================
// Order
// =============================================================================

/// A validated order ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub latitude: f64,
    pub longitude: f64,
    pub subtotal: Decimal,
    pub ordered_at: DateTime<Utc>,
    /// The `id` column of the import file, when the order came from one.
    pub source_order_id: Option<i64>,
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: i64,
    pub source: OrderSource,
    pub import_id: Option<i64>,
    pub source_order_id: Option<i64>,
    pub latitude: f64,
    pub longitude: f64,
    #[ts(type = "string")]
    pub subtotal: Decimal,
    #[ts(as = "String")]
    pub ordered_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Jurisdictions
// =============================================================================

/// The county and city a point falls in, as reported by a resolver.
///
/// Both `None` means the point is outside every known boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jurisdiction {
    pub county: Option<String>,
    pub city: Option<String>,
}

impl Jurisdiction {
    pub fn new(county: Option<String>, city: Option<String>) -> Self {
        Jurisdiction { county, city }
    }

    /// A point outside every boundary.
    pub fn outside() -> Self {
        Jurisdiction::default()
    }
}

/// An imported order paired with its resolved jurisdiction.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOrder {
    pub order_id: i64,
    pub subtotal: Decimal,
    pub jurisdiction: Jurisdiction,
}

/// Named jurisdictions that applied to a tax calculation.
///
/// `state` is absent only when the point was outside coverage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Jurisdictions {
    pub state: Option<String>,
    pub county: Option<String>,
    pub city: Option<String>,
    pub special: Vec<String>,
}

// =============================================================================
// Tax Breakdown
// =============================================================================

/// Rates and amounts of a successful calculation.
///
/// `composite_rate` is always the exact sum of the four components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxBreakdown {
    #[ts(type = "string")]
    pub composite_rate: Decimal,
    #[ts(type = "string")]
    pub tax_amount: Decimal,
    #[ts(type = "string")]
    pub total_amount: Decimal,
    #[ts(type = "string")]
    pub state_rate: Decimal,
    #[ts(type = "string")]
    pub county_rate: Decimal,
    #[ts(type = "string")]
    pub city_rate: Decimal,
    #[ts(type = "Array<string>")]
    pub special_rates: Vec<Decimal>,
}

impl TaxBreakdown {
    /// Sum of the special district rates.
    pub fn special_total(&self) -> Decimal {
        self.special_rates.iter().copied().sum()
    }
}

// =============================================================================
// Tax Outcome
// =============================================================================

/// Result of calculating tax for one order.
///
/// A failed outcome is a normal value, never an error: it is persisted like
/// any other tax record so every order keeps exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaxOutcome {
    Calculated {
        breakdown: TaxBreakdown,
        jurisdictions: Jurisdictions,
    },
    Failed {
        error: String,
        jurisdictions: Jurisdictions,
    },
}

impl TaxOutcome {
    pub fn status(&self) -> TaxStatus {
        match self {
            TaxOutcome::Calculated { .. } => TaxStatus::Calculated,
            TaxOutcome::Failed { .. } => TaxStatus::Failed,
        }
    }

    pub fn is_calculated(&self) -> bool {
        matches!(self, TaxOutcome::Calculated { .. })
    }

    pub fn breakdown(&self) -> Option<&TaxBreakdown> {
        match self {
            TaxOutcome::Calculated { breakdown, .. } => Some(breakdown),
            TaxOutcome::Failed { .. } => None,
        }
    }

    pub fn error_text(&self) -> Option<&str> {
        match self {
            TaxOutcome::Calculated { .. } => None,
            TaxOutcome::Failed { error, .. } => Some(error),
        }
    }

    pub fn jurisdictions(&self) -> &Jurisdictions {
        match self {
            TaxOutcome::Calculated { jurisdictions, .. }
            | TaxOutcome::Failed { jurisdictions, .. } => jurisdictions,
        }
    }
}

/// The tax record belonging to one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTax {
    pub order_id: i64,
    #[serde(flatten)]
    pub outcome: TaxOutcome,
}

impl OrderTax {
    pub fn new(order_id: i64, outcome: TaxOutcome) -> Self {
        OrderTax { order_id, outcome }
    }
}

/// An order joined with its tax record.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderWithTax {
    pub order: Order,
    pub tax: OrderTax,
}

// =============================================================================
// Import Summary
// =============================================================================

/// Counts reported after a bulk import completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ImportSummary {
    pub import_id: i64,
    pub total_rows: i64,
    pub inserted_rows: i64,
    pub failed_rows: i64,
    pub taxes_created: i64,
    pub taxes_calculated: i64,
    pub taxes_failed: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_values() {
        assert_eq!(OrderSource::Manual.as_str(), "manual");
        assert_eq!(OrderSource::Import.as_str(), "import");
        assert_eq!(TaxStatus::Calculated.as_str(), "calculated");
        assert_eq!(TaxStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn test_failed_outcome_accessors() {
        let outcome = TaxOutcome::Failed {
            error: "point outside jurisdiction boundaries".to_string(),
            jurisdictions: Jurisdictions::default(),
        };

        assert_eq!(outcome.status(), TaxStatus::Failed);
        assert!(outcome.breakdown().is_none());
        assert_eq!(
            outcome.error_text(),
            Some("point outside jurisdiction boundaries")
        );
    }

    #[test]
    fn test_decimal_serializes_as_string() {
        let breakdown = TaxBreakdown {
            composite_rate: "0.08875".parse().unwrap(),
            tax_amount: "8.88".parse().unwrap(),
            total_amount: "108.88".parse().unwrap(),
            state_rate: "0.04".parse().unwrap(),
            county_rate: "0.045".parse().unwrap(),
            city_rate: Decimal::ZERO,
            special_rates: vec!["0.00375".parse().unwrap()],
        };

        let json = serde_json::to_value(&breakdown).unwrap();
        assert_eq!(json["composite_rate"], "0.08875");
        assert_eq!(json["special_rates"][0], "0.00375");
    }

    #[test]
    fn test_import_completion() {
        let mut import = Import {
            id: 1,
            file_name: "orders.csv".to_string(),
            content_hash: "ab".repeat(32),
            total_rows: None,
            inserted_rows: None,
            failed_rows: None,
            created_at: Utc::now(),
        };
        assert!(!import.is_complete());

        import.total_rows = Some(3);
        assert!(import.is_complete());
    }
}
