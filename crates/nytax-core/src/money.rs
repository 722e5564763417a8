//! # Money Module
//!
//! Rounding rules for monetary values.
//!
//! ## Why Decimal?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    33.335 × 0.085 = 2.8334749999...  ❌ rounds to 2.83 by accident      │
//! │                                                                         │
//! │  Rates like 0.00375 (MCTD) and subtotals with three decimals must      │
//! │  multiply exactly before a single, explicit rounding step.             │
//! │                                                                         │
//! │  OUR SOLUTION: rust_decimal                                             │
//! │    Exact base-10 arithmetic, rounding only where the rules say so      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use std::str::FromStr;
//! use rust_decimal::Decimal;
//! use nytax_core::money::round_money;
//!
//! let tax = Decimal::from_str("2.8334750").unwrap();
//! assert_eq!(round_money(tax).to_string(), "2.83");
//! ```

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places for every monetary amount.
pub const MONEY_SCALE: u32 = 2;

/// Rounds a monetary value half-up to [`MONEY_SCALE`] places.
///
/// Half-up here means midpoints move away from zero. Amounts handled by the
/// calculator are never negative, so this is the classic "0.5 rounds up".
///
/// The result always carries exactly two decimal places (`8.5` → `8.50`).
///
/// ## Example
/// ```rust
/// use std::str::FromStr;
/// use rust_decimal::Decimal;
/// use nytax_core::money::round_money;
///
/// assert_eq!(round_money(Decimal::from_str("36.165").unwrap()).to_string(), "36.17");
/// assert_eq!(round_money(Decimal::from_str("8.5").unwrap()).to_string(), "8.50");
/// ```
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

// =============================================================================
// Unit Tests
// =============================================================================
