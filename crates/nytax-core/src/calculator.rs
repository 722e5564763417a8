//! # Tax Calculator
//!
//! Pure, deterministic New York sales tax calculation.
//!
//! ## Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  calculate_tax(subtotal, county, city, table)                           │
//! │                                                                         │
//! │  county = None ──────────────────────────► Failed("point outside ...") │
//! │  county not in table ────────────────────► Failed("county not found")  │
//! │  subtotal × rate overflows ──────────────► Failed("amount exceeds ...")│
//! │                                                                         │
//! │  state  = table.state_rate                                              │
//! │  city in exceptions?  yes ─► city = exception, county = 0              │
//! │                       no  ─► county = table rate, city = 0             │
//! │  county in MCTD set?  yes ─► special = [mctd_rate]                     │
//! │                                                                         │
//! │  composite = state + county + city + Σspecial                           │
//! │  tax       = round(subtotal × composite)                                │
//! │  total     = round(subtotal + tax)                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rounding is half-up to cents and is applied twice: once to the tax, then
//! to the total. Subtotals with more than two decimals can therefore total
//! to something other than `round(subtotal) + tax` (see the tests).

use rust_decimal::Decimal;

use crate::money::round_money;
use crate::rates::TaxRateTable;
use crate::types::{Jurisdictions, OrderTax, ResolvedOrder, TaxBreakdown, TaxOutcome};

/// State label recorded on every calculated outcome. Failed outcomes carry none.
pub const STATE_CODE: &str = "NY";

/// Name recorded in `jurisdictions.special` for the MCTD surcharge.
pub const MCTD_DISTRICT: &str = "MCTD";

/// Failure text when no county boundary contains the point.
pub const OUTSIDE_BOUNDARIES: &str = "point outside jurisdiction boundaries";

/// Failure text when the resolved county has no configured rate.
pub const UNKNOWN_COUNTY: &str = "county not found in tax configuration";

/// Failure text when the subtotal is too large for decimal arithmetic.
pub const AMOUNT_OUT_OF_RANGE: &str = "amount exceeds supported range";

/// Calculates tax for one order.
///
/// Never fails: uncovered points and unconfigured counties produce
/// [`TaxOutcome::Failed`].
///
/// ## Example
/// ```rust
/// use std::str::FromStr;
/// use rust_decimal::Decimal;
/// use nytax_core::calculator::calculate_tax;
/// use nytax_core::rates::TaxRateTable;
///
/// let table = TaxRateTable::from_json_str(r#"{
///     "consts": {"state_rate": 0.04, "mctd_rate": 0.00375},
///     "mctd_counties": [],
///     "counties": {"Kings": {"county_rate": 0.045}},
///     "cities_exceptions": {}
/// }"#).unwrap();
///
/// let outcome = calculate_tax(Decimal::from_str("100.00").unwrap(), Some("Kings"), None, &table);
/// let breakdown = outcome.breakdown().unwrap();
/// assert_eq!(breakdown.tax_amount.to_string(), "8.50");
/// assert_eq!(breakdown.total_amount.to_string(), "108.50");
/// ```
pub fn calculate_tax(
    subtotal: Decimal,
    county: Option<&str>,
    city: Option<&str>,
    table: &TaxRateTable,
) -> TaxOutcome {
    let Some(county) = county else {
        return TaxOutcome::Failed {
            error: OUTSIDE_BOUNDARIES.to_string(),
            jurisdictions: Jurisdictions {
                state: None,
                county: None,
                city: city.map(str::to_string),
                special: Vec::new(),
            },
        };
    };

    let Some(county_entry) = table.county(county) else {
        return TaxOutcome::Failed {
            error: UNKNOWN_COUNTY.to_string(),
            jurisdictions: Jurisdictions {
                state: None,
                county: Some(county.to_string()),
                city: city.map(str::to_string),
                special: Vec::new(),
            },
        };
    };

    let state_rate = table.state_rate();

    // A city with its own rate replaces the county rate entirely.
    let (county_rate, city_rate) = match city.and_then(|name| table.city_exception(name)) {
        Some(exception) => (Decimal::ZERO, exception.city_rate),
        None => (county_entry.county_rate, Decimal::ZERO),
    };

    let mut special_rates = Vec::new();
    let mut special = Vec::new();
    if table.is_mctd(county) && !table.mctd_rate().is_zero() {
        special_rates.push(table.mctd_rate());
        special.push(MCTD_DISTRICT.to_string());
    }

    let amounts = [state_rate, county_rate, city_rate]
        .into_iter()
        .chain(special_rates.iter().copied())
        .try_fold(Decimal::ZERO, Decimal::checked_add)
        .and_then(|composite_rate| {
            let tax_amount = round_money(subtotal.checked_mul(composite_rate)?);
            let total_amount = round_money(subtotal.checked_add(tax_amount)?);
            Some((composite_rate, tax_amount, total_amount))
        });
    let Some((composite_rate, tax_amount, total_amount)) = amounts else {
        return TaxOutcome::Failed {
            error: AMOUNT_OUT_OF_RANGE.to_string(),
            jurisdictions: Jurisdictions {
                state: None,
                county: Some(county.to_string()),
                city: city.map(str::to_string),
                special: Vec::new(),
            },
        };
    };

    TaxOutcome::Calculated {
        breakdown: TaxBreakdown {
            composite_rate,
            tax_amount,
            total_amount,
            state_rate,
            county_rate,
            city_rate,
            special_rates,
        },
        jurisdictions: Jurisdictions {
            state: Some(STATE_CODE.to_string()),
            county: Some(county.to_string()),
            city: city.map(str::to_string),
            special,
        },
    }
}

/// Calculates the tax record for an order whose jurisdiction is resolved.
pub fn tax_for_resolved(resolved: &ResolvedOrder, table: &TaxRateTable) -> OrderTax {
    let outcome = calculate_tax(
        resolved.subtotal,
        resolved.jurisdiction.county.as_deref(),
        resolved.jurisdiction.city.as_deref(),
        table,
    );
    OrderTax::new(resolved.order_id, outcome)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Jurisdiction;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn table() -> TaxRateTable {
        TaxRateTable::from_json_str(
            r#"{
                "consts": { "state_rate": 0.04, "mctd_rate": 0.00375 },
                "mctd_counties": ["New York", "Westchester"],
                "counties": {
                    "Kings": { "county_rate": 0.045 },
                    "New York": { "county_rate": 0.045 },
                    "Westchester": { "county_rate": 0.04 },
                    "Albany": { "county_rate": 0.04 }
                },
                "cities_exceptions": {
                    "New York": { "city_rate": 0.045 },
                    "Yonkers": { "city_rate": 0.045 }
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_county_only() {
        let outcome = calculate_tax(d("100.00"), Some("Kings"), None, &table());
        let breakdown = outcome.breakdown().unwrap();

        assert_eq!(breakdown.composite_rate, d("0.085"));
        assert_eq!(breakdown.tax_amount, d("8.50"));
        assert_eq!(breakdown.total_amount, d("108.50"));
        assert_eq!(breakdown.county_rate, d("0.045"));
        assert_eq!(breakdown.city_rate, Decimal::ZERO);
        assert!(breakdown.special_rates.is_empty());

        let jurisdictions = outcome.jurisdictions();
        assert_eq!(jurisdictions.state.as_deref(), Some("NY"));
        assert_eq!(jurisdictions.county.as_deref(), Some("Kings"));
        assert!(jurisdictions.special.is_empty());
    }

    #[test]
    fn test_mctd_surcharge_applies_once() {
        let outcome = calculate_tax(d("100.00"), Some("Westchester"), None, &table());
        let breakdown = outcome.breakdown().unwrap();

        assert_eq!(breakdown.special_rates, vec![d("0.00375")]);
        assert_eq!(breakdown.composite_rate, d("0.08375"));
        assert_eq!(breakdown.tax_amount, d("8.38"));
        assert_eq!(breakdown.total_amount, d("108.38"));
        assert_eq!(outcome.jurisdictions().special, vec!["MCTD".to_string()]);
    }

    #[test]
    fn test_city_exception_replaces_county_rate() {
        let outcome = calculate_tax(d("100.00"), Some("New York"), Some("New York"), &table());
        let breakdown = outcome.breakdown().unwrap();

        assert_eq!(breakdown.county_rate, Decimal::ZERO);
        assert_eq!(breakdown.city_rate, d("0.045"));
        assert_eq!(breakdown.composite_rate, d("0.08875"));
        assert_eq!(breakdown.tax_amount, d("8.88"));
        assert_eq!(breakdown.total_amount, d("108.88"));
    }

    #[test]
    fn test_city_without_exception_keeps_county_rate() {
        let outcome = calculate_tax(d("10.00"), Some("Albany"), Some("Cohoes"), &table());
        let breakdown = outcome.breakdown().unwrap();

        assert_eq!(breakdown.county_rate, d("0.04"));
        assert_eq!(breakdown.city_rate, Decimal::ZERO);
        assert_eq!(outcome.jurisdictions().city.as_deref(), Some("Cohoes"));
    }

    #[test]
    fn test_composite_is_sum_of_components() {
        let table = table();
        for (county, city) in [
            ("Kings", None),
            ("New York", Some("New York")),
            ("Westchester", Some("Yonkers")),
            ("Albany", Some("Cohoes")),
        ] {
            let outcome = calculate_tax(d("57.19"), Some(county), city, &table);
            let b = outcome.breakdown().unwrap();
            assert_eq!(
                b.composite_rate,
                b.state_rate + b.county_rate + b.city_rate + b.special_total()
            );
            assert!(b.county_rate.is_zero() || b.city_rate.is_zero());
        }
    }

    #[test]
    fn test_outside_boundaries_fails() {
        let outcome = calculate_tax(d("100.00"), None, None, &table());

        assert_eq!(outcome.error_text(), Some(OUTSIDE_BOUNDARIES));
        assert!(outcome.breakdown().is_none());
        assert_eq!(outcome.jurisdictions(), &Jurisdictions::default());
    }

    #[test]
    fn test_unknown_county_fails() {
        let outcome = calculate_tax(d("100.00"), Some("Atlantis"), None, &table());

        assert_eq!(outcome.error_text(), Some(UNKNOWN_COUNTY));
        assert_eq!(outcome.jurisdictions().county.as_deref(), Some("Atlantis"));
        assert!(outcome.jurisdictions().state.is_none());
    }

    #[test]
    fn test_zero_subtotal() {
        let outcome = calculate_tax(Decimal::ZERO, Some("Kings"), None, &table());
        let breakdown = outcome.breakdown().unwrap();

        assert_eq!(breakdown.tax_amount.to_string(), "0.00");
        assert_eq!(breakdown.total_amount.to_string(), "0.00");
    }

    /// 33.335 × 0.085 = 2.833475 → 2.83, then 33.335 + 2.83 = 36.165 → 36.17.
    #[test]
    fn test_total_is_rounded_after_tax() {
        let outcome = calculate_tax(d("33.335"), Some("Kings"), None, &table());
        let breakdown = outcome.breakdown().unwrap();

        assert_eq!(breakdown.tax_amount, d("2.83"));
        assert_eq!(breakdown.total_amount, d("36.17"));
    }

    #[test]
    fn test_deterministic() {
        let table = table();
        let first = calculate_tax(d("19.99"), Some("New York"), Some("New York"), &table);
        let second = calculate_tax(d("19.99"), Some("New York"), Some("New York"), &table);
        assert_eq!(first, second);
    }

    #[test]
    fn test_overflowing_subtotal_fails_instead_of_panicking() {
        let outcome = calculate_tax(Decimal::MAX, Some("Kings"), None, &table());

        match outcome {
            TaxOutcome::Failed { error, jurisdictions } => {
                assert_eq!(error, AMOUNT_OUT_OF_RANGE);
                assert_eq!(jurisdictions.state, None);
                assert_eq!(jurisdictions.county.as_deref(), Some("Kings"));
            }
            other => panic!("expected a failed outcome, got {other:?}"),
        }

        // The largest valid subtotal still calculates.
        let outcome = calculate_tax(d("99999999.99"), Some("Kings"), None, &table());
        assert_eq!(outcome.breakdown().unwrap().tax_amount, d("8500000.00"));
    }

    #[test]
    fn test_tax_for_resolved_keeps_order_id() {
        let resolved = ResolvedOrder {
            order_id: 42,
            subtotal: d("100.00"),
            jurisdiction: Jurisdiction::new(Some("Kings".to_string()), None),
        };

        let tax = tax_for_resolved(&resolved, &table());
        assert_eq!(tax.order_id, 42);
        assert!(tax.outcome.is_calculated());
    }
}
