//! # Rate Table
//!
//! Immutable view of New York state, county, city and MCTD rates.
//!
//! ## Document Shape
//! ```text
//! {
//!   "consts": { "state_rate": 0.04, "mctd_rate": 0.00375 },
//!   "mctd_counties": ["Bronx", "Kings", ...],
//!   "counties": { "Albany": { "county_rate": 0.04 }, ... },
//!   "cities_exceptions": { "New York": { "city_rate": 0.045 }, ... }
//! }
//! ```
//!
//! Rates may be JSON numbers or numeric strings. Numbers are read through
//! their literal text so `0.00375` stays exactly `0.00375`.
//!
//! Loading is the only failure point. Once built, a [`TaxRateTable`] is
//! shared read-only (usually behind an `Arc`) for the life of the process.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::error::RateTableError;

/// Per-county entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountyRate {
    pub county_rate: Decimal,
}

/// Per-city override entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CityRate {
    pub city_rate: Decimal,
}

/// Rates used by the tax calculator.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxRateTable {
    state_rate: Decimal,
    mctd_rate: Decimal,
    mctd_counties: HashSet<String>,
    counties: HashMap<String, CountyRate>,
    cities_exceptions: HashMap<String, CityRate>,
}

impl TaxRateTable {
    /// Builds a table directly from its parts.
    pub fn new(
        state_rate: Decimal,
        mctd_rate: Decimal,
        mctd_counties: HashSet<String>,
        counties: HashMap<String, CountyRate>,
        cities_exceptions: HashMap<String, CityRate>,
    ) -> Self {
        TaxRateTable {
            state_rate,
            mctd_rate,
            mctd_counties,
            counties,
            cities_exceptions,
        }
    }

    /// Parses a rate table document.
    ///
    /// ## Errors
    /// Any missing key, non-numeric or negative rate, or malformed section
    /// fails the whole load.
    pub fn from_json_str(document: &str) -> Result<Self, RateTableError> {
        let value: Value = serde_json::from_str(document)?;
        Self::from_json_value(&value)
    }

    /// Builds a table from an already parsed JSON document.
    pub fn from_json_value(document: &Value) -> Result<Self, RateTableError> {
        let root = as_object(document, "$")?;

        let consts = as_object(require(root, "consts", "consts")?, "consts")?;
        let state_rate = rate_at(require(consts, "state_rate", "consts.state_rate")?, "consts.state_rate")?;
        let mctd_rate = rate_at(require(consts, "mctd_rate", "consts.mctd_rate")?, "consts.mctd_rate")?;

        let mctd_counties = match require(root, "mctd_counties", "mctd_counties")? {
            Value::Array(names) => names
                .iter()
                .enumerate()
                .map(|(index, name)| match name {
                    Value::String(name) => Ok(name.clone()),
                    other => Err(RateTableError::Malformed {
                        key: format!("mctd_counties[{index}]"),
                        reason: format!("expected a county name, found {other}"),
                    }),
                })
                .collect::<Result<HashSet<_>, _>>()?,
            other => {
                return Err(RateTableError::Malformed {
                    key: "mctd_counties".to_string(),
                    reason: format!("expected an array, found {other}"),
                })
            }
        };

        let counties = named_rates(root, "counties", "county_rate")?
            .into_iter()
            .map(|(name, county_rate)| (name, CountyRate { county_rate }))
            .collect();

        let cities_exceptions = named_rates(root, "cities_exceptions", "city_rate")?
            .into_iter()
            .map(|(name, city_rate)| (name, CityRate { city_rate }))
            .collect();

        Ok(TaxRateTable {
            state_rate,
            mctd_rate,
            mctd_counties,
            counties,
            cities_exceptions,
        })
    }

    #[inline]
    pub fn state_rate(&self) -> Decimal {
        self.state_rate
    }

    #[inline]
    pub fn mctd_rate(&self) -> Decimal {
        self.mctd_rate
    }

    /// Looks up a county by exact name.
    pub fn county(&self, name: &str) -> Option<&CountyRate> {
        self.counties.get(name)
    }

    /// Whether a county is in the Metropolitan Commuter Transportation District.
    pub fn is_mctd(&self, name: &str) -> bool {
        self.mctd_counties.contains(name)
    }

    /// Looks up a city rate override by exact name.
    pub fn city_exception(&self, name: &str) -> Option<&CityRate> {
        self.cities_exceptions.get(name)
    }

    pub fn county_count(&self) -> usize {
        self.counties.len()
    }

    pub fn city_exception_count(&self) -> usize {
        self.cities_exceptions.len()
    }
}

// =============================================================================
// Document Helpers
// =============================================================================

fn as_object<'a>(value: &'a Value, key: &str) -> Result<&'a Map<String, Value>, RateTableError> {
    value.as_object().ok_or_else(|| RateTableError::Malformed {
        key: key.to_string(),
        reason: "expected an object".to_string(),
    })
}

fn require<'a>(
    object: &'a Map<String, Value>,
    field: &str,
    path: &str,
) -> Result<&'a Value, RateTableError> {
    object.get(field).ok_or_else(|| RateTableError::MissingKey {
        key: path.to_string(),
    })
}

/// Reads `{ name: { <rate_key>: rate } }` sections.
fn named_rates(
    root: &Map<String, Value>,
    section: &str,
    rate_key: &str,
) -> Result<Vec<(String, Decimal)>, RateTableError> {
    let entries = as_object(require(root, section, section)?, section)?;

    entries
        .iter()
        .map(|(name, entry)| {
            let path = format!("{section}.{name}");
            let entry = as_object(entry, &path)?;
            let rate_path = format!("{path}.{rate_key}");
            let rate = rate_at(require(entry, rate_key, &rate_path)?, &rate_path)?;
            Ok((name.clone(), rate))
        })
        .collect()
}

fn rate_at(value: &Value, path: &str) -> Result<Decimal, RateTableError> {
    let not_numeric = || RateTableError::NotNumeric {
        key: path.to_string(),
        value: value.to_string(),
    };

    let text = match value {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.trim().to_string(),
        _ => return Err(not_numeric()),
    };

    let rate = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| not_numeric())?;

    if rate.is_sign_negative() && !rate.is_zero() {
        return Err(RateTableError::NegativeRate {
            key: path.to_string(),
        });
    }

    Ok(rate.normalize())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "consts": { "state_rate": 0.04, "mctd_rate": "0.00375" },
        "mctd_counties": ["Kings", "Westchester"],
        "counties": {
            "Kings": { "county_rate": 0.045 },
            "Albany": { "county_rate": 0.04 }
        },
        "cities_exceptions": {
            "New York": { "city_rate": 0.045 }
        }
    }"#;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_loads_complete_document() {
        let table = TaxRateTable::from_json_str(DOCUMENT).unwrap();

        assert_eq!(table.state_rate(), d("0.04"));
        assert_eq!(table.mctd_rate(), d("0.00375"));
        assert_eq!(table.county("Kings").unwrap().county_rate, d("0.045"));
        assert_eq!(table.city_exception("New York").unwrap().city_rate, d("0.045"));
        assert!(table.is_mctd("Westchester"));
        assert!(!table.is_mctd("Albany"));
        assert_eq!(table.county_count(), 2);
        assert_eq!(table.city_exception_count(), 1);
    }

    #[test]
    fn test_lookups_are_exact() {
        let table = TaxRateTable::from_json_str(DOCUMENT).unwrap();
        assert!(table.county("kings").is_none());
        assert!(table.county("Kings ").is_none());
    }

    #[test]
    fn test_number_keeps_literal_precision() {
        let table = TaxRateTable::from_json_str(DOCUMENT).unwrap();
        assert_eq!(table.state_rate().to_string(), "0.04");
    }

    #[test]
    fn test_missing_key_is_fatal() {
        let doc = r#"{
            "consts": { "state_rate": 0.04 },
            "mctd_counties": [],
            "counties": {},
            "cities_exceptions": {}
        }"#;

        let err = TaxRateTable::from_json_str(doc).unwrap_err();
        assert!(
            matches!(err, RateTableError::MissingKey { ref key } if key == "consts.mctd_rate")
        );
    }

    #[test]
    fn test_missing_nested_rate_is_fatal() {
        let doc = r#"{
            "consts": { "state_rate": 0.04, "mctd_rate": 0.00375 },
            "mctd_counties": [],
            "counties": { "Kings": {} },
            "cities_exceptions": {}
        }"#;

        let err = TaxRateTable::from_json_str(doc).unwrap_err();
        assert!(
            matches!(err, RateTableError::MissingKey { ref key } if key == "counties.Kings.county_rate")
        );
    }

    #[test]
    fn test_non_numeric_rate_is_fatal() {
        let doc = r#"{
            "consts": { "state_rate": "four percent", "mctd_rate": 0.00375 },
            "mctd_counties": [],
            "counties": {},
            "cities_exceptions": {}
        }"#;

        let err = TaxRateTable::from_json_str(doc).unwrap_err();
        assert!(matches!(err, RateTableError::NotNumeric { .. }));
    }

    #[test]
    fn test_negative_rate_is_fatal() {
        let doc = r#"{
            "consts": { "state_rate": 0.04, "mctd_rate": 0.00375 },
            "mctd_counties": [],
            "counties": { "Kings": { "county_rate": -0.01 } },
            "cities_exceptions": {}
        }"#;

        let err = TaxRateTable::from_json_str(doc).unwrap_err();
        assert!(matches!(err, RateTableError::NegativeRate { .. }));
    }

    #[test]
    fn test_invalid_json_is_fatal() {
        let err = TaxRateTable::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, RateTableError::Parse(_)));
    }

    #[test]
    fn test_mctd_counties_must_be_names() {
        let doc = r#"{
            "consts": { "state_rate": 0.04, "mctd_rate": 0.00375 },
            "mctd_counties": ["Kings", 7],
            "counties": {},
            "cities_exceptions": {}
        }"#;

        let err = TaxRateTable::from_json_str(doc).unwrap_err();
        assert!(matches!(err, RateTableError::Malformed { .. }));
    }
}
