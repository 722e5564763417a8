//! Text encodings for column types SQLite has no native form for.
//!
//! - Decimals are stored as their exact string form.
//! - Timestamps are stored as fixed-width RFC 3339 UTC with nanoseconds, so
//!   plain text comparison orders them correctly.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::{DbError, DbResult};

pub(crate) fn encode_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%S%.9fZ").to_string()
}

pub(crate) fn decode_timestamp(table: &'static str, id: i64, raw: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| DbError::corrupt(table, id, format!("timestamp '{raw}': {err}")))
}

pub(crate) fn decode_decimal(
    table: &'static str,
    id: i64,
    column: &str,
    raw: &str,
) -> DbResult<Decimal> {
    Decimal::from_str(raw)
        .map_err(|err| DbError::corrupt(table, id, format!("{column} '{raw}': {err}")))
}

pub(crate) fn decode_optional_decimal(
    table: &'static str,
    id: i64,
    column: &str,
    raw: Option<&str>,
) -> DbResult<Option<Decimal>> {
    raw.map(|raw| decode_decimal(table, id, column, raw))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_text_sorts_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let later = earlier + chrono::Duration::nanoseconds(1);

        assert!(encode_timestamp(&earlier) < encode_timestamp(&later));
        assert_eq!(encode_timestamp(&earlier), "2025-01-01T09:00:00.000000000Z");
    }

    #[test]
    fn test_timestamp_round_trip() {
        let ts = Utc.with_ymd_and_hms(2025, 11, 4, 10, 17, 4).unwrap()
            + chrono::Duration::nanoseconds(123_456_789);
        let decoded = decode_timestamp("orders", 1, &encode_timestamp(&ts)).unwrap();
        assert_eq!(decoded, ts);
    }

    #[test]
    fn test_bad_decimal_is_corrupt_row() {
        let err = decode_decimal("order_taxes", 7, "tax_amount", "abc").unwrap_err();
        assert!(matches!(err, DbError::CorruptRow { id: 7, .. }));
    }
}
