//! # Ingest Module
//!
//! Content hashing and tolerant parsing of bulk import files.
//!
//! ## File Format
//! ```text
//! id,latitude,longitude,subtotal,timestamp
//! 1,40.6782,-73.9442,100.00,2025-11-04T10:17:04Z
//! 2,not-a-number,-73.9,12.50,2025-11-04T10:18:00Z   ← dropped, counted
//! 3,40.7128,-74.0060,19.99,2025-11-04 10:19:00      ← naive, read as UTC
//! ```
//!
//! A header row is required; column order does not matter. A row that fails
//! any rule is dropped and counted. Parsing always carries on with the next
//! row.

use chrono::{DateTime, Utc};
use csv::{ByteRecord, ReaderBuilder, Trim};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::error::ValidationError;
use crate::types::NewOrder;
use crate::validation::{
    parse_coordinate, parse_order_id, parse_subtotal, parse_timestamp, validate_latitude,
    validate_longitude, ValidationResult,
};

/// Lowercase hex SHA-256 of the raw file bytes.
///
/// This is the only idempotency key for imports: identical bytes always
/// give the identical digest, and any byte change gives a new one.
///
/// ## Example
/// ```rust
/// use nytax_core::ingest::content_hash;
///
/// assert_eq!(
///     content_hash(b""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

// =============================================================================
// Parsed Rows
// =============================================================================

/// One valid row of an import file.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub source_order_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub subtotal: Decimal,
    pub ordered_at: DateTime<Utc>,
}

impl From<ImportRow> for NewOrder {
    fn from(row: ImportRow) -> Self {
        NewOrder {
            latitude: row.latitude,
            longitude: row.longitude,
            subtotal: row.subtotal,
            ordered_at: row.ordered_at,
            source_order_id: Some(row.source_order_id),
        }
    }
}

/// Why a row was dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFailure {
    /// 1-based line in the file (the header is line 1).
    pub line: u64,
    pub reason: String,
}

/// Result of parsing a whole file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedImport {
    pub rows: Vec<ImportRow>,
    pub failures: Vec<RowFailure>,
}

impl ParsedImport {
    /// Data rows seen (header excluded).
    pub fn total_rows(&self) -> usize {
        self.rows.len() + self.failures.len()
    }

    pub fn valid_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn failed_rows(&self) -> usize {
        self.failures.len()
    }
}

// =============================================================================
// Parsing
// =============================================================================

#[derive(Debug, Default)]
struct ColumnIndex {
    id: Option<usize>,
    latitude: Option<usize>,
    longitude: Option<usize>,
    subtotal: Option<usize>,
    timestamp: Option<usize>,
}

impl ColumnIndex {
    fn from_headers(headers: &ByteRecord) -> Self {
        let mut index = ColumnIndex::default();
        for (position, raw) in headers.iter().enumerate() {
            let name = String::from_utf8_lossy(raw);
            let name = name.trim_start_matches('\u{feff}').trim().to_ascii_lowercase();
            let slot = match name.as_str() {
                "id" => &mut index.id,
                "latitude" => &mut index.latitude,
                "longitude" => &mut index.longitude,
                "subtotal" => &mut index.subtotal,
                "timestamp" => &mut index.timestamp,
                _ => continue,
            };
            slot.get_or_insert(position);
        }
        index
    }
}

/// Parses an import file, keeping valid rows and counting the rest.
///
/// Never fails as a whole. Malformed UTF-8, short rows and unparsable values
/// only affect the row they occur in.
pub fn parse_import(bytes: &[u8]) -> ParsedImport {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(bytes);

    let columns = match reader.byte_headers() {
        Ok(headers) => ColumnIndex::from_headers(headers),
        Err(_) => ColumnIndex::default(),
    };

    let mut parsed = ParsedImport::default();
    for (position, record) in reader.byte_records().enumerate() {
        let fallback_line = position as u64 + 2;
        match record {
            Ok(record) => {
                let line = record.position().map_or(fallback_line, |p| p.line());
                match parse_record(&record, &columns) {
                    Ok(row) => parsed.rows.push(row),
                    Err(err) => parsed.failures.push(RowFailure {
                        line,
                        reason: err.to_string(),
                    }),
                }
            }
            Err(err) => parsed.failures.push(RowFailure {
                line: fallback_line,
                reason: err.to_string(),
            }),
        }
    }

    parsed
}

fn parse_record(record: &ByteRecord, columns: &ColumnIndex) -> ValidationResult<ImportRow> {
    let source_order_id = parse_order_id(field(record, columns.id, "id")?)?;

    let latitude = parse_coordinate("latitude", field(record, columns.latitude, "latitude")?)?;
    validate_latitude(latitude)?;

    let longitude = parse_coordinate("longitude", field(record, columns.longitude, "longitude")?)?;
    validate_longitude(longitude)?;

    let subtotal = parse_subtotal(field(record, columns.subtotal, "subtotal")?)?;
    let ordered_at = parse_timestamp(field(record, columns.timestamp, "timestamp")?)?;

    Ok(ImportRow {
        source_order_id,
        latitude,
        longitude,
        subtotal,
        ordered_at,
    })
}

fn field<'r>(record: &'r ByteRecord, column: Option<usize>, name: &str) -> ValidationResult<&'r str> {
    let raw = column
        .and_then(|index| record.get(index))
        .ok_or_else(|| ValidationError::Required {
            field: name.to_string(),
        })?;
    std::str::from_utf8(raw).map_err(|_| ValidationError::invalid_format(name, "not valid UTF-8"))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "id,latitude,longitude,subtotal,timestamp\n";

    #[test]
    fn test_hash_is_deterministic_and_byte_sensitive() {
        let a = content_hash(b"id,latitude\n1,2\n");
        let b = content_hash(b"id,latitude\n1,2\n");
        let c = content_hash(b"id,latitude\n1,2 \n");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit() && !ch.is_ascii_uppercase()));
    }

    #[test]
    fn test_parses_valid_rows() {
        let file = format!(
            "{HEADER}1,40.6782,-73.9442,100.00,2025-11-04T10:17:04Z\n\
             2,40.7128,-74.0060,19.99,2025-11-04 10:19:00\n"
        );

        let parsed = parse_import(file.as_bytes());
        assert_eq!(parsed.total_rows(), 2);
        assert_eq!(parsed.failed_rows(), 0);
        assert_eq!(parsed.rows[0].source_order_id, 1);
        assert_eq!(parsed.rows[1].subtotal.to_string(), "19.99");
    }

    #[test]
    fn test_bad_rows_are_counted_not_fatal() {
        let file = format!(
            "{HEADER}1,40.6782,-73.9442,100.00,2025-11-04T10:17:04Z\n\
             2,not-a-number,-73.9,12.50,2025-11-04T10:18:00Z\n\
             3,95.0,-73.9,12.50,2025-11-04T10:18:00Z\n\
             4,40.7,-73.9,-1.00,2025-11-04T10:18:00Z\n\
             5,40.7,-73.9,1.00,last tuesday\n\
             x,40.7,-73.9,1.00,2025-11-04T10:18:00Z\n\
             7,40.7,-73.9\n\
             8,40.7128,-74.0060,5.00,2025-11-04T10:19:00Z\n"
        );

        let parsed = parse_import(file.as_bytes());
        assert_eq!(parsed.total_rows(), 8);
        assert_eq!(parsed.valid_rows(), 2);
        assert_eq!(parsed.failed_rows(), 6);
        assert_eq!(parsed.rows[1].source_order_id, 8);
    }

    #[test]
    fn test_oversized_subtotal_fails_only_that_row() {
        let file = format!(
            "{HEADER}1,40.6782,-73.9442,79228162514264337593543950335,2025-11-04T10:17:04Z\n\
             2,40.6782,-73.9442,100000000,2025-11-04T10:17:04Z\n\
             3,40.6782,-73.9442,99999999.99,2025-11-04T10:17:04Z\n"
        );

        let parsed = parse_import(file.as_bytes());
        assert_eq!(parsed.total_rows(), 3);
        assert_eq!(parsed.valid_rows(), 1);
        assert_eq!(parsed.rows[0].source_order_id, 3);
        assert_eq!(parsed.failures[0].line, 2);
        assert!(parsed.failures[0].reason.contains("must not exceed"));
    }

    #[test]
    fn test_invalid_utf8_fails_only_that_row() {
        let mut file = HEADER.as_bytes().to_vec();
        file.extend_from_slice(b"1,40.7,-73.9,1.00,2025-11-04T10:18:00Z\n");
        file.extend_from_slice(b"2,40.7,-73.9,1.00,2025-11-04T10:18:00\xffZ\n");
        file.extend_from_slice(b"3,40.7,-73.9,1.00,2025-11-04T10:18:00Z\n");

        let parsed = parse_import(&file);
        assert_eq!(parsed.valid_rows(), 2);
        assert_eq!(parsed.failed_rows(), 1);
    }

    #[test]
    fn test_header_only_file_has_no_rows() {
        let parsed = parse_import(HEADER.as_bytes());
        assert_eq!(parsed.total_rows(), 0);
    }

    #[test]
    fn test_empty_file_has_no_rows() {
        let parsed = parse_import(b"");
        assert_eq!(parsed.total_rows(), 0);
    }

    #[test]
    fn test_column_order_and_case_do_not_matter() {
        let file = "Subtotal,Timestamp,ID,Longitude,Latitude\n\
                    10.00,2025-01-01T00:00:00Z,9,-73.9,40.7\n";

        let parsed = parse_import(file.as_bytes());
        assert_eq!(parsed.valid_rows(), 1);
        assert_eq!(parsed.rows[0].source_order_id, 9);
        assert_eq!(parsed.rows[0].latitude, 40.7);
    }

    #[test]
    fn test_missing_column_fails_every_row() {
        let file = "id,latitude,longitude,subtotal\n1,40.7,-73.9,1.00\n2,40.7,-73.9,1.00\n";

        let parsed = parse_import(file.as_bytes());
        assert_eq!(parsed.valid_rows(), 0);
        assert_eq!(parsed.failed_rows(), 2);
        assert!(parsed.failures[0].reason.contains("timestamp"));
    }

    #[test]
    fn test_row_converts_to_new_order() {
        let file = format!("{HEADER}17,40.7,-73.9,1.00,2025-11-04T10:18:00Z\n");
        let parsed = parse_import(file.as_bytes());

        let order: NewOrder = parsed.rows[0].clone().into();
        assert_eq!(order.source_order_id, Some(17));
    }
}
