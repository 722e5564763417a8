//! # Order Tax Repository
//!
//! Storage for tax records. One row per order, written once, never updated.
//!
//! The table's CHECK constraint mirrors [`TaxOutcome`]: a calculated row has
//! every rate and amount and no error, a failed row has the reverse. Reading
//! a row back re-checks the same rule and reports a violation as
//! [`DbError::CorruptRow`].

use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use tracing::debug;

use crate::codec::decode_optional_decimal;
use crate::error::{DbError, DbResult};
use crate::repository::INSERT_CHUNK_ROWS;
use nytax_core::{Jurisdictions, OrderTax, TaxBreakdown, TaxOutcome, TaxStatus};

const TABLE: &str = "order_taxes";

/// Calculated / failed tallies for a set of orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaxStatusCounts {
    pub calculated: i64,
    pub failed: i64,
}

// =============================================================================
// Encoding
// =============================================================================

/// Column values for one insert.
struct EncodedTax {
    order_id: i64,
    status: TaxStatus,
    composite_rate: Option<String>,
    tax_amount: Option<String>,
    total_amount: Option<String>,
    state_rate: Option<String>,
    county_rate: Option<String>,
    city_rate: Option<String>,
    special_rates: String,
    jurisdictions: String,
    error_text: Option<String>,
}

impl EncodedTax {
    fn encode(tax: &OrderTax) -> DbResult<Self> {
        let breakdown = tax.outcome.breakdown();
        let text = |pick: fn(&TaxBreakdown) -> rust_decimal::Decimal| {
            breakdown.map(|b| pick(b).to_string())
        };
        let special_rates = match breakdown {
            Some(b) => serde_json::to_string(&b.special_rates)?,
            None => "[]".to_string(),
        };

        Ok(EncodedTax {
            order_id: tax.order_id,
            status: tax.outcome.status(),
            composite_rate: text(|b| b.composite_rate),
            tax_amount: text(|b| b.tax_amount),
            total_amount: text(|b| b.total_amount),
            state_rate: text(|b| b.state_rate),
            county_rate: text(|b| b.county_rate),
            city_rate: text(|b| b.city_rate),
            special_rates,
            jurisdictions: serde_json::to_string(tax.outcome.jurisdictions())?,
            error_text: tax.outcome.error_text().map(str::to_string),
        })
    }
}

const INSERT_COLUMNS: &str = "INSERT INTO order_taxes (order_id, status, composite_rate, tax_amount, \
     total_amount, state_rate, county_rate, city_rate, special_rates, jurisdictions, error_text) ";

fn push_rows(builder: &mut QueryBuilder<'_, Sqlite>, rows: Vec<EncodedTax>) {
    builder.push_values(rows, |mut b, row| {
        b.push_bind(row.order_id)
            .push_bind(row.status.as_str())
            .push_bind(row.composite_rate)
            .push_bind(row.tax_amount)
            .push_bind(row.total_amount)
            .push_bind(row.state_rate)
            .push_bind(row.county_rate)
            .push_bind(row.city_rate)
            .push_bind(row.special_rates)
            .push_bind(row.jurisdictions)
            .push_bind(row.error_text);
    });
}

// =============================================================================
// Decoding
// =============================================================================

/// Tax columns as read from a join with `orders`.
#[derive(Debug, FromRow)]
pub(crate) struct TaxRow {
    status: TaxStatus,
    composite_rate: Option<String>,
    tax_amount: Option<String>,
    total_amount: Option<String>,
    state_rate: Option<String>,
    county_rate: Option<String>,
    city_rate: Option<String>,
    special_rates: String,
    jurisdictions: String,
    error_text: Option<String>,
}

impl TaxRow {
    pub(crate) fn into_order_tax(self, order_id: i64) -> DbResult<OrderTax> {
        let corrupt = |reason: &str| DbError::corrupt(TABLE, order_id, reason);
        let decimal = |column: &str, raw: &Option<String>| {
            decode_optional_decimal(TABLE, order_id, column, raw.as_deref())
        };

        let jurisdictions: Jurisdictions = serde_json::from_str(&self.jurisdictions)
            .map_err(|err| corrupt(&format!("jurisdictions: {err}")))?;

        let outcome = match self.status {
            TaxStatus::Calculated => {
                if self.error_text.is_some() {
                    return Err(corrupt("calculated row carries error_text"));
                }
                let fields = (
                    decimal("composite_rate", &self.composite_rate)?,
                    decimal("tax_amount", &self.tax_amount)?,
                    decimal("total_amount", &self.total_amount)?,
                    decimal("state_rate", &self.state_rate)?,
                    decimal("county_rate", &self.county_rate)?,
                    decimal("city_rate", &self.city_rate)?,
                );
                let (
                    Some(composite_rate),
                    Some(tax_amount),
                    Some(total_amount),
                    Some(state_rate),
                    Some(county_rate),
                    Some(city_rate),
                ) = fields
                else {
                    return Err(corrupt("calculated row is missing a rate or amount"));
                };
                let special_rates = serde_json::from_str(&self.special_rates)
                    .map_err(|err| corrupt(&format!("special_rates: {err}")))?;

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
                    jurisdictions,
                }
            }
            TaxStatus::Failed => {
                let rates_present = [
                    &self.composite_rate,
                    &self.tax_amount,
                    &self.total_amount,
                    &self.state_rate,
                    &self.county_rate,
                    &self.city_rate,
                ]
                .iter()
                .any(|value| value.is_some());
                if rates_present {
                    return Err(corrupt("failed row carries a rate or amount"));
                }
                let error = self
                    .error_text
                    .filter(|text| !text.is_empty())
                    .ok_or_else(|| corrupt("failed row has no error_text"))?;

                TaxOutcome::Failed {
                    error,
                    jurisdictions,
                }
            }
        };

        Ok(OrderTax::new(order_id, outcome))
    }
}

// =============================================================================
// Shared SQL
// =============================================================================

pub(crate) async fn insert(conn: &mut SqliteConnection, tax: &OrderTax) -> DbResult<()> {
    debug!(order_id = tax.order_id, status = tax.outcome.status().as_str(), "Inserting order tax");

    let mut builder = QueryBuilder::<Sqlite>::new(INSERT_COLUMNS);
    push_rows(&mut builder, vec![EncodedTax::encode(tax)?]);
    builder.build().execute(&mut *conn).await?;
    Ok(())
}

/// Inserts many tax records in chunked multi-row statements.
///
/// An empty slice is a no-op.
pub(crate) async fn insert_many(conn: &mut SqliteConnection, taxes: &[OrderTax]) -> DbResult<u64> {
    let mut inserted = 0;

    for chunk in taxes.chunks(INSERT_CHUNK_ROWS) {
        let rows = chunk
            .iter()
            .map(EncodedTax::encode)
            .collect::<DbResult<Vec<_>>>()?;

        let mut builder = QueryBuilder::<Sqlite>::new(INSERT_COLUMNS);
        push_rows(&mut builder, rows);
        inserted += builder.build().execute(&mut *conn).await?.rows_affected();
    }

    debug!(count = inserted, "Inserted order taxes");
    Ok(inserted)
}

pub(crate) async fn counts_for_import(
    conn: &mut SqliteConnection,
    import_id: i64,
) -> DbResult<TaxStatusCounts> {
    let rows: Vec<(TaxStatus, i64)> = sqlx::query_as(
        r#"
        SELECT t.status, COUNT(*)
        FROM order_taxes t
        JOIN orders o ON o.id = t.order_id
        WHERE o.import_id = ?1
        GROUP BY t.status
        "#,
    )
    .bind(import_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut counts = TaxStatusCounts::default();
    for (status, count) in rows {
        match status {
            TaxStatus::Calculated => counts.calculated = count,
            TaxStatus::Failed => counts.failed = count,
        }
    }
    Ok(counts)
}

// =============================================================================
// Unit Tests
// =============================================================================
