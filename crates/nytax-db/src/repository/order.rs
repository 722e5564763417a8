//! # Order Repository
//!
//! Database operations for orders and order listings.
//!
//! ## Query Patterns
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Write                                                                  │
//! │    insert_manual()    one row, source = manual                          │
//! │    insert_imported()  chunked multi-row INSERT, source = import         │
//! │                                                                         │
//! │  Read                                                                   │
//! │    fetch_with_tax()   orders ⋈ order_taxes by id (any status)           │
//! │    list_calculated()  orders ⋈ order_taxes, status = calculated,        │
//! │                       ORDER BY id DESC, LIMIT/OFFSET, optional filters  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::codec::{decode_decimal, decode_timestamp, encode_timestamp};
use crate::error::DbResult;
use crate::repository::order_tax::TaxRow;
use crate::repository::INSERT_CHUNK_ROWS;
use nytax_core::{GeoPoint, NewOrder, Order, OrderSource, OrderWithTax};

const TABLE: &str = "orders";

const ORDER_WITH_TAX_COLUMNS: &str = "o.id, o.source, o.import_id, o.source_order_id, \
     o.latitude, o.longitude, o.subtotal, o.ordered_at, o.created_at, \
     t.status, t.composite_rate, t.tax_amount, t.total_amount, t.state_rate, \
     t.county_rate, t.city_rate, t.special_rates, t.jurisdictions, t.error_text";

/// Optional narrowing of an order listing.
///
/// Date bounds apply to `ordered_at` and are inclusive, as are the subtotal
/// bounds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilter {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub min_subtotal: Option<Decimal>,
    pub max_subtotal: Option<Decimal>,
}

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, FromRow)]
pub(crate) struct OrderRow {
    id: i64,
    source: OrderSource,
    import_id: Option<i64>,
    source_order_id: Option<i64>,
    latitude: f64,
    longitude: f64,
    subtotal: String,
    ordered_at: String,
    created_at: String,
}

impl OrderRow {
    pub(crate) fn into_order(self) -> DbResult<Order> {
        Ok(Order {
            subtotal: decode_decimal(TABLE, self.id, "subtotal", &self.subtotal)?,
            ordered_at: decode_timestamp(TABLE, self.id, &self.ordered_at)?,
            created_at: decode_timestamp(TABLE, self.id, &self.created_at)?,
            id: self.id,
            source: self.source,
            import_id: self.import_id,
            source_order_id: self.source_order_id,
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderWithTaxRow {
    #[sqlx(flatten)]
    order: OrderRow,
    #[sqlx(flatten)]
    tax: TaxRow,
}

impl OrderWithTaxRow {
    fn into_order_with_tax(self) -> DbResult<OrderWithTax> {
        let order = self.order.into_order()?;
        let tax = self.tax.into_order_tax(order.id)?;
        Ok(OrderWithTax { order, tax })
    }
}

/// The fields jurisdiction resolution needs from an imported order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OrderPoint {
    pub order_id: i64,
    pub subtotal: Decimal,
    pub point: GeoPoint,
}

// =============================================================================
// Shared SQL
// =============================================================================

pub(crate) async fn insert_manual(conn: &mut SqliteConnection, order: &NewOrder) -> DbResult<Order> {
    let created_at = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO orders (
            source, import_id, source_order_id, latitude, longitude,
            subtotal, ordered_at, created_at
        ) VALUES (?1, NULL, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(OrderSource::Manual.as_str())
    .bind(order.source_order_id)
    .bind(order.latitude)
    .bind(order.longitude)
    .bind(order.subtotal.to_string())
    .bind(encode_timestamp(&order.ordered_at))
    .bind(encode_timestamp(&created_at))
    .execute(&mut *conn)
    .await?;

    let id = result.last_insert_rowid();
    debug!(order_id = id, "Inserted manual order");

    Ok(Order {
        id,
        source: OrderSource::Manual,
        import_id: None,
        source_order_id: order.source_order_id,
        latitude: order.latitude,
        longitude: order.longitude,
        subtotal: order.subtotal,
        ordered_at: order.ordered_at,
        created_at,
    })
}

/// Inserts an import's orders in chunked multi-row statements.
///
/// An empty slice is a no-op.
pub(crate) async fn insert_imported(
    conn: &mut SqliteConnection,
    import_id: i64,
    orders: &[NewOrder],
) -> DbResult<u64> {
    let created_at = encode_timestamp(&Utc::now());
    let mut inserted = 0;

    for chunk in orders.chunks(INSERT_CHUNK_ROWS) {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "INSERT INTO orders (source, import_id, source_order_id, latitude, longitude, \
             subtotal, ordered_at, created_at) ",
        );
        builder.push_values(chunk, |mut b, order| {
            b.push_bind(OrderSource::Import.as_str())
                .push_bind(import_id)
                .push_bind(order.source_order_id)
                .push_bind(order.latitude)
                .push_bind(order.longitude)
                .push_bind(order.subtotal.to_string())
                .push_bind(encode_timestamp(&order.ordered_at))
                .push_bind(created_at.clone());
        });
        inserted += builder.build().execute(&mut *conn).await?.rows_affected();
    }

    debug!(import_id, count = inserted, "Inserted imported orders");
    Ok(inserted)
}

/// Every order of an import, in ascending id order.
pub(crate) async fn points_for_import(
    conn: &mut SqliteConnection,
    import_id: i64,
) -> DbResult<Vec<OrderPoint>> {
    let rows: Vec<(i64, String, f64, f64)> = sqlx::query_as(
        r#"
        SELECT id, subtotal, latitude, longitude
        FROM orders
        WHERE import_id = ?1
        ORDER BY id
        "#,
    )
    .bind(import_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|(order_id, subtotal, latitude, longitude)| {
            Ok(OrderPoint {
                order_id,
                subtotal: decode_decimal(TABLE, order_id, "subtotal", &subtotal)?,
                point: GeoPoint::new(latitude, longitude),
            })
        })
        .collect()
}

pub(crate) async fn fetch_with_tax(
    conn: &mut SqliteConnection,
    order_id: i64,
) -> DbResult<Option<OrderWithTax>> {
    let sql = format!(
        "SELECT {ORDER_WITH_TAX_COLUMNS} FROM orders o \
         JOIN order_taxes t ON t.order_id = o.id WHERE o.id = ?1"
    );
    let row = sqlx::query_as::<_, OrderWithTaxRow>(&sql)
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(OrderWithTaxRow::into_order_with_tax).transpose()
}

fn push_listing_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &OrderFilter) {
    builder.push(" FROM orders o JOIN order_taxes t ON t.order_id = o.id WHERE t.status = 'calculated'");

    if let Some(from) = &filter.date_from {
        builder.push(" AND o.ordered_at >= ").push_bind(encode_timestamp(from));
    }
    if let Some(to) = &filter.date_to {
        builder.push(" AND o.ordered_at <= ").push_bind(encode_timestamp(to));
    }
    if let Some(min) = &filter.min_subtotal {
        builder
            .push(" AND CAST(o.subtotal AS REAL) >= CAST(")
            .push_bind(min.to_string())
            .push(" AS REAL)");
    }
    if let Some(max) = &filter.max_subtotal {
        builder
            .push(" AND CAST(o.subtotal AS REAL) <= CAST(")
            .push_bind(max.to_string())
            .push(" AS REAL)");
    }
}

/// One page of calculated orders, newest id first.
pub(crate) async fn list_calculated(
    conn: &mut SqliteConnection,
    filter: &OrderFilter,
    limit: i64,
    offset: i64,
) -> DbResult<Vec<OrderWithTax>> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT ");
    builder.push(ORDER_WITH_TAX_COLUMNS);
    push_listing_filter(&mut builder, filter);
    builder
        .push(" ORDER BY o.id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = builder
        .build_query_as::<OrderWithTaxRow>()
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter()
        .map(OrderWithTaxRow::into_order_with_tax)
        .collect()
}

pub(crate) async fn count_calculated(
    conn: &mut SqliteConnection,
    filter: &OrderFilter,
) -> DbResult<i64> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*)");
    push_listing_filter(&mut builder, filter);

    let count = builder
        .build_query_scalar::<i64>()
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order reads.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order with its tax record, whatever the tax status.
    pub async fn get_with_tax(&self, order_id: i64) -> DbResult<Option<OrderWithTax>> {
        let mut conn = self.pool.acquire().await?;
        fetch_with_tax(&mut conn, order_id).await
    }

    /// Lists calculated orders, newest first, with the unpaged total.
    ///
    /// Both queries run on one connection inside a read transaction so the
    /// page and the total agree.
    pub async fn list(
        &self,
        filter: &OrderFilter,
        limit: i64,
        offset: i64,
    ) -> DbResult<(Vec<OrderWithTax>, i64)> {
        let mut tx = self.pool.begin().await?;
        let items = list_calculated(&mut tx, filter, limit, offset).await?;
        let total = count_calculated(&mut tx, filter).await?;
        tx.commit().await?;
        Ok((items, total))
    }

    /// Total number of orders, whatever their source or tax status.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::TimeZone;
    use nytax_core::{Jurisdictions, OrderTax, TaxBreakdown, TaxOutcome};

    fn new_order(subtotal: &str, day: u32) -> NewOrder {
        NewOrder {
            latitude: 40.7,
            longitude: -73.9,
            subtotal: subtotal.parse().unwrap(),
            ordered_at: Utc.with_ymd_and_hms(2025, 11, day, 12, 0, 0).unwrap(),
            source_order_id: None,
        }
    }

    fn calculated(order_id: i64) -> OrderTax {
        OrderTax::new(
            order_id,
            TaxOutcome::Calculated {
                breakdown: TaxBreakdown {
                    composite_rate: "0.085".parse().unwrap(),
                    tax_amount: "1.00".parse().unwrap(),
                    total_amount: "2.00".parse().unwrap(),
                    state_rate: "0.04".parse().unwrap(),
                    county_rate: "0.045".parse().unwrap(),
                    city_rate: Decimal::ZERO,
                    special_rates: vec![],
                },
                jurisdictions: Jurisdictions {
                    state: Some("NY".to_string()),
                    county: Some("Kings".to_string()),
                    city: None,
                    special: vec![],
                },
            },
        )
    }

    fn failed(order_id: i64) -> OrderTax {
        OrderTax::new(
            order_id,
            TaxOutcome::Failed {
                error: "point outside jurisdiction boundaries".to_string(),
                jurisdictions: Jurisdictions::default(),
            },
        )
    }

    /// Five orders on days 1..=5; the third fails tax calculation.
    async fn seeded() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();
        for (day, subtotal) in [(1, "10.00"), (2, "20.00"), (3, "30.00"), (4, "40.00"), (5, "50.00")] {
            let order = tx.insert_manual_order(&new_order(subtotal, day)).await.unwrap();
            let tax = if day == 3 { failed(order.id) } else { calculated(order.id) };
            tx.insert_order_tax(&tax).await.unwrap();
        }
        tx.commit().await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_list_excludes_failed_and_orders_by_id_desc() {
        let db = seeded().await;
        let (items, total) = db.orders().list(&OrderFilter::default(), 20, 0).await.unwrap();

        assert_eq!(total, 4);
        let ids: Vec<i64> = items.iter().map(|i| i.order.id).collect();
        assert_eq!(ids, vec![5, 4, 2, 1]);
    }

    #[tokio::test]
    async fn test_list_paging() {
        let db = seeded().await;
        let (items, total) = db.orders().list(&OrderFilter::default(), 2, 1).await.unwrap();

        assert_eq!(total, 4);
        let ids: Vec<i64> = items.iter().map(|i| i.order.id).collect();
        assert_eq!(ids, vec![4, 2]);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let db = seeded().await;
        let filter = OrderFilter {
            date_from: Some(Utc.with_ymd_and_hms(2025, 11, 2, 0, 0, 0).unwrap()),
            date_to: None,
            min_subtotal: None,
            max_subtotal: Some("40.00".parse().unwrap()),
        };

        let (items, total) = db.orders().list(&filter, 20, 0).await.unwrap();
        assert_eq!(total, 2);
        let ids: Vec<i64> = items.iter().map(|i| i.order.id).collect();
        assert_eq!(ids, vec![4, 2]);
    }

    #[tokio::test]
    async fn test_imported_orders_bulk_insert() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();
        let import_id = tx.create_import("a.csv", "h").await.unwrap();

        let orders: Vec<NewOrder> = (0..1200)
            .map(|i| NewOrder {
                source_order_id: Some(i),
                ..new_order("1.00", 1)
            })
            .collect();
        assert_eq!(tx.bulk_insert_imported_orders(import_id, &orders).await.unwrap(), 1200);
        assert_eq!(tx.bulk_insert_imported_orders(import_id, &[]).await.unwrap(), 0);

        let points = points_for_import(tx.connection(), import_id).await.unwrap();
        assert_eq!(points.len(), 1200);
        assert!(points.windows(2).all(|w| w[0].order_id < w[1].order_id));
        tx.commit().await.unwrap();

        assert_eq!(db.orders().count().await.unwrap(), 1200);
    }

    #[tokio::test]
    async fn test_get_with_tax_returns_failed_too() {
        let db = seeded().await;
        let item = db.orders().get_with_tax(3).await.unwrap().unwrap();
        assert!(!item.tax.outcome.is_calculated());
        assert!(db.orders().get_with_tax(99).await.unwrap().is_none());
    }
}
