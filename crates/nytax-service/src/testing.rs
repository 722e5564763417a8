//! Shared test fixtures: a small rate table, square boundaries around
//! Brooklyn (Kings) and Queens, and a resolver that misbehaves on demand.

use async_trait::async_trait;
use sqlx::SqliteConnection;

use nytax_core::geo::Polygon;
use nytax_core::{
    Boundary, BoundaryKind, BoundarySet, GeoPoint, Geometry, Jurisdiction, ResolvedOrder,
    TaxRateTable,
};
use nytax_db::{
    Database, DbError, DbResult, InMemoryResolver, JurisdictionResolver, ResolverBackend,
};

pub(crate) fn rate_table() -> TaxRateTable {
    TaxRateTable::from_json_str(
        r#"{
            "consts": { "state_rate": 0.04, "mctd_rate": 0.00375 },
            "mctd_counties": ["Queens", "Westchester"],
            "counties": {
                "Kings": { "county_rate": 0.045 },
                "Queens": { "county_rate": 0.045 },
                "Westchester": { "county_rate": 0.04 }
            },
            "cities_exceptions": {
                "New York": { "city_rate": 0.045 }
            }
        }"#,
    )
    .unwrap()
}

fn rectangle(kind: BoundaryKind, name: &str, lon: (f64, f64), lat: (f64, f64)) -> Boundary {
    let (west, east) = lon;
    let (south, north) = lat;
    Boundary {
        kind,
        name: name.to_string(),
        geometry: Geometry::new(vec![Polygon {
            exterior: vec![
                [west, south],
                [east, south],
                [east, north],
                [west, north],
                [west, south],
            ],
            holes: vec![],
        }])
        .unwrap(),
    }
}

pub(crate) fn kings_and_queens() -> Vec<Boundary> {
    vec![
        rectangle(BoundaryKind::County, "Kings", (-74.05, -73.85), (40.57, 40.74)),
        rectangle(BoundaryKind::County, "Queens", (-73.85, -73.70), (40.54, 40.80)),
        rectangle(BoundaryKind::City, "New York", (-73.82, -73.805), (40.705, 40.72)),
    ]
}

pub(crate) fn boundary_set() -> BoundarySet {
    let mut set = BoundarySet::new();
    set.extend(kings_and_queens());
    set
}

/// How [`FaultyResolver::resolve_batch`] goes wrong.
#[derive(Debug, Clone, Copy)]
pub(crate) enum BatchFault {
    /// Storage error after the orders are written.
    Error,
    /// Silently loses the last order.
    DropLast,
}

/// Resolves single points correctly; batch resolution fails as configured.
#[derive(Debug)]
pub(crate) struct FaultyResolver {
    inner: InMemoryResolver,
    fault: BatchFault,
}

impl FaultyResolver {
    pub(crate) fn new(fault: BatchFault) -> Self {
        FaultyResolver {
            inner: InMemoryResolver::new(boundary_set()),
            fault,
        }
    }
}

#[async_trait]
impl JurisdictionResolver for FaultyResolver {
    fn backend(&self) -> ResolverBackend {
        self.inner.backend()
    }

    async fn resolve(&self, conn: &mut SqliteConnection, point: GeoPoint) -> DbResult<Jurisdiction> {
        self.inner.resolve(conn, point).await
    }

    async fn resolve_batch(
        &self,
        conn: &mut SqliteConnection,
        import_id: i64,
    ) -> DbResult<Vec<ResolvedOrder>> {
        match self.fault {
            BatchFault::Error => Err(DbError::QueryFailed("disk I/O error".to_string())),
            BatchFault::DropLast => {
                let mut resolved = self.inner.resolve_batch(conn, import_id).await?;
                resolved.pop();
                Ok(resolved)
            }
        }
    }
}

/// Row counts of (imports, orders, order_taxes).
pub(crate) async fn table_counts(db: &Database) -> (i64, i64, i64) {
    let mut counts = [0i64; 3];
    for (slot, table) in counts.iter_mut().zip(["imports", "orders", "order_taxes"]) {
        *slot = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(db.pool())
            .await
            .unwrap();
    }
    (counts[0], counts[1], counts[2])
}
