//! # Jurisdiction Resolvers
//!
//! Point → (county, city) lookup, single and batched.
//!
//! ## Backends
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 dyn JurisdictionResolver                                │
//! │                                                                         │
//! │  ┌───────────────────────────┐    ┌───────────────────────────────┐    │
//! │  │   InMemoryResolver        │    │   SpatialResolver             │    │
//! │  │   ─────────────────────   │    │   ─────────────────────────   │    │
//! │  │   BoundarySet held in RAM │    │   geo_boundaries table        │    │
//! │  │   loaded once at startup  │    │   bbox prefilter in SQL,      │    │
//! │  │                           │    │   exact test in Rust          │    │
//! │  └───────────────────────────┘    └───────────────────────────────┘    │
//! │                                                                         │
//! │  Both: first covering boundary of each kind wins, in load order.       │
//! │  Batch form returns one entry per order of the import, ascending id.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The backend is chosen once at startup and shared as
//! `Arc<dyn JurisdictionResolver>`. Callers pass the connection of their own
//! transaction so batch resolution sees orders that are not committed yet.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use tracing::debug;

use crate::codec::decode_decimal;
use crate::error::{DbError, DbResult};
use crate::repository::{boundary, order};
use nytax_core::geo::first_covering;
use nytax_core::{
    Boundary, BoundaryKind, BoundarySet, GeoPoint, Geometry, Jurisdiction, ResolvedOrder,
};

// =============================================================================
// Trait
// =============================================================================

/// Looks up the jurisdictions a point falls in.
#[async_trait]
pub trait JurisdictionResolver: Send + Sync + fmt::Debug {
    /// Which backend this is.
    fn backend(&self) -> ResolverBackend;

    /// Resolves a single point.
    async fn resolve(&self, conn: &mut SqliteConnection, point: GeoPoint) -> DbResult<Jurisdiction>;

    /// Resolves every order of an import, ordered by order id.
    async fn resolve_batch(
        &self,
        conn: &mut SqliteConnection,
        import_id: i64,
    ) -> DbResult<Vec<ResolvedOrder>>;
}

/// Available resolver backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverBackend {
    /// Boundaries held in process memory.
    Memory,
    /// Boundaries queried from the database.
    Spatial,
}

impl fmt::Display for ResolverBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverBackend::Memory => f.write_str("memory"),
            ResolverBackend::Spatial => f.write_str("spatial"),
        }
    }
}

impl FromStr for ResolverBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" | "in_memory" => Ok(ResolverBackend::Memory),
            "spatial" | "db" | "database" => Ok(ResolverBackend::Spatial),
            other => Err(format!(
                "unknown resolver backend '{other}' (expected 'memory' or 'spatial')"
            )),
        }
    }
}

// =============================================================================
// In-Memory Backend
// =============================================================================

/// Resolver over a [`BoundarySet`] held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryResolver {
    boundaries: Arc<BoundarySet>,
}

impl InMemoryResolver {
    pub fn new(boundaries: BoundarySet) -> Self {
        InMemoryResolver {
            boundaries: Arc::new(boundaries),
        }
    }

    pub fn boundaries(&self) -> &BoundarySet {
        &self.boundaries
    }
}

#[async_trait]
impl JurisdictionResolver for InMemoryResolver {
    fn backend(&self) -> ResolverBackend {
        ResolverBackend::Memory
    }

    async fn resolve(&self, _conn: &mut SqliteConnection, point: GeoPoint) -> DbResult<Jurisdiction> {
        Ok(self.boundaries.resolve(point))
    }

    async fn resolve_batch(
        &self,
        conn: &mut SqliteConnection,
        import_id: i64,
    ) -> DbResult<Vec<ResolvedOrder>> {
        let points = order::points_for_import(conn, import_id).await?;
        debug!(import_id, orders = points.len(), "Resolving import in memory");

        Ok(points
            .into_iter()
            .map(|p| ResolvedOrder {
                order_id: p.order_id,
                subtotal: p.subtotal,
                jurisdiction: self.boundaries.resolve(p.point),
            })
            .collect())
    }
}

// =============================================================================
// Spatial (Database) Backend
// =============================================================================

/// Resolver over the `geo_boundaries` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpatialResolver;

impl SpatialResolver {
    pub fn new() -> Self {
        SpatialResolver
    }
}

/// One (order, candidate boundary) pair from the batch join. The boundary
/// columns are NULL when no bounding box contains the order.
#[derive(Debug, FromRow)]
struct CandidateRow {
    order_id: i64,
    subtotal: String,
    latitude: f64,
    longitude: f64,
    boundary_id: Option<i64>,
    kind: Option<BoundaryKind>,
    name: Option<String>,
    geometry: Option<String>,
}

/// Collects candidates for one order and picks the first covering of each kind.
#[derive(Default)]
struct PendingOrder {
    counties: Vec<Boundary>,
    cities: Vec<Boundary>,
}

impl PendingOrder {
    fn finish(self, point: GeoPoint) -> Jurisdiction {
        Jurisdiction::new(
            first_covering(&self.counties, point),
            first_covering(&self.cities, point),
        )
    }
}

#[async_trait]
impl JurisdictionResolver for SpatialResolver {
    fn backend(&self) -> ResolverBackend {
        ResolverBackend::Spatial
    }

    async fn resolve(&self, conn: &mut SqliteConnection, point: GeoPoint) -> DbResult<Jurisdiction> {
        let mut set = BoundarySet::new();
        set.extend(boundary::candidates_for_point(conn, point).await?);
        Ok(set.resolve(point))
    }

    async fn resolve_batch(
        &self,
        conn: &mut SqliteConnection,
        import_id: i64,
    ) -> DbResult<Vec<ResolvedOrder>> {
        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT
                o.id AS order_id,
                o.subtotal,
                o.latitude,
                o.longitude,
                b.id AS boundary_id,
                b.kind,
                b.name,
                b.geometry
            FROM orders o
            LEFT JOIN geo_boundaries b
                ON o.longitude BETWEEN b.min_longitude AND b.max_longitude
               AND o.latitude BETWEEN b.min_latitude AND b.max_latitude
            WHERE o.import_id = ?1
            ORDER BY o.id, b.id
            "#,
        )
        .bind(import_id)
        .fetch_all(&mut *conn)
        .await?;

        debug!(import_id, candidate_rows = rows.len(), "Resolving import spatially");

        // Many orders share the same few boundaries; parse each geometry once.
        let mut geometries: HashMap<i64, Geometry> = HashMap::new();
        let mut resolved = Vec::new();
        let mut current: Option<(i64, String, GeoPoint, PendingOrder)> = None;

        for row in rows {
            if current.as_ref().map(|(id, ..)| *id) != Some(row.order_id) {
                if let Some((order_id, subtotal, point, pending)) = current.take() {
                    resolved.push(finish_order(order_id, &subtotal, point, pending)?);
                }
                current = Some((
                    row.order_id,
                    row.subtotal.clone(),
                    GeoPoint::new(row.latitude, row.longitude),
                    PendingOrder::default(),
                ));
            }

            let (Some(boundary_id), Some(kind), Some(name), Some(raw)) =
                (row.boundary_id, row.kind, row.name, row.geometry)
            else {
                continue;
            };

            let geometry = match geometries.get(&boundary_id) {
                Some(geometry) => geometry.clone(),
                None => {
                    let parsed = boundary::decode_geometry(boundary_id, &raw)?;
                    geometries.insert(boundary_id, parsed.clone());
                    parsed
                }
            };

            if let Some((.., pending)) = current.as_mut() {
                let candidate = Boundary {
                    kind,
                    name,
                    geometry,
                };
                match kind {
                    BoundaryKind::County => pending.counties.push(candidate),
                    BoundaryKind::City => pending.cities.push(candidate),
                }
            }
        }

        if let Some((order_id, subtotal, point, pending)) = current.take() {
            resolved.push(finish_order(order_id, &subtotal, point, pending)?);
        }

        Ok(resolved)
    }
}

fn finish_order(
    order_id: i64,
    subtotal: &str,
    point: GeoPoint,
    pending: PendingOrder,
) -> DbResult<ResolvedOrder> {
    Ok(ResolvedOrder {
        order_id,
        subtotal: decode_decimal("orders", order_id, "subtotal", subtotal)?,
        jurisdiction: pending.finish(point),
    })
}

/// Builds the configured backend.
///
/// The in-memory backend needs its boundaries up front; the spatial backend
/// reads them from the database on every lookup.
pub fn build_resolver(
    backend: ResolverBackend,
    boundaries: Option<BoundarySet>,
) -> DbResult<Arc<dyn JurisdictionResolver>> {
    match backend {
        ResolverBackend::Memory => {
            let boundaries = boundaries.ok_or_else(|| {
                DbError::Internal("in-memory resolver requires boundary documents".to_string())
            })?;
            Ok(Arc::new(InMemoryResolver::new(boundaries)))
        }
        ResolverBackend::Spatial => Ok(Arc::new(SpatialResolver::new())),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
