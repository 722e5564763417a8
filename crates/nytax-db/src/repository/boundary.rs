//! # Boundary Repository
//!
//! Stored county and city boundaries for the spatial resolver.
//!
//! Each row keeps its GeoJSON geometry plus a bounding box. Lookups filter
//! on the box in SQL and leave the exact point-in-polygon test to
//! [`nytax_core::geo`]. Rows come back in id order, which is load order, so
//! "first match wins" means the same thing here as in memory.

use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::INSERT_CHUNK_ROWS;
use nytax_core::{Boundary, BoundaryKind, BoundarySet, GeoPoint, Geometry};

#[derive(Debug, FromRow)]
pub(crate) struct BoundaryRow {
    pub id: i64,
    pub kind: BoundaryKind,
    pub name: String,
    pub geometry: String,
}

impl BoundaryRow {
    pub(crate) fn into_boundary(self) -> DbResult<Boundary> {
        Ok(Boundary {
            geometry: decode_geometry(self.id, &self.geometry)?,
            kind: self.kind,
            name: self.name,
        })
    }
}

pub(crate) fn decode_geometry(id: i64, raw: &str) -> DbResult<Geometry> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|err| DbError::corrupt("geo_boundaries", id, err.to_string()))?;
    Geometry::from_geojson(&value).map_err(|reason| DbError::corrupt("geo_boundaries", id, reason))
}

// =============================================================================
// Shared SQL
// =============================================================================

/// Replaces every boundary of one kind. Returns the number written.
pub(crate) async fn replace_kind(
    conn: &mut SqliteConnection,
    kind: BoundaryKind,
    boundaries: &[Boundary],
) -> DbResult<u64> {
    let removed = sqlx::query("DELETE FROM geo_boundaries WHERE kind = ?1")
        .bind(kind.as_str())
        .execute(&mut *conn)
        .await?
        .rows_affected();
    debug!(kind = %kind, removed, "Cleared boundaries");

    let mut inserted = 0;
    for chunk in boundaries.chunks(INSERT_CHUNK_ROWS) {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "INSERT INTO geo_boundaries (kind, name, min_longitude, min_latitude, \
             max_longitude, max_latitude, geometry) ",
        );
        builder.push_values(chunk, |mut b, boundary| {
            let bbox = boundary.bbox();
            b.push_bind(kind.as_str())
                .push_bind(boundary.name.clone())
                .push_bind(bbox.min_longitude)
                .push_bind(bbox.min_latitude)
                .push_bind(bbox.max_longitude)
                .push_bind(bbox.max_latitude)
                .push_bind(boundary.geometry.to_geojson().to_string());
        });
        inserted += builder.build().execute(&mut *conn).await?.rows_affected();
    }

    Ok(inserted)
}

/// Boundaries whose bounding box contains the point, in load order.
pub(crate) async fn candidates_for_point(
    conn: &mut SqliteConnection,
    point: GeoPoint,
) -> DbResult<Vec<Boundary>> {
    let rows = sqlx::query_as::<_, BoundaryRow>(
        r#"
        SELECT id, kind, name, geometry
        FROM geo_boundaries
        WHERE ?1 BETWEEN min_longitude AND max_longitude
          AND ?2 BETWEEN min_latitude AND max_latitude
        ORDER BY id
        "#,
    )
    .bind(point.longitude)
    .bind(point.latitude)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(BoundaryRow::into_boundary).collect()
}

pub(crate) async fn all(conn: &mut SqliteConnection) -> DbResult<Vec<Boundary>> {
    let rows = sqlx::query_as::<_, BoundaryRow>(
        "SELECT id, kind, name, geometry FROM geo_boundaries ORDER BY id",
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(BoundaryRow::into_boundary).collect()
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for boundary reads. Replacement goes through
/// [`crate::WriteTransaction::replace_boundaries`].
#[derive(Debug, Clone)]
pub struct BoundaryRepository {
    pool: SqlitePool,
}

impl BoundaryRepository {
    /// Creates a new BoundaryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BoundaryRepository { pool }
    }

    /// Loads every stored boundary into memory.
    pub async fn load_set(&self) -> DbResult<BoundarySet> {
        let mut conn = self.pool.acquire().await?;
        let mut set = BoundarySet::new();
        set.extend(all(&mut conn).await?);
        Ok(set)
    }

    /// Number of stored boundaries of one kind.
    pub async fn count(&self, kind: BoundaryKind) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM geo_boundaries WHERE kind = ?1")
            .bind(kind.as_str())
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
    use nytax_core::geo::Polygon;

    fn square(kind: BoundaryKind, name: &str, min: f64, max: f64) -> Boundary {
        Boundary {
            kind,
            name: name.to_string(),
            geometry: Geometry::new(vec![Polygon {
                exterior: vec![[min, min], [max, min], [max, max], [min, max], [min, min]],
                holes: vec![],
            }])
            .unwrap(),
        }
    }

    #[tokio::test]
    async fn test_replace_swaps_one_kind_only() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.boundaries();

        let mut tx = db.begin().await.unwrap();
        tx.replace_boundaries(BoundaryKind::County, &[square(BoundaryKind::County, "A", 0.0, 10.0)])
            .await
            .unwrap();
        tx.replace_boundaries(BoundaryKind::City, &[square(BoundaryKind::City, "Town", 1.0, 2.0)])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = db.begin().await.unwrap();
        tx.replace_boundaries(
            BoundaryKind::County,
            &[
                square(BoundaryKind::County, "B", 0.0, 10.0),
                square(BoundaryKind::County, "C", 20.0, 30.0),
            ],
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(repo.count(BoundaryKind::County).await.unwrap(), 2);
        assert_eq!(repo.count(BoundaryKind::City).await.unwrap(), 1);

        let set = repo.load_set().await.unwrap();
        let resolved = set.resolve(GeoPoint::new(1.5, 1.5));
        assert_eq!(resolved.county.as_deref(), Some("B"));
        assert_eq!(resolved.city.as_deref(), Some("Town"));
    }

    #[tokio::test]
    async fn test_candidates_use_bbox_and_load_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();
        tx.replace_boundaries(
            BoundaryKind::County,
            &[
                square(BoundaryKind::County, "Big", 0.0, 10.0),
                square(BoundaryKind::County, "Far", 50.0, 60.0),
                square(BoundaryKind::County, "Small", 4.0, 6.0),
            ],
        )
        .await
        .unwrap();

        let names: Vec<String> = candidates_for_point(tx.connection(), GeoPoint::new(5.0, 5.0))
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["Big".to_string(), "Small".to_string()]);
    }
}
