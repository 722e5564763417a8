//! # Import Repository
//!
//! Database operations for bulk import records.
//!
//! ## Import Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Import Lifecycle                                  │
//! │                                                                         │
//! │  1. CREATE (inside the import transaction)                             │
//! │     └── insert() → id, stats NULL                                      │
//! │         content_hash UNIQUE: a racing duplicate fails here             │
//! │                                                                         │
//! │  2. ORDERS + TAXES written under the same transaction                  │
//! │                                                                         │
//! │  3. FINALIZE                                                           │
//! │     └── write_stats() → total / inserted / failed, exactly once        │
//! │                                                                         │
//! │  Rollback at any point leaves no import row behind.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::codec::{decode_timestamp, encode_timestamp};
use crate::error::{DbError, DbResult};
use crate::repository::order_tax::{self, TaxStatusCounts};
use nytax_core::Import;

/// Row statistics written when an import finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub total_rows: i64,
    pub inserted_rows: i64,
    pub failed_rows: i64,
}

#[derive(Debug, FromRow)]
struct ImportRow {
    id: i64,
    file_name: String,
    content_hash: String,
    total_rows: Option<i64>,
    inserted_rows: Option<i64>,
    failed_rows: Option<i64>,
    created_at: String,
}

impl ImportRow {
    fn into_import(self) -> DbResult<Import> {
        Ok(Import {
            created_at: decode_timestamp("imports", self.id, &self.created_at)?,
            id: self.id,
            file_name: self.file_name,
            content_hash: self.content_hash,
            total_rows: self.total_rows,
            inserted_rows: self.inserted_rows,
            failed_rows: self.failed_rows,
        })
    }
}

// =============================================================================
// Shared SQL
// =============================================================================

pub(crate) async fn insert(
    conn: &mut SqliteConnection,
    file_name: &str,
    content_hash: &str,
) -> DbResult<i64> {
    debug!(file_name = %file_name, content_hash = %content_hash, "Creating import");

    let result = sqlx::query(
        "INSERT INTO imports (file_name, content_hash, created_at) VALUES (?1, ?2, ?3)",
    )
    .bind(file_name)
    .bind(content_hash)
    .bind(encode_timestamp(&Utc::now()))
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub(crate) async fn find_id_by_hash(
    conn: &mut SqliteConnection,
    content_hash: &str,
) -> DbResult<Option<i64>> {
    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM imports WHERE content_hash = ?1")
        .bind(content_hash)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(id)
}

pub(crate) async fn get(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Import>> {
    let row = sqlx::query_as::<_, ImportRow>(
        r#"
        SELECT id, file_name, content_hash, total_rows, inserted_rows, failed_rows, created_at
        FROM imports
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(ImportRow::into_import).transpose()
}

/// Writes the final statistics. Refuses to overwrite stats already written.
pub(crate) async fn write_stats(
    conn: &mut SqliteConnection,
    id: i64,
    stats: ImportStats,
) -> DbResult<()> {
    debug!(
        import_id = id,
        total_rows = stats.total_rows,
        inserted_rows = stats.inserted_rows,
        failed_rows = stats.failed_rows,
        "Writing import stats"
    );

    let result = sqlx::query(
        r#"
        UPDATE imports
        SET total_rows = ?2, inserted_rows = ?3, failed_rows = ?4
        WHERE id = ?1 AND total_rows IS NULL
        "#,
    )
    .bind(id)
    .bind(stats.total_rows)
    .bind(stats.inserted_rows)
    .bind(stats.failed_rows)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("unfinished import", id));
    }
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for import reads.
#[derive(Debug, Clone)]
pub struct ImportRepository {
    pool: SqlitePool,
}

impl ImportRepository {
    /// Creates a new ImportRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ImportRepository { pool }
    }

    /// Finds the import that already holds this content hash.
    pub async fn find_by_hash(&self, content_hash: &str) -> DbResult<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        find_id_by_hash(&mut conn, content_hash).await
    }

    /// Gets an import by ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Import>> {
        let mut conn = self.pool.acquire().await?;
        get(&mut conn, id).await
    }

    /// Counts the tax outcomes of an import's orders.
    pub async fn tax_counts(&self, id: i64) -> DbResult<TaxStatusCounts> {
        let mut conn = self.pool.acquire().await?;
        order_tax::counts_for_import(&mut conn, id).await
    }

    /// Total number of imports.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM imports")
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

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_find_by_hash() {
        let db = setup().await;
        let mut tx = db.begin().await.unwrap();
        let id = tx.create_import("orders.csv", "abc123").await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(db.imports().find_by_hash("abc123").await.unwrap(), Some(id));
        assert_eq!(db.imports().find_by_hash("other").await.unwrap(), None);

        let import = db.imports().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(import.file_name, "orders.csv");
        assert!(!import.is_complete());
    }

    #[tokio::test]
    async fn test_duplicate_hash_is_unique_violation() {
        let db = setup().await;
        let mut tx = db.begin().await.unwrap();
        tx.create_import("a.csv", "same").await.unwrap();
        let err = tx.create_import("b.csv", "same").await.unwrap_err();

        assert!(err.is_unique_violation_on("imports.content_hash"));
    }

    #[tokio::test]
    async fn test_stats_written_once() {
        let db = setup().await;
        let mut tx = db.begin().await.unwrap();
        let id = tx.create_import("a.csv", "hash").await.unwrap();

        let stats = ImportStats {
            total_rows: 3,
            inserted_rows: 2,
            failed_rows: 1,
        };
        tx.update_import_stats(id, stats).await.unwrap();
        let err = tx.update_import_stats(id, stats).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        tx.commit().await.unwrap();

        let import = db.imports().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(import.total_rows, Some(3));
        assert_eq!(import.failed_rows, Some(1));
    }

    #[tokio::test]
    async fn test_rollback_leaves_no_import() {
        let db = setup().await;
        {
            let mut tx = db.begin().await.unwrap();
            tx.create_import("a.csv", "dropped").await.unwrap();
            // dropped without commit
        }
        assert_eq!(db.imports().find_by_hash("dropped").await.unwrap(), None);
        assert_eq!(db.imports().count().await.unwrap(), 0);
    }
}
