//! # Database Error Types
//!
//! Typed storage failures, mapped from `sqlx::Error` by constraint kind.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ServiceError (nytax-service) ← Persistence failure / duplicate        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (CLI) ← Stable code + message                                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::error::ErrorKind;
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// A row the caller expected is missing.
    ///
    /// ## When This Occurs
    /// - Recording stats for an import id that doesn't exist, or whose
    ///   stats were already written
    /// - `fetch_one` returns no rows
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// UNIQUE constraint violation. `field` is SQLite's `table.column`.
    ///
    /// ## When This Occurs
    /// - Two imports of the same file racing past the duplicate pre-check
    /// - A second tax record for the same order
    #[error("Duplicate value for {field}")]
    UniqueViolation { field: String },

    /// FOREIGN KEY constraint violation.
    ///
    /// ## When This Occurs
    /// - Tax record for an order that doesn't exist
    /// - Order tagged with an unknown import id
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// CHECK constraint violation.
    ///
    /// ## When This Occurs
    /// - Coordinates out of range reached the database
    /// - A calculated tax row without rates, or a failed one without
    ///   `error_text`
    /// - An import order without `import_id`, or a manual order with one
    #[error("Check constraint failed: {0}")]
    CheckViolation(String),

    /// The database file can't be opened or the pool is closed.
    ///
    /// ## When This Occurs
    /// - Missing directory or no write permission
    /// - Disk full
    /// - Using a `Database` after `close`
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Any other SQL error.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed to begin, commit or roll back.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// A stored row could not be turned back into a domain value.
    ///
    /// ## When This Occurs
    /// - Decimal or timestamp text that no longer parses
    /// - A tax row whose status disagrees with its columns
    #[error("Corrupt {table} row {id}: {reason}")]
    CorruptRow {
        table: &'static str,
        id: i64,
        reason: String,
    },

    /// A JSON column could not be encoded.
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// Every pooled connection stayed busy past the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        DbError::NotFound { entity, id }
    }

    pub(crate) fn corrupt(table: &'static str, id: i64, reason: impl Into<String>) -> Self {
        DbError::CorruptRow {
            table,
            id,
            reason: reason.into(),
        }
    }

    /// True for a unique violation on the given `table.column`.
    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field } if field == column)
    }
}

/// ## Mapping
/// ```text
/// RowNotFound                  → NotFound
/// Database, UniqueViolation    → UniqueViolation { table.column }
/// Database, ForeignKeyViolation→ ForeignKeyViolation
/// Database, CheckViolation     → CheckViolation
/// Database, other              → QueryFailed
/// PoolTimedOut                 → PoolExhausted
/// PoolClosed                   → ConnectionFailed
/// anything else                → Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "row",
                id: 0,
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                match db_err.kind() {
                    // "UNIQUE constraint failed: imports.content_hash"
                    ErrorKind::UniqueViolation => DbError::UniqueViolation {
                        field: msg
                            .strip_prefix("UNIQUE constraint failed: ")
                            .unwrap_or(msg)
                            .to_string(),
                    },
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation(msg.to_string()),
                    ErrorKind::CheckViolation => DbError::CheckViolation(msg.to_string()),
                    _ => DbError::QueryFailed(msg.to_string()),
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Encoding(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
