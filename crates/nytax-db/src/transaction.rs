//! # Write Transactions
//!
//! A scoped unit of work over one connection.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  let mut tx = db.begin().await?;                                        │
//! │       │                                                                 │
//! │       ├── tx.create_import(..)                                          │
//! │       ├── tx.bulk_insert_imported_orders(..)                            │
//! │       ├── resolver.resolve_batch(tx.connection(), ..)                   │
//! │       ├── tx.bulk_insert_order_taxes(..)                                │
//! │       └── tx.update_import_stats(..)                                    │
//! │       │                                                                 │
//! │       ├── tx.commit()   → all writes visible at once                    │
//! │       └── drop / error  → everything rolled back                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Dropping a [`WriteTransaction`] without committing rolls it back. That
//! covers `?` early returns and a caller abandoning the future mid-flight.

use sqlx::{Sqlite, SqliteConnection, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::{boundary, import, order, order_tax, ImportStats};
use nytax_core::{Boundary, BoundaryKind, NewOrder, Order, OrderTax, OrderWithTax};

/// An open write transaction.
pub struct WriteTransaction {
    tx: Transaction<'static, Sqlite>,
}

impl std::fmt::Debug for WriteTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteTransaction").finish_non_exhaustive()
    }
}

impl WriteTransaction {
    pub(crate) fn new(tx: Transaction<'static, Sqlite>) -> Self {
        WriteTransaction { tx }
    }

    /// The transaction's connection, for collaborators that run their own
    /// queries (resolvers).
    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Creates an import record with empty statistics.
    ///
    /// ## Errors
    /// `DbError::UniqueViolation` on `imports.content_hash` when the same
    /// content was imported concurrently.
    pub async fn create_import(&mut self, file_name: &str, content_hash: &str) -> DbResult<i64> {
        import::insert(&mut self.tx, file_name, content_hash).await
    }

    /// Writes an import's final statistics. Allowed once per import.
    pub async fn update_import_stats(&mut self, import_id: i64, stats: ImportStats) -> DbResult<()> {
        import::write_stats(&mut self.tx, import_id, stats).await
    }

    /// Inserts a single manual order.
    pub async fn insert_manual_order(&mut self, new_order: &NewOrder) -> DbResult<Order> {
        order::insert_manual(&mut self.tx, new_order).await
    }

    /// Inserts all orders of an import. A correct no-op for an empty slice.
    pub async fn bulk_insert_imported_orders(
        &mut self,
        import_id: i64,
        orders: &[NewOrder],
    ) -> DbResult<u64> {
        order::insert_imported(&mut self.tx, import_id, orders).await
    }

    /// Inserts one tax record.
    pub async fn insert_order_tax(&mut self, tax: &OrderTax) -> DbResult<()> {
        order_tax::insert(&mut self.tx, tax).await
    }

    /// Inserts many tax records. A correct no-op for an empty slice.
    pub async fn bulk_insert_order_taxes(&mut self, taxes: &[OrderTax]) -> DbResult<u64> {
        order_tax::insert_many(&mut self.tx, taxes).await
    }

    /// Reads an order joined with its tax record, as this transaction sees it.
    pub async fn fetch_order_with_tax(&mut self, order_id: i64) -> DbResult<Option<OrderWithTax>> {
        order::fetch_with_tax(&mut self.tx, order_id).await
    }

    /// Replaces all boundaries of one kind.
    pub async fn replace_boundaries(
        &mut self,
        kind: BoundaryKind,
        boundaries: &[Boundary],
    ) -> DbResult<u64> {
        boundary::replace_kind(&mut self.tx, kind, boundaries).await
    }

    /// Commits every write made through this transaction.
    pub async fn commit(self) -> DbResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|err| DbError::TransactionFailed(err.to_string()))?;
        debug!("Transaction committed");
        Ok(())
    }

    /// Rolls back explicitly. Dropping has the same effect.
    pub async fn rollback(self) -> DbResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|err| DbError::TransactionFailed(err.to_string()))?;
        debug!("Transaction rolled back");
        Ok(())
    }
}
