//! # Import Pipeline
//!
//! Turns one uploaded CSV file into orders and tax records.
//!
//! ## Stages
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Import Pipeline                                 │
//! │                                                                         │
//! │  RECEIVED ──► HASHED ──┬──► DUPLICATE (existing import id, no writes)   │
//! │                        │                                                │
//! │                        ▼            ┌── one write transaction ───────┐  │
//! │                  IMPORT_CREATED ────┤  UNIQUE(content_hash) race ──► │  │
//! │                        │            │  rollback, report DUPLICATE    │  │
//! │                        ▼            │                                │  │
//! │                     PARSED          │  bad rows counted, not fatal   │  │
//! │                        ▼            │                                │  │
//! │               ORDERS_PERSISTED      │  chunked multi-row INSERT      │  │
//! │                        ▼            │                                │  │
//! │            JURISDICTIONS_RESOLVED   │  resolver batch, by order id   │  │
//! │                        ▼            │                                │  │
//! │                 TAXES_COMPUTED      │  pure, per order               │  │
//! │                        ▼            │                                │  │
//! │                TAXES_PERSISTED      │                                │  │
//! │                        ▼            │                                │  │
//! │                 STATS_UPDATED       │  written exactly once          │  │
//! │                        ▼            └────────────────────────────────┘  │
//! │                      DONE  (commit)                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any error after IMPORT_CREATED drops the transaction, which rolls back
//! every write of the request, the import row included.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use ts_rs::TS;

use crate::error::{ServiceError, ServiceResult};
use nytax_core::ingest::{content_hash, parse_import};
use nytax_core::{tax_for_resolved, ImportSummary, NewOrder, OrderTax, TaxRateTable};
use nytax_db::{Database, ImportStats, JurisdictionResolver};

/// Pipeline position, logged at each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStage {
    Received,
    Hashed,
    Duplicate,
    ImportCreated,
    Parsed,
    OrdersPersisted,
    JurisdictionsResolved,
    TaxesComputed,
    TaxesPersisted,
    StatsUpdated,
    Done,
}

impl ImportStage {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ImportStage::Received => "received",
            ImportStage::Hashed => "hashed",
            ImportStage::Duplicate => "duplicate",
            ImportStage::ImportCreated => "import_created",
            ImportStage::Parsed => "parsed",
            ImportStage::OrdersPersisted => "orders_persisted",
            ImportStage::JurisdictionsResolved => "jurisdictions_resolved",
            ImportStage::TaxesComputed => "taxes_computed",
            ImportStage::TaxesPersisted => "taxes_persisted",
            ImportStage::StatsUpdated => "stats_updated",
            ImportStage::Done => "done",
        }
    }
}

/// Result of running the pipeline on one file.
///
/// ```json
/// {"status": "completed", "import_id": 1, "total_rows": 3, ...}
/// {"status": "already_imported", "import_id": 1}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "status", rename_all = "snake_case")]
#[ts(export)]
pub enum ImportOutcome {
    /// The file was new and has been fully written.
    Completed(ImportSummary),
    /// The same bytes were imported before. Nothing was written.
    AlreadyImported { import_id: i64 },
}

impl ImportOutcome {
    pub fn import_id(&self) -> i64 {
        match self {
            ImportOutcome::Completed(summary) => summary.import_id,
            ImportOutcome::AlreadyImported { import_id } => *import_id,
        }
    }
}

/// Bulk import of order files.
#[derive(Debug, Clone)]
pub struct ImportPipeline {
    db: Database,
    rates: Arc<TaxRateTable>,
    resolver: Arc<dyn JurisdictionResolver>,
}

impl ImportPipeline {
    pub fn new(
        db: Database,
        rates: Arc<TaxRateTable>,
        resolver: Arc<dyn JurisdictionResolver>,
    ) -> Self {
        ImportPipeline {
            db,
            rates,
            resolver,
        }
    }

    /// Imports one file.
    ///
    /// ## Returns
    /// * `ImportOutcome::Completed` with row and tax counts
    /// * `ImportOutcome::AlreadyImported` when these exact bytes were seen
    ///   before, including when a concurrent import of them won the race
    ///
    /// ## Errors
    /// `ServiceError::Persistence` when storage fails (nothing is kept),
    /// `ServiceError::ConsistencyViolation` when resolution loses orders.
    pub async fn run(&self, file_name: &str, bytes: &[u8]) -> ServiceResult<ImportOutcome> {
        info!(file_name, bytes = bytes.len(), stage = ImportStage::Received.as_str(), "Import received");

        let hash = content_hash(bytes);
        debug!(file_name, hash = %hash, stage = ImportStage::Hashed.as_str(), "Import hashed");

        // Optimistic pre-check outside the write transaction. The UNIQUE
        // constraint in `write` is the authoritative guard.
        if let Some(import_id) = self.db.imports().find_by_hash(&hash).await? {
            warn!(file_name, import_id, stage = ImportStage::Duplicate.as_str(), "File already imported");
            return Ok(ImportOutcome::AlreadyImported { import_id });
        }

        self.write(file_name, &hash, bytes).await
    }

    /// Everything after the duplicate pre-check, in one transaction.
    async fn write(&self, file_name: &str, hash: &str, bytes: &[u8]) -> ServiceResult<ImportOutcome> {
        let mut tx = self.db.begin().await?;

        let import_id = match tx.create_import(file_name, hash).await {
            Ok(id) => id,
            Err(err) if err.is_unique_violation_on("imports.content_hash") => {
                // Lost the race. Release the connection before looking up
                // the winner.
                tx.rollback().await?;
                let import_id = self.db.imports().find_by_hash(hash).await?.ok_or_else(|| {
                    ServiceError::consistency(format!(
                        "content hash {hash} conflicted but no import holds it"
                    ))
                })?;
                warn!(file_name, import_id, stage = ImportStage::Duplicate.as_str(), "Concurrent import of the same file");
                return Ok(ImportOutcome::AlreadyImported { import_id });
            }
            Err(err) => return Err(err.into()),
        };
        info!(import_id, file_name, stage = ImportStage::ImportCreated.as_str(), "Import created");

        let parsed = parse_import(bytes);
        for failure in &parsed.failures {
            debug!(import_id, line = failure.line, reason = %failure.reason, "Row rejected");
        }
        info!(
            import_id,
            total_rows = parsed.total_rows(),
            valid_rows = parsed.valid_rows(),
            failed_rows = parsed.failed_rows(),
            stage = ImportStage::Parsed.as_str(),
            "Import parsed"
        );

        let total_rows = parsed.total_rows() as i64;
        let failed_rows = parsed.failed_rows() as i64;
        let orders: Vec<NewOrder> = parsed.rows.into_iter().map(NewOrder::from).collect();

        let inserted = tx.bulk_insert_imported_orders(import_id, &orders).await?;
        info!(import_id, inserted, stage = ImportStage::OrdersPersisted.as_str(), "Orders persisted");

        let resolved = self
            .resolver
            .resolve_batch(tx.connection(), import_id)
            .await?;
        if resolved.len() as u64 != inserted {
            error!(import_id, inserted, resolved = resolved.len(), "Resolution lost orders");
            return Err(ServiceError::consistency(format!(
                "import {import_id}: inserted {inserted} orders but resolved {}",
                resolved.len()
            )));
        }
        info!(
            import_id,
            resolved = resolved.len(),
            backend = %self.resolver.backend(),
            stage = ImportStage::JurisdictionsResolved.as_str(),
            "Jurisdictions resolved"
        );

        let taxes: Vec<OrderTax> = resolved
            .iter()
            .map(|order| tax_for_resolved(order, &self.rates))
            .collect();
        let taxes_calculated = taxes.iter().filter(|t| t.outcome.is_calculated()).count() as i64;
        let taxes_failed = taxes.len() as i64 - taxes_calculated;
        info!(
            import_id,
            taxes_calculated,
            taxes_failed,
            stage = ImportStage::TaxesComputed.as_str(),
            "Taxes computed"
        );

        let taxes_created = tx.bulk_insert_order_taxes(&taxes).await? as i64;
        info!(import_id, taxes_created, stage = ImportStage::TaxesPersisted.as_str(), "Taxes persisted");

        let stats = ImportStats {
            total_rows,
            inserted_rows: inserted as i64,
            failed_rows,
        };
        tx.update_import_stats(import_id, stats).await?;
        debug!(import_id, stage = ImportStage::StatsUpdated.as_str(), "Import stats written");

        tx.commit().await?;

        let summary = ImportSummary {
            import_id,
            total_rows: stats.total_rows,
            inserted_rows: stats.inserted_rows,
            failed_rows: stats.failed_rows,
            taxes_created,
            taxes_calculated,
            taxes_failed,
        };
        info!(
            import_id,
            total_rows = summary.total_rows,
            inserted_rows = summary.inserted_rows,
            failed_rows = summary.failed_rows,
            stage = ImportStage::Done.as_str(),
            "Import complete"
        );
        Ok(ImportOutcome::Completed(summary))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
