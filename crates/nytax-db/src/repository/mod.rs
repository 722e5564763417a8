//! # Repository Module
//!
//! Database repository implementations for NY Tax.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  Each module owns the SQL for one table, written once as functions     │
//! │  over `&mut SqliteConnection`. Two callers share them:                 │
//! │                                                                         │
//! │  Read side                      Write side                             │
//! │  ─────────                      ──────────                             │
//! │  db.orders().list(..)           db.begin() → WriteTransaction          │
//! │  db.imports().get_by_id(..)       .insert_manual_order(..)             │
//! │       │                           .bulk_insert_order_taxes(..)         │
//! │       │ pooled connection         │ connection inside the transaction  │
//! │       ▼                           ▼                                     │
//! │  order::list_calculated   ◄── same functions ──►  order_tax::insert    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ImportRepository`] - Import lookup by hash and id
//! - [`OrderRepository`] - Order reads and paged listing
//! - [`BoundaryRepository`] - Boundary loading and counts

pub mod boundary;
pub mod import;
pub mod order;
pub mod order_tax;

pub use boundary::BoundaryRepository;
pub use import::{ImportRepository, ImportStats};
pub use order::{OrderFilter, OrderRepository};
pub use order_tax::TaxStatusCounts;

/// Rows per multi-row INSERT. Keeps bound parameters well under SQLite's limit.
pub(crate) const INSERT_CHUNK_ROWS: usize = 500;
