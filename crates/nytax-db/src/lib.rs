//! # nytax-db: Database Layer for NY Tax
//!
//! SQLite storage for imports, orders, tax records and jurisdiction
//! boundaries, plus the resolvers that map a point to its jurisdictions.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        NY Tax Data Flow                                 │
//! │                                                                         │
//! │  nytax-service (ImportPipeline, OrderService)                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     nytax-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │  ┌──────────────┐  ┌────────────────┐  ┌─────────────────────┐  │   │
//! │  │  │  Database    │  │ Repositories   │  │ WriteTransaction    │  │   │
//! │  │  │  (pool.rs)   │  │ imports        │  │ all writes, one     │  │   │
//! │  │  │  SqlitePool  │◄─│ orders         │  │ commit or rollback  │  │   │
//! │  │  │  migrations  │  │ boundaries     │  └─────────────────────┘  │   │
//! │  │  └──────────────┘  └────────────────┘  ┌─────────────────────┐  │   │
//! │  │                                        │ Resolvers           │  │   │
//! │  │                                        │ memory / spatial    │  │   │
//! │  │                                        └─────────────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (NYTAX_DATABASE_PATH)                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Read-side repositories and the shared SQL
//! - [`transaction`] - Scoped write transactions
//! - [`resolver`] - Jurisdiction resolver backends
//!
//! ## Storage Encoding
//!
//! Money and rates are stored as decimal TEXT so nothing passes through a
//! float. Timestamps are fixed-width UTC TEXT, which sorts chronologically.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nytax_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("nytax.db")).await?;
//! let mut tx = db.begin().await?;
//! let import_id = tx.create_import("orders.csv", &hash).await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

mod codec;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod resolver;
pub mod transaction;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use migrations::MigrationStatus;
pub use pool::{Database, DbConfig, DbLocation};
pub use repository::{
    BoundaryRepository, ImportRepository, ImportStats, OrderFilter, OrderRepository,
    TaxStatusCounts,
};
pub use resolver::{
    build_resolver, InMemoryResolver, JurisdictionResolver, ResolverBackend, SpatialResolver,
};
pub use transaction::WriteTransaction;
