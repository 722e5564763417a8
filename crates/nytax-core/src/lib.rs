//! # nytax-core: Pure Business Logic for NY Tax
//!
//! This crate is the **heart** of NY Tax. It contains the tax rules, the
//! rate table, boundary geometry and import row parsing as pure functions
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        NY Tax Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    nytax CLI (apps/cli)                         │   │
//! │  │   import ──► create-order ──► list-orders ──► load-boundaries  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │         nytax-service: ImportPipeline, OrderService             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ nytax-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   rates   │  │calculator │  │    geo    │  │  ingest   │  │   │
//! │  │   │ RateTable │  │ TaxOutcome│  │ Boundary  │  │ CSV rows  │  │   │
//! │  │   │           │  │  rounding │  │  covers() │  │  sha256   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    nytax-db (Database Layer)                    │   │
//! │  │        SQLite queries, migrations, repositories, resolvers      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Order, Import, OrderTax, TaxOutcome)
//! - [`money`] - Half-up rounding to cents
//! - [`rates`] - The immutable rate table
//! - [`calculator`] - Tax calculation
//! - [`geo`] - Boundaries and point-in-polygon
//! - [`ingest`] - Content hash and import file parsing
//! - [`validation`] - Field and paging rules
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input, same output; no clock reads
//! 2. **No I/O**: documents arrive as `&str`/`&[u8]`, never as paths
//! 3. **Exact Money**: `rust_decimal` everywhere, rounding only at defined steps
//! 4. **Failures as Values**: an uncovered point is a failed outcome, not an error

// =============================================================================
// Module Declarations
// =============================================================================

pub mod calculator;
pub mod error;
pub mod geo;
pub mod ingest;
pub mod money;
pub mod rates;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use calculator::{calculate_tax, tax_for_resolved};
pub use error::{BoundaryError, CoreError, RateTableError, ValidationError};
pub use geo::{Boundary, BoundaryKind, BoundarySet, GeoPoint, Geometry};
pub use rates::TaxRateTable;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default page size for order listings.
pub const DEFAULT_PAGE_LIMIT: i64 = 20;

/// Largest page a single listing may return.
pub const MAX_PAGE_LIMIT: i64 = 200;
