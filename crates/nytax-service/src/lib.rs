//! # nytax-service: Request Flows for NY Tax
//!
//! The two write flows (bulk import and manual order creation) plus the
//! read operations built on them.
//!
//! ## Shared State
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Built once at startup, shared by every request:                        │
//! │                                                                         │
//! │    Database                    pool handle, cheap to clone              │
//! │    Arc<TaxRateTable>           read-only, no locking                    │
//! │    Arc<dyn JurisdictionResolver>  memory or spatial backend             │
//! │                                                                         │
//! │  ImportPipeline ──┐                                                     │
//! │                   ├── one WriteTransaction per request                  │
//! │  OrderService ────┘   commit on success, rollback on any failure        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod orders;
pub mod pipeline;
pub mod view;

#[cfg(test)]
mod testing;

pub use error::{ServiceError, ServiceResult};
pub use orders::OrderService;
pub use pipeline::{ImportOutcome, ImportPipeline, ImportStage};
pub use view::{
    CreateOrderRequest, ImportReport, ListOrdersQuery, OrderView, OrdersPage, RateBreakdown,
};
