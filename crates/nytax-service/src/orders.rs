//! # Order Service
//!
//! Manual order creation, order listing and import lookup.
//!
//! ## Order Creation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate ──► BEGIN                                                     │
//! │                 ├── insert order (source = manual)                      │
//! │                 ├── resolve jurisdiction for its point                  │
//! │                 ├── calculate tax                                       │
//! │                 ├── insert tax record                                   │
//! │                 ├── re-fetch joined row (missing: ConsistencyViolation) │
//! │               COMMIT                                                    │
//! │                 │                                                       │
//! │                 ├── calculated ──► OrderView                            │
//! │                 └── failed ──────► TaxCalculationFailed(error_text)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failed tax is still committed. The order and its failure reason stay on
//! record; only the caller sees a rejection.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::view::{CreateOrderRequest, ImportReport, ListOrdersQuery, OrderView, OrdersPage};
use nytax_core::validation::{validate_new_order, validate_page};
use nytax_core::{
    calculate_tax, GeoPoint, NewOrder, OrderTax, TaxOutcome, TaxRateTable, ValidationError,
    DEFAULT_PAGE_LIMIT,
};
use nytax_db::{Database, JurisdictionResolver, OrderFilter};
use rust_decimal::Decimal;

/// Order-level operations.
#[derive(Debug, Clone)]
pub struct OrderService {
    db: Database,
    rates: Arc<TaxRateTable>,
    resolver: Arc<dyn JurisdictionResolver>,
}

impl OrderService {
    pub fn new(
        db: Database,
        rates: Arc<TaxRateTable>,
        resolver: Arc<dyn JurisdictionResolver>,
    ) -> Self {
        OrderService {
            db,
            rates,
            resolver,
        }
    }

    /// Creates one manual order and its tax record.
    ///
    /// ## Errors
    /// - `Validation`: coordinates or subtotal out of range, nothing written
    /// - `TaxCalculationFailed`: order stored with a failed tax record
    /// - `Persistence`: storage failed, nothing written
    /// - `ConsistencyViolation`: the joined row vanished, nothing written
    pub async fn create_order(&self, request: CreateOrderRequest) -> ServiceResult<OrderView> {
        let new_order = NewOrder::from(request);
        if let Err(err) = validate_new_order(&new_order) {
            warn!(error = %err, "Order rejected by validation");
            return Err(err.into());
        }

        let mut tx = self.db.begin().await?;

        let order = tx.insert_manual_order(&new_order).await?;
        let point = GeoPoint::new(order.latitude, order.longitude);
        let jurisdiction = self.resolver.resolve(tx.connection(), point).await?;
        debug!(
            order_id = order.id,
            county = ?jurisdiction.county,
            city = ?jurisdiction.city,
            "Jurisdiction resolved"
        );

        let outcome = calculate_tax(
            order.subtotal,
            jurisdiction.county.as_deref(),
            jurisdiction.city.as_deref(),
            &self.rates,
        );
        tx.insert_order_tax(&OrderTax::new(order.id, outcome)).await?;

        let Some(joined) = tx.fetch_order_with_tax(order.id).await? else {
            error!(order_id = order.id, "Order written but joined row missing");
            return Err(ServiceError::consistency(format!(
                "order {} has no joined tax row after write",
                order.id
            )));
        };

        tx.commit().await?;

        match &joined.tax.outcome {
            TaxOutcome::Calculated { breakdown, .. } => {
                info!(
                    order_id = order.id,
                    composite_rate = %breakdown.composite_rate,
                    tax_amount = %breakdown.tax_amount,
                    "Order created"
                );
                OrderView::try_from(joined)
            }
            TaxOutcome::Failed { error, .. } => {
                warn!(order_id = order.id, reason = %error, "Order stored with failed tax");
                Err(ServiceError::TaxCalculationFailed {
                    order_id: order.id,
                    reason: error.clone(),
                })
            }
        }
    }

    /// Lists orders with a calculated tax, newest id first.
    pub async fn list_orders(&self, query: ListOrdersQuery) -> ServiceResult<OrdersPage> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        let offset = query.offset.unwrap_or(0);
        validate_page(limit, offset)?;

        for (field, bound) in [
            ("min_subtotal", query.min_subtotal),
            ("max_subtotal", query.max_subtotal),
        ] {
            if bound.is_some_and(|value| value < Decimal::ZERO) {
                return Err(ValidationError::Negative {
                    field: field.to_string(),
                }
                .into());
            }
        }

        let filter = OrderFilter {
            date_from: query.date_from,
            date_to: query.date_to,
            min_subtotal: query.min_subtotal,
            max_subtotal: query.max_subtotal,
        };
        let (rows, total) = self.db.orders().list(&filter, limit, offset).await?;
        let items = rows
            .into_iter()
            .map(OrderView::try_from)
            .collect::<ServiceResult<Vec<_>>>()?;

        debug!(limit, offset, returned = items.len(), total, "Orders listed");
        Ok(OrdersPage {
            items,
            total,
            limit,
            offset,
        })
    }

    /// Fetches a stored import with its tax tallies.
    pub async fn get_import(&self, import_id: i64) -> ServiceResult<ImportReport> {
        let import = self
            .db
            .imports()
            .get_by_id(import_id)
            .await?
            .ok_or(ServiceError::NotFound {
                entity: "Import",
                id: import_id,
            })?;
        let counts = self.db.imports().tax_counts(import_id).await?;
        Ok(ImportReport::new(import, counts))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
