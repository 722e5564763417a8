//! # Request and Response Shapes
//!
//! Transport-agnostic shapes returned by the service layer. The CLI prints
//! them as JSON; `ts-rs` exports matching TypeScript types.
//!
//! Decimals serialize as strings so no rate or amount passes through a float.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{ServiceError, ServiceResult};
use nytax_core::{Import, Jurisdictions, NewOrder, Order, OrderWithTax, TaxOutcome};
use nytax_db::TaxStatusCounts;

// =============================================================================
// Requests
// =============================================================================

/// Input for creating one manual order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateOrderRequest {
    pub latitude: f64,
    pub longitude: f64,
    #[ts(type = "string")]
    pub subtotal: Decimal,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
}

impl From<CreateOrderRequest> for NewOrder {
    fn from(request: CreateOrderRequest) -> Self {
        NewOrder {
            latitude: request.latitude,
            longitude: request.longitude,
            subtotal: request.subtotal,
            ordered_at: request.timestamp,
            source_order_id: None,
        }
    }
}

/// Paging and filters for an order listing. Absent paging falls back to
/// the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ListOrdersQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    #[ts(as = "Option<String>")]
    pub date_from: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub date_to: Option<DateTime<Utc>>,
    #[ts(type = "string | null")]
    pub min_subtotal: Option<Decimal>,
    #[ts(type = "string | null")]
    pub max_subtotal: Option<Decimal>,
}

// =============================================================================
// Responses
// =============================================================================

/// Rate components of a calculated tax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RateBreakdown {
    #[ts(type = "string")]
    pub state_rate: Decimal,
    #[ts(type = "string")]
    pub county_rate: Decimal,
    #[ts(type = "string")]
    pub city_rate: Decimal,
    #[ts(type = "Array<string>")]
    pub special_rates: Vec<Decimal>,
}

/// An order with its calculated tax.
///
/// ```json
/// {
///   "id": 7, "source": "manual", "subtotal": "100.00", ...,
///   "composite_tax_rate": "0.085",
///   "tax_amount": "8.50",
///   "total_amount": "108.50",
///   "breakdown": { "state_rate": "0.04", "county_rate": "0.045", ... },
///   "jurisdictions": { "state": "NY", "county": "Kings", ... }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    #[ts(type = "string")]
    pub composite_tax_rate: Decimal,
    #[ts(type = "string")]
    pub tax_amount: Decimal,
    #[ts(type = "string")]
    pub total_amount: Decimal,
    pub breakdown: RateBreakdown,
    pub jurisdictions: Jurisdictions,
}

impl TryFrom<OrderWithTax> for OrderView {
    type Error = ServiceError;

    /// Only calculated taxes have a view. A failed one here means a caller
    /// skipped the status check.
    fn try_from(joined: OrderWithTax) -> ServiceResult<Self> {
        let order_id = joined.order.id;
        match joined.tax.outcome {
            TaxOutcome::Calculated {
                breakdown,
                jurisdictions,
            } => Ok(OrderView {
                order: joined.order,
                composite_tax_rate: breakdown.composite_rate,
                tax_amount: breakdown.tax_amount,
                total_amount: breakdown.total_amount,
                breakdown: RateBreakdown {
                    state_rate: breakdown.state_rate,
                    county_rate: breakdown.county_rate,
                    city_rate: breakdown.city_rate,
                    special_rates: breakdown.special_rates,
                },
                jurisdictions,
            }),
            TaxOutcome::Failed { .. } => Err(ServiceError::consistency(format!(
                "order {order_id} has no calculated tax"
            ))),
        }
    }
}

/// One page of calculated orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrdersPage {
    pub items: Vec<OrderView>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// A stored import with the tax outcomes of its orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ImportReport {
    #[serde(flatten)]
    pub import: Import,
    pub taxes_calculated: i64,
    pub taxes_failed: i64,
}

impl ImportReport {
    pub(crate) fn new(import: Import, counts: TaxStatusCounts) -> Self {
        ImportReport {
            import,
            taxes_calculated: counts.calculated,
            taxes_failed: counts.failed,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use nytax_core::{OrderSource, OrderTax, TaxBreakdown};

    fn order() -> Order {
        Order {
            id: 3,
            source: OrderSource::Manual,
            import_id: None,
            source_order_id: None,
            latitude: 40.65,
            longitude: -73.95,
            subtotal: "100.00".parse().unwrap(),
            ordered_at: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_view_flattens_order_and_breakdown() {
        let joined = OrderWithTax {
            order: order(),
            tax: OrderTax::new(
                3,
                TaxOutcome::Calculated {
                    breakdown: TaxBreakdown {
                        composite_rate: "0.085".parse().unwrap(),
                        tax_amount: "8.50".parse().unwrap(),
                        total_amount: "108.50".parse().unwrap(),
                        state_rate: "0.04".parse().unwrap(),
                        county_rate: "0.045".parse().unwrap(),
                        city_rate: "0".parse().unwrap(),
                        special_rates: vec![],
                    },
                    jurisdictions: Jurisdictions {
                        state: Some("NY".to_string()),
                        county: Some("Kings".to_string()),
                        city: None,
                        special: vec![],
                    },
                },
            ),
        };

        let view = OrderView::try_from(joined).unwrap();
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["id"], 3);
        assert_eq!(json["composite_tax_rate"], "0.085");
        assert_eq!(json["tax_amount"], "8.50");
        assert_eq!(json["total_amount"], "108.50");
        assert_eq!(json["breakdown"]["county_rate"], "0.045");
        assert_eq!(json["jurisdictions"]["county"], "Kings");
    }

    #[test]
    fn test_failed_tax_has_no_view() {
        let joined = OrderWithTax {
            order: order(),
            tax: OrderTax::new(
                3,
                TaxOutcome::Failed {
                    error: "point outside jurisdiction boundaries".to_string(),
                    jurisdictions: Jurisdictions::default(),
                },
            ),
        };

        assert!(matches!(
            OrderView::try_from(joined),
            Err(ServiceError::ConsistencyViolation(_))
        ));
    }

    #[test]
    fn test_create_request_becomes_manual_order() {
        let request: CreateOrderRequest = serde_json::from_str(
            r#"{"latitude": 40.7, "longitude": -74.0, "subtotal": "12.50",
                "timestamp": "2025-01-01T12:00:00Z"}"#,
        )
        .unwrap();

        let new_order = NewOrder::from(request);
        assert_eq!(new_order.subtotal, "12.50".parse::<Decimal>().unwrap());
        assert_eq!(new_order.source_order_id, None);
    }
}
