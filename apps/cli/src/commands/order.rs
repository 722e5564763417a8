//! # Order Commands

use std::str::FromStr;

use clap::Args;
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;
use nytax_core::validation::{parse_subtotal, parse_timestamp};
use nytax_core::ValidationError;
use nytax_service::{CreateOrderRequest, ListOrdersQuery, OrderView, OrdersPage};

/// Flags for `create-order`.
///
/// Subtotal and timestamp stay text until validation so a malformed value
/// is reported as `VALIDATION_ERROR` rather than a usage error.
#[derive(Debug, Clone, Args)]
pub struct CreateOrderArgs {
    #[arg(long, allow_hyphen_values = true)]
    pub latitude: f64,

    #[arg(long, allow_hyphen_values = true)]
    pub longitude: f64,

    #[arg(long, allow_hyphen_values = true)]
    pub subtotal: String,

    /// ISO-8601 time of the order; `Z` or an offset, or naive UTC
    #[arg(long)]
    pub timestamp: String,
}

impl TryFrom<CreateOrderArgs> for CreateOrderRequest {
    type Error = ValidationError;

    fn try_from(args: CreateOrderArgs) -> Result<Self, Self::Error> {
        Ok(CreateOrderRequest {
            latitude: args.latitude,
            longitude: args.longitude,
            subtotal: parse_subtotal(&args.subtotal)?,
            timestamp: parse_timestamp(&args.timestamp)?,
        })
    }
}

/// Flags for `list-orders`.
#[derive(Debug, Clone, Default, Args)]
pub struct ListOrdersArgs {
    /// Page size, 1 to 200
    #[arg(long, allow_hyphen_values = true)]
    pub limit: Option<i64>,

    #[arg(long, allow_hyphen_values = true)]
    pub offset: Option<i64>,

    /// Earliest order time, inclusive
    #[arg(long)]
    pub date_from: Option<String>,

    /// Latest order time, inclusive
    #[arg(long)]
    pub date_to: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    pub min_subtotal: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    pub max_subtotal: Option<String>,
}

fn decimal_flag(field: &str, raw: Option<&str>) -> Result<Option<Decimal>, ValidationError> {
    raw.map(|value| {
        Decimal::from_str(value.trim()).map_err(|err| ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: err.to_string(),
        })
    })
    .transpose()
}

impl TryFrom<ListOrdersArgs> for ListOrdersQuery {
    type Error = ValidationError;

    fn try_from(args: ListOrdersArgs) -> Result<Self, Self::Error> {
        Ok(ListOrdersQuery {
            limit: args.limit,
            offset: args.offset,
            date_from: args.date_from.as_deref().map(parse_timestamp).transpose()?,
            date_to: args.date_to.as_deref().map(parse_timestamp).transpose()?,
            min_subtotal: decimal_flag("min_subtotal", args.min_subtotal.as_deref())?,
            max_subtotal: decimal_flag("max_subtotal", args.max_subtotal.as_deref())?,
        })
    }
}

/// Creates one manual order.
pub async fn create_order(state: &AppState, args: CreateOrderArgs) -> Result<OrderView, ApiError> {
    debug!(latitude = args.latitude, longitude = args.longitude, "create-order command");

    let request = CreateOrderRequest::try_from(args)
        .map_err(|err| ApiError::validation(err.to_string()))?;
    Ok(state.orders().create_order(request).await?)
}

/// Lists calculated orders.
pub async fn list_orders(state: &AppState, args: ListOrdersArgs) -> Result<OrdersPage, ApiError> {
    debug!(?args, "list-orders command");

    let query =
        ListOrdersQuery::try_from(args).map_err(|err| ApiError::validation(err.to_string()))?;
    Ok(state.orders().list_orders(query).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_args_parse_text_fields() {
        let request = CreateOrderRequest::try_from(CreateOrderArgs {
            latitude: 40.7,
            longitude: -74.0,
            subtotal: "19.99".to_string(),
            timestamp: "2025-11-04T10:17:04Z".to_string(),
        })
        .unwrap();
        assert_eq!(request.subtotal, Decimal::from_str("19.99").unwrap());
    }

    #[test]
    fn test_create_args_reject_bad_subtotal() {
        let err = CreateOrderRequest::try_from(CreateOrderArgs {
            latitude: 40.7,
            longitude: -74.0,
            subtotal: "ten dollars".to_string(),
            timestamp: "2025-11-04T10:17:04Z".to_string(),
        })
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFormat { .. }));
    }

    #[test]
    fn test_list_args_parse_filters() {
        let query = ListOrdersQuery::try_from(ListOrdersArgs {
            limit: Some(50),
            date_from: Some("2025-11-01T00:00:00Z".to_string()),
            min_subtotal: Some("5.5".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(query.limit, Some(50));
        assert!(query.date_from.is_some());
        assert_eq!(query.min_subtotal, Some(Decimal::from_str("5.5").unwrap()));

        let err = ListOrdersQuery::try_from(ListOrdersArgs {
            max_subtotal: Some("lots".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFormat { field, .. } if field == "max_subtotal"));
    }
}
