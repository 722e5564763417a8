//! # Health Command

use serde::Serialize;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;
use nytax_core::BoundaryKind;
use nytax_db::{MigrationStatus, ResolverBackend};

#[derive(Debug, Clone, Serialize)]
pub struct StoredBoundaries {
    pub counties: i64,
    pub cities: i64,
}

/// What `nytax check` prints.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub database_ok: bool,
    pub migrations: MigrationStatus,
    pub rate_table_counties: usize,
    pub rate_table_city_exceptions: usize,
    pub resolver: ResolverBackend,
    pub stored_boundaries: StoredBoundaries,
}

/// Reports database reachability, schema state and loaded configuration.
pub async fn check(state: &AppState) -> Result<HealthReport, ApiError> {
    debug!("check command");

    let boundaries = state.db.boundaries();
    Ok(HealthReport {
        database_ok: state.db.health_check().await,
        migrations: state.db.migration_status().await?,
        rate_table_counties: state.rates.county_count(),
        rate_table_city_exceptions: state.rates.city_exception_count(),
        resolver: state.resolver.backend(),
        stored_boundaries: StoredBoundaries {
            counties: boundaries.count(BoundaryKind::County).await?,
            cities: boundaries.count(BoundaryKind::City).await?,
        },
    })
}
