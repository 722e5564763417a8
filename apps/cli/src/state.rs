//! # Application State
//!
//! Everything built once at startup and shared by the commands.
//!
//! The rate table and the boundary documents are loaded here and nowhere
//! else. A malformed document stops the process before any command runs.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::config::AppConfig;
use crate::error::StartupError;
use nytax_core::geo::parse_feature_collection;
use nytax_core::{BoundaryKind, BoundarySet, CoreError, TaxRateTable};
use nytax_db::{build_resolver, Database, DbConfig, JurisdictionResolver, ResolverBackend};
use nytax_service::{ImportPipeline, OrderService};

/// Shared handles for one process.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub rates: Arc<TaxRateTable>,
    pub resolver: Arc<dyn JurisdictionResolver>,
}

impl AppState {
    /// Opens the database, loads the rate table and builds the resolver.
    pub async fn init(config: &AppConfig) -> Result<Self, StartupError> {
        let db = open_database(config).await?;
        let rates = Arc::new(load_rate_table(&config.tax_rates_path).await?);

        let boundaries = match config.resolver {
            ResolverBackend::Memory => {
                let (counties, cities) = config.boundary_paths()?;
                Some(load_boundary_set(counties, cities).await?)
            }
            ResolverBackend::Spatial => None,
        };
        let resolver = build_resolver(config.resolver, boundaries)?;
        info!(backend = %resolver.backend(), "Resolver ready");

        Ok(AppState {
            db,
            rates,
            resolver,
        })
    }

    pub fn pipeline(&self) -> ImportPipeline {
        ImportPipeline::new(self.db.clone(), self.rates.clone(), self.resolver.clone())
    }

    pub fn orders(&self) -> OrderService {
        OrderService::new(self.db.clone(), self.rates.clone(), self.resolver.clone())
    }
}

/// Opens the database and applies migrations.
pub async fn open_database(config: &AppConfig) -> Result<Database, StartupError> {
    let db_config =
        DbConfig::new(config.database_path.clone()).max_connections(config.db_max_connections);
    Ok(Database::new(db_config).await?)
}

async fn read_text(path: &Path) -> Result<String, StartupError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| StartupError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn invalid(path: &Path, err: impl Into<CoreError>) -> StartupError {
    StartupError::Document {
        path: path.to_path_buf(),
        source: err.into(),
    }
}

/// Loads and validates the rate table document.
pub async fn load_rate_table(path: &Path) -> Result<TaxRateTable, StartupError> {
    let text = read_text(path).await?;
    let table = TaxRateTable::from_json_str(&text).map_err(|err| invalid(path, err))?;
    info!(
        path = %path.display(),
        counties = table.county_count(),
        city_exceptions = table.city_exception_count(),
        "Rate table loaded"
    );
    Ok(table)
}

/// Loads county and city boundary documents for the memory backend.
pub async fn load_boundary_set(counties: &Path, cities: &Path) -> Result<BoundarySet, StartupError> {
    let county_text = read_text(counties).await?;
    let city_text = read_text(cities).await?;
    let mut set = BoundarySet::new();
    set.extend(
        parse_feature_collection(BoundaryKind::County, &county_text)
            .map_err(|err| invalid(counties, err))?,
    );
    set.extend(
        parse_feature_collection(BoundaryKind::City, &city_text)
            .map_err(|err| invalid(cities, err))?,
    );
    info!(
        counties = set.county_count(),
        cities = set.city_count(),
        "Boundaries loaded"
    );
    Ok(set)
}
