//! # CLI Configuration
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults. Command-line flags override the database path and resolver.
//!
//! | Variable                   | Default                  |
//! |----------------------------|--------------------------|
//! | `NYTAX_DATABASE_PATH`      | `./nytax.db`             |
//! | `NYTAX_TAX_RATES_PATH`     | `./data/tax_rates.json`  |
//! | `NYTAX_RESOLVER`           | `spatial`                |
//! | `NYTAX_COUNTY_BOUNDARIES`  | none                     |
//! | `NYTAX_CITY_BOUNDARIES`    | none                     |
//! | `NYTAX_DB_MAX_CONNECTIONS` | `5`                      |

use std::env;
use std::path::PathBuf;

use nytax_db::ResolverBackend;
use serde::Serialize;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Rate table JSON document
    pub tax_rates_path: PathBuf,

    /// Jurisdiction resolver backend
    pub resolver: ResolverBackend,

    /// County boundaries GeoJSON (memory backend)
    pub county_boundaries: Option<PathBuf>,

    /// City boundaries GeoJSON (memory backend)
    pub city_boundaries: Option<PathBuf>,

    /// Pool size
    pub db_max_connections: u32,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = AppConfig {
            database_path: lookup("NYTAX_DATABASE_PATH")
                .unwrap_or_else(|| "./nytax.db".to_string())
                .into(),

            tax_rates_path: lookup("NYTAX_TAX_RATES_PATH")
                .unwrap_or_else(|| "./data/tax_rates.json".to_string())
                .into(),

            resolver: lookup("NYTAX_RESOLVER")
                .unwrap_or_else(|| "spatial".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("NYTAX_RESOLVER".to_string()))?,

            county_boundaries: lookup("NYTAX_COUNTY_BOUNDARIES").map(PathBuf::from),

            city_boundaries: lookup("NYTAX_CITY_BOUNDARIES").map(PathBuf::from),

            db_max_connections: lookup("NYTAX_DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| "5".to_string())
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::InvalidValue("NYTAX_DB_MAX_CONNECTIONS".to_string()))?,
        };

        Ok(config)
    }

    /// Applies command-line overrides.
    pub fn with_overrides(
        mut self,
        database_path: Option<PathBuf>,
        resolver: Option<ResolverBackend>,
    ) -> Self {
        if let Some(path) = database_path {
            self.database_path = path;
        }
        if let Some(backend) = resolver {
            self.resolver = backend;
        }
        self
    }

    /// Both boundary documents, required by the memory backend.
    pub fn boundary_paths(&self) -> Result<(&PathBuf, &PathBuf), ConfigError> {
        match (&self.county_boundaries, &self.city_boundaries) {
            (Some(counties), Some(cities)) => Ok((counties, cities)),
            (None, _) => Err(ConfigError::MissingRequired(
                "NYTAX_COUNTY_BOUNDARIES".to_string(),
            )),
            (_, None) => Err(ConfigError::MissingRequired(
                "NYTAX_CITY_BOUNDARIES".to_string(),
            )),
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.database_path, PathBuf::from("./nytax.db"));
        assert_eq!(config.resolver, ResolverBackend::Spatial);
        assert_eq!(config.db_max_connections, 5);
        assert!(config.county_boundaries.is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("NYTAX_RESOLVER", "postgis")]),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            load(&[("NYTAX_DB_MAX_CONNECTIONS", "0")]),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_memory_backend_needs_both_documents() {
        let config = load(&[
            ("NYTAX_RESOLVER", "memory"),
            ("NYTAX_COUNTY_BOUNDARIES", "counties.geojson"),
        ])
        .unwrap();
        assert!(matches!(
            config.boundary_paths(),
            Err(ConfigError::MissingRequired(name)) if name == "NYTAX_CITY_BOUNDARIES"
        ));
    }

    #[test]
    fn test_flags_override_environment() {
        let config = load(&[("NYTAX_DATABASE_PATH", "/env.db")])
            .unwrap()
            .with_overrides(Some("/flag.db".into()), Some(ResolverBackend::Memory));
        assert_eq!(config.database_path, PathBuf::from("/flag.db"));
        assert_eq!(config.resolver, ResolverBackend::Memory);
    }
}
