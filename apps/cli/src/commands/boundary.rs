//! # Boundary Commands
//!
//! Loads GeoJSON boundaries into `geo_boundaries` for the spatial backend.

use std::path::Path;

use clap::ValueEnum;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ApiError;
use nytax_core::geo::parse_feature_collection;
use nytax_core::BoundaryKind;
use nytax_db::Database;

/// `--kind` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    County,
    City,
}

impl From<KindArg> for BoundaryKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::County => BoundaryKind::County,
            KindArg::City => BoundaryKind::City,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadBoundariesResponse {
    pub kind: BoundaryKind,
    pub loaded: u64,
}

/// Replaces every stored boundary of one kind with the features of a
/// GeoJSON `FeatureCollection`.
///
/// The document is parsed completely before anything is written, and the
/// replacement runs in one transaction.
pub async fn load_boundaries(
    db: &Database,
    kind: BoundaryKind,
    path: &Path,
) -> Result<LoadBoundariesResponse, ApiError> {
    debug!(kind = %kind, path = %path.display(), "load-boundaries command");

    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| ApiError::validation(format!("cannot read {}: {}", path.display(), err)))?;
    let boundaries = parse_feature_collection(kind, &text)
        .map_err(|err| ApiError::validation(format!("{}: {}", path.display(), err)))?;

    let mut tx = db.begin().await?;
    let loaded = tx.replace_boundaries(kind, &boundaries).await?;
    tx.commit().await?;

    info!(kind = %kind, loaded, "Boundaries replaced");
    Ok(LoadBoundariesResponse { kind, loaded })
}
