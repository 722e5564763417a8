//! # Import Commands

use std::path::Path;

use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;
use nytax_service::{ImportOutcome, ImportReport};

/// Runs the import pipeline on a file.
///
/// `name` is recorded as the import's file name; it defaults to the last
/// component of `path`.
pub async fn import_file(
    state: &AppState,
    path: &Path,
    name: Option<String>,
) -> Result<ImportOutcome, ApiError> {
    debug!(path = %path.display(), "import command");

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| ApiError::validation(format!("cannot read {}: {}", path.display(), err)))?;

    let file_name = name
        .or_else(|| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| path.display().to_string());

    Ok(state.pipeline().run(&file_name, &bytes).await?)
}

/// Shows a stored import.
pub async fn show_import(state: &AppState, import_id: i64) -> Result<ImportReport, ApiError> {
    debug!(import_id, "show-import command");
    Ok(state.orders().get_import(import_id).await?)
}
