//! # nytax
//!
//! Command line for the NY sales tax engine.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  argv ──► Cli (clap) ──► AppConfig::load + overrides                    │
//! │                                │                                        │
//! │                                ▼                                        │
//! │                          AppState::init                                 │
//! │                                │                                        │
//! │                                ▼                                        │
//! │  commands::* ──► Ok(T)        ──► JSON on stdout, exit 0                │
//! │              └─► Err(ApiError) ─► JSON on stdout, exit 2 (client) │ 1   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Logs go to stderr. `RUST_LOG` (or `NYTAX_LOG`) sets the filter.

mod commands;
mod config;
mod error;
mod state;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::commands::boundary::KindArg;
use crate::commands::order::{CreateOrderArgs, ListOrdersArgs};
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::state::AppState;
use nytax_db::ResolverBackend;

#[derive(Debug, Parser)]
#[command(name = "nytax", version, about = "NY sales tax engine")]
struct Cli {
    /// SQLite database file; overrides NYTAX_DATABASE_PATH
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Jurisdiction resolver: memory or spatial; overrides NYTAX_RESOLVER
    #[arg(long, global = true)]
    resolver: Option<ResolverBackend>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import a CSV file of orders
    Import {
        file: PathBuf,

        /// Name recorded for the import; defaults to the file name
        #[arg(long)]
        name: Option<String>,
    },

    /// Create one order and calculate its tax
    CreateOrder(CreateOrderArgs),

    /// List orders with a calculated tax, newest first
    ListOrders(ListOrdersArgs),

    /// Show an import and its tax outcome counts
    ShowImport { id: i64 },

    /// Replace stored county or city boundaries from a GeoJSON file
    LoadBoundaries {
        #[arg(long, value_enum)]
        kind: KindArg,

        file: PathBuf,
    },

    /// Report database, migration and configuration status
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "Startup failed");
            eprintln!("nytax: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// Initializes the tracing subscriber on stderr.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `NYTAX_LOG=nytax=trace` - Used when `RUST_LOG` is unset
/// - Default: INFO, DEBUG for nytax crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env("NYTAX_LOG"))
        .unwrap_or_else(|_| EnvFilter::new("info,nytax=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = AppConfig::load()?.with_overrides(cli.database, cli.resolver);
    info!(database = %config.database_path.display(), "Starting nytax");

    // Loading boundaries must work before any boundary exists, so it skips
    // resolver construction.
    if let Command::LoadBoundaries { kind, file } = &cli.command {
        let db = state::open_database(&config).await?;
        let result = commands::boundary::load_boundaries(&db, (*kind).into(), file).await;
        db.close().await;
        return emit(result);
    }

    let state = AppState::init(&config).await?;
    let code = match cli.command {
        Command::Import { file, name } => {
            emit(commands::import::import_file(&state, &file, name).await)?
        }
        Command::CreateOrder(args) => emit(commands::order::create_order(&state, args).await)?,
        Command::ListOrders(args) => emit(commands::order::list_orders(&state, args).await)?,
        Command::ShowImport { id } => emit(commands::import::show_import(&state, id).await)?,
        Command::Check => emit(commands::health::check(&state).await)?,
        Command::LoadBoundaries { .. } => ExitCode::SUCCESS,
    };

    state.db.close().await;
    Ok(code)
}

/// Prints a command result as JSON and picks the exit code.
fn emit<T: Serialize>(result: Result<T, ApiError>) -> anyhow::Result<ExitCode> {
    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            println!("{}", serde_json::to_string_pretty(&err)?);
            if err.code.is_client_error() {
                Ok(ExitCode::from(2))
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "nytax",
            "list-orders",
            "--limit",
            "5",
            "--resolver",
            "spatial",
        ])
        .unwrap();
        assert_eq!(cli.resolver, Some(ResolverBackend::Spatial));
        assert!(matches!(cli.command, Command::ListOrders(ref args) if args.limit == Some(5)));
    }

    #[test]
    fn test_cli_accepts_negative_longitude() {
        let cli = Cli::try_parse_from([
            "nytax",
            "create-order",
            "--latitude",
            "40.7",
            "--longitude",
            "-74.0",
            "--subtotal",
            "100",
            "--timestamp",
            "2025-11-04T10:17:04Z",
        ])
        .unwrap();
        match cli.command {
            Command::CreateOrder(args) => assert_eq!(args.longitude, -74.0),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_load_boundaries_requires_kind() {
        assert!(Cli::try_parse_from(["nytax", "load-boundaries", "counties.geojson"]).is_err());
        let cli =
            Cli::try_parse_from(["nytax", "load-boundaries", "--kind", "city", "cities.geojson"])
                .unwrap();
        assert!(matches!(cli.command, Command::LoadBoundaries { kind: KindArg::City, .. }));
    }
}
