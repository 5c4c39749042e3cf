pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::AuditConfig;
use crate::database::DatabaseManager;
use crate::error::AuditError;

#[derive(Parser)]
#[command(name = "rls-audit")]
#[command(about = "Row-level-security policy matrix, expectation ledger and verifier")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Wait until the database accepts connections")]
    Wait,

    #[command(about = "List tables and their row-security flag, or save a catalog snapshot")]
    Introspect {
        #[arg(help = "Write a catalog snapshot to this file instead of listing tables")]
        output: Option<PathBuf>,
    },

    #[command(about = "Build the permission matrix from the live catalog or a snapshot")]
    Matrix {
        #[arg(help = "Catalog snapshot to build from (default: live database)")]
        snapshot: Option<PathBuf>,
    },

    #[command(about = "Merge new matrix entries into the expectation ledger as undecided")]
    Sync {
        #[arg(help = "Matrix file (default: RLS_MATRIX_PATH or rls/rls-matrix.json)")]
        matrix: Option<PathBuf>,
    },

    #[command(about = "Apply the default allow/deny heuristic to undecided ledger entries")]
    Classify {
        #[arg(help = "Ledger file (default: RLS_LEDGER_PATH or rls/rls-expected.json)")]
        ledger: Option<PathBuf>,
    },

    #[command(about = "Count allowed, denied and undecided ledger entries")]
    Status {
        #[arg(help = "Ledger file (default: RLS_LEDGER_PATH or rls/rls-expected.json)")]
        ledger: Option<PathBuf>,
    },

    #[command(about = "Verify the matrix and ledger (strict when RLS_STRICT is set)")]
    Verify {
        #[arg(help = "Matrix file (default: RLS_MATRIX_PATH or rls/rls-matrix.json)")]
        matrix: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli, config: &AuditConfig) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Wait => commands::wait::handle(config, output_format).await,
        Commands::Introspect { output } => commands::introspect::handle(output, config, output_format).await,
        Commands::Matrix { snapshot } => commands::matrix::handle(snapshot, config, output_format).await,
        Commands::Sync { matrix } => commands::sync::handle(matrix, config, output_format).await,
        Commands::Classify { ledger } => commands::classify::handle(ledger, config, output_format).await,
        Commands::Status { ledger } => commands::status::handle(ledger, config, output_format).await,
        Commands::Verify { matrix } => commands::verify::handle(matrix, config, output_format).await,
    }
}

/// Single connection attempt; failure is fatal for every stage but `wait`
pub(crate) async fn connect(config: &AuditConfig) -> Result<DatabaseManager, AuditError> {
    Ok(DatabaseManager::connect(&config.database).await?)
}
