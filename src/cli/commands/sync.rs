use serde_json::json;
use std::path::PathBuf;

use crate::cli::utils::{output_lines, output_success};
use crate::cli::OutputFormat;
use crate::config::AuditConfig;
use crate::error::AuditError;
use crate::ledger;
use crate::matrix::RlsMatrix;

pub async fn handle(
    matrix: Option<PathBuf>,
    config: &AuditConfig,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let matrix_path = matrix.unwrap_or_else(|| config.artifacts.matrix_path.clone());
    let matrix = RlsMatrix::load(&matrix_path).map_err(AuditError::from)?;

    let ledger_path = &config.artifacts.ledger_path;
    let report = ledger::sync_file(&matrix, ledger_path).map_err(AuditError::from)?;

    output_success(
        &output_format,
        &format!("Added {} new entries to {}", report.added, ledger_path.display()),
        Some(json!({
            "ledger": ledger_path.display().to_string(),
            "added": report.added,
            "added_keys": report.added_keys,
            "stale": report.stale
        })),
    )?;
    output_lines(&output_format, report.added_keys.iter().map(|k| format!("+ {}", k)));
    Ok(())
}
