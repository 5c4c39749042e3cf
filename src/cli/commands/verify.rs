use serde_json::json;
use std::path::PathBuf;

use crate::cli::utils::{log_warnings, output_success};
use crate::cli::OutputFormat;
use crate::config::AuditConfig;
use crate::error::AuditError;
use crate::ledger::Ledger;
use crate::matrix::RlsMatrix;
use crate::verify;

pub async fn handle(
    matrix: Option<PathBuf>,
    config: &AuditConfig,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let matrix_path = matrix.unwrap_or_else(|| config.artifacts.matrix_path.clone());
    let matrix = RlsMatrix::load(&matrix_path).map_err(AuditError::from)?;
    let ledger = Ledger::load_existing(&config.artifacts.ledger_path).map_err(AuditError::from)?;

    let report = verify::verify(&matrix, &ledger, &config.verify);
    log_warnings(&report.warnings);
    let report = report.into_result(config.verify.sample_size)?;

    output_success(
        &output_format,
        &format!(
            "Verified {} tables and {} ledger entries{} ({} warnings)",
            matrix.tables.len(),
            ledger.len(),
            if config.verify.strict { " in strict mode" } else { "" },
            report.warnings.len()
        ),
        Some(json!({ "strict": config.verify.strict, "warnings": report.warnings })),
    )
}
