use serde_json::json;
use std::path::PathBuf;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AuditConfig;
use crate::error::AuditError;
use crate::ledger::Ledger;

pub async fn handle(
    ledger: Option<PathBuf>,
    config: &AuditConfig,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let path = ledger.unwrap_or_else(|| config.artifacts.ledger_path.clone());
    let status = Ledger::load_existing(&path).map_err(AuditError::from)?.status();

    output_success(
        &output_format,
        &format!(
            "{}: {} entries, {} allowed, {} denied, {} undecided",
            path.display(),
            status.total,
            status.allowed,
            status.denied,
            status.undecided
        ),
        Some(json!({ "ledger": path.display().to_string(), "status": status })),
    )
}
