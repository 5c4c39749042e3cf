use serde_json::json;
use std::path::PathBuf;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AuditConfig;
use crate::error::AuditError;
use crate::ledger::classifier::{classify, PublicDenyClassifier};
use crate::ledger::Ledger;

pub async fn handle(
    ledger: Option<PathBuf>,
    config: &AuditConfig,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let path = ledger.unwrap_or_else(|| config.artifacts.ledger_path.clone());
    let mut ledger = Ledger::load_existing(&path).map_err(AuditError::from)?;

    let report = classify(&mut ledger, &PublicDenyClassifier);
    if report.changed > 0 {
        ledger.save(&path).map_err(AuditError::from)?;
    }

    output_success(
        &output_format,
        &format!(
            "Classified {} entries ({} allowed, {} denied); review {} before committing",
            report.changed,
            report.allowed,
            report.denied,
            path.display()
        ),
        Some(json!({
            "ledger": path.display().to_string(),
            "changed": report.changed,
            "allowed": report.allowed,
            "denied": report.denied
        })),
    )
}
