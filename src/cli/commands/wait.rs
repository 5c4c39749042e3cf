use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AuditConfig;
use crate::database::DatabaseManager;
use crate::error::AuditError;

pub async fn handle(config: &AuditConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let manager = DatabaseManager::wait_until_ready(&config.database)
        .await
        .map_err(AuditError::from)?;
    let url = manager.display_url().to_string();
    manager.close().await;

    output_success(
        &output_format,
        &format!("Database ready at {}", url),
        Some(json!({ "database": url })),
    )
}
