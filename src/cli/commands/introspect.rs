use serde_json::json;
use std::path::PathBuf;

use crate::catalog::{CatalogSnapshot, PgCatalog, PolicyCatalog};
use crate::cli::utils::{output_lines, output_success};
use crate::cli::{connect, OutputFormat};
use crate::config::AuditConfig;
use crate::error::AuditError;

pub async fn handle(
    output: Option<PathBuf>,
    config: &AuditConfig,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let manager = connect(config).await?;
    let catalog = PgCatalog::new(&manager, &config.catalog);

    let result = match output {
        Some(path) => save_snapshot(&catalog, path, &output_format).await,
        None => list_tables(&catalog, &output_format).await,
    };
    manager.close().await;
    result
}

async fn save_snapshot(
    catalog: &PgCatalog,
    path: PathBuf,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    let snapshot = CatalogSnapshot::capture(catalog).await.map_err(AuditError::from)?;
    snapshot.save(&path).map_err(AuditError::from)?;

    output_success(
        output_format,
        &format!(
            "Saved catalog snapshot to {} ({} tables, {} policies)",
            path.display(),
            snapshot.tables.len(),
            snapshot.policies.len()
        ),
        Some(json!({
            "path": path.display().to_string(),
            "tables": snapshot.tables.len(),
            "policies": snapshot.policies.len()
        })),
    )
}

async fn list_tables(catalog: &PgCatalog, output_format: &OutputFormat) -> anyhow::Result<()> {
    let tables = catalog.tables().await.map_err(AuditError::from)?;
    let enabled = tables.iter().filter(|t| t.rls_enabled).count();

    output_success(
        output_format,
        &format!("{} tables, {} with row security enabled", tables.len(), enabled),
        Some(json!({ "tables": tables })),
    )?;
    output_lines(
        output_format,
        tables.iter().map(|t| {
            format!(
                "{}.{}  rls={}",
                t.schema,
                t.name,
                if t.rls_enabled { "on" } else { "off" }
            )
        }),
    );
    Ok(())
}
