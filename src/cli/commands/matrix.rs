use serde_json::json;
use std::path::PathBuf;

use crate::catalog::{PgCatalog, SnapshotCatalog};
use crate::cli::utils::{log_warnings, output_success};
use crate::cli::{connect, OutputFormat};
use crate::config::AuditConfig;
use crate::error::AuditError;
use crate::matrix::{self, RlsMatrix};

pub async fn handle(
    snapshot: Option<PathBuf>,
    config: &AuditConfig,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let built = match snapshot {
        Some(path) => {
            let catalog = SnapshotCatalog::from_file(&path).map_err(AuditError::from)?;
            matrix::build_from_catalog(&catalog).await.map_err(AuditError::from)?
        }
        None => {
            let manager = connect(config).await?;
            let catalog = PgCatalog::new(&manager, &config.catalog);
            let result = matrix::build_from_catalog(&catalog).await;
            manager.close().await;
            result.map_err(AuditError::from)?
        }
    };

    let path = &config.artifacts.matrix_path;
    built.save(path).map_err(AuditError::from)?;
    report(&built, path, &output_format)
}

fn report(built: &RlsMatrix, path: &std::path::Path, output_format: &OutputFormat) -> anyhow::Result<()> {
    log_warnings(
        built
            .unprotected
            .iter()
            .map(|table| format!("table {} has row security disabled", table)),
    );

    output_success(
        output_format,
        &format!(
            "Wrote {} ({} tables, {} operations)",
            path.display(),
            built.tables.len(),
            built.operation_count()
        ),
        Some(json!({
            "path": path.display().to_string(),
            "tables": built.tables.len(),
            "operations": built.operation_count(),
            "unprotected": built.unprotected
        })),
    )
}
