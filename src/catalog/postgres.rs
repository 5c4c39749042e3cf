use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use tracing::debug;

use super::{CatalogError, PolicyCatalog, PolicyCommand, PolicyKind, PolicyRecord, TableDescriptor};
use crate::config::CatalogConfig;
use crate::database::DatabaseManager;

const TABLES_SQL: &str = r"
SELECT n.nspname AS schema_name,
       c.relname AS table_name,
       c.relrowsecurity AS rls_enabled
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE c.relkind IN ('r', 'p')
  AND n.nspname <> 'information_schema'
  AND n.nspname NOT LIKE 'pg\_%'
  AND NOT (n.nspname = ANY($1))
ORDER BY n.nspname, c.relname
";

const POLICIES_SQL: &str = r"
SELECT p.schemaname::text AS schema_name,
       p.tablename::text AS table_name,
       p.policyname::text AS policy_name,
       p.permissive,
       p.roles::text[] AS roles,
       p.cmd,
       p.qual,
       p.with_check
FROM pg_catalog.pg_policies p
WHERE p.schemaname <> 'information_schema'
  AND p.schemaname NOT LIKE 'pg\_%'
  AND NOT (p.schemaname = ANY($1))
ORDER BY p.schemaname, p.tablename, p.policyname
";

#[derive(Debug, FromRow)]
struct TableRow {
    schema_name: String,
    table_name: String,
    rls_enabled: bool,
}

#[derive(Debug, FromRow)]
struct PolicyRow {
    schema_name: String,
    table_name: String,
    policy_name: String,
    permissive: String,
    roles: Vec<String>,
    cmd: String,
    qual: Option<String>,
    with_check: Option<String>,
}

impl TryFrom<PolicyRow> for PolicyRecord {
    type Error = CatalogError;

    fn try_from(row: PolicyRow) -> Result<Self, Self::Error> {
        let command = row.cmd.parse::<PolicyCommand>().map_err(|command| CatalogError::UnknownCommand {
            policy: format!("{}.{}.{}", row.schema_name, row.table_name, row.policy_name),
            command,
        })?;
        let kind = if row.permissive.eq_ignore_ascii_case("RESTRICTIVE") {
            PolicyKind::Restrictive
        } else {
            PolicyKind::Permissive
        };

        Ok(PolicyRecord {
            schema: row.schema_name,
            table: row.table_name,
            name: row.policy_name,
            kind,
            roles: row.roles,
            command,
            using_expr: row.qual,
            check_expr: row.with_check,
        })
    }
}

/// Live catalog read from `pg_class` and `pg_policies`
pub struct PgCatalog {
    pool: PgPool,
    excluded_schemas: Vec<String>,
}

impl PgCatalog {
    pub fn new(manager: &DatabaseManager, config: &CatalogConfig) -> Self {
        Self {
            pool: manager.pool().clone(),
            excluded_schemas: config.excluded_schemas.clone(),
        }
    }
}

#[async_trait]
impl PolicyCatalog for PgCatalog {
    async fn tables(&self) -> Result<Vec<TableDescriptor>, CatalogError> {
        let rows: Vec<TableRow> = sqlx::query_as(TABLES_SQL)
            .bind(self.excluded_schemas.clone())
            .fetch_all(&self.pool)
            .await?;

        debug!("Catalog returned {} tables", rows.len());
        Ok(rows
            .into_iter()
            .map(|row| TableDescriptor::new(row.schema_name, row.table_name, row.rls_enabled))
            .collect())
    }

    async fn policies(&self) -> Result<Vec<PolicyRecord>, CatalogError> {
        let rows: Vec<PolicyRow> = sqlx::query_as(POLICIES_SQL)
            .bind(self.excluded_schemas.clone())
            .fetch_all(&self.pool)
            .await?;

        debug!("Catalog returned {} policies", rows.len());
        rows.into_iter().map(PolicyRecord::try_from).collect()
    }
}
