//! Policy introspection: which tables exist, whether row security is on,
//! and which policies are declared on them.

pub mod postgres;
pub mod snapshot;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::artifact::ArtifactError;
use crate::database::manager::DatabaseError;

pub use postgres::PgCatalog;
pub use snapshot::{CatalogSnapshot, SnapshotCatalog};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Catalog query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Policy {policy} has unknown command '{command}'")]
    UnknownCommand { policy: String, command: String },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// One table as seen by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub schema: String,
    pub name: String,
    pub rls_enabled: bool,
}

impl TableDescriptor {
    pub fn new(schema: impl Into<String>, name: impl Into<String>, rls_enabled: bool) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            rls_enabled,
        }
    }

    /// Name used in the matrix and ledger: bare for `public`, qualified otherwise
    pub fn display_name(&self) -> String {
        qualified_name(&self.schema, &self.name)
    }
}

pub fn qualified_name(schema: &str, table: &str) -> String {
    if schema == "public" {
        table.to_string()
    } else {
        format!("{}.{}", schema, table)
    }
}

/// Command a policy applies to, as reported by `pg_policies.cmd`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyCommand {
    All,
    Select,
    Insert,
    Update,
    Delete,
}

impl FromStr for PolicyCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" | "*" => Ok(PolicyCommand::All),
            "SELECT" | "R" => Ok(PolicyCommand::Select),
            "INSERT" | "A" => Ok(PolicyCommand::Insert),
            "UPDATE" | "W" => Ok(PolicyCommand::Update),
            "DELETE" | "D" => Ok(PolicyCommand::Delete),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for PolicyCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PolicyCommand::All => "ALL",
            PolicyCommand::Select => "SELECT",
            PolicyCommand::Insert => "INSERT",
            PolicyCommand::Update => "UPDATE",
            PolicyCommand::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyKind {
    Permissive,
    Restrictive,
}

/// One row of `pg_policies`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub schema: String,
    pub table: String,
    pub name: String,
    #[serde(rename = "permissive")]
    pub kind: PolicyKind,
    pub roles: Vec<String>,
    pub command: PolicyCommand,
    #[serde(rename = "using", default, skip_serializing_if = "Option::is_none")]
    pub using_expr: Option<String>,
    #[serde(rename = "with_check", default, skip_serializing_if = "Option::is_none")]
    pub check_expr: Option<String>,
}

impl PolicyRecord {
    pub fn table_name(&self) -> String {
        qualified_name(&self.schema, &self.table)
    }
}

/// Source of table and policy metadata.
///
/// Both lists come back ordered: tables by (schema, name), policies by
/// (schema, table, name).
#[async_trait]
pub trait PolicyCatalog: Send + Sync {
    async fn tables(&self) -> Result<Vec<TableDescriptor>, CatalogError>;

    async fn policies(&self) -> Result<Vec<PolicyRecord>, CatalogError>;
}

pub(crate) fn sort_tables(tables: &mut [TableDescriptor]) {
    tables.sort_by(|a, b| (&a.schema, &a.name).cmp(&(&b.schema, &b.name)));
}

pub(crate) fn sort_policies(policies: &mut [PolicyRecord]) {
    policies.sort_by(|a, b| (&a.schema, &a.table, &a.name).cmp(&(&b.schema, &b.table, &b.name)));
}
