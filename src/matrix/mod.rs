//! Permission matrix: for every table with row security enabled, the
//! (role, operation) pairs its permissive policies grant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use crate::artifact::{self, ArtifactError};
use crate::catalog::{CatalogError, PolicyCatalog, PolicyCommand, PolicyKind, PolicyRecord, TableDescriptor};

/// Role Postgres applies a policy to when none is named
pub const PUBLIC_ROLE: &str = "public";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 4] = [Operation::Read, Operation::Insert, Operation::Update, Operation::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }

    /// Operations a policy command covers
    pub fn for_command(command: PolicyCommand) -> &'static [Operation] {
        match command {
            PolicyCommand::All => &Self::ALL,
            PolicyCommand::Select => &[Operation::Read],
            PolicyCommand::Insert => &[Operation::Insert],
            PolicyCommand::Update => &[Operation::Update],
            PolicyCommand::Delete => &[Operation::Delete],
        }
    }
}

// Artifacts sort by the serialized name, not declaration order
impl Ord for Operation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for Operation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationEntry {
    pub role: String,
    pub operation: Operation,
}

impl OperationEntry {
    pub fn new(role: impl Into<String>, operation: Operation) -> Self {
        Self {
            role: role.into(),
            operation,
        }
    }
}

/// Policy as recorded in the matrix, for reviewers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixPolicy {
    pub name: String,
    pub command: PolicyCommand,
    pub permissive: PolicyKind,
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub using: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_check: Option<String>,
}

impl From<&PolicyRecord> for MatrixPolicy {
    fn from(policy: &PolicyRecord) -> Self {
        Self {
            name: policy.name.clone(),
            command: policy.command,
            permissive: policy.kind,
            roles: policy.roles.clone(),
            using: policy.using_expr.clone(),
            with_check: policy.check_expr.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMatrix {
    pub table: String,
    #[serde(default)]
    pub policies: Vec<MatrixPolicy>,
    #[serde(default)]
    pub operations: Vec<OperationEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RlsMatrix {
    pub generated_at: DateTime<Utc>,
    pub tables: Vec<TableMatrix>,
    /// Tables in exposed schemas with row security disabled
    #[serde(default)]
    pub unprotected: Vec<String>,
}

impl RlsMatrix {
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        artifact::read_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        artifact::write_json(path, self)
    }

    pub fn table(&self, name: &str) -> Option<&TableMatrix> {
        self.tables.iter().find(|t| t.table == name)
    }

    /// Every (table, role, operation) triple in matrix order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &OperationEntry)> {
        self.tables
            .iter()
            .flat_map(|t| t.operations.iter().map(move |op| (t.table.as_str(), op)))
    }

    pub fn operation_count(&self) -> usize {
        self.tables.iter().map(|t| t.operations.len()).sum()
    }
}

/// Expand the RLS-enabled tables into their granted (role, operation) pairs.
///
/// Only permissive policies grant access; restrictive ones are listed but
/// contribute no entries. A policy without roles applies to `public`.
pub fn build_matrix(tables: &[TableDescriptor], policies: &[PolicyRecord]) -> RlsMatrix {
    let mut by_table: BTreeMap<String, Vec<&PolicyRecord>> = BTreeMap::new();
    for policy in policies {
        by_table.entry(policy.table_name()).or_default().push(policy);
    }

    let mut matrix_tables = Vec::new();
    let mut unprotected = Vec::new();

    for descriptor in tables {
        let name = descriptor.display_name();
        if !descriptor.rls_enabled {
            unprotected.push(name);
            continue;
        }

        let table_policies = by_table.remove(&name).unwrap_or_default();
        let mut operations = BTreeSet::new();
        for policy in table_policies.iter().filter(|p| p.kind == PolicyKind::Permissive) {
            let ops = Operation::for_command(policy.command);
            if policy.roles.is_empty() {
                operations.extend(ops.iter().map(|op| OperationEntry::new(PUBLIC_ROLE, *op)));
            } else {
                for role in &policy.roles {
                    operations.extend(ops.iter().map(|op| OperationEntry::new(role.clone(), *op)));
                }
            }
        }

        debug!("{}: {} policies, {} operations", name, table_policies.len(), operations.len());
        matrix_tables.push(TableMatrix {
            table: name,
            policies: table_policies.into_iter().map(MatrixPolicy::from).collect(),
            operations: operations.into_iter().collect(),
        });
    }

    for orphan in by_table.keys() {
        debug!("Ignoring policies on {} (not an introspected table)", orphan);
    }

    matrix_tables.sort_by(|a, b| a.table.cmp(&b.table));
    unprotected.sort();

    RlsMatrix {
        generated_at: Utc::now(),
        tables: matrix_tables,
        unprotected,
    }
}

/// Introspect a catalog and build its matrix
pub async fn build_from_catalog(catalog: &dyn PolicyCatalog) -> Result<RlsMatrix, CatalogError> {
    let tables = catalog.tables().await?;
    let policies = catalog.policies().await?;
    let matrix = build_matrix(&tables, &policies);

    info!(
        "Built matrix: {} RLS tables, {} operations, {} without RLS",
        matrix.tables.len(),
        matrix.operation_count(),
        matrix.unprotected.len()
    );
    Ok(matrix)
}
