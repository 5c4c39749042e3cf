use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{sort_policies, sort_tables, CatalogError, PolicyCatalog, PolicyRecord, TableDescriptor};
use crate::artifact;

/// Serialized catalog, so the matrix can be rebuilt without a live database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub generated_at: DateTime<Utc>,
    pub tables: Vec<TableDescriptor>,
    #[serde(default)]
    pub policies: Vec<PolicyRecord>,
}

impl CatalogSnapshot {
    /// Capture both catalog lists from any source
    pub async fn capture(catalog: &dyn PolicyCatalog) -> Result<Self, CatalogError> {
        Ok(Self {
            generated_at: Utc::now(),
            tables: catalog.tables().await?,
            policies: catalog.policies().await?,
        })
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        Ok(artifact::read_json(path)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), CatalogError> {
        Ok(artifact::write_json(path, self)?)
    }
}

/// Catalog backed by a snapshot file or hand-built lists
pub struct SnapshotCatalog {
    tables: Vec<TableDescriptor>,
    policies: Vec<PolicyRecord>,
}

impl SnapshotCatalog {
    pub fn new(mut tables: Vec<TableDescriptor>, mut policies: Vec<PolicyRecord>) -> Self {
        sort_tables(&mut tables);
        sort_policies(&mut policies);
        Self { tables, policies }
    }

    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let snapshot = CatalogSnapshot::load(path)?;
        Ok(Self::from(snapshot))
    }
}

impl From<CatalogSnapshot> for SnapshotCatalog {
    fn from(snapshot: CatalogSnapshot) -> Self {
        Self::new(snapshot.tables, snapshot.policies)
    }
}

#[async_trait]
impl PolicyCatalog for SnapshotCatalog {
    async fn tables(&self) -> Result<Vec<TableDescriptor>, CatalogError> {
        Ok(self.tables.clone())
    }

    async fn policies(&self) -> Result<Vec<PolicyRecord>, CatalogError> {
        Ok(self.policies.clone())
    }
}
