//! Expected-permissions ledger: one human-reviewable allow/deny decision per
//! (table, role, operation).
//!
//! The ledger only ever grows. Syncing appends entries for matrix pairs it
//! has not seen yet, as `undecided`, and never rewrites or drops an entry
//! that already exists. Decisions move `undecided -> allow | deny` once,
//! either by hand or through [`classifier::classify`].

pub mod classifier;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::artifact::{self, ArtifactError};
use crate::matrix::{Operation, RlsMatrix};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger contains duplicate entry {0}")]
    DuplicateKey(String),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Allow/deny decision. Stored as JSON `true`, `false` or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum Decision {
    Allow,
    Deny,
    #[default]
    Undecided,
}

impl Decision {
    pub fn is_decided(&self) -> bool {
        !matches!(self, Decision::Undecided)
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }
}

impl From<Option<bool>> for Decision {
    fn from(value: Option<bool>) -> Self {
        value.map(Decision::from).unwrap_or(Decision::Undecided)
    }
}

impl From<Decision> for Option<bool> {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Allow => Some(true),
            Decision::Deny => Some(false),
            Decision::Undecided => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Decision::Allow => "allow",
            Decision::Deny => "deny",
            Decision::Undecided => "undecided",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub table: String,
    pub role: String,
    pub operation: Operation,
    #[serde(default)]
    pub allowed: Decision,
}

impl LedgerEntry {
    pub fn undecided(table: impl Into<String>, role: impl Into<String>, operation: Operation) -> Self {
        Self {
            table: table.into(),
            role: role.into(),
            operation,
            allowed: Decision::Undecided,
        }
    }

    pub fn key(&self) -> String {
        entry_key(&self.table, &self.role, self.operation)
    }
}

/// Index key for a (table, role, operation) triple
pub fn entry_key(table: &str, role: &str, operation: Operation) -> String {
    format!("{}|{}|{}", table, role, operation)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    pub entries: Vec<LedgerEntry>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub added: usize,
    pub added_keys: Vec<String>,
    /// Ledger keys the matrix no longer produces; kept, only reported
    pub stale: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStatus {
    pub total: usize,
    pub allowed: usize,
    pub denied: usize,
    pub undecided: usize,
}

impl Ledger {
    pub fn new(entries: Vec<LedgerEntry>) -> Self {
        Self { entries }
    }

    /// Load a ledger; a missing file is an empty ledger
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        artifact::read_json_opt::<Ledger>(path)?
            .unwrap_or_default()
            .ensure_unique()
    }

    /// Load a ledger that must already exist
    pub fn load_existing(path: &Path) -> Result<Self, LedgerError> {
        artifact::read_json::<Ledger>(path)?.ensure_unique()
    }

    fn ensure_unique(self) -> Result<Self, LedgerError> {
        match self.duplicate_keys().into_iter().next() {
            Some(key) => Err(LedgerError::DuplicateKey(key)),
            None => Ok(self),
        }
    }

    /// Sort and overwrite the whole file
    pub fn save(&mut self, path: &Path) -> Result<(), LedgerError> {
        self.sort();
        artifact::write_json(path, &*self)?;
        Ok(())
    }

    /// Order by (table, role, operation)
    pub fn sort(&mut self) {
        self.entries.sort_by(|a, b| {
            (&a.table, &a.role, a.operation.as_str()).cmp(&(&b.table, &b.role, b.operation.as_str()))
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, table: &str, role: &str, operation: Operation) -> Option<&LedgerEntry> {
        self.entries
            .iter()
            .find(|e| e.table == table && e.role == role && e.operation == operation)
    }

    pub fn undecided(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter().filter(|e| !e.allowed.is_decided())
    }

    /// Keys appearing more than once, in ledger order
    pub fn duplicate_keys(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for entry in &self.entries {
            let key = entry.key();
            if !seen.insert(key.clone()) && !duplicates.contains(&key) {
                duplicates.push(key);
            }
        }
        duplicates
    }

    /// Append an undecided entry for every matrix pair not yet in the ledger.
    ///
    /// Existing entries are never modified or removed. Running it again with
    /// the same matrix adds nothing.
    pub fn sync(&mut self, matrix: &RlsMatrix) -> SyncReport {
        let mut index: HashSet<String> = self.entries.iter().map(LedgerEntry::key).collect();
        let matrix_keys: HashSet<String> = matrix
            .entries()
            .map(|(table, op)| entry_key(table, &op.role, op.operation))
            .collect();

        let mut stale: Vec<String> = self
            .entries
            .iter()
            .map(LedgerEntry::key)
            .filter(|key| !matrix_keys.contains(key))
            .collect();
        stale.sort();

        let mut report = SyncReport {
            stale,
            ..SyncReport::default()
        };

        for (table, op) in matrix.entries() {
            let key = entry_key(table, &op.role, op.operation);
            if index.insert(key.clone()) {
                self.entries
                    .push(LedgerEntry::undecided(table, op.role.clone(), op.operation));
                report.added += 1;
                report.added_keys.push(key);
            }
        }

        self.sort();
        report
    }

    pub fn status(&self) -> LedgerStatus {
        let mut status = LedgerStatus {
            total: self.entries.len(),
            ..LedgerStatus::default()
        };
        for entry in &self.entries {
            match entry.allowed {
                Decision::Allow => status.allowed += 1,
                Decision::Deny => status.denied += 1,
                Decision::Undecided => status.undecided += 1,
            }
        }
        status
    }
}

/// Merge a matrix into the ledger file at `path` and rewrite it
pub fn sync_file(matrix: &RlsMatrix, path: &Path) -> Result<SyncReport, LedgerError> {
    let mut ledger = Ledger::load(path)?;
    let report = ledger.sync(matrix);
    ledger.save(path)?;

    info!("Ledger {}: added {} entries ({} total)", path.display(), report.added, ledger.len());
    if !report.stale.is_empty() {
        warn!(
            "{} ledger entries no longer appear in the matrix (kept): {}",
            report.stale.len(),
            report.stale.iter().take(5).cloned().collect::<Vec<_>>().join(", ")
        );
    }
    Ok(report)
}
