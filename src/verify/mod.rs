//! Checks run against the persisted matrix and ledger artifacts.
//!
//! The matrix builder already guarantees unique (role, operation) pairs, but
//! the verifier only sees the files on disk and checks again.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::config::VerifyConfig;
use crate::error::AuditError;
use crate::ledger::{entry_key, Ledger, LedgerEntry};
use crate::matrix::RlsMatrix;

/// Fails verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// Row security is on but nothing is granted
    TableWithoutPolicies { table: String },
    DuplicateOperation { table: String, key: String },
    DuplicateLedgerEntry { key: String },
    /// Strict mode only
    UndecidedEntry { key: String },
    /// Strict mode only: the matrix has a pair the ledger never recorded
    UnsyncedEntry { key: String },
}

impl Violation {
    pub fn key(&self) -> &str {
        match self {
            Violation::TableWithoutPolicies { table } => table,
            Violation::DuplicateOperation { key, .. }
            | Violation::DuplicateLedgerEntry { key }
            | Violation::UndecidedEntry { key }
            | Violation::UnsyncedEntry { key } => key,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Violation::TableWithoutPolicies { .. } => "RLS-enabled tables without policies",
            Violation::DuplicateOperation { .. } => "duplicate (role, operation) pairs in the matrix",
            Violation::DuplicateLedgerEntry { .. } => "duplicate ledger entries",
            Violation::UndecidedEntry { .. } => "undecided ledger entries",
            Violation::UnsyncedEntry { .. } => "matrix entries missing from the ledger",
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label(), self.key())
    }
}

/// Reported, never fatal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    UnprotectedTable { table: String },
    StaleEntry { key: String },
    UndecidedEntry { key: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnprotectedTable { table } => write!(f, "table {} has row security disabled", table),
            Warning::StaleEntry { key } => write!(f, "ledger entry {} no longer appears in the matrix", key),
            Warning::UndecidedEntry { key } => write!(f, "ledger entry {} is undecided", key),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    pub violations: Vec<Violation>,
    pub warnings: Vec<Warning>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn merge(mut self, other: VerifyReport) -> Self {
        self.violations.extend(other.violations);
        self.warnings.extend(other.warnings);
        self
    }

    /// Turn violations into an integrity error naming up to `sample_size`
    /// keys per kind
    pub fn into_result(self, sample_size: usize) -> Result<Self, AuditError> {
        if self.is_ok() {
            return Ok(self);
        }

        let mut groups: BTreeMap<&'static str, Vec<&str>> = BTreeMap::new();
        for violation in &self.violations {
            groups.entry(violation.label()).or_default().push(violation.key());
        }

        let mut keys = Vec::new();
        let parts: Vec<String> = groups
            .into_iter()
            .map(|(label, group)| {
                let sample: Vec<&str> = group.iter().take(sample_size).copied().collect();
                keys.extend(sample.iter().map(|k| k.to_string()));
                let more = group.len() - sample.len();
                let mut part = format!("{} {}: {}", group.len(), label, sample.join(", "));
                if more > 0 {
                    part.push_str(&format!(" (and {} more)", more));
                }
                part
            })
            .collect();

        Err(AuditError::integrity(
            format!("RLS verification failed: {}", parts.join("; ")),
            keys,
        ))
    }
}

/// Every RLS table grants something; no table repeats a (role, operation)
pub fn verify_matrix(matrix: &RlsMatrix) -> VerifyReport {
    let mut report = VerifyReport::default();

    for table in &matrix.tables {
        if table.operations.is_empty() {
            report.violations.push(Violation::TableWithoutPolicies {
                table: table.table.clone(),
            });
        }

        let mut seen = HashSet::new();
        for op in &table.operations {
            if !seen.insert((op.role.as_str(), op.operation)) {
                report.violations.push(Violation::DuplicateOperation {
                    table: table.table.clone(),
                    key: entry_key(&table.table, &op.role, op.operation),
                });
            }
        }
    }

    report.warnings.extend(
        matrix
            .unprotected
            .iter()
            .map(|table| Warning::UnprotectedTable { table: table.clone() }),
    );
    report
}

/// Ledger uniqueness, plus undecided and unsynced entries in strict mode.
/// Without strict mode undecided entries are only warnings.
///
/// `Ledger::load` already refuses duplicate keys; the uniqueness check here
/// covers ledgers built in memory.
pub fn verify_ledger(ledger: &Ledger, matrix: Option<&RlsMatrix>, strict: bool) -> VerifyReport {
    let mut report = VerifyReport::default();

    report.violations.extend(
        ledger
            .duplicate_keys()
            .into_iter()
            .map(|key| Violation::DuplicateLedgerEntry { key }),
    );

    for entry in ledger.undecided() {
        if strict {
            report.violations.push(Violation::UndecidedEntry { key: entry.key() });
        } else {
            report.warnings.push(Warning::UndecidedEntry { key: entry.key() });
        }
    }

    if let Some(matrix) = matrix {
        let ledger_keys: HashSet<String> = ledger.entries.iter().map(LedgerEntry::key).collect();
        let matrix_keys: HashSet<String> = matrix
            .entries()
            .map(|(table, op)| entry_key(table, &op.role, op.operation))
            .collect();

        if strict {
            let mut unsynced: Vec<&String> = matrix_keys.difference(&ledger_keys).collect();
            unsynced.sort();
            report
                .violations
                .extend(unsynced.into_iter().map(|key| Violation::UnsyncedEntry { key: key.clone() }));
        }

        let mut stale: Vec<&String> = ledger_keys.difference(&matrix_keys).collect();
        stale.sort();
        report
            .warnings
            .extend(stale.into_iter().map(|key| Warning::StaleEntry { key: key.clone() }));
    }

    report
}

/// Full verification of both artifacts
pub fn verify(matrix: &RlsMatrix, ledger: &Ledger, config: &VerifyConfig) -> VerifyReport {
    verify_matrix(matrix).merge(verify_ledger(ledger, Some(matrix), config.strict))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Decision;
    use crate::matrix::{Operation, OperationEntry, TableMatrix};
    use chrono::Utc;

    fn matrix(tables: Vec<(&str, Vec<OperationEntry>)>) -> RlsMatrix {
        RlsMatrix {
            generated_at: Utc::now(),
            tables: tables
                .into_iter()
                .map(|(table, operations)| TableMatrix {
                    table: table.to_string(),
                    policies: Vec::new(),
                    operations,
                })
                .collect(),
            unprotected: Vec::new(),
        }
    }

    fn decided(table: &str, role: &str, operation: Operation, allowed: bool) -> LedgerEntry {
        LedgerEntry {
            table: table.to_string(),
            role: role.to_string(),
            operation,
            allowed: Decision::from(allowed),
        }
    }

    #[test]
    fn table_without_operations_is_a_violation() {
        let report = verify_matrix(&matrix(vec![("payouts", vec![])]));
        assert_eq!(
            report.violations,
            vec![Violation::TableWithoutPolicies {
                table: "payouts".to_string()
            }]
        );
    }

    #[test]
    fn duplicate_pairs_in_matrix_file_are_caught() {
        let report = verify_matrix(&matrix(vec![(
            "orders",
            vec![
                OperationEntry::new("admin", Operation::Read),
                OperationEntry::new("admin", Operation::Read),
            ],
        )]));
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].key(), "orders|admin|read");
    }

    #[test]
    fn unprotected_tables_only_warn() {
        let mut m = matrix(vec![("orders", vec![OperationEntry::new("admin", Operation::Read)])]);
        m.unprotected.push("audit_log".to_string());

        let report = verify_matrix(&m);
        assert!(report.is_ok());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn duplicate_ledger_entries_fail_even_without_strict() {
        let ledger = Ledger::new(vec![
            decided("orders", "admin", Operation::Read, true),
            decided("orders", "admin", Operation::Read, false),
            decided("orders", "public", Operation::Read, false),
        ]);

        let report = verify_ledger(&ledger, None, false);
        assert_eq!(
            report.violations,
            vec![Violation::DuplicateLedgerEntry {
                key: "orders|admin|read".to_string()
            }]
        );
        match report.into_result(5).unwrap_err() {
            AuditError::Integrity { message, keys } => {
                assert_eq!(keys, vec!["orders|admin|read"]);
                assert!(message.contains("1 duplicate ledger entries"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn undecided_is_fatal_only_in_strict_mode() {
        let ledger = Ledger::new(vec![LedgerEntry::undecided("orders", "admin", Operation::Read)]);

        let relaxed = verify_ledger(&ledger, None, false);
        assert!(relaxed.is_ok());
        assert_eq!(relaxed.warnings.len(), 1);

        let strict = verify_ledger(&ledger, None, true);
        let err = strict.into_result(5).unwrap_err();
        assert!(err.to_string().contains("orders|admin|read"));
        assert_eq!(err.tag(), "integrity");
    }

    #[test]
    fn error_names_at_most_five_keys() {
        let ledger = Ledger::new(
            ["a", "b", "c", "d", "e", "f", "g"]
                .iter()
                .map(|t| LedgerEntry::undecided(*t, "admin", Operation::Read))
                .collect(),
        );

        match verify_ledger(&ledger, None, true).into_result(5).unwrap_err() {
            AuditError::Integrity { message, keys } => {
                assert_eq!(keys.len(), 5);
                assert!(message.contains("7 undecided ledger entries"));
                assert!(message.contains("(and 2 more)"));
                assert!(!message.contains("g|admin|read"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn strict_mode_flags_unsynced_pairs_and_warns_on_stale() {
        let m = matrix(vec![(
            "orders",
            vec![
                OperationEntry::new("admin", Operation::Read),
                OperationEntry::new("public", Operation::Read),
            ],
        )]);
        let ledger = Ledger::new(vec![
            decided("orders", "admin", Operation::Read, true),
            decided("coupons", "anon", Operation::Read, false),
        ]);

        let report = verify_ledger(&ledger, Some(&m), true);
        assert_eq!(
            report.violations,
            vec![Violation::UnsyncedEntry {
                key: "orders|public|read".to_string()
            }]
        );
        assert_eq!(
            report.warnings,
            vec![Warning::StaleEntry {
                key: "coupons|anon|read".to_string()
            }]
        );
    }

    #[test]
    fn fully_decided_ledger_passes_strict() {
        let m = matrix(vec![("orders", vec![OperationEntry::new("admin", Operation::Read)])]);
        let ledger = Ledger::new(vec![decided("orders", "admin", Operation::Read, true)]);
        let config = VerifyConfig {
            strict: true,
            sample_size: 5,
        };

        assert!(verify(&m, &ledger, &config).into_result(5).is_ok());
    }
}
