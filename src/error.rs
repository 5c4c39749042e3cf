// Pipeline Error Types
use thiserror::Error;

use crate::artifact::ArtifactError;
use crate::catalog::CatalogError;
use crate::database::manager::DatabaseError;
use crate::ledger::LedgerError;

/// Fatal pipeline errors. Every variant ends the invocation with exit code 1.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Missing or invalid environment/file input
    #[error("{0}")]
    Config(String),

    /// Backend unreachable or readiness wait exhausted
    #[error("{0}")]
    Connectivity(String),

    /// Verifier violations or a corrupt ledger
    #[error("{message}")]
    Integrity { message: String, keys: Vec<String> },

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: invalid JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl AuditError {
    /// Short tag printed in front of fatal messages
    pub fn tag(&self) -> &'static str {
        match self {
            AuditError::Config(_) => "config",
            AuditError::Connectivity(_) => "connectivity",
            AuditError::Integrity { .. } => "integrity",
            AuditError::Io { .. } => "io",
            AuditError::Json { .. } => "json",
        }
    }

    pub fn exit_code(&self) -> i32 {
        1
    }

    pub fn config(message: impl Into<String>) -> Self {
        AuditError::Config(message.into())
    }

    pub fn connectivity(message: impl Into<String>) -> Self {
        AuditError::Connectivity(message.into())
    }

    pub fn integrity(message: impl Into<String>, keys: Vec<String>) -> Self {
        AuditError::Integrity {
            message: message.into(),
            keys,
        }
    }
}

impl From<DatabaseError> for AuditError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConfigMissing(_) | DatabaseError::InvalidDatabaseUrl(_) => {
                AuditError::config(err.to_string())
            }
            DatabaseError::Timeout { .. } | DatabaseError::Sqlx(_) => {
                AuditError::connectivity(err.to_string())
            }
        }
    }
}

impl From<ArtifactError> for AuditError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::Missing(_) => AuditError::config(err.to_string()),
            ArtifactError::Io { path, source } => AuditError::Io { path, source },
            ArtifactError::Json { path, source } => AuditError::Json { path, source },
        }
    }
}

impl From<CatalogError> for AuditError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Database(db) => db.into(),
            CatalogError::Query(_) => AuditError::connectivity(err.to_string()),
            CatalogError::UnknownCommand { ref policy, .. } => {
                let key = policy.clone();
                AuditError::integrity(err.to_string(), vec![key])
            }
            CatalogError::Artifact(artifact) => artifact.into(),
        }
    }
}

impl From<LedgerError> for AuditError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::DuplicateKey(key) => AuditError::integrity(
                format!("Ledger contains duplicate entry {}", key),
                vec![key],
            ),
            LedgerError::Artifact(artifact) => artifact.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_follow_taxonomy() {
        assert_eq!(AuditError::config("x").tag(), "config");
        assert_eq!(AuditError::connectivity("x").tag(), "connectivity");
        assert_eq!(AuditError::integrity("x", vec![]).tag(), "integrity");
        assert_eq!(AuditError::config("x").exit_code(), 1);
    }

    #[test]
    fn duplicate_ledger_key_is_integrity_error() {
        let err: AuditError = LedgerError::DuplicateKey("orders|admin|read".to_string()).into();
        match err {
            AuditError::Integrity { keys, .. } => assert_eq!(keys, vec!["orders|admin|read"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_input_file_is_config_error() {
        let err: AuditError = ArtifactError::Missing("rls/rls-matrix.json".to_string()).into();
        assert_eq!(err.tag(), "config");
        assert!(err.to_string().contains("rls/rls-matrix.json"));
    }

    #[test]
    fn missing_url_is_config_error() {
        let err: AuditError = DatabaseError::ConfigMissing("SUPABASE_DB_URL or DATABASE_URL").into();
        assert_eq!(err.tag(), "config");
        assert!(err.to_string().contains("DATABASE_URL"));
    }
}
