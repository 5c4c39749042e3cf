use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Connection URL variables, in precedence order.
pub const DATABASE_URL_VARS: &[&str] = &["SUPABASE_DB_URL", "DATABASE_URL"];

/// Schemas owned by the managed backend rather than the application.
pub const DEFAULT_EXCLUDED_SCHEMAS: &[&str] = &[
    "auth",
    "storage",
    "realtime",
    "extensions",
    "graphql",
    "graphql_public",
    "pgbouncer",
    "vault",
    "supabase_functions",
    "supabase_migrations",
    "net",
    "pgsodium",
    "pgsodium_masks",
    "cron",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub database: DatabaseConfig,
    pub artifacts: ArtifactConfig,
    pub verify: VerifyConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// Decide from the URL host and its `sslmode` parameter
    Auto,
    Require,
    Disable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    /// Name of the variable the URL came from, for diagnostics
    pub url_source: Option<String>,
    pub tls: TlsMode,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
    pub wait_attempts: u32,
    pub wait_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    pub matrix_path: PathBuf,
    pub ledger_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    pub strict: bool,
    /// How many offending keys an integrity error names
    pub sample_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub excluded_schemas: Vec<String>,
}

impl AuditConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::defaults().with_overrides(lookup)
    }

    fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Database overrides
        for var in DATABASE_URL_VARS {
            if let Some(v) = lookup(var).filter(|v| !v.trim().is_empty()) {
                self.database.url = Some(v.trim().to_string());
                self.database.url_source = Some(var.to_string());
                break;
            }
        }
        if let Some(v) = lookup("DB_SSL") {
            self.database.tls = parse_tls_mode(&v).unwrap_or(self.database.tls);
        }
        if let Some(v) = lookup("DB_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Some(v) = lookup("DB_CONNECT_TIMEOUT_SECS") {
            self.database.connect_timeout_secs = v.parse().unwrap_or(self.database.connect_timeout_secs);
        }
        if let Some(v) = lookup("DB_WAIT_ATTEMPTS") {
            self.database.wait_attempts = v.parse().unwrap_or(self.database.wait_attempts);
        }
        if let Some(v) = lookup("DB_WAIT_INTERVAL_MS") {
            self.database.wait_interval_ms = v.parse().unwrap_or(self.database.wait_interval_ms);
        }

        // Artifact overrides
        if let Some(v) = lookup("RLS_MATRIX_PATH") {
            self.artifacts.matrix_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("RLS_LEDGER_PATH") {
            self.artifacts.ledger_path = PathBuf::from(v);
        }

        // Verify overrides
        if let Some(v) = lookup("RLS_STRICT") {
            self.verify.strict = parse_flag(&v).unwrap_or(self.verify.strict);
        }

        // Catalog overrides
        if let Some(v) = lookup("RLS_EXCLUDED_SCHEMAS") {
            self.catalog.excluded_schemas = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        self
    }

    fn defaults() -> Self {
        Self {
            database: DatabaseConfig {
                url: None,
                url_source: None,
                tls: TlsMode::Auto,
                max_connections: 2,
                connect_timeout_secs: 10,
                wait_attempts: 30,
                wait_interval_ms: 1000,
            },
            artifacts: ArtifactConfig {
                matrix_path: PathBuf::from("rls").join("rls-matrix.json"),
                ledger_path: PathBuf::from("rls").join("rls-expected.json"),
            },
            verify: VerifyConfig {
                strict: false,
                sample_size: 5,
            },
            catalog: CatalogConfig {
                excluded_schemas: DEFAULT_EXCLUDED_SCHEMAS.iter().map(|s| s.to_string()).collect(),
            },
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_tls_mode(value: &str) -> Option<TlsMode> {
    match value.trim().to_ascii_lowercase().as_str() {
        "require" => Some(TlsMode::Require),
        "disable" => Some(TlsMode::Disable),
        "auto" => Some(TlsMode::Auto),
        other => parse_flag(other).map(|on| if on { TlsMode::Require } else { TlsMode::Disable }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> AuditConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AuditConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = config_with(&[]);
        assert!(config.database.url.is_none());
        assert_eq!(config.database.tls, TlsMode::Auto);
        assert!(!config.verify.strict);
        assert_eq!(config.verify.sample_size, 5);
        assert_eq!(config.artifacts.ledger_path, PathBuf::from("rls/rls-expected.json"));
        assert!(config.catalog.excluded_schemas.contains(&"auth".to_string()));
    }

    #[test]
    fn test_supabase_url_takes_precedence() {
        let config = config_with(&[
            ("DATABASE_URL", "postgres://local/app"),
            ("SUPABASE_DB_URL", "postgres://remote/app"),
        ]);
        assert_eq!(config.database.url.as_deref(), Some("postgres://remote/app"));
        assert_eq!(config.database.url_source.as_deref(), Some("SUPABASE_DB_URL"));
    }

    #[test]
    fn test_blank_primary_url_falls_back() {
        let config = config_with(&[
            ("SUPABASE_DB_URL", "  "),
            ("DATABASE_URL", "postgres://local/app"),
        ]);
        assert_eq!(config.database.url.as_deref(), Some("postgres://local/app"));
        assert_eq!(config.database.url_source.as_deref(), Some("DATABASE_URL"));
    }

    #[test]
    fn test_flag_overrides() {
        let config = config_with(&[
            ("DB_SSL", "false"),
            ("RLS_STRICT", "1"),
            ("DB_WAIT_ATTEMPTS", "3"),
            ("DB_WAIT_INTERVAL_MS", "not-a-number"),
        ]);
        assert_eq!(config.database.tls, TlsMode::Disable);
        assert!(config.verify.strict);
        assert_eq!(config.database.wait_attempts, 3);
        assert_eq!(config.database.wait_interval_ms, 1000);
    }

    #[test]
    fn test_excluded_schemas_replace_defaults() {
        let config = config_with(&[("RLS_EXCLUDED_SCHEMAS", "auth, billing ,,")]);
        assert_eq!(config.catalog.excluded_schemas, vec!["auth", "billing"]);
    }
}
