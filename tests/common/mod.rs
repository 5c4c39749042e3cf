#![allow(dead_code)]

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use rls_audit::cli::Cli;
use rls_audit::AuditConfig;
use tempfile::TempDir;

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

/// Scratch workspace with artifact paths pointing inside it
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Result<Self> {
        Ok(Self { dir: tempfile::tempdir()? })
    }

    pub fn matrix_path(&self) -> PathBuf {
        self.dir.path().join("rls").join("rls-matrix.json")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.dir.path().join("rls").join("rls-expected.json")
    }

    pub fn config(&self, strict: bool) -> AuditConfig {
        let matrix = self.matrix_path().display().to_string();
        let ledger = self.ledger_path().display().to_string();
        let strict = if strict { "true" } else { "false" }.to_string();
        AuditConfig::from_lookup(move |key| match key {
            "RLS_MATRIX_PATH" => Some(matrix.clone()),
            "RLS_LEDGER_PATH" => Some(ledger.clone()),
            "RLS_STRICT" => Some(strict.clone()),
            _ => None,
        })
    }

    /// Run one CLI invocation against this workspace
    pub async fn run(&self, args: &[&str], strict: bool) -> Result<()> {
        let mut argv = vec!["rls-audit", "--json"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv)?;
        rls_audit::cli::run(cli, &self.config(strict)).await
    }

    pub fn write(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content)?;
        Ok(path)
    }
}
