//! JSON artifact files shared between pipeline stages.
//!
//! Artifacts are always written whole: pretty-printed, with a trailing
//! newline, parent directories created on demand. Identical values produce
//! identical bytes, which keeps ledger diffs reviewable.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Input file not found: {0}")]
    Missing(String),

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

impl ArtifactError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        ArtifactError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    fn json(path: &Path, source: serde_json::Error) -> Self {
        ArtifactError::Json {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Read a required artifact
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    read_json_opt(path)?.ok_or_else(|| ArtifactError::Missing(path.display().to_string()))
}

/// Read an artifact that may not exist yet
pub fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ArtifactError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ArtifactError::io(path, e)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| ArtifactError::json(path, e))
}

/// Serialize exactly as `write_json` would, without touching the filesystem
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');
    Ok(content)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let content = to_pretty_json(value).map_err(|e| ArtifactError::json(path, e))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ArtifactError::io(parent, e))?;
    }
    fs::write(path, content).map_err(|e| ArtifactError::io(path, e))
}
