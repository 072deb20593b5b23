//! Patch config loading: TOML text to a validated `PatchConfig`.

use crate::config::schema::{PatchConfig, ValidationError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read patch config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse patch config{}: {source}", origin(path))]
    Toml {
        path: Option<PathBuf>,
        #[source]
        source: toml_edit::de::Error,
    },

    #[error("Invalid patch config{}{}: {source}", origin(path), failing(source))]
    Validation {
        path: Option<PathBuf>,
        #[source]
        source: ValidationError,
    },
}

fn origin(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" {}", p.display()))
        .unwrap_or_default()
}

fn failing(error: &ValidationError) -> String {
    let ids = error.patch_ids();
    if ids.is_empty() {
        String::new()
    } else {
        format!(" (patches: {})", ids.join(", "))
    }
}

impl ConfigError {
    /// Ids of the patches that failed validation.
    pub fn patch_ids(&self) -> Vec<&str> {
        match self {
            ConfigError::Validation { source, .. } => source.patch_ids(),
            _ => Vec::new(),
        }
    }
}

/// Parse and validate, tagging errors with where the text came from.
fn parse(input: &str, path: Option<&Path>) -> Result<PatchConfig, ConfigError> {
    let config: PatchConfig = toml_edit::de::from_str(input).map_err(|source| ConfigError::Toml {
        path: path.map(Path::to_path_buf),
        source,
    })?;

    config.validate().map_err(|source| ConfigError::Validation {
        path: path.map(Path::to_path_buf),
        source,
    })?;

    debug!(
        name = %config.meta.name,
        patches = config.patches.len(),
        "loaded patch config"
    );
    Ok(config)
}

pub fn load_from_str(input: &str) -> Result<PatchConfig, ConfigError> {
    parse(input, None)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatchConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&contents, Some(path))
}
