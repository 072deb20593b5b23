//! Version gating for patch sets.
//!
//! A patch set may carry a semver range like ">=0.3.0, <0.5.0". The workspace
//! version is the `version` field of its `package.json`.

use semver::{Version, VersionReq};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;

/// Errors during version gating
#[derive(Debug, Clone)]
pub enum VersionError {
    /// Invalid version string (e.g., "not-a-version")
    InvalidVersion { value: String, source: String },
    /// Invalid version requirement (e.g., ">=bad")
    InvalidRequirement { value: String, source: String },
    /// package.json missing, unreadable or without a version
    Manifest { path: String, reason: String },
}

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionError::InvalidVersion { value, source } => {
                write!(f, "invalid version '{}': {}", value, source)
            }
            VersionError::InvalidRequirement { value, source } => {
                write!(f, "invalid version requirement '{}': {}", value, source)
            }
            VersionError::Manifest { path, reason } => {
                write!(f, "cannot read version from {}: {}", path, reason)
            }
        }
    }
}

impl std::error::Error for VersionError {}

#[derive(Deserialize)]
struct PackageManifest {
    version: Option<String>,
}

/// Read the workspace version from `<workspace>/package.json`.
pub fn read_workspace_version(workspace: &Path) -> Result<String, VersionError> {
    let path = workspace.join("package.json");
    let manifest_error = |reason: String| VersionError::Manifest {
        path: path.display().to_string(),
        reason,
    };

    let raw = fs::read_to_string(&path).map_err(|e| manifest_error(e.to_string()))?;
    let manifest: PackageManifest =
        serde_json::from_str(&raw).map_err(|e| manifest_error(e.to_string()))?;

    manifest
        .version
        .ok_or_else(|| manifest_error("no \"version\" field".to_string()))
}

/// Check if a version matches a requirement string
///
/// # Examples
///
/// ```
/// use block_patcher::config::version::matches_requirement;
///
/// assert!(matches_requirement("0.4.0", Some(">=0.3.0")).unwrap());
/// assert!(!matches_requirement("0.2.9", Some(">=0.3.0")).unwrap());
///
/// // None requirement means "apply to all versions"
/// assert!(matches_requirement("1.0.0", None).unwrap());
/// ```
pub fn matches_requirement(
    version: &str,
    requirement: Option<&str>,
) -> Result<bool, VersionError> {
    let Some(req_str) = requirement else {
        return Ok(true);
    };

    let req_str = req_str.trim();
    if req_str.is_empty() {
        return Ok(true);
    }

    let version = Version::parse(version.trim()).map_err(|e| VersionError::InvalidVersion {
        value: version.to_string(),
        source: e.to_string(),
    })?;

    let req = VersionReq::parse(req_str).map_err(|e| VersionError::InvalidRequirement {
        value: req_str.to_string(),
        source: e.to_string(),
    })?;

    Ok(req.matches(&version))
}
