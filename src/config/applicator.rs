//! Patch applicator - applies block patches with a missing-block policy
//!
//! For each patch, in config order:
//! - Gates the whole set on `meta.version_range`
//! - Resolves and guards the target path
//! - Replaces every occurrence of the block, or reports the no-op
//! - Reports one result per patch

use crate::config::schema::{MissingPolicy, PatchConfig, PatchDefinition};
use crate::config::version::{matches_requirement, VersionError};
use crate::drift::{closest_region, DriftReport};
use crate::edit::{BlockReplace, EditError, ReplaceOutcome};
use crate::safety::{SafetyError, WorkspaceGuard};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Result of applying a single patch
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchResult should be checked for success/no-op"]
pub enum PatchResult {
    /// Block was found and replaced (or would be, when checking)
    Applied { file: PathBuf, occurrences: usize },
    /// Block was absent; content left byte-identical
    Unchanged { file: PathBuf },
    /// Patch was skipped due to version constraint
    SkippedVersion { reason: String },
}

impl fmt::Display for PatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchResult::Applied { file, occurrences } => {
                write!(
                    f,
                    "Applied patch to {} ({} occurrence{})",
                    file.display(),
                    occurrences,
                    if *occurrences == 1 { "" } else { "s" }
                )
            }
            PatchResult::Unchanged { file } => {
                write!(f, "Block not found in {}, left unchanged", file.display())
            }
            PatchResult::SkippedVersion { reason } => {
                write!(f, "Skipped (version): {}", reason)
            }
        }
    }
}

/// Errors during patch application
#[derive(Debug)]
pub enum ApplicationError {
    /// Version gating error
    Version(VersionError),
    /// Target path rejected by the workspace guard
    Safety(SafetyError),
    /// Read, decode or write failure
    Edit(EditError),
    /// Block absent under `on_missing = "fail"`
    NoMatch {
        file: PathBuf,
        drift: Option<DriftReport>,
    },
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationError::Version(e) => write!(f, "version error: {}", e),
            ApplicationError::Safety(e) => write!(f, "unsafe target: {}", e),
            ApplicationError::Edit(e) => write!(f, "edit error: {}", e),
            ApplicationError::NoMatch { file, drift } => {
                write!(f, "block matched no locations in {}", file.display())?;
                if let Some(drift) = drift {
                    write!(f, "; {}", drift)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ApplicationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApplicationError::Version(e) => Some(e),
            ApplicationError::Safety(e) => Some(e),
            ApplicationError::Edit(e) => Some(e),
            ApplicationError::NoMatch { .. } => None,
        }
    }
}

impl From<VersionError> for ApplicationError {
    fn from(e: VersionError) -> Self {
        ApplicationError::Version(e)
    }
}

impl From<SafetyError> for ApplicationError {
    fn from(e: SafetyError) -> Self {
        ApplicationError::Safety(e)
    }
}

impl From<EditError> for ApplicationError {
    fn from(e: EditError) -> Self {
        ApplicationError::Edit(e)
    }
}

pub type PatchOutcomes = Vec<(String, Result<PatchResult, ApplicationError>)>;

/// Resolve a patch's target path against the workspace.
pub fn resolve_target(
    config: &PatchConfig,
    patch: &PatchDefinition,
    workspace_root: &Path,
) -> PathBuf {
    if config.meta.workspace_relative {
        workspace_root.join(&patch.file)
    } else {
        PathBuf::from(&patch.file)
    }
}

/// Apply a patch configuration to a workspace
///
/// # Arguments
///
/// * `config` - The patch configuration to apply
/// * `workspace_root` - Root directory of the workspace
/// * `workspace_version` - Version from the workspace's `package.json`
///
/// # Returns
///
/// One result per patch, in config order
pub fn apply_patches(
    config: &PatchConfig,
    workspace_root: &Path,
    workspace_version: &str,
) -> PatchOutcomes {
    run_patches(config, workspace_root, workspace_version, true)
}

/// Check patch status without mutating the workspace.
///
/// Mirrors `apply_patches` result semantics; `Applied` means "would apply".
pub fn check_patches(
    config: &PatchConfig,
    workspace_root: &Path,
    workspace_version: &str,
) -> PatchOutcomes {
    run_patches(config, workspace_root, workspace_version, false)
}

fn run_patches(
    config: &PatchConfig,
    workspace_root: &Path,
    workspace_version: &str,
    write: bool,
) -> PatchOutcomes {
    match matches_requirement(workspace_version, config.meta.version_range.as_deref()) {
        Ok(true) => config
            .patches
            .iter()
            .map(|patch| {
                let result = run_patch(config, patch, workspace_root, write);
                (patch.id.clone(), result)
            })
            .collect(),
        Ok(false) => {
            let req = config.meta.version_range.as_deref().unwrap_or("").trim();
            let reason =
                format!("workspace version {workspace_version} does not satisfy version_range {req}");
            config
                .patches
                .iter()
                .map(|patch| {
                    (
                        patch.id.clone(),
                        Ok(PatchResult::SkippedVersion {
                            reason: reason.clone(),
                        }),
                    )
                })
                .collect()
        }
        Err(e) => config
            .patches
            .iter()
            .map(|patch| (patch.id.clone(), Err(ApplicationError::Version(e.clone()))))
            .collect(),
    }
}

fn run_patch(
    config: &PatchConfig,
    patch: &PatchDefinition,
    workspace_root: &Path,
    write: bool,
) -> Result<PatchResult, ApplicationError> {
    let guard = WorkspaceGuard::new(workspace_root)?;
    let target = resolve_target(config, patch, guard.workspace_root());
    let file = guard.validate_path(&target)?;

    let edit = BlockReplace::new(&file, patch.old.as_str(), patch.new.as_str());
    let (original, rendered) = edit.preview()?;
    debug!(
        patch = %patch.id,
        file = %file.display(),
        occurrences = rendered.occurrences,
        "previewed patch"
    );

    if rendered.occurrences == 0 {
        if patch.on_missing == MissingPolicy::Fail {
            let drift = closest_region(&original, &patch.old);
            return Err(ApplicationError::NoMatch { file, drift });
        }
        warn!(patch = %patch.id, file = %file.display(), "block not found");
    }

    if !write {
        return Ok(if rendered.occurrences == 0 {
            PatchResult::Unchanged { file }
        } else {
            PatchResult::Applied {
                file,
                occurrences: rendered.occurrences,
            }
        });
    }

    guard.revalidate(&file)?;
    let outcome = edit.commit(&rendered)?;

    Ok(match outcome {
        ReplaceOutcome::Replaced { file, occurrences } => PatchResult::Applied { file, occurrences },
        ReplaceOutcome::Unchanged { file } => PatchResult::Unchanged { file },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::Metadata;
    use std::fs;

    fn config_for(old: &str, new: &str, on_missing: MissingPolicy) -> PatchConfig {
        PatchConfig {
            meta: Metadata {
                name: "test".to_string(),
                description: None,
                version_range: None,
                workspace_relative: true,
            },
            patches: vec![PatchDefinition {
                id: "p".to_string(),
                file: "view.tsx".to_string(),
                old: old.to_string(),
                new: new.to_string(),
                on_missing,
            }],
        }
    }

    #[test]
    fn test_apply_patches_version_filtering() {
        let mut config = config_for("a", "b", MissingPolicy::Ignore);
        config.meta.version_range = Some(">=2.0.0".to_string());

        let results = apply_patches(&config, Path::new("/nonexistent"), "1.0.0");
        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0].1,
            Ok(PatchResult::SkippedVersion { .. })
        ));
    }

    #[test]
    fn test_apply_patches_bad_version() {
        let mut config = config_for("a", "b", MissingPolicy::Ignore);
        config.meta.version_range = Some(">=2.0.0".to_string());

        let results = apply_patches(&config, Path::new("/nonexistent"), "next");
        assert!(matches!(results[0].1, Err(ApplicationError::Version(_))));
    }

    #[test]
    fn test_fail_policy_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("view.tsx");
        fs::write(&file, "line one\nline two\n").unwrap();
        let past = filetime::FileTime::from_unix_time(1_000_000, 0);
        filetime::set_file_mtime(&file, past).unwrap();

        let config = config_for("line three", "x", MissingPolicy::Fail);
        let results = apply_patches(&config, dir.path(), "0.0.0");

        match &results[0].1 {
            Err(ApplicationError::NoMatch { drift, .. }) => assert!(drift.is_some()),
            other => panic!("expected NoMatch, got {other:?}"),
        }
        let mtime =
            filetime::FileTime::from_last_modification_time(&fs::metadata(&file).unwrap());
        assert_eq!(mtime, past);
    }

    #[test]
    fn test_check_patches_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("view.tsx");
        fs::write(&file, "OLD").unwrap();

        let config = config_for("OLD", "NEW", MissingPolicy::Ignore);
        let results = check_patches(&config, dir.path(), "0.0.0");

        assert!(matches!(
            results[0].1,
            Ok(PatchResult::Applied { occurrences: 1, .. })
        ));
        assert_eq!(fs::read_to_string(&file).unwrap(), "OLD");
    }

    #[test]
    fn test_patch_result_display() {
        let applied = PatchResult::Applied {
            file: PathBuf::from("/tmp/view.tsx"),
            occurrences: 2,
        };
        assert!(applied.to_string().contains("2 occurrences"));

        let unchanged = PatchResult::Unchanged {
            file: PathBuf::from("/tmp/view.tsx"),
        };
        assert!(unchanged.to_string().contains("left unchanged"));

        let skipped = PatchResult::SkippedVersion {
            reason: "version too old".to_string(),
        };
        assert!(skipped.to_string().contains("Skipped"));
    }
}
