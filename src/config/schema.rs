use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct PatchConfig {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub patches: Vec<PatchDefinition>,
}

impl PatchConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();

        if self.patches.is_empty() {
            issues.push(ValidationIssue::EmptyPatchList);
        }

        for patch in &self.patches {
            let patch_id = if patch.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    patch_id: None,
                    field: "id",
                });
                None
            } else {
                if !seen.insert(patch.id.as_str()) {
                    issues.push(ValidationIssue::DuplicateId(patch.id.clone()));
                }
                Some(patch.id.clone())
            };

            if patch.file.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    patch_id: patch_id.clone(),
                    field: "file",
                });
            }
            // Whitespace-only blocks are legal; only an empty search is not
            if patch.old.is_empty() {
                issues.push(ValidationIssue::MissingField {
                    patch_id,
                    field: "old",
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Force every patch to fail when its block is absent.
    pub fn strict(mut self) -> Self {
        for patch in &mut self.patches {
            patch.on_missing = MissingPolicy::Fail;
        }
        self
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// semver requirement matched against `package.json`'s version
    #[serde(default)]
    pub version_range: Option<String>,
    #[serde(default)]
    pub workspace_relative: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PatchDefinition {
    pub id: String,
    pub file: String,
    pub old: String,
    #[serde(default)]
    pub new: String,
    #[serde(default)]
    pub on_missing: MissingPolicy,
}

/// What to do when the search block occurs zero times.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MissingPolicy {
    /// Rewrite the file unchanged and report success
    #[default]
    Ignore,
    /// Report the patch as failed
    Fail,
}

impl fmt::Display for MissingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingPolicy::Ignore => write!(f, "ignore"),
            MissingPolicy::Fail => write!(f, "fail"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    /// Distinct ids of the patches with issues, in config order.
    pub fn patch_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for issue in &self.issues {
            let id = match issue {
                ValidationIssue::MissingField {
                    patch_id: Some(id), ..
                } => id.as_str(),
                ValidationIssue::DuplicateId(id) => id.as_str(),
                _ => continue,
            };
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyPatchList,
    MissingField {
        patch_id: Option<String>,
        field: &'static str,
    },
    DuplicateId(String),
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyPatchList => write!(f, "patch config contains no patches"),
            ValidationIssue::MissingField { patch_id, field } => match patch_id {
                Some(id) => write!(f, "patch '{id}' missing required field '{field}'"),
                None => write!(f, "patch missing required field '{field}'"),
            },
            ValidationIssue::DuplicateId(id) => write!(f, "patch id '{id}' is used more than once"),
        }
    }
}
