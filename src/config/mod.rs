pub mod applicator;
pub mod loader;
pub mod schema;
pub mod version;

pub use applicator::{
    apply_patches, check_patches, resolve_target, ApplicationError, PatchOutcomes, PatchResult,
};
pub use loader::{load_from_path, load_from_str, ConfigError};
pub use schema::{
    Metadata, MissingPolicy, PatchConfig, PatchDefinition, ValidationError, ValidationIssue,
};
pub use version::{matches_requirement, read_workspace_version, VersionError};
