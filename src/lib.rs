//! Block Patcher: literal block replacement for UI source files
//!
//! Replaces an exact multi-line block of text with another inside a single
//! file. Ships one built-in patch, the `react-json-view` italic styling fix
//! for `JsonFormatter.tsx`, and accepts the same `{ file, old, new }` shape
//! from a TOML patch config.
//!
//! # Semantics
//!
//! - Every non-overlapping occurrence of the block is replaced
//! - An absent block is a silent no-op by default; the file is still rewritten
//!   byte-identical (`on_missing = "fail"` turns it into an error)
//! - Writes go through tempfile + fsync + rename
//! - Targets must resolve inside the workspace
//!
//! # Example
//!
//! ```no_run
//! use block_patcher::BlockReplace;
//!
//! let edit = BlockReplace::new("JsonFormatter.tsx", "font-style: italic", "font-style: normal");
//!
//! match edit.apply() {
//!     Ok(outcome) => println!("{} occurrence(s) replaced", outcome.occurrences()),
//!     Err(e) => eprintln!("Patch failed: {}", e),
//! }
//! ```

pub mod builtin;
pub mod config;
pub mod drift;
pub mod edit;
pub mod safety;

// Re-exports
pub use builtin::{builtin_config, COMPLETION_MESSAGE, TARGET_FILE};
pub use config::{
    apply_patches, check_patches, load_from_path, load_from_str, matches_requirement,
    ApplicationError, ConfigError, MissingPolicy, PatchConfig, PatchResult, VersionError,
};
pub use drift::{closest_region, DriftReport};
pub use edit::{BlockReplace, EditError, ReplaceOutcome};
pub use safety::{SafetyError, WorkspaceGuard};

/// Run the built-in patch against `JsonFormatter.tsx` in the current
/// directory.
///
/// Succeeds whether or not the old block was present.
pub fn run() -> Result<ReplaceOutcome, EditError> {
    BlockReplace::new(
        TARGET_FILE,
        builtin::OLD_STYLE_BLOCK,
        builtin::NEW_STYLE_BLOCK,
    )
    .apply()
}
