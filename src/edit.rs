use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use xxhash_rust::xxh3::xxh3_64;

/// The fundamental patch primitive: literal block replacement on one file.
///
/// Every occurrence of `old` is replaced by `new` using standard
/// left-to-right, non-overlapping substring semantics. The file is always
/// rewritten, even when `old` does not occur.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "BlockReplace does nothing until apply() is called"]
pub struct BlockReplace {
    /// Path to the file to patch
    pub file: PathBuf,
    /// Exact block to search for
    pub old: String,
    /// Replacement block
    pub new: String,
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Search block is empty for {0}")]
    EmptyPattern(PathBuf),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Result of applying a block replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "ReplaceOutcome should be checked for replaced/unchanged"]
pub enum ReplaceOutcome {
    /// At least one occurrence was replaced
    Replaced { file: PathBuf, occurrences: usize },
    /// The block was absent; the file was rewritten byte-identical
    Unchanged { file: PathBuf },
}

impl ReplaceOutcome {
    pub fn occurrences(&self) -> usize {
        match self {
            ReplaceOutcome::Replaced { occurrences, .. } => *occurrences,
            ReplaceOutcome::Unchanged { .. } => 0,
        }
    }
}

/// In-memory result of a replacement, before anything touches disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub content: String,
    pub occurrences: usize,
}

impl Rendered {
    /// xxh3 fingerprint of the rendered content.
    pub fn fingerprint(&self) -> u64 {
        fingerprint(&self.content)
    }
}

/// xxh3 fingerprint of a text, used to tell whether content actually changed.
pub fn fingerprint(text: &str) -> u64 {
    xxh3_64(text.as_bytes())
}

impl BlockReplace {
    pub fn new(file: impl Into<PathBuf>, old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            old: old.into(),
            new: new.into(),
        }
    }

    /// Replace every non-overlapping occurrence of `old` in `content`.
    pub fn render(&self, content: &str) -> Result<Rendered, EditError> {
        if self.old.is_empty() {
            return Err(EditError::EmptyPattern(self.file.clone()));
        }

        let occurrences = content.matches(self.old.as_str()).count();
        let content = if occurrences == 0 {
            content.to_string()
        } else {
            content.replace(self.old.as_str(), &self.new)
        };

        Ok(Rendered {
            content,
            occurrences,
        })
    }

    /// Read the target and compute the replacement without writing.
    pub fn preview(&self) -> Result<(String, Rendered), EditError> {
        let original = read_text(&self.file)?;
        let rendered = self.render(&original)?;
        Ok((original, rendered))
    }

    /// Apply this replacement to the file system.
    ///
    /// The file is rewritten via tempfile + fsync + rename whether or not
    /// any occurrence was found, and its mtime is bumped.
    pub fn apply(&self) -> Result<ReplaceOutcome, EditError> {
        let (original, rendered) = self.preview()?;

        debug!(
            file = %self.file.display(),
            occurrences = rendered.occurrences,
            changed = fingerprint(&original) != rendered.fingerprint(),
            "computed block replacement"
        );

        self.commit(&rendered)
    }

    /// Write previously rendered content to the target.
    pub fn commit(&self, rendered: &Rendered) -> Result<ReplaceOutcome, EditError> {
        atomic_write(&self.file, rendered.content.as_bytes())?;

        // Rename keeps the tempfile's mtime; force "now" so watchers pick it up
        let now = filetime::FileTime::now();
        filetime::set_file_mtime(&self.file, now)?;

        info!(
            file = %self.file.display(),
            bytes = rendered.content.len(),
            "wrote patched file"
        );

        if rendered.occurrences == 0 {
            Ok(ReplaceOutcome::Unchanged {
                file: self.file.clone(),
            })
        } else {
            Ok(ReplaceOutcome::Replaced {
                file: self.file.clone(),
                occurrences: rendered.occurrences,
            })
        }
    }
}

/// Read a file fully and decode it as UTF-8.
pub fn read_text(path: &Path) -> Result<String, EditError> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8(bytes)?)
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Symlinks are followed so the rename replaces the file they point to, not
/// the link. The tempfile lives in that file's directory so the rename stays
/// on one filesystem. An existing target must be writable, and its
/// permissions are carried over.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    let target = match fs::canonicalize(path) {
        Ok(resolved) => resolved,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => path.to_path_buf(),
        Err(e) => return Err(e.into()),
    };

    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        Some(_) => Path::new("."),
        None => {
            return Err(EditError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Path has no parent directory",
            )))
        }
    };

    // The rename only needs a writable directory; refuse read-only targets
    match fs::OpenOptions::new().write(true).open(&target) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let permissions = fs::metadata(&target).map(|m| m.permissions()).ok();

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    if let Some(permissions) = permissions {
        temp.as_file().set_permissions(permissions)?;
    }

    temp.persist(&target).map_err(|e| e.error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_single_occurrence() {
        let edit = BlockReplace::new("test.tsx", "<b>old</b>", "<b>new</b>");
        let rendered = edit.render("before\n<b>old</b>\nafter\n").unwrap();
        assert_eq!(rendered.content, "before\n<b>new</b>\nafter\n");
        assert_eq!(rendered.occurrences, 1);
    }

    #[test]
    fn test_render_absent_is_identical() {
        let edit = BlockReplace::new("test.tsx", "missing", "x");
        let input = "nothing to see here\n";
        let rendered = edit.render(input).unwrap();
        assert_eq!(rendered.content, input);
        assert_eq!(rendered.occurrences, 0);
        assert_eq!(rendered.fingerprint(), fingerprint(input));
    }

    #[test]
    fn test_render_replaces_all_occurrences() {
        let edit = BlockReplace::new("test.tsx", "ab", "X");
        let rendered = edit.render("ab-ab-ab").unwrap();
        assert_eq!(rendered.content, "X-X-X");
        assert_eq!(rendered.occurrences, 3);
    }

    #[test]
    fn test_render_non_overlapping() {
        let edit = BlockReplace::new("test.tsx", "aa", "b");
        let rendered = edit.render("aaa").unwrap();
        assert_eq!(rendered.content, "ba");
        assert_eq!(rendered.occurrences, 1);
    }

    #[test]
    fn test_render_empty_pattern_rejected() {
        let edit = BlockReplace::new("test.tsx", "", "x");
        assert!(matches!(
            edit.render("abc"),
            Err(EditError::EmptyPattern(_))
        ));
    }

    #[test]
    fn test_apply_writes_replacement() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("test.tsx");
        fs::write(&file_path, "keep\nOLD\nkeep\n").unwrap();

        let edit = BlockReplace::new(&file_path, "OLD", "NEW");
        let outcome = edit.apply().unwrap();

        assert_eq!(
            outcome,
            ReplaceOutcome::Replaced {
                file: file_path.clone(),
                occurrences: 1
            }
        );
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "keep\nNEW\nkeep\n");
    }

    #[test]
    fn test_apply_absent_rewrites_unchanged() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("test.tsx");
        fs::write(&file_path, "unrelated").unwrap();

        let past = filetime::FileTime::from_unix_time(1_000_000, 0);
        filetime::set_file_mtime(&file_path, past).unwrap();

        let edit = BlockReplace::new(&file_path, "OLD", "NEW");
        let outcome = edit.apply().unwrap();

        assert!(matches!(outcome, ReplaceOutcome::Unchanged { .. }));
        assert_eq!(fs::read(&file_path).unwrap(), b"unrelated");

        let mtime = filetime::FileTime::from_last_modification_time(
            &fs::metadata(&file_path).unwrap(),
        );
        assert!(mtime > past);
    }

    #[test]
    fn test_apply_missing_file_is_io_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let edit = BlockReplace::new(temp_dir.path().join("nope.tsx"), "a", "b");
        assert!(matches!(edit.apply(), Err(EditError::Io(_))));
    }

    #[test]
    fn test_apply_invalid_utf8_is_decoding_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("bin.tsx");
        fs::write(&file_path, [0xff, 0xfe, 0x00, 0x41]).unwrap();

        let edit = BlockReplace::new(&file_path, "A", "B");
        assert!(matches!(edit.apply(), Err(EditError::Utf8(_))));
        assert_eq!(fs::read(&file_path).unwrap(), vec![0xff, 0xfe, 0x00, 0x41]);
    }

    #[test]
    #[cfg(unix)]
    fn test_atomic_write_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("mode.tsx");
        fs::write(&file_path, "x").unwrap();
        fs::set_permissions(&file_path, fs::Permissions::from_mode(0o644)).unwrap();

        atomic_write(&file_path, b"y").unwrap();

        let mode = fs::metadata(&file_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
        assert_eq!(fs::read(&file_path).unwrap(), b"y");
    }

    #[test]
    #[cfg(unix)]
    fn test_apply_read_only_target_is_io_error() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("locked.tsx");
        fs::write(&file_path, "OLD").unwrap();
        fs::set_permissions(&file_path, fs::Permissions::from_mode(0o444)).unwrap();

        // Privileged users can write through 0444; nothing to check then
        if fs::OpenOptions::new().write(true).open(&file_path).is_ok() {
            return;
        }

        let edit = BlockReplace::new(&file_path, "OLD", "NEW");
        assert!(matches!(edit.apply(), Err(EditError::Io(_))));
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "OLD");
    }

    #[test]
    #[cfg(unix)]
    fn test_apply_writes_through_symlink() {
        use std::os::unix::fs::symlink;

        let temp_dir = tempfile::tempdir().unwrap();
        let real = temp_dir.path().join("real.tsx");
        let link = temp_dir.path().join("JsonFormatter.tsx");
        fs::write(&real, "keep OLD keep").unwrap();
        symlink(&real, &link).unwrap();

        let outcome = BlockReplace::new(&link, "OLD", "NEW").apply().unwrap();

        assert_eq!(outcome.occurrences(), 1);
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&real).unwrap(), "keep NEW keep");
    }
}
