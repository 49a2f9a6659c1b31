//! Generated file persistence and drift detection

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use tracing::{error, info};

use crate::checksum::Checksum;
use crate::error::{CompilerError, Result};

/// What a write did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The file already held exactly this content
    Unchanged,
}

/// Write `contents` to `path` in full, or report why not.
///
/// The data is flushed and synced before returning so that a failed close
/// is reported rather than lost.
pub fn write_file(path: &Path, contents: &str) -> Result<WriteOutcome> {
    if let Ok(existing) = fs::read_to_string(path) {
        if Checksum::of(&existing) == Checksum::of(contents) {
            info!("{} is up to date", path.display());
            return Ok(WriteOutcome::Unchanged);
        }
    }

    let wrap = |source: std::io::Error| {
        error!("Error: Failed to write file: {} ({})", path.display(), source);
        CompilerError::Write {
            path: path.to_path_buf(),
            source,
        }
    };
    let mut file = File::create(path).map_err(wrap)?;
    file.write_all(contents.as_bytes()).map_err(wrap)?;
    file.sync_all().map_err(wrap)?;
    info!("Wrote {}", path.display());
    Ok(WriteOutcome::Written)
}

/// Difference between a file on disk and what would be generated
#[derive(Debug, Clone, Serialize)]
pub struct Drift {
    pub path: PathBuf,
    pub missing: bool,
    pub expected_checksum: String,
    pub actual_checksum: Option<String>,
    /// Unified diff from the file on disk to the expected content
    pub diff: String,
}

/// Compare `path` against `expected`; `None` means the file is in sync.
pub fn check_file(path: &Path, expected: &str) -> Result<Option<Drift>> {
    let expected_checksum = Checksum::of(expected);
    let actual = match fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    match actual {
        Some(text) if expected_checksum.verify(&text) => Ok(None),
        Some(text) => Ok(Some(Drift {
            path: path.to_path_buf(),
            missing: false,
            expected_checksum: expected_checksum.to_string(),
            actual_checksum: Some(Checksum::of(&text).to_string()),
            diff: unified_diff(&text, expected),
        })),
        None => Ok(Some(Drift {
            path: path.to_path_buf(),
            missing: true,
            expected_checksum: expected_checksum.to_string(),
            actual_checksum: None,
            diff: unified_diff("", expected),
        })),
    }
}

fn unified_diff(old: &str, new: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut out = String::new();
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => continue,
        };
        out.push_str(sign);
        out.push_str(change.value());
        if !change.value().ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experiments.h");

        assert_eq!(write_file(&path, "a\n").unwrap(), WriteOutcome::Written);
        assert_eq!(write_file(&path, "a\n").unwrap(), WriteOutcome::Unchanged);
        assert_eq!(write_file(&path, "b\n").unwrap(), WriteOutcome::Written);
        assert_eq!(fs::read_to_string(&path).unwrap(), "b\n");
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no/such/dir/experiments.h");
        let err = write_file(&path, "a\n").unwrap_err();
        assert!(matches!(err, CompilerError::Write { .. }));
    }

    #[test]
    fn test_check_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experiments.cc");

        let drift = check_file(&path, "x\n").unwrap().unwrap();
        assert!(drift.missing);

        fs::write(&path, "x\ny\n").unwrap();
        let drift = check_file(&path, "x\nz\n").unwrap().unwrap();
        assert!(!drift.missing);
        assert_eq!(drift.diff, "-y\n+z\n");

        fs::write(&path, "x\nz\n").unwrap();
        assert!(check_file(&path, "x\nz\n").unwrap().is_none());
    }
}
