//! Patch applicator - applies or reverts every patch set, one file at a time.
//!
//! This module:
//! - Runs each file's rules against its content, accumulating replacements
//! - Swaps a file only when every one of its rules was found
//! - Restores a file from the backup matching the running host version
//! - Reports per-file outcomes and rule-granular totals
//!
//! No failure escapes [`apply_patches`]; filesystem errors are logged and
//! recorded as [`FileStatus::Failed`] for the file they occurred on.

use crate::engine::backup::backup_path;
use crate::rules::{FilePatchSet, RuleSet};
use crate::swap::{restore, swap_in, PatchError};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Which way a pass goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Enable,
    Disable,
}

/// What happened to one target file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    /// Every rule was found; original moved to backup, patched content written.
    Applied,
    /// Backup for the running host version moved back over the target.
    Restored,
    /// Only some rules were found; file left untouched.
    PartialMatch { found: usize },
    /// Nothing to restore for this host version.
    NoBackup,
    /// A current-version backup already exists; enabling again would
    /// overwrite the pristine copy with a patched one.
    BackupExists,
    /// Filesystem error; file left as it was found where possible.
    Failed { reason: String },
}

impl FileStatus {
    /// Whether this file's rules count toward `applied`.
    pub fn counts(&self) -> bool {
        matches!(self, FileStatus::Applied | FileStatus::Restored)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub target: String,
    pub path: PathBuf,
    pub rules: usize,
    #[serde(flatten)]
    pub status: FileStatus,
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            FileStatus::Applied => write!(f, "Patched {} ({} rules)", self.target, self.rules),
            FileStatus::Restored => write!(f, "Restored {}", self.target),
            FileStatus::PartialMatch { found } => write!(
                f,
                "Left {} untouched: {}/{} rules matched",
                self.target, found, self.rules
            ),
            FileStatus::NoBackup => write!(f, "Nothing to restore for {}", self.target),
            FileStatus::BackupExists => {
                write!(f, "Skipped {}: already patched for this version", self.target)
            }
            FileStatus::Failed { reason } => write!(f, "Failed on {}: {}", self.target, reason),
        }
    }
}

/// Summary of one enable or disable pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[must_use = "PatchResult should be checked for success"]
pub struct PatchResult {
    pub direction: Direction,
    /// Rule units applied (enable) or reverted (disable).
    pub applied: usize,
    /// Rule units declared across all target files.
    pub total: usize,
    /// `applied == total`.
    pub success: bool,
    pub files: Vec<FileOutcome>,
}

impl PatchResult {
    fn new(direction: Direction, applied: usize, total: usize, files: Vec<FileOutcome>) -> Self {
        Self {
            direction,
            applied,
            total,
            success: applied == total,
            files,
        }
    }
}

/// Apply (or revert) every patch set in `rules` under `install_dir`.
///
/// # Arguments
///
/// * `rules` - The rule set to apply
/// * `install_dir` - Directory the rule targets are relative to
/// * `host_version` - Running host version; names the backups
/// * `direction` - Enable patches or restore backups
///
/// Files are processed in declaration order and independently: a failure on
/// one never stops the others.
pub fn apply_patches(
    rules: &RuleSet,
    install_dir: &Path,
    host_version: &str,
    direction: Direction,
) -> PatchResult {
    let mut applied = 0;
    let mut total = 0;
    let mut files = Vec::with_capacity(rules.files.len());

    for set in &rules.files {
        let amount = set.rule_count();
        total += amount;

        let path = set.resolve(install_dir);
        let result = match direction {
            Direction::Enable => enable_file(set, &path, host_version),
            Direction::Disable => disable_file(&path, host_version),
        };

        let status = result.unwrap_or_else(|err| {
            tracing::error!(target_file = %set.target, error = %err, "patch pass failed on file");
            FileStatus::Failed {
                reason: err.to_string(),
            }
        });

        if status.counts() {
            applied += amount;
        }

        files.push(FileOutcome {
            target: set.target.clone(),
            path,
            rules: amount,
            status,
        });
    }

    PatchResult::new(direction, applied, total, files)
}

fn enable_file(set: &FilePatchSet, path: &Path, host_version: &str) -> Result<FileStatus, PatchError> {
    let backup = backup_path(path, host_version);
    if backup.exists() {
        tracing::warn!(backup = %backup.display(), "backup for this version already exists, not patching");
        return Ok(FileStatus::BackupExists);
    }

    let content = fs::read_to_string(path).map_err(|source| PatchError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let (patched, found) = set.apply_all(&content);
    if found != set.rule_count() {
        tracing::warn!(
            target_file = %set.target,
            found,
            total = set.rule_count(),
            "not all rules matched, leaving file untouched"
        );
        return Ok(FileStatus::PartialMatch { found });
    }

    swap_in(path, &backup, patched.as_bytes())?;
    tracing::info!(target_file = %set.target, backup = %backup.display(), "patched");
    Ok(FileStatus::Applied)
}

fn disable_file(path: &Path, host_version: &str) -> Result<FileStatus, PatchError> {
    let backup = backup_path(path, host_version);
    if !backup.exists() {
        tracing::debug!(target_path = %path.display(), "no backup to restore");
        return Ok(FileStatus::NoBackup);
    }

    restore(&backup, path)?;
    tracing::info!(target_path = %path.display(), "restored from backup");
    Ok(FileStatus::Restored)
}

/// Patched content for one target, computed without touching the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePreview {
    pub target: String,
    pub path: PathBuf,
    pub rules: usize,
    pub found: usize,
    pub original: String,
    pub patched: String,
}

impl FilePreview {
    pub fn is_full_match(&self) -> bool {
        self.found == self.rules
    }
}

/// Run every rule set against the current target contents in memory.
///
/// Targets that cannot be read are returned as errors in place.
pub fn preview_patches(
    rules: &RuleSet,
    install_dir: &Path,
) -> Vec<Result<FilePreview, PatchError>> {
    rules
        .files
        .iter()
        .map(|set| -> Result<FilePreview, PatchError> {
            let path = set.resolve(install_dir);
            let original = fs::read_to_string(&path).map_err(|source| PatchError::Read {
                path: path.clone(),
                source,
            })?;
            let (patched, found) = set.apply_all(&original);
            Ok(FilePreview {
                target: set.target.clone(),
                path,
                rules: set.rule_count(),
                found,
                original,
                patched,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::PatchRule;
    use tempfile::TempDir;

    const V: &str = "1.18.0";

    fn single_rule() -> RuleSet {
        RuleSet::new(
            "test",
            vec![FilePatchSet::new("fileX", vec![PatchRule::literal("foo", "foo", "bar")])],
        )
    }

    #[test]
    fn test_enable_then_disable_scenario() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("fileX");
        fs::write(&file, "foo baz").unwrap();

        let result = apply_patches(&single_rule(), dir.path(), V, Direction::Enable);
        assert_eq!((result.applied, result.total, result.success), (1, 1, true));
        assert_eq!(result.files[0].status, FileStatus::Applied);
        assert_eq!(fs::read_to_string(&file).unwrap(), "bar baz");
        assert_eq!(
            fs::read_to_string(dir.path().join("fileX.orig.1.18.0")).unwrap(),
            "foo baz"
        );

        let result = apply_patches(&single_rule(), dir.path(), V, Direction::Disable);
        assert_eq!((result.applied, result.total, result.success), (1, 1, true));
        assert_eq!(result.files[0].status, FileStatus::Restored);
        assert_eq!(fs::read_to_string(&file).unwrap(), "foo baz");
        assert!(!dir.path().join("fileX.orig.1.18.0").exists());
    }

    #[test]
    fn test_partial_match_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.js");
        fs::write(&file, "foo").unwrap();
        let rules = RuleSet::new(
            "test",
            vec![FilePatchSet::new(
                "a.js",
                vec![
                    PatchRule::literal("one", "foo", "bar"),
                    PatchRule::literal("two", "missing", "x"),
                ],
            )],
        );

        let result = apply_patches(&rules, dir.path(), V, Direction::Enable);

        assert_eq!((result.applied, result.total, result.success), (0, 2, false));
        assert_eq!(result.files[0].status, FileStatus::PartialMatch { found: 1 });
        assert_eq!(fs::read_to_string(&file).unwrap(), "foo");
        assert!(!dir.path().join("a.js.orig.1.18.0").exists());
    }

    #[test]
    fn test_missing_file_is_isolated() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.js"), "foo").unwrap();
        let rules = RuleSet::new(
            "test",
            vec![
                FilePatchSet::new("a.js", vec![PatchRule::literal("r", "foo", "bar")]),
                FilePatchSet::new("b.js", vec![PatchRule::literal("r", "foo", "bar")]),
            ],
        );

        let result = apply_patches(&rules, dir.path(), V, Direction::Enable);

        assert_eq!((result.applied, result.total), (1, 2));
        assert!(matches!(result.files[0].status, FileStatus::Failed { .. }));
        assert_eq!(result.files[1].status, FileStatus::Applied);
    }

    #[test]
    fn test_disable_error_is_isolated() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("a.js")).unwrap();
        fs::write(dir.path().join("a.js/inner"), "x").unwrap();
        fs::write(dir.path().join("a.js.orig.1.18.0"), "foo").unwrap();
        fs::write(dir.path().join("b.js"), "bar").unwrap();
        fs::write(dir.path().join("b.js.orig.1.18.0"), "foo").unwrap();
        let rules = RuleSet::new(
            "test",
            vec![
                FilePatchSet::new("a.js", vec![PatchRule::literal("r", "foo", "bar")]),
                FilePatchSet::new("b.js", vec![PatchRule::literal("r", "foo", "bar")]),
            ],
        );

        let result = apply_patches(&rules, dir.path(), V, Direction::Disable);

        assert_eq!((result.applied, result.total, result.success), (1, 2, false));
        assert!(matches!(result.files[0].status, FileStatus::Failed { .. }));
        assert_eq!(result.files[1].status, FileStatus::Restored);
        assert_eq!(fs::read_to_string(dir.path().join("b.js")).unwrap(), "foo");
        assert!(dir.path().join("a.js.orig.1.18.0").exists());
    }

    #[test]
    fn test_disable_without_backup_is_noop() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("fileX");
        fs::write(&file, "foo baz").unwrap();

        let result = apply_patches(&single_rule(), dir.path(), V, Direction::Disable);

        assert_eq!((result.applied, result.total, result.success), (0, 1, false));
        assert_eq!(result.files[0].status, FileStatus::NoBackup);
        assert_eq!(fs::read_to_string(&file).unwrap(), "foo baz");
    }

    #[test]
    fn test_disable_ignores_other_version_backup() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("fileX"), "bar baz").unwrap();
        fs::write(dir.path().join("fileX.orig.1.17.0"), "foo baz").unwrap();

        let result = apply_patches(&single_rule(), dir.path(), V, Direction::Disable);

        assert_eq!(result.applied, 0);
        assert_eq!(fs::read_to_string(dir.path().join("fileX")).unwrap(), "bar baz");
    }

    #[test]
    fn test_enable_refuses_to_overwrite_backup() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("fileX"), "foo baz").unwrap();
        fs::write(dir.path().join("fileX.orig.1.18.0"), "pristine").unwrap();

        let result = apply_patches(&single_rule(), dir.path(), V, Direction::Enable);

        assert_eq!(result.applied, 0);
        assert_eq!(result.files[0].status, FileStatus::BackupExists);
        assert_eq!(
            fs::read_to_string(dir.path().join("fileX.orig.1.18.0")).unwrap(),
            "pristine"
        );
        assert_eq!(fs::read_to_string(dir.path().join("fileX")).unwrap(), "foo baz");
    }

    #[test]
    fn test_preview_does_not_touch_files() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("fileX");
        fs::write(&file, "foo baz").unwrap();

        let previews = preview_patches(&single_rule(), dir.path());

        let preview = previews[0].as_ref().unwrap();
        assert!(preview.is_full_match());
        assert_eq!(preview.original, "foo baz");
        assert_eq!(preview.patched, "bar baz");
        assert_eq!(fs::read_to_string(&file).unwrap(), "foo baz");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_outcome_display() {
        let outcome = FileOutcome {
            target: "vs/a.js".into(),
            path: PathBuf::from("/x/vs/a.js"),
            rules: 2,
            status: FileStatus::PartialMatch { found: 1 },
        };
        assert_eq!(outcome.to_string(), "Left vs/a.js untouched: 1/2 rules matched");
    }
}
