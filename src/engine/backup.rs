//! Backup naming, inspection, and the stale-backup sweep.
//!
//! A backup sits next to its target as `<target>.orig.<hostVersion>`. Only a
//! backup whose suffix equals the running host version is ever restored;
//! anything else is stale and gets swept.

use crate::rules::RuleSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Separator between a target's file name and the host version.
pub const BACKUP_MARKER: &str = ".orig.";

/// `<target>.orig.<host_version>`.
pub fn backup_path(target: &Path, host_version: &str) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(BACKUP_MARKER);
    name.push(host_version);
    PathBuf::from(name)
}

/// Version suffix of `file_name` if it is a backup of `target_name`.
pub fn backup_version<'a>(file_name: &'a str, target_name: &str) -> Option<&'a str> {
    file_name
        .strip_prefix(target_name)?
        .strip_prefix(BACKUP_MARKER)
        .filter(|version| !version.is_empty())
}

/// Backups of `target_name` found in `dir`, as `(path, version)`, sorted by path.
pub fn find_backups(dir: &Path, target_name: &str) -> Result<Vec<(PathBuf, String)>, walkdir::Error> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        // Follows symlinks, so a linked backup is still found and swept.
        if !entry.path().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if let Some(version) = backup_version(name, target_name) {
            found.push((entry.path().to_path_buf(), version.to_string()));
        }
    }
    found.sort();
    Ok(found)
}

/// What [`remove_stale_backups`] did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Delete every backup of a declared target whose version suffix differs
/// from `host_version`.
///
/// Never fails as a whole: unreadable directories and undeletable files are
/// logged and listed in [`SweepReport::failed`].
pub fn remove_stale_backups(rules: &RuleSet, install_dir: &Path, host_version: &str) -> SweepReport {
    let mut report = SweepReport::default();

    for set in &rules.files {
        let target = set.resolve(install_dir);
        let Some(dir) = target.parent() else {
            continue;
        };

        let backups = match find_backups(dir, set.file_name()) {
            Ok(backups) => backups,
            Err(err) => {
                tracing::error!(dir = %dir.display(), error = %err, "cannot list backups");
                report.failed.push((dir.to_path_buf(), err.to_string()));
                continue;
            }
        };

        for (path, version) in backups {
            if version == host_version {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::info!(backup = %path.display(), %version, "removed stale backup");
                    report.removed.push(path);
                }
                Err(err) => {
                    tracing::error!(backup = %path.display(), error = %err, "cannot remove stale backup");
                    report.failed.push((path, err.to_string()));
                }
            }
        }
    }

    report
}

/// Backup state of one target.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BackupState {
    pub target: String,
    pub path: PathBuf,
    pub target_exists: bool,
    /// Backup for the running host version; present means "patched".
    pub current: Option<PathBuf>,
    pub stale: Vec<PathBuf>,
}

impl BackupState {
    pub fn is_patched(&self) -> bool {
        self.current.is_some()
    }
}

/// Read-only view of every target's backups.
pub fn backup_status(rules: &RuleSet, install_dir: &Path, host_version: &str) -> Vec<BackupState> {
    rules
        .files
        .iter()
        .map(|set| {
            let path = set.resolve(install_dir);
            let mut current = None;
            let mut stale = Vec::new();

            if let Some(dir) = path.parent() {
                match find_backups(dir, set.file_name()) {
                    Ok(backups) => {
                        for (backup, version) in backups {
                            if version == host_version {
                                current = Some(backup);
                            } else {
                                stale.push(backup);
                            }
                        }
                    }
                    Err(err) => {
                        tracing::warn!(dir = %dir.display(), error = %err, "cannot list backups");
                    }
                }
            }

            BackupState {
                target: set.target.clone(),
                target_exists: path.is_file(),
                path,
                current,
                stale,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{FilePatchSet, PatchRule};
    use tempfile::TempDir;

    fn rules() -> RuleSet {
        RuleSet::new(
            "test",
            vec![
                FilePatchSet::new("a/x.js", vec![PatchRule::literal("r", "foo", "bar")]),
                FilePatchSet::new("a/y.css", vec![PatchRule::append("css", ".z{}")]),
            ],
        )
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_backup_path() {
        let path = backup_path(Path::new("/app/out/vs/main.js"), "1.18.0");
        assert_eq!(path, Path::new("/app/out/vs/main.js.orig.1.18.0"));
    }

    #[test]
    fn test_backup_version() {
        assert_eq!(backup_version("main.js.orig.1.18.0", "main.js"), Some("1.18.0"));
        assert_eq!(backup_version("main.js.orig.", "main.js"), None);
        assert_eq!(backup_version("main.js", "main.js"), None);
        assert_eq!(backup_version("other.js.orig.1.0.0", "main.js"), None);
        assert_eq!(backup_version("main.json.orig.1.0.0", "main.js"), None);
    }

    #[test]
    fn test_sweep_keeps_current_version() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("a/x.js"));
        touch(&root.join("a/x.js.orig.1.0.0"));
        touch(&root.join("a/x.js.orig.2.0.0"));
        touch(&root.join("a/y.css.orig.1.0.0"));

        let report = remove_stale_backups(&rules(), root, "2.0.0");

        assert!(report.is_clean());
        assert_eq!(
            report.removed,
            vec![root.join("a/x.js.orig.1.0.0"), root.join("a/y.css.orig.1.0.0")]
        );
        assert!(root.join("a/x.js.orig.2.0.0").exists());
        assert!(root.join("a/x.js").exists());
    }

    #[test]
    fn test_sweep_ignores_backups_of_undeclared_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("a/unrelated.js.orig.1.0.0"));

        let report = remove_stale_backups(&rules(), root, "2.0.0");

        assert!(report.removed.is_empty());
        assert!(root.join("a/unrelated.js.orig.1.0.0").exists());
    }

    #[test]
    fn test_sweep_missing_directory_is_reported() {
        let dir = TempDir::new().unwrap();

        let report = remove_stale_backups(&rules(), &dir.path().join("nope"), "2.0.0");

        assert!(report.removed.is_empty());
        assert_eq!(report.failed.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_sweep_removes_symlinked_backup() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("elsewhere/x.js.old"));
        fs::create_dir_all(root.join("a")).unwrap();
        let link = root.join("a/x.js.orig.1.0.0");
        std::os::unix::fs::symlink(root.join("elsewhere/x.js.old"), &link).unwrap();

        assert_eq!(backup_status(&rules(), root, "2.0.0")[0].stale, vec![link.clone()]);
        let report = remove_stale_backups(&rules(), root, "2.0.0");

        assert_eq!(report.removed, vec![link.clone()]);
        assert!(fs::symlink_metadata(&link).is_err());
        assert!(root.join("elsewhere/x.js.old").exists());
    }

    #[test]
    fn test_backup_status() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("a/x.js"));
        touch(&root.join("a/x.js.orig.2.0.0"));
        touch(&root.join("a/y.css.orig.1.0.0"));

        let states = backup_status(&rules(), root, "2.0.0");

        assert_eq!(states.len(), 2);
        assert!(states[0].is_patched());
        assert!(states[0].target_exists);
        assert!(states[0].stale.is_empty());
        assert!(!states[1].is_patched());
        assert!(!states[1].target_exists);
        assert_eq!(states[1].stale, vec![root.join("a/y.css.orig.1.0.0")]);
    }
}
