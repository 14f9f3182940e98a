//! User-facing enable/disable operations built on [`apply_patches`].

use crate::engine::applicator::{apply_patches, Direction, PatchResult};
use crate::rules::RuleSet;
use serde::Serialize;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Enabled,
    Disabled,
    /// The enable pass did not apply every rule.
    ApplyFailed,
    /// A disable pass restored some but not all files.
    RemoveFailed,
}

/// Result of [`enable`] or [`disable`], with the pass that decided it.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub outcome: Outcome,
    pub result: PatchResult,
}

impl Report {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Enabled | Outcome::Disabled)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.outcome {
            Outcome::Enabled => "enabled",
            Outcome::Disabled => "disabled",
            Outcome::ApplyFailed => "apply",
            Outcome::RemoveFailed => "remove",
        };
        if self.is_success() {
            write!(
                f,
                "Titlebar-less mode {verb}. Please restart VSCode to see effect."
            )
        } else {
            write!(
                f,
                "Unable to {verb} all patches ({}/{})",
                self.result.applied, self.result.total
            )
        }
    }
}

/// A disable pass is clean if it restored everything or found nothing to restore.
fn clean_removal(result: &PatchResult) -> bool {
    result.success || result.applied == 0
}

/// Restore any current-version backups, then patch from pristine files.
///
/// Calling this on an already enabled install re-applies cleanly.
pub fn enable(rules: &RuleSet, install_dir: &Path, host_version: &str) -> Report {
    let removal = apply_patches(rules, install_dir, host_version, Direction::Disable);
    if !clean_removal(&removal) {
        tracing::warn!(
            applied = removal.applied,
            total = removal.total,
            "partial restore, not enabling"
        );
        return Report {
            outcome: Outcome::RemoveFailed,
            result: removal,
        };
    }

    let result = apply_patches(rules, install_dir, host_version, Direction::Enable);
    let outcome = if result.success {
        Outcome::Enabled
    } else {
        Outcome::ApplyFailed
    };
    Report { outcome, result }
}

/// Restore every current-version backup. Nothing to restore counts as success.
pub fn disable(rules: &RuleSet, install_dir: &Path, host_version: &str) -> Report {
    let result = apply_patches(rules, install_dir, host_version, Direction::Disable);
    let outcome = if clean_removal(&result) {
        Outcome::Disabled
    } else {
        Outcome::RemoveFailed
    };
    Report { outcome, result }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::applicator::FileStatus;
    use crate::rules::{FilePatchSet, PatchRule};
    use std::fs;
    use tempfile::TempDir;

    const V: &str = "1.18.0";

    fn rules() -> RuleSet {
        RuleSet::new(
            "test",
            vec![
                FilePatchSet::new("a.js", vec![PatchRule::literal("r", "foo", "bar")]),
                FilePatchSet::new("b.css", vec![PatchRule::append("css", "\n.x{}")]),
            ],
        )
    }

    fn setup() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.js"), "foo();").unwrap();
        fs::write(dir.path().join("b.css"), "body{}").unwrap();
        dir
    }

    #[test]
    fn test_enable_message() {
        let dir = setup();
        let report = enable(&rules(), dir.path(), V);
        assert!(report.is_success());
        assert_eq!(
            report.to_string(),
            "Titlebar-less mode enabled. Please restart VSCode to see effect."
        );
    }

    #[test]
    fn test_enable_twice_does_not_double_append() {
        let dir = setup();
        assert!(enable(&rules(), dir.path(), V).is_success());
        assert!(enable(&rules(), dir.path(), V).is_success());
        assert_eq!(fs::read_to_string(dir.path().join("b.css")).unwrap(), "body{}\n.x{}");
        assert_eq!(fs::read_to_string(dir.path().join("b.css.orig.1.18.0")).unwrap(), "body{}");
    }

    #[test]
    fn test_enable_reports_apply_failure() {
        let dir = setup();
        fs::write(dir.path().join("a.js"), "changed();").unwrap();

        let report = enable(&rules(), dir.path(), V);

        assert_eq!(report.outcome, Outcome::ApplyFailed);
        assert_eq!(report.to_string(), "Unable to apply all patches (1/2)");
    }

    #[test]
    fn test_enable_stops_on_partial_restore() {
        let dir = setup();
        // Only one of two files has a backup, so the pre-pass is partial.
        fs::write(dir.path().join("a.js.orig.1.18.0"), "foo();").unwrap();

        let report = enable(&rules(), dir.path(), V);

        assert_eq!(report.outcome, Outcome::RemoveFailed);
        assert_eq!(report.result.direction, Direction::Disable);
        assert_eq!(report.to_string(), "Unable to remove all patches (1/2)");
        // The restore that did succeed stays; the css is not patched.
        assert_eq!(fs::read_to_string(dir.path().join("b.css")).unwrap(), "body{}");
    }

    #[test]
    fn test_enable_stops_when_a_restore_errors() {
        let dir = setup();
        // a.js is a non-empty directory, so removing it before the restore fails.
        fs::remove_file(dir.path().join("a.js")).unwrap();
        fs::create_dir(dir.path().join("a.js")).unwrap();
        fs::write(dir.path().join("a.js/inner"), "x").unwrap();
        fs::write(dir.path().join("a.js.orig.1.18.0"), "foo();").unwrap();
        fs::write(dir.path().join("b.css"), "body{}\n.x{}").unwrap();
        fs::write(dir.path().join("b.css.orig.1.18.0"), "body{}").unwrap();

        let report = enable(&rules(), dir.path(), V);

        assert_eq!(report.outcome, Outcome::RemoveFailed);
        assert_eq!((report.result.applied, report.result.total), (1, 2));
        assert!(matches!(
            &report.result.files[0].status,
            FileStatus::Failed { reason } if reason.starts_with("failed to remove patched")
        ));
        assert_eq!(report.result.files[1].status, FileStatus::Restored);
        assert_eq!(fs::read_to_string(dir.path().join("b.css")).unwrap(), "body{}");
        assert!(dir.path().join("a.js.orig.1.18.0").exists());
        assert!(dir.path().join("a.js/inner").exists());
    }

    #[test]
    fn test_disable_with_nothing_enabled() {
        let dir = setup();
        let report = disable(&rules(), dir.path(), V);
        assert_eq!(report.outcome, Outcome::Disabled);
        assert_eq!(report.result.applied, 0);
        assert_eq!(
            report.to_string(),
            "Titlebar-less mode disabled. Please restart VSCode to see effect."
        );
    }

    #[test]
    fn test_disable_after_enable_round_trips() {
        let dir = setup();
        assert!(enable(&rules(), dir.path(), V).is_success());
        let report = disable(&rules(), dir.path(), V);
        assert!(report.result.success);
        assert_eq!(fs::read_to_string(dir.path().join("a.js")).unwrap(), "foo();");
        assert_eq!(fs::read_to_string(dir.path().join("b.css")).unwrap(), "body{}");
    }
}
