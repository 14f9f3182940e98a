//! Titlebar-less: reversible patcher for VS Code's window chrome
//!
//! Rewrites three files of an installed VS Code (the Electron main bundle,
//! the workbench bundle and the workbench stylesheet) so the window uses a
//! hidden-inset title bar with the traffic lights floating over the
//! activity bar.
//!
//! # Architecture
//!
//! - [`rules`]: static data. Each target file has an ordered list of
//!   literal or regex rules; a file is patched only when all of them match.
//! - [`engine`]: applies or reverts a whole [`RuleSet`], keeping the pristine
//!   file as `<target>.orig.<hostVersion>` and sweeping backups left behind
//!   by other host versions.
//! - [`swap`]: the backup-rename and atomic-write primitives.
//! - [`host`]: finding the install and its version.
//!
//! # Safety
//!
//! - All-or-nothing per file: partial matches never reach disk
//! - Patched content written via tempfile + fsync + rename
//! - Backups are keyed on the exact host version
//! - `enable` restores before patching, so it is idempotent
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use titlebar_less::{enable, remove_stale_backups, rules};
//!
//! let rules = rules::titlebar::rule_set().unwrap();
//! let out = Path::new("/Applications/Visual Studio Code.app/Contents/Resources/app/out");
//!
//! remove_stale_backups(&rules, out, "1.18.1");
//! let report = enable(&rules, out, "1.18.1");
//! println!("{report}");
//! ```

pub mod engine;
pub mod host;
pub mod rules;
pub mod swap;

// Re-exports
pub use engine::{
    apply_patches, backup_path, backup_status, disable, enable, preview_patches,
    remove_stale_backups, BackupState, Direction, FileOutcome, FilePreview, FileStatus, Outcome,
    PatchResult, Report, SweepReport,
};
pub use host::{parse_host_version, read_host_version, resolve_install_dir, HostError};
pub use rules::{FilePatchSet, Matcher, PatchRule, Replacement, RuleError, RuleSet, VersionError};
pub use swap::PatchError;
