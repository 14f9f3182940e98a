//! Locating the host install and reading its version.
//!
//! The install directory is the host's `out/` directory, the one the rule
//! targets are relative to. Its parent holds the host's `package.json`, whose
//! `version` names the backups.

use crate::rules::RuleSet;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Overrides the install directory when `--install-dir` is not given.
pub const INSTALL_DIR_ENV: &str = "TITLEBAR_LESS_INSTALL_DIR";
/// Overrides the host version when `--host-version` is not given.
pub const HOST_VERSION_ENV: &str = "TITLEBAR_LESS_HOST_VERSION";

#[derive(Error, Debug)]
pub enum HostError {
    #[error("install directory does not exist: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("no host install found (searched {} locations)", searched.len())]
    NotFound { searched: Vec<PathBuf> },

    #[error("failed to read {}: {source}", path.display())]
    PackageRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    PackageParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("empty version in {}", .0.display())]
    EmptyVersion(PathBuf),

    #[error("invalid host version {value:?}: {reason}")]
    InvalidVersion { value: String, reason: &'static str },
}

#[derive(Debug, Deserialize)]
struct HostPackage {
    version: String,
}

/// Well-known `out/` directories of VS Code installs, most specific first.
pub fn candidate_install_dirs() -> Vec<PathBuf> {
    const MAC_APP: &str = "Visual Studio Code.app/Contents/Resources/app/out";

    let mut dirs = vec![Path::new("/Applications").join(MAC_APP)];
    if let Some(home) = home::home_dir() {
        dirs.push(home.join("Applications").join(MAC_APP));
    }
    dirs.push(PathBuf::from("/usr/share/code/resources/app/out"));
    dirs.push(PathBuf::from("/opt/visual-studio-code/resources/app/out"));
    dirs
}

/// Whether every target of `rules` exists as a file under `dir`.
pub fn has_all_targets(dir: &Path, rules: &RuleSet) -> bool {
    rules.files.iter().all(|set| set.resolve(dir).is_file())
}

/// Use `explicit` if given (it must be a directory), otherwise the first
/// candidate that contains every target.
pub fn resolve_install_dir(
    explicit: Option<&Path>,
    rules: &RuleSet,
    candidates: &[PathBuf],
) -> Result<PathBuf, HostError> {
    if let Some(dir) = explicit {
        if !dir.is_dir() {
            return Err(HostError::NotADirectory(dir.to_path_buf()));
        }
        if !has_all_targets(dir, rules) {
            tracing::warn!(dir = %dir.display(), "install directory is missing some targets");
        }
        return Ok(dir.to_path_buf());
    }

    candidates
        .iter()
        .find(|dir| has_all_targets(dir, rules))
        .cloned()
        .ok_or_else(|| HostError::NotFound {
            searched: candidates.to_vec(),
        })
}

/// `package.json` next to the install directory.
pub fn package_json_path(install_dir: &Path) -> PathBuf {
    install_dir
        .parent()
        .unwrap_or(install_dir)
        .join("package.json")
}

/// Trim a host version given on the command line or in the environment.
///
/// The result names backup files, so it must be non-empty and must not
/// contain a path separator.
pub fn parse_host_version(raw: &str) -> Result<String, HostError> {
    let version = raw.trim();
    let reason = if version.is_empty() {
        "empty"
    } else if version.contains(['/', '\\']) {
        "contains a path separator"
    } else {
        return Ok(version.to_string());
    };
    Err(HostError::InvalidVersion {
        value: raw.to_string(),
        reason,
    })
}

/// Read the host version from its `package.json`.
pub fn read_host_version(install_dir: &Path) -> Result<String, HostError> {
    let path = package_json_path(install_dir);
    let raw = fs::read_to_string(&path).map_err(|source| HostError::PackageRead {
        path: path.clone(),
        source,
    })?;
    let package: HostPackage =
        serde_json::from_str(&raw).map_err(|source| HostError::PackageParse {
            path: path.clone(),
            source,
        })?;

    if package.version.trim().is_empty() {
        return Err(HostError::EmptyVersion(path));
    }
    parse_host_version(&package.version)
}
