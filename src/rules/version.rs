//! Host-version compatibility checks for rule sets.
//!
//! A rule set records the range of host versions whose bundles it was written
//! against, e.g. `">=1.17.0, <1.19.0"`. Backups are keyed on exact version
//! equality regardless; this check only decides whether to warn.

use semver::{Version, VersionReq};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("invalid host version '{value}': {reason}")]
    InvalidVersion { value: String, reason: String },

    #[error("invalid version requirement '{value}': {reason}")]
    InvalidRequirement { value: String, reason: String },
}

/// Check if a host version satisfies a requirement string.
///
/// # Examples
///
/// ```
/// use titlebar_less::rules::matches_requirement;
///
/// assert!(matches_requirement("1.18.1", Some(">=1.17.0, <1.19.0")).unwrap());
/// assert!(!matches_requirement("1.19.0", Some(">=1.17.0, <1.19.0")).unwrap());
///
/// // No requirement accepts every host.
/// assert!(matches_requirement("1.0.0", None).unwrap());
/// ```
pub fn matches_requirement(
    version: &str,
    requirement: Option<&str>,
) -> Result<bool, VersionError> {
    let Some(req_str) = requirement else {
        return Ok(true);
    };

    let req_str = req_str.trim();
    if req_str.is_empty() {
        return Ok(true);
    }

    let version = Version::parse(version.trim()).map_err(|e| VersionError::InvalidVersion {
        value: version.to_string(),
        reason: e.to_string(),
    })?;

    let req = VersionReq::parse(req_str).map_err(|e| VersionError::InvalidRequirement {
        value: req_str.to_string(),
        reason: e.to_string(),
    })?;

    Ok(req.matches(&version))
}
