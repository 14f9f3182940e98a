//! Patch rules: what to look for in a target file and what to put there instead.
//!
//! A [`RuleSet`] maps each target file (a `/`-separated path relative to the
//! host's install directory) to an ordered list of [`PatchRule`]s. Rules are
//! pure data plus pure transform functions; everything that touches the
//! filesystem lives in [`crate::engine`].

pub mod titlebar;
pub mod version;

use regex::{Captures, NoExpand, Regex};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use version::{matches_requirement, VersionError};

/// Transform applied to a match: receives the full match text and the ordered
/// capture groups (unmatched optional groups are empty strings).
pub type Transform = fn(&str, &[&str]) -> String;

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("invalid pattern for {target}: {source}")]
    InvalidPattern {
        target: String,
        #[source]
        source: regex::Error,
    },

    #[error("empty literal matcher for {target}")]
    EmptyLiteral { target: String },

    #[error("target path must be relative and '/'-separated: {0}")]
    InvalidTarget(String),
}

/// What a rule looks for.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Exact substring.
    Literal(String),
    /// Regular expression, possibly with capture groups.
    Pattern(Regex),
    /// The empty position after the last byte; matches exactly once.
    EndOfInput,
}

/// What a rule puts in place of the match.
#[derive(Clone)]
pub enum Replacement {
    /// Literal text, inserted verbatim (no `$name` expansion).
    Text(String),
    /// Computed from the match and its captures.
    Transform(Transform),
}

impl std::fmt::Debug for Replacement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Replacement::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Replacement::Transform(_) => f.write_str("Transform(..)"),
        }
    }
}

/// One matcher + replacement unit.
#[derive(Debug, Clone)]
pub struct PatchRule {
    pub description: &'static str,
    pub matcher: Matcher,
    pub replacement: Replacement,
}

impl PatchRule {
    /// Literal substring to literal text.
    pub fn literal(
        description: &'static str,
        find: impl Into<String>,
        replace: impl Into<String>,
    ) -> Self {
        Self {
            description,
            matcher: Matcher::Literal(find.into()),
            replacement: Replacement::Text(replace.into()),
        }
    }

    /// Regex to computed text.
    pub fn pattern(
        description: &'static str,
        pattern: &str,
        transform: Transform,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            description,
            matcher: Matcher::Pattern(Regex::new(pattern)?),
            replacement: Replacement::Transform(transform),
        })
    }

    /// Append `text` at end of file. Always found unless `text` is empty.
    pub fn append(description: &'static str, text: impl Into<String>) -> Self {
        Self {
            description,
            matcher: Matcher::EndOfInput,
            replacement: Replacement::Text(text.into()),
        }
    }

    /// Replace the first occurrence of the matcher in `content`.
    ///
    /// Returns `None` when the rule is not found, i.e. when replacing would
    /// leave the content unchanged.
    pub fn apply(&self, content: &str) -> Option<String> {
        let patched: Cow<'_, str> = match (&self.matcher, &self.replacement) {
            (Matcher::Literal(find), Replacement::Text(text)) => {
                Cow::Owned(content.replacen(find.as_str(), text, 1))
            }
            (Matcher::Literal(find), Replacement::Transform(transform)) => {
                match content.find(find.as_str()) {
                    Some(start) => {
                        let mut out = String::with_capacity(content.len());
                        out.push_str(&content[..start]);
                        out.push_str(&transform(find, &[]));
                        out.push_str(&content[start + find.len()..]);
                        Cow::Owned(out)
                    }
                    None => Cow::Borrowed(content),
                }
            }
            (Matcher::EndOfInput, Replacement::Text(text)) => Cow::Owned(format!("{content}{text}")),
            (Matcher::EndOfInput, Replacement::Transform(transform)) => {
                Cow::Owned(format!("{content}{}", transform("", &[])))
            }
            (Matcher::Pattern(regex), Replacement::Text(text)) => {
                regex.replace(content, NoExpand(text.as_str()))
            }
            (Matcher::Pattern(regex), Replacement::Transform(transform)) => {
                regex.replace(content, |caps: &Captures<'_>| {
                    let full = caps.get(0).map_or("", |m| m.as_str());
                    let groups: Vec<&str> = caps
                        .iter()
                        .skip(1)
                        .map(|m| m.map_or("", |m| m.as_str()))
                        .collect();
                    transform(full, &groups)
                })
            }
        };

        if patched == content {
            None
        } else {
            Some(patched.into_owned())
        }
    }
}

/// The ordered rules for one target file.
#[derive(Debug, Clone)]
pub struct FilePatchSet {
    /// `/`-separated path relative to the install directory.
    pub target: String,
    pub rules: Vec<PatchRule>,
}

impl FilePatchSet {
    pub fn new(target: impl Into<String>, rules: Vec<PatchRule>) -> Self {
        Self {
            target: target.into(),
            rules,
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Resolve the target under `install_dir`, one path component per `/` segment.
    pub fn resolve(&self, install_dir: &Path) -> PathBuf {
        self.target
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(install_dir.to_path_buf(), |path, segment| path.join(segment))
    }

    /// Final path segment, e.g. `main.js`.
    pub fn file_name(&self) -> &str {
        self.target.rsplit('/').next().unwrap_or(&self.target)
    }

    /// Run every rule against `content`, each on the output of the previous one.
    ///
    /// Returns the accumulated content and how many rules were found.
    pub fn apply_all(&self, content: &str) -> (String, usize) {
        let mut working = content.to_string();
        let mut found = 0;
        for rule in &self.rules {
            if let Some(patched) = rule.apply(&working) {
                tracing::debug!(target_file = %self.target, rule = rule.description, "rule matched");
                working = patched;
                found += 1;
            } else {
                tracing::debug!(target_file = %self.target, rule = rule.description, "rule not found");
            }
        }
        (working, found)
    }
}

/// All patch sets, in declaration order, plus the host versions they were
/// written against.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub name: String,
    /// Semver requirement on the host version, e.g. `">=1.17.0, <1.19.0"`.
    pub version_range: Option<String>,
    pub files: Vec<FilePatchSet>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>, files: Vec<FilePatchSet>) -> Self {
        Self {
            name: name.into(),
            version_range: None,
            files,
        }
    }

    pub fn with_version_range(mut self, range: impl Into<String>) -> Self {
        self.version_range = Some(range.into());
        self
    }

    /// Total number of rule units across all files.
    pub fn rule_count(&self) -> usize {
        self.files.iter().map(FilePatchSet::rule_count).sum()
    }

    /// Whether `host_version` falls inside [`RuleSet::version_range`].
    pub fn supports(&self, host_version: &str) -> Result<bool, VersionError> {
        matches_requirement(host_version, self.version_range.as_deref())
    }

    /// Reject targets that would escape the install directory or that carry
    /// empty literal matchers (an empty literal always "matches" at offset 0).
    pub fn validate(&self) -> Result<(), RuleError> {
        for file in &self.files {
            let target = &file.target;
            if target.is_empty()
                || target.starts_with('/')
                || target.contains('\\')
                || target.split('/').any(|segment| segment == ".." || segment == ".")
            {
                return Err(RuleError::InvalidTarget(target.clone()));
            }
            for rule in &file.rules {
                if let Matcher::Literal(find) = &rule.matcher {
                    if find.is_empty() {
                        return Err(RuleError::EmptyLiteral {
                            target: target.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
