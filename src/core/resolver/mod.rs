//! # Resolver Module
//!
//! Decides what happens when a destination path is already taken.
//!
//! ## Policies
//! - `Rename` - probe `name (1).ext`, `name (2).ext`, ... until one is free
//! - `Skip` - leave the existing file alone
//! - `Overwrite` - replace the existing file

use crate::error::ConflictError;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Highest suffix probed before giving up on a rename
pub const MAX_RENAME_ATTEMPTS: usize = 1000;

/// How to handle a destination that already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    #[default]
    Rename,
    Skip,
    Overwrite,
}

impl std::fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictPolicy::Rename => write!(f, "rename"),
            ConflictPolicy::Skip => write!(f, "skip"),
            ConflictPolicy::Overwrite => write!(f, "overwrite"),
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rename" => Ok(ConflictPolicy::Rename),
            "skip" => Ok(ConflictPolicy::Skip),
            "overwrite" => Ok(ConflictPolicy::Overwrite),
            other => Err(format!(
                "unknown conflict policy '{}' (expected rename, skip or overwrite)",
                other
            )),
        }
    }
}

/// Outcome of conflict resolution for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictDecision {
    /// Place the file here
    Proceed { final_path: PathBuf, overwrite: bool },
    /// Leave the existing file and count this one as skipped
    Skip,
}

/// Resolves destination conflicts against the live filesystem
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    max_attempts: usize,
}

impl ConflictResolver {
    pub fn new() -> Self {
        Self {
            max_attempts: MAX_RENAME_ATTEMPTS,
        }
    }

    /// Cap how many numbered names a rename tries
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Pick the final destination for `destination` under `policy`
    pub fn resolve(
        &self,
        destination: &Path,
        policy: ConflictPolicy,
    ) -> Result<ConflictDecision, ConflictError> {
        if !occupied(destination) {
            return Ok(ConflictDecision::Proceed {
                final_path: destination.to_path_buf(),
                overwrite: false,
            });
        }

        match policy {
            ConflictPolicy::Skip => Ok(ConflictDecision::Skip),
            ConflictPolicy::Overwrite => Ok(ConflictDecision::Proceed {
                final_path: destination.to_path_buf(),
                overwrite: true,
            }),
            ConflictPolicy::Rename => self.next_free_name(destination),
        }
    }

    fn next_free_name(&self, destination: &Path) -> Result<ConflictDecision, ConflictError> {
        for counter in 1..=self.max_attempts {
            let candidate = numbered_path(destination, counter);
            if !occupied(&candidate) {
                return Ok(ConflictDecision::Proceed {
                    final_path: candidate,
                    overwrite: false,
                });
            }
        }

        Err(ConflictError::Exhausted {
            path: destination.to_path_buf(),
            attempts: self.max_attempts,
        })
    }
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve with the default attempt cap
pub fn resolve(
    destination: &Path,
    policy: ConflictPolicy,
) -> Result<ConflictDecision, ConflictError> {
    ConflictResolver::new().resolve(destination, policy)
}

/// `dir/name.ext` becomes `dir/name (n).ext`; `dir/name` becomes `dir/name (n)`
///
/// Name bytes are kept as-is, including ones that are not valid UTF-8.
pub fn numbered_path(path: &Path, counter: usize) -> PathBuf {
    let mut file_name = path.file_stem().map(OsString::from).unwrap_or_default();
    file_name.push(format!(" ({})", counter));

    if let Some(ext) = path.extension() {
        file_name.push(".");
        file_name.push(ext);
    }

    path.with_file_name(file_name)
}

// Broken symlinks still occupy the name.
fn occupied(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}
