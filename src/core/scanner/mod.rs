//! # Scanner Module
//!
//! Enumerates regular files under the source directory.
//!
//! ## Ordering
//! Entries come back in lexicographic path order so that conflict
//! resolution (and therefore every rename) is reproducible.
//!
//! ## Example
//! ```rust,ignore
//! use smartfile_flow::core::scanner::{ScanConfig, SourceScanner, WalkDirScanner};
//!
//! let scanner = WalkDirScanner::new(ScanConfig::default());
//! let result = scanner.scan(Path::new("/home/me/Downloads"));
//! ```

mod filter;
mod walker;

pub use filter::EntryFilter;
pub use walker::{ScanConfig, WalkDirScanner};

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Immutable snapshot of a source file taken at scan time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path to the file
    pub path: PathBuf,
    /// Lowercased extension without the dot
    pub extension: Option<String>,
    /// File size in bytes
    pub size_bytes: u64,
    /// Best-effort content sniff
    pub mime_hint: Option<String>,
    /// Last modified time
    pub modified: SystemTime,
}

impl FileEntry {
    /// Final path component, used as the destination file name
    pub fn file_name(&self) -> Option<&std::ffi::OsStr> {
        self.path.file_name()
    }

    /// File name without the extension
    pub fn stem(&self) -> Option<&str> {
        self.path.file_stem().and_then(|s| s.to_str())
    }
}

/// Lowercased extension of a path, if it has one
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_lowercase())
}

/// Result of a scan operation
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Discovered files, sorted by path
    pub entries: Vec<FileEntry>,
    /// Problems that occurred during scanning (non-fatal)
    pub errors: Vec<ScanError>,
}

/// Trait for source scanners
///
/// Implement this trait to feed the sorter from something other than
/// the filesystem (e.g. in tests).
pub trait SourceScanner: Send + Sync {
    /// Scan a directory tree and return its regular files
    fn scan(&self, root: &Path) -> ScanResult;
}
