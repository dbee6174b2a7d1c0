//! Directory walking implementation using walkdir.

use super::{extension_of, filter::EntryFilter, FileEntry, ScanResult, SourceScanner};
use crate::error::ScanError;
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Bytes read from the head of each file for content sniffing
const SNIFF_LEN: u64 = 8192;

/// Configuration for the directory scanner
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Whether to include hidden files and directories
    pub include_hidden: bool,
    /// Maximum directory depth (None = unlimited)
    pub max_depth: Option<usize>,
    /// Extension allowlist (None = every file)
    pub extensions: Option<Vec<String>>,
    /// Directories to leave out when they lie inside the scan root
    pub exclude: Vec<PathBuf>,
    /// Read file headers to fill `mime_hint`
    pub sniff_content: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            include_hidden: false,
            max_depth: None,
            extensions: None,
            exclude: Vec::new(),
            sniff_content: true,
        }
    }
}

/// Scanner implementation using the walkdir crate
pub struct WalkDirScanner {
    config: ScanConfig,
    filter: EntryFilter,
}

impl WalkDirScanner {
    /// Create a new scanner with the given configuration
    pub fn new(config: ScanConfig) -> Self {
        let mut filter = EntryFilter::new().with_hidden(config.include_hidden);

        if let Some(ref extensions) = config.extensions {
            filter = filter.with_extensions(extensions.clone());
        }

        Self { config, filter }
    }

    /// Excluded directories expressed relative to `root`.
    ///
    /// Anything outside the root, or the root itself, is ignored.
    fn excluded_below(&self, root: &Path) -> Vec<PathBuf> {
        let root_canonical = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());

        self.config
            .exclude
            .iter()
            .filter_map(|dir| {
                let canonical = fs::canonicalize(dir).unwrap_or_else(|_| dir.clone());
                canonical
                    .strip_prefix(&root_canonical)
                    .ok()
                    .filter(|rel| !rel.as_os_str().is_empty())
                    .map(Path::to_path_buf)
            })
            .collect()
    }

    fn sniff(path: &Path) -> Option<String> {
        let mut head = Vec::with_capacity(SNIFF_LEN as usize);
        File::open(path)
            .and_then(|file| file.take(SNIFF_LEN).read_to_end(&mut head))
            .ok()?;
        infer::get(&head).map(|kind| kind.mime_type().to_string())
    }
}

impl SourceScanner for WalkDirScanner {
    fn scan(&self, root: &Path) -> ScanResult {
        let mut filter = self.filter.clone();
        for relative in self.excluded_below(root) {
            tracing::debug!(path = %relative.display(), "Excluding subtree from scan");
            filter = filter.with_excluded(relative);
        }

        let mut walker = WalkDir::new(root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name();

        if let Some(depth) = self.config.max_depth {
            walker = walker.max_depth(depth);
        }

        let mut result = ScanResult::default();
        let mut candidates = Vec::new();

        let entries = walker.into_iter().filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            entry
                .path()
                .strip_prefix(root)
                .map(|relative| filter.should_visit(relative))
                .unwrap_or(true)
        });

        // Phase 1: Walk in name order, collecting regular files
        for entry_result in entries {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    let error = if e.io_error().map(|io| io.kind())
                        == Some(std::io::ErrorKind::PermissionDenied)
                    {
                        ScanError::PermissionDenied { path }
                    } else {
                        ScanError::ReadDirectory {
                            path,
                            source: std::io::Error::other(e.to_string()),
                        }
                    };
                    tracing::warn!(error = %error, "Skipping unreadable entry");
                    result.errors.push(error);
                    continue;
                }
            };

            // Symlinks are only regular files here when followed
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if !filter.should_include(path) {
                continue;
            }

            match entry.metadata() {
                Ok(metadata) => candidates.push((path.to_path_buf(), metadata)),
                Err(e) => {
                    let error = ScanError::ReadDirectory {
                        path: path.to_path_buf(),
                        source: std::io::Error::other(e.to_string()),
                    };
                    tracing::warn!(error = %error, "Skipping file without metadata");
                    result.errors.push(error);
                }
            }
        }

        // Phase 2: Sniff file heads in parallel
        let sniff_content = self.config.sniff_content;
        result.entries = candidates
            .into_par_iter()
            .map(|(path, metadata)| {
                let mime_hint = if sniff_content { Self::sniff(&path) } else { None };
                FileEntry {
                    extension: extension_of(&path),
                    size_bytes: metadata.len(),
                    mime_hint,
                    modified: metadata
                        .modified()
                        .unwrap_or(std::time::SystemTime::UNIX_EPOCH),
                    path,
                }
            })
            .collect();

        result.entries.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::debug!(
            root = %root.display(),
            files = result.entries.len(),
            errors = result.errors.len(),
            "Scan complete"
        );

        result
    }
}
