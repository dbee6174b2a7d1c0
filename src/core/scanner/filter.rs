//! Entry filtering logic for the scanner.

use super::extension_of;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Decides which directories to descend into and which files to keep
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    /// Optional extension allowlist (lowercase, no dot)
    extensions: Option<HashSet<String>>,
    /// Whether to include hidden files and directories
    include_hidden: bool,
    /// Subtrees to leave out, relative to the scan root
    excluded: Vec<PathBuf>,
}

impl EntryFilter {
    /// Create a filter that keeps every visible file
    pub fn new() -> Self {
        Self::default()
    }

    /// Include hidden entries (starting with .)
    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Only keep files whose extension is in the list
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = Some(
            extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        );
        self
    }

    /// Leave out a subtree, given relative to the scan root
    pub fn with_excluded(mut self, relative: PathBuf) -> Self {
        self.excluded.push(relative);
        self
    }

    /// Whether the entry's name marks it hidden
    pub fn is_hidden(path: &Path) -> bool {
        path.file_name()
            .map(|n| n.as_encoded_bytes().starts_with(b"."))
            .unwrap_or(false)
    }

    /// Whether the walker should look at this entry at all.
    ///
    /// `relative` is the path below the scan root.
    pub fn should_visit(&self, relative: &Path) -> bool {
        if !self.include_hidden && Self::is_hidden(relative) {
            return false;
        }
        !self.excluded.iter().any(|ex| relative == ex.as_path())
    }

    /// Whether a regular file should become a scan entry
    pub fn should_include(&self, path: &Path) -> bool {
        if !self.include_hidden && Self::is_hidden(path) {
            return false;
        }

        match &self.extensions {
            None => true,
            Some(allowed) => extension_of(path)
                .map(|ext| allowed.contains(&ext))
                .unwrap_or(false),
        }
    }
}
