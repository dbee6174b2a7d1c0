//! Run configuration and its validation.

use crate::core::executor::OperationMode;
use crate::core::resolver::ConflictPolicy;
use crate::error::{ConfigError, DirRole};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Immutable snapshot of what a run should do.
///
/// An empty path means the directory has not been set yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SortConfiguration {
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    pub mode: OperationMode,
    pub use_ml: bool,
    pub conflict_policy: ConflictPolicy,
}

impl SortConfiguration {
    /// Copy mode, rules only, rename on conflict
    pub fn new(source_dir: impl Into<PathBuf>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            target_dir: target_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: OperationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_ml(mut self, use_ml: bool) -> Self {
        self.use_ml = use_ml;
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// Check both directories before any file is touched.
    ///
    /// The target is probed by creating and removing a temp file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_directory(&self.source_dir, DirRole::Source)?;
        check_directory(&self.target_dir, DirRole::Target)?;

        let source = fs::canonicalize(&self.source_dir).map_err(|source| ConfigError::NotReadable {
            role: DirRole::Source,
            path: self.source_dir.clone(),
            source,
        })?;
        let target = fs::canonicalize(&self.target_dir).map_err(|source| ConfigError::NotReadable {
            role: DirRole::Target,
            path: self.target_dir.clone(),
            source,
        })?;
        if source == target {
            return Err(ConfigError::SameDirectory { path: source });
        }

        fs::read_dir(&self.source_dir).map_err(|source| ConfigError::NotReadable {
            role: DirRole::Source,
            path: self.source_dir.clone(),
            source,
        })?;

        probe_writable(&self.target_dir)?;

        Ok(())
    }
}

fn check_directory(path: &Path, role: DirRole) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::NotSet { role });
    }

    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(ConfigError::NotADirectory {
            role,
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::DirectoryNotFound {
            role,
            path: path.to_path_buf(),
        }),
        Err(source) => Err(ConfigError::NotReadable {
            role,
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Create and drop a temp file in `dir`
pub(crate) fn probe_writable(dir: &Path) -> Result<(), ConfigError> {
    tempfile::Builder::new()
        .prefix(".smartfile-probe-")
        .tempfile_in(dir)
        .map(drop)
        .map_err(|source| ConfigError::NotWritable {
            role: DirRole::Target,
            path: dir.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn valid_directories_pass() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        SortConfiguration::new(source.path(), target.path()).validate().unwrap();

        // The probe leaves nothing behind
        assert_eq!(fs::read_dir(target.path()).unwrap().count(), 0);
    }

    #[test]
    fn unset_directories_are_rejected() {
        let target = TempDir::new().unwrap();
        let err = SortConfiguration::new("", target.path()).validate().unwrap_err();
        assert!(matches!(err, ConfigError::NotSet { role: DirRole::Source }));

        let source = TempDir::new().unwrap();
        let err = SortConfiguration::new(source.path(), "").validate().unwrap_err();
        assert!(matches!(err, ConfigError::NotSet { role: DirRole::Target }));
    }

    #[test]
    fn missing_source_is_rejected() {
        let target = TempDir::new().unwrap();
        let err = SortConfiguration::new("/nonexistent/inbox/12345", target.path())
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::DirectoryNotFound { role: DirRole::Source, .. }));
    }

    #[test]
    fn file_as_target_is_rejected() {
        let source = TempDir::new().unwrap();
        let file = source.path().join("not_a_dir.txt");
        fs::write(&file, "x").unwrap();

        let err = SortConfiguration::new(source.path(), &file).validate().unwrap_err();
        assert!(matches!(err, ConfigError::NotADirectory { role: DirRole::Target, .. }));
    }

    #[test]
    fn same_directory_is_rejected() {
        let dir = TempDir::new().unwrap();
        let alias = dir.path().join(".");
        let err = SortConfiguration::new(dir.path(), alias).validate().unwrap_err();
        assert!(matches!(err, ConfigError::SameDirectory { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn read_only_target_is_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        fs::set_permissions(target.path(), fs::Permissions::from_mode(0o555)).unwrap();

        // Privileged users bypass permission bits
        if probe_writable(target.path()).is_ok() {
            fs::set_permissions(target.path(), fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let err = SortConfiguration::new(source.path(), target.path())
            .validate()
            .unwrap_err();
        fs::set_permissions(target.path(), fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(err, ConfigError::NotWritable { .. }));
    }

    #[test]
    fn builder_methods_set_fields() {
        let config = SortConfiguration::new("/in", "/out")
            .with_mode(OperationMode::Move)
            .with_ml(true)
            .with_conflict_policy(ConflictPolicy::Skip);

        assert_eq!(config.mode, OperationMode::Move);
        assert!(config.use_ml);
        assert_eq!(config.conflict_policy, ConflictPolicy::Skip);
    }
}
