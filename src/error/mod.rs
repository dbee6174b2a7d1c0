//! # Error Module
//!
//! Error types for the file sorting engine.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, file names, what went wrong
//! - **Per-file errors are isolated** - only configuration errors stop a run
//! - **Recovery hints** - suggest how to fix when possible

use std::path::PathBuf;
use thiserror::Error;

/// Top-level engine error.
///
/// Only failures that stop a run surface here. Per-file and model
/// problems are counted and reported through events instead.
#[derive(Error, Debug)]
pub enum SorterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("A sorting run is already in progress")]
    RunInProgress,

    #[error("The sorting worker stopped unexpectedly")]
    WorkerPanicked,

    #[error("Failed to start the sorting worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

/// Errors that make a run impossible before any file is touched
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{role} directory is not set")]
    NotSet { role: DirRole },

    #[error("{role} directory not found: {path}")]
    DirectoryNotFound { role: DirRole, path: PathBuf },

    #[error("{role} path is not a directory: {path}")]
    NotADirectory { role: DirRole, path: PathBuf },

    #[error("Source and target are the same directory: {path}")]
    SameDirectory { path: PathBuf },

    #[error("Cannot read {role} directory {path}: {source}")]
    NotReadable {
        role: DirRole,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write to {role} directory {path}: {source}. Check the folder permissions.")]
    NotWritable {
        role: DirRole,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings file not found: {path}")]
    SettingsNotFound { path: PathBuf },

    #[error("Failed to read settings file {path}: {source}")]
    SettingsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings in {path}: {reason}")]
    InvalidSettings { path: PathBuf, reason: String },
}

/// Which configured directory an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirRole {
    Source,
    Target,
}

impl std::fmt::Display for DirRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirRole::Source => write!(f, "Source"),
            DirRole::Target => write!(f, "Target"),
        }
    }
}

/// Non-fatal problems met while walking the source tree
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from loading the classification model.
///
/// These never abort a run. They demote classification to rules only.
#[derive(Error, Debug, Clone)]
pub enum ModelError {
    #[error("Model artifact not found at {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to read model artifact {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("Model artifact {path} is corrupt: {reason}. Replace or delete this file.")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Model artifact {path} is incompatible: {reason}")]
    Incompatible { path: PathBuf, reason: String },
}

/// Errors from conflict resolution
#[derive(Error, Debug)]
pub enum ConflictError {
    #[error("No free name for {path} after {attempts} attempts")]
    Exhausted { path: PathBuf, attempts: usize },
}

/// Machine-distinguishable reason for a failed file operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOpErrorKind {
    /// The source disappeared between scan and operation
    SourceMissing,
    /// The OS refused access to the source or destination
    PermissionDenied,
    /// A file appeared at the destination after conflict resolution
    DestinationExists,
    /// The destination filesystem is full
    StorageFull,
    /// The destination path exceeds the platform limit
    PathTooLong,
    /// A cross-device copy did not produce an identical size
    VerificationFailed,
    /// Anything else reported by the OS
    Other,
}

impl std::fmt::Display for FileOpErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            FileOpErrorKind::SourceMissing => "source missing",
            FileOpErrorKind::PermissionDenied => "permission denied",
            FileOpErrorKind::DestinationExists => "destination exists",
            FileOpErrorKind::StorageFull => "storage full",
            FileOpErrorKind::PathTooLong => "path too long",
            FileOpErrorKind::VerificationFailed => "verification failed",
            FileOpErrorKind::Other => "i/o error",
        };
        write!(f, "{}", text)
    }
}

/// A failed copy or move of a single file
#[derive(Error, Debug)]
#[error("{kind} at {path}: {source}")]
pub struct FileOpError {
    pub kind: FileOpErrorKind,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl FileOpError {
    /// Build an error, deriving the kind from the OS error
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            kind: classify_io_error(&source),
            path: path.into(),
            source,
        }
    }

    /// Build an error with an explicit kind
    pub fn new(kind: FileOpErrorKind, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            kind,
            path: path.into(),
            source,
        }
    }
}

#[cfg(target_os = "linux")]
const NAME_TOO_LONG_CODES: &[i32] = &[36];
#[cfg(target_os = "macos")]
const NAME_TOO_LONG_CODES: &[i32] = &[63];
#[cfg(windows)]
const NAME_TOO_LONG_CODES: &[i32] = &[206, 3];
#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
const NAME_TOO_LONG_CODES: &[i32] = &[];

fn classify_io_error(error: &std::io::Error) -> FileOpErrorKind {
    use std::io::ErrorKind;

    if let Some(code) = error.raw_os_error() {
        if NAME_TOO_LONG_CODES.contains(&code) {
            return FileOpErrorKind::PathTooLong;
        }
    }

    match error.kind() {
        ErrorKind::NotFound => FileOpErrorKind::SourceMissing,
        ErrorKind::PermissionDenied => FileOpErrorKind::PermissionDenied,
        ErrorKind::AlreadyExists => FileOpErrorKind::DestinationExists,
        ErrorKind::StorageFull => FileOpErrorKind::StorageFull,
        _ => FileOpErrorKind::Other,
    }
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, SorterError>;
