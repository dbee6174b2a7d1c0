//! # Executor Module
//!
//! Performs the copy or move of one file into its resolved destination.
//!
//! ## Safety
//! - The source is re-checked right before the operation
//! - Copies are staged in a temp file beside the destination and renamed
//!   into place, so a destination is never left half-written
//! - Moves without overwrite hard-link then unlink, so a file that
//!   appeared after resolution is never replaced
//! - Cross-device moves are copied, size-verified, and only then is the
//!   source deleted; if that delete fails the copy is undone
//! - Copies keep the source's permissions and modified time

use crate::core::scanner::FileEntry;
use crate::error::{FileOpError, FileOpErrorKind};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};

#[cfg(unix)]
const CROSS_DEVICE_CODES: &[i32] = &[18];
#[cfg(windows)]
const CROSS_DEVICE_CODES: &[i32] = &[17];
#[cfg(not(any(unix, windows)))]
const CROSS_DEVICE_CODES: &[i32] = &[];

/// Whether the source is kept after it is placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    /// Copy files to destination (keep originals)
    #[default]
    Copy,
    /// Move files to destination
    Move,
}

impl OperationMode {
    /// `copy_files = true` means Copy
    pub fn from_copy_flag(copy_files: bool) -> Self {
        if copy_files {
            OperationMode::Copy
        } else {
            OperationMode::Move
        }
    }
}

impl std::fmt::Display for OperationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationMode::Copy => write!(f, "copy"),
            OperationMode::Move => write!(f, "move"),
        }
    }
}

/// A file that was successfully placed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub mode: OperationMode,
    /// Bytes written at the destination
    pub bytes: u64,
    /// An existing destination file was replaced
    pub replaced: bool,
    /// A move had to fall back to copy and delete
    pub cross_device: bool,
}

/// Deletes a source once its copy is in place
type RemoveSource<'a> = &'a dyn Fn(&Path) -> io::Result<()>;

/// Executes single file operations
pub struct FileExecutor;

impl FileExecutor {
    /// Place `entry` at `final_path`.
    ///
    /// Without `overwrite` an existing file at `final_path` is never
    /// touched and the call fails with `DestinationExists`, including
    /// when the file appears after conflict resolution.
    pub fn execute(
        entry: &FileEntry,
        final_path: &Path,
        mode: OperationMode,
        overwrite: bool,
    ) -> Result<FileOutcome, FileOpError> {
        let parent = final_path.parent().ok_or_else(|| {
            FileOpError::new(
                FileOpErrorKind::Other,
                final_path,
                io::Error::new(io::ErrorKind::InvalidInput, "destination has no parent directory"),
            )
        })?;
        fs::create_dir_all(parent).map_err(|e| destination_error(parent, e))?;

        let source_len = source_len(&entry.path)?;

        let replaced = occupied(final_path);
        if replaced && !overwrite {
            return Err(clobber_error(final_path));
        }

        let (bytes, cross_device) = Self::place(
            &entry.path,
            final_path,
            mode,
            overwrite,
            source_len,
            &|path: &Path| fs::remove_file(path),
        )?;

        Ok(FileOutcome {
            source: entry.path.clone(),
            destination: final_path.to_path_buf(),
            mode,
            bytes,
            replaced,
            cross_device,
        })
    }

    /// Bytes placed, and whether a move fell back to copy and delete
    fn place(
        source: &Path,
        final_path: &Path,
        mode: OperationMode,
        overwrite: bool,
        source_len: u64,
        remove_source: RemoveSource<'_>,
    ) -> Result<(u64, bool), FileOpError> {
        match mode {
            OperationMode::Copy => Ok((Self::copy_into_place(source, final_path, overwrite)?, false)),
            OperationMode::Move if overwrite => match fs::rename(source, final_path) {
                Ok(()) => Ok((source_len, false)),
                Err(e) if is_cross_device(&e) => {
                    tracing::debug!(
                        source = %source.display(),
                        "Rename crossed filesystems, falling back to copy"
                    );
                    Ok((Self::move_by_copy(source, final_path, true, remove_source)?, true))
                }
                Err(e) => Err(FileOpError::from_io(source, e)),
            },
            // A hard link never replaces an existing name
            OperationMode::Move => match fs::hard_link(source, final_path) {
                Ok(()) => {
                    if let Err(e) = remove_source(source) {
                        roll_back(final_path, None);
                        return Err(FileOpError::from_io(source, e));
                    }
                    Ok((source_len, false))
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(clobber_error(final_path)),
                Err(e) => {
                    tracing::debug!(
                        error = %e,
                        source = %source.display(),
                        "Hard link unavailable, falling back to copy"
                    );
                    Ok((Self::move_by_copy(source, final_path, false, remove_source)?, true))
                }
            },
        }
    }

    /// Copy through a staged temp file, then rename it into place
    fn copy_into_place(source: &Path, final_path: &Path, overwrite: bool) -> Result<u64, FileOpError> {
        let staged = stage_copy(source, final_path)?;
        let bytes = staged.len;
        persist(staged.file, final_path, overwrite)?;
        Ok(bytes)
    }

    /// Copy, verify, place, then delete the source.
    ///
    /// If the source cannot be deleted the destination is put back the
    /// way it was, so the file never ends up in both places.
    fn move_by_copy(
        source: &Path,
        final_path: &Path,
        overwrite: bool,
        remove_source: RemoveSource<'_>,
    ) -> Result<u64, FileOpError> {
        let staged = stage_copy(source, final_path)?;
        let bytes = staged.len;

        let backup = if overwrite { set_aside(final_path)? } else { None };
        if let Err(e) = persist(staged.file, final_path, overwrite) {
            if let Some(backup) = backup.as_deref() {
                roll_back(final_path, Some(backup));
            }
            return Err(e);
        }

        if let Err(e) = remove_source(source) {
            tracing::warn!(
                error = %e,
                source = %source.display(),
                "Copied but could not remove source, undoing the copy"
            );
            roll_back(final_path, backup.as_deref());
            return Err(FileOpError::from_io(source, e));
        }

        Ok(bytes)
    }
}

fn persist(file: NamedTempFile, final_path: &Path, overwrite: bool) -> Result<(), FileOpError> {
    let result = if overwrite {
        file.persist(final_path).map(drop)
    } else {
        file.persist_noclobber(final_path).map(drop)
    };
    result.map_err(|e| destination_error(final_path, e.error))
}

/// Move an existing destination to a hidden temp name beside it.
///
/// The returned path deletes the old file when dropped.
fn set_aside(path: &Path) -> Result<Option<TempPath>, FileOpError> {
    if !occupied(path) {
        return Ok(None);
    }

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let backup = tempfile::Builder::new()
        .prefix(".smartfile-replaced-")
        .tempfile_in(parent)
        .map_err(|e| destination_error(parent, e))?
        .into_temp_path();
    fs::rename(path, &backup).map_err(|e| destination_error(path, e))?;

    Ok(Some(backup))
}

/// Remove a placed file, restoring the one it replaced
fn roll_back(final_path: &Path, backup: Option<&Path>) {
    let result = match backup {
        Some(backup) => fs::rename(backup, final_path),
        None => fs::remove_file(final_path),
    };

    if let Err(e) = result {
        tracing::warn!(
            error = %e,
            destination = %final_path.display(),
            "Could not roll back destination"
        );
    }
}

fn clobber_error(final_path: &Path) -> FileOpError {
    FileOpError::new(
        FileOpErrorKind::DestinationExists,
        final_path,
        io::Error::new(io::ErrorKind::AlreadyExists, "destination appeared after resolution"),
    )
}

struct StagedCopy {
    file: NamedTempFile,
    len: u64,
}

fn stage_copy(source: &Path, final_path: &Path) -> Result<StagedCopy, FileOpError> {
    let parent = final_path.parent().unwrap_or_else(|| Path::new("."));
    let expected = source_len(source)?;

    let mut reader = File::open(source).map_err(|e| FileOpError::from_io(source, e))?;
    let mut staged = NamedTempFile::new_in(parent).map_err(|e| destination_error(parent, e))?;

    io::copy(&mut reader, staged.as_file_mut()).map_err(|e| destination_error(final_path, e))?;
    staged
        .as_file()
        .sync_all()
        .map_err(|e| destination_error(final_path, e))?;

    if let Ok(metadata) = fs::metadata(source) {
        if let Ok(modified) = metadata.modified() {
            if let Err(e) = staged.as_file().set_modified(modified) {
                tracing::debug!(error = %e, "Could not carry modified time to destination");
            }
        }
        if let Err(e) = fs::set_permissions(staged.path(), metadata.permissions()) {
            tracing::debug!(error = %e, "Could not carry permissions to destination");
        }
    }

    let written = staged
        .as_file()
        .metadata()
        .map_err(|e| destination_error(final_path, e))?
        .len();

    if written != expected {
        return Err(FileOpError::new(
            FileOpErrorKind::VerificationFailed,
            final_path,
            io::Error::other(format!(
                "copy verification failed: source {} bytes, destination {} bytes",
                expected, written
            )),
        ));
    }

    Ok(StagedCopy {
        file: staged,
        len: written,
    })
}

fn source_len(source: &Path) -> Result<u64, FileOpError> {
    match fs::metadata(source) {
        Ok(metadata) if metadata.is_file() => Ok(metadata.len()),
        Ok(_) => Err(FileOpError::new(
            FileOpErrorKind::SourceMissing,
            source,
            io::Error::new(io::ErrorKind::NotFound, "source is no longer a regular file"),
        )),
        Err(e) => Err(FileOpError::from_io(source, e)),
    }
}

// A missing destination component is not a missing source.
fn destination_error(path: &Path, error: io::Error) -> FileOpError {
    let mut err = FileOpError::from_io(path, error);
    if err.kind == FileOpErrorKind::SourceMissing {
        err.kind = FileOpErrorKind::Other;
    }
    err
}

fn is_cross_device(error: &io::Error) -> bool {
    error
        .raw_os_error()
        .map(|code| CROSS_DEVICE_CODES.contains(&code))
        .unwrap_or(false)
}

fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scanner::extension_of;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn entry_for(path: &Path) -> FileEntry {
        FileEntry {
            path: path.to_path_buf(),
            extension: extension_of(path),
            size_bytes: fs::metadata(path).map(|m| m.len()).unwrap_or(0),
            mime_hint: None,
            modified: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn copy_keeps_source_and_creates_parents() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let file = src.path().join("test.jpg");
        fs::write(&file, b"test content").unwrap();

        let final_path = dest.path().join("Images/deep/test.jpg");
        let outcome =
            FileExecutor::execute(&entry_for(&file), &final_path, OperationMode::Copy, false).unwrap();

        assert!(file.exists());
        assert_eq!(fs::read(&final_path).unwrap(), b"test content");
        assert_eq!(outcome.bytes, 12);
        assert!(!outcome.replaced);
    }

    #[test]
    fn move_removes_source() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let file = src.path().join("test.txt");
        fs::write(&file, b"moved").unwrap();

        let final_path = dest.path().join("Documents/test.txt");
        FileExecutor::execute(&entry_for(&file), &final_path, OperationMode::Move, false).unwrap();

        assert!(!file.exists());
        assert_eq!(fs::read(&final_path).unwrap(), b"moved");
    }

    #[test]
    fn overwrite_replaces_destination() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let file = src.path().join("foo.txt");
        fs::write(&file, b"new").unwrap();
        let final_path = dest.path().join("foo.txt");
        fs::write(&final_path, b"old and longer").unwrap();

        let outcome =
            FileExecutor::execute(&entry_for(&file), &final_path, OperationMode::Copy, true).unwrap();

        assert!(outcome.replaced);
        assert_eq!(fs::read(&final_path).unwrap(), b"new");
    }

    #[test]
    fn move_with_overwrite_replaces_destination() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let file = src.path().join("foo.txt");
        fs::write(&file, b"new").unwrap();
        let final_path = dest.path().join("foo.txt");
        fs::write(&final_path, b"old").unwrap();

        FileExecutor::execute(&entry_for(&file), &final_path, OperationMode::Move, true).unwrap();

        assert!(!file.exists());
        assert_eq!(fs::read(&final_path).unwrap(), b"new");
    }

    #[test]
    fn refuses_to_clobber_without_overwrite() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let file = src.path().join("foo.txt");
        fs::write(&file, b"new").unwrap();
        let final_path = dest.path().join("foo.txt");
        fs::write(&final_path, b"old").unwrap();

        for mode in [OperationMode::Copy, OperationMode::Move] {
            let err = FileExecutor::execute(&entry_for(&file), &final_path, mode, false).unwrap_err();
            assert_eq!(err.kind, FileOpErrorKind::DestinationExists);
        }
        assert_eq!(fs::read(&final_path).unwrap(), b"old");
        assert!(file.exists());
    }

    #[test]
    fn vanished_source_is_reported() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let file = src.path().join("gone.txt");
        fs::write(&file, b"x").unwrap();
        let entry = entry_for(&file);
        fs::remove_file(&file).unwrap();

        let err = FileExecutor::execute(
            &entry,
            &dest.path().join("Documents/gone.txt"),
            OperationMode::Move,
            false,
        )
        .unwrap_err();

        assert_eq!(err.kind, FileOpErrorKind::SourceMissing);
        assert_eq!(err.path, file);
    }

    #[test]
    fn copy_fallback_moves_and_verifies() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let file = src.path().join("big.bin");
        fs::write(&file, vec![7u8; 64 * 1024]).unwrap();
        let final_path = dest.path().join("big.bin");

        let bytes =
            FileExecutor::move_by_copy(&file, &final_path, false, &|p: &Path| fs::remove_file(p))
                .unwrap();

        assert_eq!(bytes, 64 * 1024);
        assert!(!file.exists());
        assert_eq!(fs::metadata(&final_path).unwrap().len(), 64 * 1024);
    }

    fn stuck_source(_: &Path) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "source is locked"))
    }

    fn dir_names(dir: &Path) -> Vec<std::ffi::OsString> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn failed_source_removal_undoes_copy() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let file = src.path().join("report.pdf");
        fs::write(&file, b"pdf").unwrap();
        let final_path = dest.path().join("report.pdf");

        let err = FileExecutor::move_by_copy(&file, &final_path, false, &stuck_source).unwrap_err();

        assert_eq!(err.kind, FileOpErrorKind::PermissionDenied);
        assert_eq!(err.path, file);
        assert!(file.exists());
        assert!(dir_names(dest.path()).is_empty());
    }

    #[test]
    fn failed_source_removal_restores_replaced_file() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let file = src.path().join("foo.txt");
        fs::write(&file, b"new").unwrap();
        let final_path = dest.path().join("foo.txt");
        fs::write(&final_path, b"old").unwrap();

        FileExecutor::move_by_copy(&file, &final_path, true, &stuck_source).unwrap_err();

        assert_eq!(fs::read(&final_path).unwrap(), b"old");
        assert_eq!(dir_names(dest.path()), vec![std::ffi::OsString::from("foo.txt")]);
        assert!(file.exists());
    }

    #[test]
    fn replaced_file_is_discarded_after_successful_fallback() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let file = src.path().join("foo.txt");
        fs::write(&file, b"new").unwrap();
        let final_path = dest.path().join("foo.txt");
        fs::write(&final_path, b"old").unwrap();

        FileExecutor::move_by_copy(&file, &final_path, true, &|p: &Path| fs::remove_file(p)).unwrap();

        assert_eq!(fs::read(&final_path).unwrap(), b"new");
        assert_eq!(dir_names(dest.path()), vec![std::ffi::OsString::from("foo.txt")]);
        assert!(!file.exists());
    }

    #[test]
    fn failed_source_removal_undoes_link() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let file = src.path().join("a.txt");
        fs::write(&file, b"a").unwrap();
        let final_path = dest.path().join("a.txt");

        let err = FileExecutor::place(&file, &final_path, OperationMode::Move, false, 1, &stuck_source)
            .unwrap_err();

        assert_eq!(err.path, file);
        assert!(file.exists());
        assert!(!final_path.exists());
    }

    #[test]
    fn move_never_replaces_late_destination() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let file = src.path().join("a.txt");
        fs::write(&file, b"mine").unwrap();
        let final_path = dest.path().join("a.txt");

        // Appeared after the destination was resolved as free
        fs::write(&final_path, b"late").unwrap();

        let err = FileExecutor::place(
            &file,
            &final_path,
            OperationMode::Move,
            false,
            4,
            &|p: &Path| fs::remove_file(p),
        )
        .unwrap_err();

        assert_eq!(err.kind, FileOpErrorKind::DestinationExists);
        assert_eq!(fs::read(&final_path).unwrap(), b"late");
        assert_eq!(fs::read(&file).unwrap(), b"mine");
    }

    #[test]
    fn copy_keeps_modified_time() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let file = src.path().join("old.txt");
        fs::write(&file, b"from 2001").unwrap();

        let then = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000_000);
        File::options()
            .write(true)
            .open(&file)
            .unwrap()
            .set_modified(then)
            .unwrap();

        let final_path = dest.path().join("old.txt");
        FileExecutor::execute(&entry_for(&file), &final_path, OperationMode::Copy, false).unwrap();

        assert_eq!(fs::metadata(&final_path).unwrap().modified().unwrap(), then);
    }

    #[test]
    fn staged_copies_leave_no_temp_files() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let file = src.path().join("a.txt");
        fs::write(&file, b"a").unwrap();

        FileExecutor::execute(&entry_for(&file), &dest.path().join("a.txt"), OperationMode::Copy, false)
            .unwrap();

        let names: Vec<_> = fs::read_dir(dest.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("a.txt")]);
    }

    #[test]
    fn only_exdev_counts_as_cross_device() {
        assert!(!is_cross_device(&io::Error::new(io::ErrorKind::PermissionDenied, "no")));
        #[cfg(unix)]
        assert!(is_cross_device(&io::Error::from_raw_os_error(18)));
    }

    #[test]
    fn copy_flag_selects_mode() {
        assert_eq!(OperationMode::from_copy_flag(true), OperationMode::Copy);
        assert_eq!(OperationMode::from_copy_flag(false), OperationMode::Move);
    }
}
