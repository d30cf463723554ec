//! Storage Abstraction
//!
//! File operations the lifecycle coordinator performs on resolved paths.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument, warn};
use uploader_core::UploadError;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Directory is not writable: {0}")]
    Unwritable(PathBuf),
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for UploadError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Unwritable(path) => UploadError::DirectoryUnwritable { path },
            StorageError::NotFound(path) => UploadError::SourceMissing(path),
            StorageError::IoError(io) => UploadError::Io(io),
        }
    }
}

/// Storage trait - file operations on absolute paths
pub trait Storage: Send + Sync {
    /// Make sure the directory that will hold `file` exists and is writable
    fn ensure_dir(&self, file: &Path) -> StorageResult<()>;

    /// Move an uploaded temporary file to its final location
    fn move_upload(&self, from: &Path, to: &Path) -> StorageResult<()>;

    /// Move a downloaded temporary file into place and normalize its permissions
    fn rename_remote(&self, from: &Path, to: &Path) -> StorageResult<()>;

    /// Remove a file; `Ok(false)` when there was nothing to remove
    fn remove(&self, path: &Path) -> StorageResult<bool>;

    /// Get storage name for logging
    fn name(&self) -> &str;
}

/// Local filesystem storage
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

impl LocalStorage {
    pub fn new() -> Self {
        Self
    }

    fn move_file(from: &Path, to: &Path) -> StorageResult<()> {
        if !from.is_file() {
            return Err(StorageError::NotFound(from.to_path_buf()));
        }

        match fs::rename(from, to) {
            Ok(()) => Ok(()),
            // Temp dirs often live on another filesystem
            Err(err) => {
                debug!(from = ?from, to = ?to, error = %err, "Rename failed, copying instead");
                fs::copy(from, to)?;
                if let Err(err) = fs::remove_file(from) {
                    warn!(path = ?from, error = %err, "Could not remove temporary file");
                }
                Ok(())
            }
        }
    }
}

fn parent_dir(file: &Path) -> PathBuf {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn is_writable(dir: &Path) -> bool {
    fs::metadata(dir)
        .map(|meta| meta.is_dir() && !meta.permissions().readonly())
        .unwrap_or(false)
}

impl Storage for LocalStorage {
    #[instrument(skip(self), fields(storage = "local"))]
    fn ensure_dir(&self, file: &Path) -> StorageResult<()> {
        let dir = parent_dir(file);
        if is_writable(&dir) {
            return Ok(());
        }

        // Another request may have created it in the meantime
        if let Err(err) = fs::create_dir_all(&dir) {
            if !dir.is_dir() {
                debug!(dir = ?dir, error = %err, "Could not create directory");
                return Err(StorageError::Unwritable(dir));
            }
        }

        if is_writable(&dir) {
            debug!(dir = ?dir, "Directory ready");
            Ok(())
        } else {
            Err(StorageError::Unwritable(dir))
        }
    }

    #[instrument(skip(self), fields(storage = "local"))]
    fn move_upload(&self, from: &Path, to: &Path) -> StorageResult<()> {
        Self::move_file(from, to)?;
        debug!(path = ?to, "Upload moved into place");
        Ok(())
    }

    #[instrument(skip(self), fields(storage = "local"))]
    fn rename_remote(&self, from: &Path, to: &Path) -> StorageResult<()> {
        Self::move_file(from, to)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(to, fs::Permissions::from_mode(0o644))?;
        }

        debug!(path = ?to, "Remote file moved into place");
        Ok(())
    }

    #[instrument(skip(self), fields(storage = "local"))]
    fn remove(&self, path: &Path) -> StorageResult<bool> {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(path = ?path, "File deleted");
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn name(&self) -> &str {
        "local"
    }
}
