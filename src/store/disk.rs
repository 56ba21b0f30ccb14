//! Real filesystem access with the same contract as the virtual store.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};
use crate::path::{is_malformed, normalize_path};

/// Disk side of the dual namespace.
///
/// Paths use native syntax. Malformed strings (empty, embedded NUL) are
/// reported as `NotFound` before any system call is made.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskBridge;

impl DiskBridge {
    /// Create a disk bridge.
    pub const fn new() -> Self {
        Self
    }

    fn checked(path: &str) -> Result<&Path> {
        if is_malformed(path) {
            Err(Error::not_found(path))
        } else {
            Ok(Path::new(path))
        }
    }

    /// List file names directly inside `path`, sorted.
    ///
    /// Symbolic links are followed, so a link to a regular file is listed.
    /// A missing or unreadable directory yields an empty list.
    pub fn list(&self, path: &str) -> Vec<String> {
        let Ok(dir) = Self::checked(path) else {
            return Vec::new();
        };
        let Ok(entries) = fs::read_dir(dir) else {
            return Vec::new();
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Read a whole file.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let file = Self::checked(path)?;
        let map_err = |e| Error::from_io(e, path);
        fs::metadata(file).map_err(map_err).and_then(|m| {
            if m.is_dir() {
                Err(Error::Argument(format!("'{path}' is a directory")))
            } else {
                fs::read(file).map_err(map_err)
            }
        })
    }

    /// Create or replace a file. The parent directory must exist.
    pub fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let file = Self::checked(path)?;
        fs::write(file, bytes).map_err(|e| Error::from_io(e, path))?;
        tracing::debug!(path, size = bytes.len(), "disk write");
        Ok(())
    }

    /// Append to an existing file. Never creates the file.
    pub fn append(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let file = Self::checked(path)?;
        let mut handle = OpenOptions::new()
            .append(true)
            .open(file)
            .map_err(|e| Error::from_io(e, path))?;
        handle
            .write_all(bytes)
            .map_err(|e| Error::from_io(e, path))?;
        tracing::debug!(path, added = bytes.len(), "disk append");
        Ok(())
    }

    /// Remove a file. Returns `false` if nothing was removed.
    pub fn remove(&self, path: &str) -> bool {
        match self.delete(path) {
            Ok(()) => true,
            Err(e) => {
                if !e.is_not_found() {
                    tracing::warn!(path, error = %e, "disk remove failed");
                }
                false
            }
        }
    }

    /// Remove a file, reporting why nothing was removed.
    pub fn delete(&self, path: &str) -> Result<()> {
        let file = Self::checked(path)?;
        fs::remove_file(file).map_err(|e| Error::from_io(e, path))?;
        tracing::debug!(path, "disk remove");
        Ok(())
    }

    /// Rename a file, replacing any file at `new`.
    pub fn rename(&self, old: &str, new: &str) -> Result<()> {
        let from = Self::checked(old)?;
        let to = Self::checked(new)?;
        if !from.exists() {
            return Err(Error::not_found(old));
        }
        fs::rename(from, to).map_err(|e| Error::from_io(e, new))?;
        tracing::debug!(from = old, to = new, "disk rename");
        Ok(())
    }

    /// Copy a file on disk, streaming its content.
    ///
    /// Copying a file onto itself leaves it untouched.
    pub fn copy(&self, source: &str, target: &str) -> Result<u64> {
        let from = Self::checked(source)?;
        let to = Self::checked(target)?;
        if !from.is_file() {
            return Err(Error::not_found(source));
        }
        if same_file(from, to) {
            tracing::debug!(path = source, "disk copy onto itself skipped");
            return fs::metadata(from)
                .map(|m| m.len())
                .map_err(|e| Error::from_io(e, source));
        }
        let copied = fs::copy(from, to).map_err(|e| Error::from_io(e, target))?;
        tracing::debug!(from = source, to = target, bytes = copied, "disk copy");
        Ok(copied)
    }

    /// Create a directory and any missing ancestors.
    pub fn mkdir(&self, path: &str) -> Result<()> {
        let dir = Self::checked(path)?;
        fs::create_dir_all(dir).map_err(|e| Error::from_io(e, path))
    }

    /// Remove a directory and all of its content.
    pub(crate) fn rmdir(&self, path: &str) -> Result<()> {
        let dir = Self::checked(path)?;
        if !dir.is_dir() {
            return Err(Error::not_found(path));
        }
        fs::remove_dir_all(dir).map_err(|e| Error::from_io(e, path))?;
        tracing::debug!(path, "disk rmdir");
        Ok(())
    }

    /// Check if a regular file exists.
    pub fn exists(&self, path: &str) -> bool {
        Self::checked(path).is_ok_and(Path::is_file)
    }

    /// Check if a directory exists.
    pub fn is_dir(&self, path: &str) -> bool {
        Self::checked(path).is_ok_and(Path::is_dir)
    }
}

/// Whether two paths name the same file, through links and `..` included.
fn same_file(a: &Path, b: &Path) -> bool {
    if normalize_path(a) == normalize_path(b) {
        return true;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        if let (Ok(x), Ok(y)) = (fs::metadata(a), fs::metadata(b)) {
            return x.dev() == y.dev() && x.ino() == y.ino();
        }
    }
    false
}
