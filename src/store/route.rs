//! Namespace routing over the virtual store and the disk bridge.
//!
//! ```text
//! path ──► classify() ──┬─► Virtual ──► VirtualStore
//!                       └─► Disk    ──► DiskBridge
//!
//! copy / rename with endpoints in different namespaces:
//!   read(source) ──► write(target) [──► delete(source)]
//!
//! a move whose source cannot be deleted removes the new copy again
//! ```

use std::sync::Arc;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::path::{Namespace, classify};

use super::disk::DiskBridge;
use super::memory::VirtualStore;

/// Unified file access over both namespaces.
///
/// Cheap to share: the virtual store sits behind an `Arc`, so clones of a
/// `FileSystem` see the same virtual files.
#[derive(Clone)]
pub struct FileSystem {
    config: Arc<Config>,
    memory: Arc<VirtualStore>,
    disk: DiskBridge,
}

impl Default for FileSystem {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl FileSystem {
    /// Create a file system with a fresh, empty virtual store.
    pub fn new(config: Config) -> Self {
        let memory = Arc::new(VirtualStore::new(&config));
        Self {
            config: Arc::new(config),
            memory,
            disk: DiskBridge::new(),
        }
    }

    /// The configuration paths are classified with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Direct access to the virtual store.
    pub fn memory(&self) -> &VirtualStore {
        &self.memory
    }

    /// Direct access to the disk bridge.
    pub fn disk(&self) -> &DiskBridge {
        &self.disk
    }

    /// Classify a path under this file system's configuration.
    #[inline]
    pub fn namespace(&self, path: &str) -> Namespace {
        classify(path, &self.config)
    }

    /// List file names directly inside a directory.
    pub fn list(&self, path: &str) -> Vec<String> {
        match self.namespace(path) {
            Namespace::Virtual => self.memory.list(path),
            Namespace::Disk => self.disk.list(path),
        }
    }

    /// Read a whole file.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        match self.namespace(path) {
            Namespace::Virtual => self.memory.read(path),
            Namespace::Disk => self.disk.read(path),
        }
    }

    /// Create or replace a file.
    pub fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        match self.namespace(path) {
            Namespace::Virtual => self.memory.write(path, bytes),
            Namespace::Disk => self.disk.write(path, bytes),
        }
    }

    /// Append to an existing file.
    pub fn append(&self, path: &str, bytes: &[u8]) -> Result<()> {
        match self.namespace(path) {
            Namespace::Virtual => self.memory.append(path, bytes),
            Namespace::Disk => self.disk.append(path, bytes),
        }
    }

    /// Remove a file. Returns `false` if nothing was removed.
    pub fn remove(&self, path: &str) -> bool {
        match self.namespace(path) {
            Namespace::Virtual => self.memory.remove(path),
            Namespace::Disk => self.disk.remove(path),
        }
    }

    /// Remove a file, reporting why nothing was removed.
    pub fn delete(&self, path: &str) -> Result<()> {
        match self.namespace(path) {
            Namespace::Virtual if self.memory.remove(path) => Ok(()),
            Namespace::Virtual => Err(Error::not_found(path)),
            Namespace::Disk => self.disk.delete(path),
        }
    }

    /// Check if a file exists.
    pub fn exists(&self, path: &str) -> bool {
        match self.namespace(path) {
            Namespace::Virtual => self.memory.exists(path),
            Namespace::Disk => self.disk.exists(path),
        }
    }

    /// Create a directory.
    pub fn mkdir(&self, path: &str) -> Result<()> {
        match self.namespace(path) {
            Namespace::Virtual => self.memory.mkdir(path),
            Namespace::Disk => self.disk.mkdir(path),
        }
    }

    /// Remove a directory and everything below it.
    ///
    /// Callers holding a resource cache go through `Session::rmdir`.
    pub(crate) fn rmdir(&self, path: &str) -> Result<()> {
        match self.namespace(path) {
            Namespace::Virtual => self.memory.rmdir(path).map(drop),
            Namespace::Disk => self.disk.rmdir(path),
        }
    }

    /// Copy a file. Either side may be virtual or on disk.
    pub fn copy(&self, source: &str, target: &str) -> Result<()> {
        match (self.namespace(source), self.namespace(target)) {
            (Namespace::Disk, Namespace::Disk) => self.disk.copy(source, target).map(drop),
            (Namespace::Virtual, Namespace::Virtual) => {
                let bytes = self.memory.read(source)?;
                self.memory.write(target, bytes)
            }
            (Namespace::Disk, Namespace::Virtual) => {
                let bytes = self.disk.read(source)?;
                self.memory.write(target, bytes)
            }
            (Namespace::Virtual, Namespace::Disk) => {
                let bytes = self.memory.read(source)?;
                self.disk.write(target, &bytes)
            }
        }
    }

    /// Move a file. Crossing namespaces copies then deletes the source.
    ///
    /// If the source cannot be deleted the copy is removed and the error
    /// returned, so a failed move leaves only the source behind.
    pub fn rename(&self, old: &str, new: &str) -> Result<()> {
        match (self.namespace(old), self.namespace(new)) {
            (Namespace::Virtual, Namespace::Virtual) => self.memory.rename(old, new),
            (Namespace::Disk, Namespace::Disk) => self.disk.rename(old, new),
            _ => {
                self.copy(old, new)?;
                let deleted = self.delete(old);
                self.settle_move(new, deleted)
            }
        }
    }

    fn settle_move(&self, new: &str, deleted: Result<()>) -> Result<()> {
        deleted.inspect_err(|e| {
            tracing::warn!(target_path = new, error = %e, "move failed, removing copy");
            if let Err(undo) = self.delete(new) {
                tracing::warn!(target_path = new, error = %undo, "copy left behind");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn disk_path(dir: &TempDir, name: &str) -> String {
        dir.path().join(name).to_string_lossy().into_owned()
    }

    #[test]
    fn test_routes_by_prefix() {
        let dir = TempDir::new().unwrap();
        let fs = FileSystem::default();
        let on_disk = disk_path(&dir, "a.txt");

        fs.write("$:a.txt", b"memory").unwrap();
        fs.write(&on_disk, b"disk").unwrap();

        assert_eq!(fs.read("$:a.txt").unwrap(), b"memory");
        assert_eq!(fs.read(&on_disk).unwrap(), b"disk");
        assert_eq!(fs.memory().len(), 1);
    }

    #[test]
    fn test_copy_disk_to_virtual_and_back() {
        let dir = TempDir::new().unwrap();
        let fs = FileSystem::default();
        let source = disk_path(&dir, "corpus.txt");
        let back = disk_path(&dir, "corpus-copy.txt");
        fs.write(&source, "Bonjour le monde".as_bytes()).unwrap();

        fs.copy(&source, "$:data/corpus-vfs-01.txt").unwrap();
        assert_eq!(fs.list("$:data"), vec!["corpus-vfs-01.txt"]);

        fs.copy("$:data/corpus-vfs-01.txt", &back).unwrap();
        assert_eq!(fs.read(&back).unwrap(), b"Bonjour le monde");
    }

    #[test]
    fn test_copy_failures() {
        let dir = TempDir::new().unwrap();
        let fs = FileSystem::default();

        assert!(fs.copy("$:absent", "$:target").unwrap_err().is_not_found());
        assert!(fs.copy(&disk_path(&dir, "absent"), "$:t").unwrap_err().is_not_found());

        fs.write("$:present", b"x").unwrap();
        let orphan = disk_path(&dir, "no/parent/file");
        assert!(fs.copy("$:present", &orphan).unwrap_err().is_not_found());
    }

    #[test]
    fn test_rename_virtual() {
        let fs = FileSystem::default();
        fs.write("$:data/corpus-vfs-01.txt", b"x").unwrap();
        fs.rename("$:data/corpus-vfs-01.txt", "$:data/corpus-vfs-02.txt").unwrap();
        assert_eq!(fs.list("$:data"), vec!["corpus-vfs-02.txt"]);
    }

    #[test]
    fn test_rename_across_namespaces() {
        let dir = TempDir::new().unwrap();
        let fs = FileSystem::default();
        let target = disk_path(&dir, "out.txt");

        fs.write("$:out.txt", b"leaving memory").unwrap();
        fs.rename("$:out.txt", &target).unwrap();

        assert!(!fs.exists("$:out.txt"));
        assert_eq!(fs.read(&target).unwrap(), b"leaving memory");
    }

    #[test]
    fn test_copy_onto_itself() {
        let dir = TempDir::new().unwrap();
        let fs = FileSystem::default();
        let on_disk = disk_path(&dir, "precious.txt");
        fs.write(&on_disk, b"precious").unwrap();
        fs.write("$:precious.txt", b"precious").unwrap();

        fs.copy(&on_disk, &on_disk).unwrap();
        fs.copy("$:precious.txt", "$:precious.txt").unwrap();
        fs.rename(&on_disk, &on_disk).unwrap();

        assert_eq!(fs.read(&on_disk).unwrap(), b"precious");
        assert_eq!(fs.read("$:precious.txt").unwrap(), b"precious");
    }

    #[test]
    fn test_failed_move_keeps_only_source() {
        let dir = TempDir::new().unwrap();
        let fs = FileSystem::default();
        let target = disk_path(&dir, "out.txt");
        fs.write("$:out.txt", b"staying").unwrap();
        fs.copy("$:out.txt", &target).unwrap();

        let denied = Err(Error::PermissionDenied { path: "$:out.txt".into() });
        let err = fs.settle_move(&target, denied).unwrap_err();

        assert!(matches!(err, Error::PermissionDenied { .. }));
        assert!(!fs.exists(&target));
        assert!(fs.exists("$:out.txt"));
    }

    #[test]
    fn test_delete() {
        let dir = TempDir::new().unwrap();
        let fs = FileSystem::default();
        let on_disk = disk_path(&dir, "a.txt");

        assert!(fs.delete("$:absent").unwrap_err().is_not_found());
        assert!(fs.delete(&on_disk).unwrap_err().is_not_found());

        fs.write("$:a.txt", b"x").unwrap();
        fs.write(&on_disk, b"x").unwrap();
        fs.delete("$:a.txt").unwrap();
        fs.delete(&on_disk).unwrap();
        assert!(!fs.exists("$:a.txt") && !fs.exists(&on_disk));
    }

    #[test]
    fn test_mkdir_rmdir_both_namespaces() {
        let dir = TempDir::new().unwrap();
        let fs = FileSystem::default();
        let on_disk = disk_path(&dir, "biniou");

        fs.mkdir(&on_disk).unwrap();
        fs.mkdir("$:biniou").unwrap();
        assert!(fs.disk().is_dir(&on_disk));
        assert!(fs.memory().is_dir("$:biniou"));

        fs.rmdir(&on_disk).unwrap();
        fs.rmdir("$:biniou").unwrap();
        assert!(!fs.disk().is_dir(&on_disk));
        assert!(!fs.memory().is_dir("$:biniou"));
    }

    #[test]
    fn test_clones_share_memory() {
        let fs = FileSystem::default();
        let other = fs.clone();
        fs.write("$:shared", b"1").unwrap();
        assert!(other.exists("$:shared"));
    }
}
