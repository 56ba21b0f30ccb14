//! In-memory virtual file store.
//!
//! # Layout
//!
//! ```text
//! VirtualStore
//! ├── shards: [RwLock<Shard>; N]     (shard = hash(parent key) % N)
//! │   └── Shard
//! │       └── FxHashMap<parent key, BTreeMap<name, VirtualFile>>
//! └── dirs: RwLock<FxHashSet<key>>    (explicit and implied directories)
//! ```
//!
//! All children of one directory live in the same shard, so `list` touches a
//! single lock and writers in unrelated directories do not contend.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockWriteGuard};
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::path::{key_within, normalize_key, split_key};

// =============================================================================
// VirtualFile
// =============================================================================

/// A file held in process memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualFile {
    path: String,
    bytes: Vec<u8>,
    modified: DateTime<Utc>,
}

impl VirtualFile {
    fn new(path: String, bytes: Vec<u8>) -> Self {
        Self {
            path,
            bytes,
            modified: Utc::now(),
        }
    }

    /// Full virtual path, including the root marker.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// File content.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Content length in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Time of the last write or append.
    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }
}

/// Metadata snapshot of a virtual file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    /// Full virtual path.
    pub path: String,
    /// Content length in bytes.
    pub size: usize,
    /// Time of the last write or append.
    pub modified: DateTime<Utc>,
}

type Shard = FxHashMap<String, BTreeMap<String, VirtualFile>>;

// =============================================================================
// VirtualStore
// =============================================================================

/// Named-blob store addressed with virtual paths.
///
/// Accepts paths with or without the virtual root marker; both spellings
/// address the same file.
pub struct VirtualStore {
    prefix: String,
    shards: Box<[RwLock<Shard>]>,
    dirs: RwLock<FxHashSet<String>>,
}

impl Default for VirtualStore {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl VirtualStore {
    /// Create an empty store.
    pub fn new(config: &Config) -> Self {
        let shards = (0..config.shards.max(1))
            .map(|_| RwLock::new(Shard::default()))
            .collect();
        Self {
            prefix: config.virtual_prefix.clone(),
            shards,
            dirs: RwLock::new(FxHashSet::default()),
        }
    }

    fn key(&self, path: &str) -> String {
        let raw = path.strip_prefix(self.prefix.as_str()).unwrap_or(path);
        normalize_key(raw)
    }

    fn full_path(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn shard_index(&self, parent: &str) -> usize {
        let mut hasher = FxHasher::default();
        parent.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    fn shard(&self, parent: &str) -> &RwLock<Shard> {
        &self.shards[self.shard_index(parent)]
    }

    /// Register `key` and every ancestor as directory nodes.
    fn ensure_dirs(&self, key: &str) {
        let missing = {
            let dirs = self.dirs.read();
            !ancestors(key).all(|dir| dirs.contains(dir))
        };
        if missing {
            let mut dirs = self.dirs.write();
            for dir in ancestors(key) {
                if !dirs.contains(dir) {
                    dirs.insert(dir.to_string());
                }
            }
        }
    }

    fn file_key(&self, path: &str) -> Result<String> {
        let key = self.key(path);
        if key.is_empty() {
            return Err(Error::Argument(format!("'{path}' names the virtual root")));
        }
        if self.dirs.read().contains(&key) {
            return Err(Error::Argument(format!("'{path}' is a directory")));
        }
        self.check_dir_path(path, split_key(&key).0)?;
        Ok(key)
    }

    fn has_file(&self, key: &str) -> bool {
        let (parent, name) = split_key(key);
        self.shard(parent)
            .read()
            .get(parent)
            .is_some_and(|files| files.contains_key(name))
    }

    /// A directory key and its ancestors must not name files.
    fn check_dir_path(&self, path: &str, dir: &str) -> Result<()> {
        match ancestors(dir).find(|ancestor| self.has_file(ancestor)) {
            Some(file) => Err(Error::Argument(format!(
                "'{path}' is below the file '{}'",
                self.full_path(file)
            ))),
            None => Ok(()),
        }
    }

    /// List the names of files directly inside `path`, sorted.
    ///
    /// A missing or empty directory yields an empty list.
    pub fn list(&self, path: &str) -> Vec<String> {
        let dir = self.key(path);
        self.shard(&dir)
            .read()
            .get(&dir)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Read the full content of a file.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let key = self.key(path);
        let (parent, name) = split_key(&key);
        self.shard(parent)
            .read()
            .get(parent)
            .and_then(|files| files.get(name))
            .map(|file| file.bytes.clone())
            .ok_or_else(|| Error::not_found(path))
    }

    /// Copy of a whole file entry, if it exists.
    pub fn get(&self, path: &str) -> Option<VirtualFile> {
        let key = self.key(path);
        let (parent, name) = split_key(&key);
        self.shard(parent)
            .read()
            .get(parent)
            .and_then(|files| files.get(name))
            .cloned()
    }

    /// Metadata of a file, if it exists.
    pub fn stat(&self, path: &str) -> Option<FileStat> {
        let key = self.key(path);
        let (parent, name) = split_key(&key);
        self.shard(parent)
            .read()
            .get(parent)
            .and_then(|files| files.get(name))
            .map(|file| FileStat {
                path: file.path.clone(),
                size: file.size(),
                modified: file.modified,
            })
    }

    /// Check if a file exists.
    pub fn exists(&self, path: &str) -> bool {
        self.stat(path).is_some()
    }

    /// Check if a directory node exists.
    pub fn is_dir(&self, path: &str) -> bool {
        let key = self.key(path);
        key.is_empty() || self.dirs.read().contains(&key)
    }

    /// Create or fully replace a file.
    ///
    /// Fails with `Argument` when `path` is a directory or lies below a file.
    pub fn write(&self, path: &str, bytes: impl Into<Vec<u8>>) -> Result<()> {
        let key = self.file_key(path)?;
        let (parent, name) = split_key(&key);
        self.ensure_dirs(parent);

        let file = VirtualFile::new(self.full_path(&key), bytes.into());
        tracing::debug!(path = %file.path, size = file.size(), "virtual write");
        self.shard(parent)
            .write()
            .entry(parent.to_string())
            .or_default()
            .insert(name.to_string(), file);
        Ok(())
    }

    /// Append to an existing file. Never creates the file.
    pub fn append(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let key = self.key(path);
        let (parent, name) = split_key(&key);
        let mut shard = self.shard(parent).write();
        let file = shard
            .get_mut(parent)
            .and_then(|files| files.get_mut(name))
            .ok_or_else(|| Error::not_found(path))?;
        file.bytes.extend_from_slice(bytes);
        file.modified = Utc::now();
        tracing::debug!(path = %file.path, added = bytes.len(), "virtual append");
        Ok(())
    }

    /// Remove a file. Returns `false` if it did not exist.
    pub fn remove(&self, path: &str) -> bool {
        let key = self.key(path);
        let (parent, name) = split_key(&key);
        let mut shard = self.shard(parent).write();
        let removed = take(&mut shard, parent, name).is_some();
        if removed {
            tracing::debug!(path = %self.full_path(&key), "virtual remove");
        }
        removed
    }

    /// Move a file to a new path, replacing any file already there.
    pub fn rename(&self, old: &str, new: &str) -> Result<()> {
        let old_key = self.key(old);
        let new_key = self.file_key(new)?;
        if old_key == new_key {
            return if self.exists(old) {
                Ok(())
            } else {
                Err(Error::not_found(old))
            };
        }

        let (old_parent, old_name) = split_key(&old_key);
        let (new_parent, new_name) = split_key(&new_key);
        self.ensure_dirs(new_parent);

        let (i, j) = (self.shard_index(old_parent), self.shard_index(new_parent));
        let (mut src, mut dst) = lock_pair(&self.shards, i, j);

        let mut file = take(&mut src, old_parent, old_name).ok_or_else(|| Error::not_found(old))?;
        file.path = self.full_path(&new_key);
        let target = match dst.as_mut() {
            Some(guard) => &mut **guard,
            None => &mut *src,
        };
        target
            .entry(new_parent.to_string())
            .or_default()
            .insert(new_name.to_string(), file);

        tracing::debug!(from = %old, to = %new, "virtual rename");
        Ok(())
    }

    /// Create a directory node and its ancestors.
    ///
    /// Fails with `Argument` if the path or one of its ancestors is a file.
    pub fn mkdir(&self, path: &str) -> Result<()> {
        let key = self.key(path);
        self.check_dir_path(path, &key)?;
        self.ensure_dirs(&key);
        Ok(())
    }

    /// Remove a directory and every file below it.
    ///
    /// Returns the number of files removed. Fails with `NotFound` when
    /// neither a directory node nor any file exists under `path`.
    ///
    /// Crate-private: removal must go through the session so that cached
    /// resources inside the directory are invalidated.
    pub(crate) fn rmdir(&self, path: &str) -> Result<usize> {
        let dir = self.key(path);

        let mut removed = 0;
        for shard in self.shards.iter() {
            shard.write().retain(|parent, files| {
                if key_within(parent, &dir) {
                    removed += files.len();
                    false
                } else {
                    true
                }
            });
        }

        let had_node = {
            let mut dirs = self.dirs.write();
            let before = dirs.len();
            dirs.retain(|d| !key_within(d, &dir));
            dirs.len() != before
        };

        if !had_node && removed == 0 && !dir.is_empty() {
            return Err(Error::not_found(path));
        }
        tracing::debug!(path = %self.full_path(&dir), files = removed, "virtual rmdir");
        Ok(removed)
    }

    /// All file paths in the store, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .shards
            .iter()
            .flat_map(|shard| {
                shard
                    .read()
                    .values()
                    .flat_map(|files| files.values().map(|f| f.path.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        paths.sort();
        paths
    }

    /// Number of files in the store.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.read().values().map(BTreeMap::len).sum::<usize>())
            .sum()
    }

    /// Check if the store holds no files.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every file and directory node.
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.write().clear();
        }
        self.dirs.write().clear();
    }
}

/// Non-empty ancestors of a key, including the key itself.
fn ancestors(key: &str) -> impl Iterator<Item = &str> {
    key.match_indices('/')
        .map(move |(pos, _)| &key[..pos])
        .chain((!key.is_empty()).then_some(key))
}

fn take(shard: &mut Shard, parent: &str, name: &str) -> Option<VirtualFile> {
    let files = shard.get_mut(parent)?;
    let file = files.remove(name)?;
    if files.is_empty() {
        shard.remove(parent);
    }
    Some(file)
}

/// Lock two shards for writing in index order.
///
/// The second guard is `None` when both indices name the same shard.
fn lock_pair(
    shards: &[RwLock<Shard>],
    i: usize,
    j: usize,
) -> (RwLockWriteGuard<'_, Shard>, Option<RwLockWriteGuard<'_, Shard>>) {
    if i == j {
        (shards[i].write(), None)
    } else if i < j {
        let first = shards[i].write();
        let second = shards[j].write();
        (first, Some(second))
    } else {
        let second = shards[j].write();
        let first = shards[i].write();
        (first, Some(second))
    }
}
