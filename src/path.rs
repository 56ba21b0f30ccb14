//! Path classification and normalization.
//!
//! Every path string belongs to exactly one [`Namespace`]. The decision is
//! purely syntactic: a path that starts with the configured virtual prefix
//! (`$:` by default) lives in the in-memory store, anything else is a disk
//! path. Existence is never consulted.
//!
//! ```text
//! "$:data/corpus.txt"   ──► Virtual  (key "data/corpus.txt")
//! "data/corpus.txt"     ──► Disk     (normalized against the cwd)
//! "$persist:dic:/x.bin" ──► Disk     (a handle; see resource::kind)
//! ```

use std::path::{Component, Path, PathBuf};

use crate::config::Config;

/// Storage namespace of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// In-process virtual file store.
    Virtual,
    /// Real filesystem.
    Disk,
}

/// Classify a path by its syntax.
///
/// Total: malformed input (empty, embedded NUL) classifies as
/// [`Namespace::Disk`] and is rejected later by the disk bridge.
#[inline]
pub fn classify(path: &str, config: &Config) -> Namespace {
    if path.starts_with(config.virtual_prefix.as_str()) {
        Namespace::Virtual
    } else {
        Namespace::Disk
    }
}

/// Check whether a disk path string can never name a file.
#[inline]
pub fn is_malformed(path: &str) -> bool {
    path.is_empty() || path.contains('\0')
}

/// Compute the virtual store key of a path.
///
/// Strips the virtual prefix if present, then normalizes separators,
/// `.` and `..` components. The root directory has the empty key.
pub fn virtual_key(path: &str, config: &Config) -> String {
    let raw = path
        .strip_prefix(config.virtual_prefix.as_str())
        .unwrap_or(path);
    normalize_key(raw)
}

/// Normalize a virtual key: `/`-joined, no empty, `.` or `..` components.
pub fn normalize_key(raw: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in raw.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }
    parts.join("/")
}

/// Split a virtual key into its parent key and file name.
#[inline]
pub fn split_key(key: &str) -> (&str, &str) {
    match key.rfind('/') {
        Some(pos) => (&key[..pos], &key[pos + 1..]),
        None => ("", key),
    }
}

/// Check whether `key` lies inside the directory `dir` (both normalized).
#[inline]
pub fn key_within(key: &str, dir: &str) -> bool {
    dir.is_empty()
        || key
            .strip_prefix(dir)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to joining with the current directory and cleaning the
/// components lexically, so missing files still get a stable form.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        };
        clean(&absolute)
    })
}

/// Lexically resolve `.` and `..` components.
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Namespace-aware canonical form of a path.
///
/// Virtual paths become `prefix + key`, disk paths their normalized absolute
/// spelling. Two spellings of the same file map to the same string.
pub fn canonical(path: &str, config: &Config) -> String {
    match classify(path, config) {
        Namespace::Virtual => format!("{}{}", config.virtual_prefix, virtual_key(path, config)),
        Namespace::Disk => normalize_path(Path::new(path))
            .to_string_lossy()
            .into_owned(),
    }
}

/// Check whether the canonical path `path` lies inside canonical `dir`.
pub fn is_within(path: &str, dir: &str, config: &Config) -> bool {
    match (classify(path, config), classify(dir, config)) {
        (Namespace::Virtual, Namespace::Virtual) => {
            key_within(&virtual_key(path, config), &virtual_key(dir, config))
        }
        (Namespace::Disk, Namespace::Disk) => Path::new(path).starts_with(dir),
        _ => false,
    }
}
