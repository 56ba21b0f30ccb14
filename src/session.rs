//! The surface an adapter binds to.
//!
//! A [`Session`] owns one [`FileSystem`], one [`PersistentCache`] and one
//! [`Console`]. Sessions are fully isolated from each other; clone the
//! file system out of a session to share its virtual store.
//!
//! ```ignore
//! let session = Session::default();
//! session.cp("/corpus/fr/Balzac.txt", "$:data/corpus-vfs-01.txt")?;
//! let alphabet = session.load_alphabet("/lang/fr/Alphabet.txt")?;
//! // ... run tools against "$:data/..." and `alphabet` ...
//! session.free_alphabet(alphabet.as_str());
//! session.rmdir("$:data")?;
//! ```

use crate::config::{self, Config};
use crate::console::Console;
use crate::error::Result;
use crate::path;
use crate::resource::{Decoder, Handle, PersistentCache, ResourceKind, Unload};
use crate::status::ReturnCode;
use crate::store::FileSystem;
use crate::text::{self, OpenMode, TextFile};

/// File system, persistent space and console switches of one process.
pub struct Session {
    fs: FileSystem,
    cache: PersistentCache,
    console: Console,
}

impl Default for Session {
    /// A session using the process-wide configuration ([`config::get`]).
    fn default() -> Self {
        Self::new(config::get().clone())
    }
}

impl Session {
    /// Create a session with the standard decoder.
    pub fn new(config: Config) -> Self {
        let fs = FileSystem::new(config);
        Self {
            cache: PersistentCache::new(fs.clone()),
            fs,
            console: Console::new(),
        }
    }

    /// Create a session with a custom decoder.
    pub fn with_decoder<D: Decoder + 'static>(config: Config, decoder: D) -> Self {
        let fs = FileSystem::new(config);
        Self {
            cache: PersistentCache::with_decoder(fs.clone(), decoder),
            fs,
            console: Console::new(),
        }
    }

    /// Configuration of this session.
    #[inline]
    pub fn config(&self) -> &Config {
        self.fs.config()
    }

    /// The routing file system.
    #[inline]
    pub fn fs(&self) -> &FileSystem {
        &self.fs
    }

    /// Persistent space.
    #[inline]
    pub fn cache(&self) -> &PersistentCache {
        &self.cache
    }

    /// Tool output switches.
    #[inline]
    pub fn console(&self) -> &Console {
        &self.console
    }

    /// Native status-code view of this session.
    pub fn codes(&self) -> Codes<'_> {
        Codes(self)
    }

    // =========================================================================
    // File operations
    // =========================================================================

    /// Copy a file; either side may be virtual.
    pub fn cp(&self, source: &str, target: &str) -> Result<()> {
        tracing::debug!(source, target, "cp");
        self.fs.copy(source, target)
    }

    /// Remove a file. Returns `false` if there was nothing to remove.
    pub fn rm(&self, path: &str) -> bool {
        tracing::debug!(path, "rm");
        self.fs.remove(path)
    }

    /// Move a file; either side may be virtual.
    pub fn mv(&self, old: &str, new: &str) -> Result<()> {
        tracing::debug!(old, new, "mv");
        self.fs.rename(old, new)
    }

    /// Create a directory (recursively on disk).
    pub fn mkdir(&self, path: &str) -> Result<()> {
        tracing::debug!(path, "mkdir");
        self.fs.mkdir(path)
    }

    /// Remove a directory with its content.
    ///
    /// Resources loaded from inside it are dropped from persistent space.
    /// The file system handed out by [`Session::fs`] has no directory
    /// removal of its own:
    ///
    /// ```compile_fail
    /// let session = lexvfs::Session::default();
    /// session.fs().rmdir("$:data").unwrap();
    /// ```
    pub fn rmdir(&self, path: &str) -> Result<()> {
        tracing::debug!(path, "rmdir");
        // Resolve before removal, while the directory still canonicalizes.
        let dir = path::canonical(path, self.config());
        self.fs.rmdir(path)?;
        let invalidated = self.cache.invalidate_within(&dir);
        if invalidated > 0 {
            tracing::info!(path, invalidated, "resources dropped with their directory");
        }
        Ok(())
    }

    /// File names directly inside a directory.
    pub fn ls(&self, path: &str) -> Vec<String> {
        self.fs.list(path)
    }

    /// Check if a file exists.
    pub fn exists(&self, path: &str) -> bool {
        self.fs.exists(path)
    }

    // =========================================================================
    // Text I/O
    // =========================================================================

    /// Read a UTF-8 file, BOM stripped.
    pub fn read_text(&self, path: &str) -> Result<String> {
        text::read_text(&self.fs, path)
    }

    /// Replace a file with UTF-8 text.
    pub fn write_text(&self, path: &str, text: &str, with_bom: bool) -> Result<()> {
        text::write_text(&self.fs, path, text, with_bom)
    }

    /// Append UTF-8 text to an existing file.
    pub fn append_text(&self, path: &str, text: &str) -> Result<()> {
        text::append_text(&self.fs, path, text)
    }

    /// Open a text file in `mode`.
    pub fn open(&self, path: &str, mode: OpenMode) -> Result<TextFile> {
        TextFile::open(&self.fs, path, mode)
    }

    // =========================================================================
    // Persistent space
    // =========================================================================

    /// Load a `.bin` dictionary into persistent space.
    pub fn load_dictionary(&self, path: &str) -> Result<Handle> {
        self.cache.load(ResourceKind::Dictionary, path)
    }

    /// Load an `.fst2` grammar into persistent space.
    pub fn load_grammar(&self, path: &str) -> Result<Handle> {
        self.cache.load(ResourceKind::Grammar, path)
    }

    /// Load an alphabet into persistent space.
    pub fn load_alphabet(&self, path: &str) -> Result<Handle> {
        self.cache.load(ResourceKind::Alphabet, path)
    }

    /// Release a dictionary handle.
    pub fn free_dictionary(&self, handle: &str) -> Unload {
        self.free(ResourceKind::Dictionary, handle)
    }

    /// Release a grammar handle.
    pub fn free_grammar(&self, handle: &str) -> Unload {
        self.free(ResourceKind::Grammar, handle)
    }

    /// Release an alphabet handle.
    pub fn free_alphabet(&self, handle: &str) -> Unload {
        self.free(ResourceKind::Alphabet, handle)
    }

    /// Check for the dictionary handle shape.
    pub fn is_persistent_dictionary(&self, path: &str) -> bool {
        self.cache.is_persistent(ResourceKind::Dictionary, path)
    }

    /// Check for the grammar handle shape.
    pub fn is_persistent_grammar(&self, path: &str) -> bool {
        self.cache.is_persistent(ResourceKind::Grammar, path)
    }

    /// Check for the alphabet handle shape.
    pub fn is_persistent_alphabet(&self, path: &str) -> bool {
        self.cache.is_persistent(ResourceKind::Alphabet, path)
    }

    /// Unload a handle of `kind`. Handles of another kind are ignored.
    fn free(&self, kind: ResourceKind, handle: &str) -> Unload {
        if !self.cache.is_persistent(kind, handle) {
            tracing::debug!(%kind, handle, "free ignored: not a handle of this kind");
            return Unload::Unknown;
        }
        self.cache.unload(handle)
    }
}

/// Status-code variants of the session operations.
///
/// Effecting operations answer `0` on success; predicates answer non-zero
/// for true.
#[derive(Clone, Copy)]
pub struct Codes<'s>(&'s Session);

impl Codes<'_> {
    /// See [`Session::cp`].
    pub fn cp(self, source: &str, target: &str) -> ReturnCode {
        ReturnCode::from_result(&self.0.cp(source, target))
    }

    /// `0` if a file was removed.
    pub fn rm(self, path: &str) -> ReturnCode {
        if self.0.rm(path) {
            ReturnCode::SUCCESS
        } else {
            ReturnCode::FAILURE
        }
    }

    /// See [`Session::mv`].
    pub fn mv(self, old: &str, new: &str) -> ReturnCode {
        ReturnCode::from_result(&self.0.mv(old, new))
    }

    /// See [`Session::mkdir`].
    pub fn mkdir(self, path: &str) -> ReturnCode {
        ReturnCode::from_result(&self.0.mkdir(path))
    }

    /// See [`Session::rmdir`].
    pub fn rmdir(self, path: &str) -> ReturnCode {
        ReturnCode::from_result(&self.0.rmdir(path))
    }

    /// Non-zero if `path` has the handle shape for `kind`.
    pub fn is_persistent(self, kind: ResourceKind, path: &str) -> ReturnCode {
        ReturnCode::from_bool(self.0.cache.is_persistent(kind, path))
    }
}
