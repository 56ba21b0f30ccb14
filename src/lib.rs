//! # lexvfs
//!
//! A dual-namespace file system and a persistent resource cache for
//! linguistic processing tools.
//!
//! Tools read and write files by path. This crate lets a caller keep some of
//! those files in memory and keep decoded resources resident between tool
//! runs, without the tools knowing:
//!
//! - **Virtual files**: paths starting with `$:` live in an in-process store
//! - **Disk files**: every other path goes to the real filesystem
//! - **Persistent space**: dictionaries, grammars and alphabets decoded once,
//!   shared by handle, reference counted
//!
//! ## Quick Start
//!
//! ```
//! use lexvfs::{Config, Session};
//!
//! let session = Session::new(Config::default());
//! session.write_text("$:fr/Alphabet.txt", "#az\nAa\n", true).unwrap();
//!
//! let alphabet = session.load_alphabet("$:fr/Alphabet.txt").unwrap();
//! assert!(session.is_persistent_alphabet(alphabet.as_str()));
//! assert_eq!(alphabet, session.load_alphabet("$:fr/Alphabet.txt").unwrap());
//!
//! session.free_alphabet(alphabet.as_str());
//! session.free_alphabet(alphabet.as_str());
//! assert!(session.cache().is_empty());
//! ```
//!
//! ## Modules
//!
//! - [`session`]: the facade an adapter binds to
//! - [`store`]: virtual store, disk bridge and the namespace router
//! - [`resource`]: persistent cache, decoders and resource sets
//! - [`text`]: UTF-8 text I/O with BOM handling
//! - [`path`]: classification and normalization of path strings
//! - [`status`]: native integer status codes
//! - [`config`]: runtime configuration
//! - [`logging`]: subscriber setup (`logging` feature)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod console;
pub mod error;
pub mod logging;
pub mod path;
pub mod resource;
pub mod session;
pub mod status;
pub mod store;
pub mod text;

// =============================================================================
// Prelude - import commonly used items with a single `use`
// =============================================================================

/// Prelude module for convenient imports.
///
/// ```ignore
/// use lexvfs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Config, ConfigBuilder, Console, Error, FileSystem, Handle, OpenMode, PersistentCache,
        ResourceKind, ResourceManifest, ResourceSet, Result, ReturnCode, Session, Stream,
        TextFile, Unload,
    };
}

// =============================================================================
// Session
// =============================================================================

pub use session::{Codes, Session};

// =============================================================================
// Storage
// =============================================================================

pub use path::Namespace;
pub use store::{DiskBridge, FileStat, FileSystem, VirtualFile, VirtualStore};
pub use text::{OpenMode, TextFile, append_text, read_text, write_text};

// =============================================================================
// Persistent space
// =============================================================================

pub use resource::{
    DecodedResource, Decoder, EntryInfo, Handle, PersistentCache, ResourceKind,
    ResourceManifest, ResourceSet, StandardDecoder, Unload,
};

// =============================================================================
// Infrastructure
// =============================================================================

pub use config::{Config, ConfigBuilder};
pub use console::{Console, Stream};
pub use error::{Error, Result};
pub use status::ReturnCode;
