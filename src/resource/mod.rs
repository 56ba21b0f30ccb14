//! Persistent space: decoded linguistic resources shared by handle.
//!
//! - [`kind`]: resource kinds and the handle format
//! - [`decode`]: turning bytes into decoded state
//! - [`cache`]: the reference-counted cache
//! - [`set`]: bulk loading from a manifest

pub mod cache;
pub mod decode;
pub mod kind;
pub mod set;

pub use cache::{EntryInfo, PersistentCache, Unload};
pub use decode::{Alphabet, DecodedResource, Decoder, Dictionary, Grammar, StandardDecoder};
pub use kind::{is_persistent, Handle, ResourceKind};
pub use set::{ResourceManifest, ResourceSet, Slot};
