//! Dual-namespace file storage.
//!
//! - [`VirtualStore`]: files held in process memory (`$:` paths)
//! - [`DiskBridge`]: the real filesystem (native paths)
//! - [`FileSystem`]: routes each call to one of the two by path syntax

mod disk;
mod memory;
mod route;

pub use disk::DiskBridge;
pub use memory::{FileStat, VirtualFile, VirtualStore};
pub use route::FileSystem;
