//! Error type shared by the stores, the resource cache and the text layer.

use std::io;

use thiserror::Error;

use crate::resource::ResourceKind;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error type for filesystem and persistent-space operations.
///
/// Query-like operations (`list`, `exists`, `is_persistent`, `remove`) never
/// produce these for a missing target; they answer empty or `false` instead.
///
/// # Example
///
/// ```ignore
/// match session.fs().read("$:corpus.snt") {
///     Ok(bytes) => { /* use bytes */ }
///     Err(e) if e.is_not_found() => { /* nothing there yet */ }
///     Err(e) => eprintln!("{e}"),
/// }
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// The target file does not exist.
    #[error("not found: {path}")]
    NotFound {
        /// Path as given by the caller.
        path: String,
    },

    /// The operating system refused access.
    #[error("permission denied: {path}")]
    PermissionDenied {
        /// Path as given by the caller.
        path: String,
    },

    /// Any other disk-level failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path as given by the caller.
        path: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// A resource could not be decoded for the requested kind.
    #[error("invalid {kind} resource {path}: {reason}")]
    InvalidResource {
        /// Source path of the resource.
        path: String,
        /// Kind the resource was loaded as.
        kind: ResourceKind,
        /// What the validator rejected.
        reason: String,
    },

    /// File content is not valid UTF-8.
    #[error("invalid UTF-8 in {path}")]
    Decode {
        /// Path of the offending file.
        path: String,
    },

    /// Malformed argument at the API boundary.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// Malformed configuration or manifest document.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a not-found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an invalid-resource error.
    pub fn invalid_resource(
        path: impl Into<String>,
        kind: ResourceKind,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidResource {
            path: path.into(),
            kind,
            reason: reason.into(),
        }
    }

    /// Map an OS error for `path` onto the crate taxonomy.
    pub fn from_io(err: io::Error, path: impl Into<String>) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound { path },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source: err },
        }
    }

    /// Check if this error reports a missing target.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_maps_kinds() {
        let err = Error::from_io(io::Error::from(io::ErrorKind::NotFound), "a");
        assert!(err.is_not_found());

        let err = Error::from_io(io::Error::from(io::ErrorKind::PermissionDenied), "b");
        assert!(matches!(err, Error::PermissionDenied { ref path } if path == "b"));

        let err = Error::from_io(io::Error::other("disk on fire"), "c");
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_display() {
        let err = Error::invalid_resource("x.fst2", ResourceKind::Grammar, "empty header");
        assert_eq!(err.to_string(), "invalid grammar resource x.fst2: empty header");
    }
}
