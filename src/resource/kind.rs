//! Resource kinds and the persistent handle format.
//!
//! A handle spells out the kind and the canonical source path behind the
//! persistent prefix, so loading the same file twice yields the same handle:
//!
//! ```text
//! $persist:dic:/srv/lang/fr/dela.bin
//! $persist:fst2:$:graphs/Sentence.fst2
//! └──┬────┘└┬─┘ └──────┬────────────┘
//!  prefix  tag   canonical source
//! ```

use std::fmt;

use crate::config::Config;

/// Kind of linguistic resource kept in persistent space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// Compressed dictionary (`.bin` with its `.inf`).
    Dictionary,
    /// Compiled grammar (`.fst2`).
    Grammar,
    /// Alphabet definition.
    Alphabet,
}

impl ResourceKind {
    /// All kinds, in a fixed order.
    pub const ALL: [ResourceKind; 3] = [Self::Dictionary, Self::Grammar, Self::Alphabet];

    /// Short tag used inside handles.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Dictionary => "dic",
            Self::Grammar => "fst2",
            Self::Alphabet => "alph",
        }
    }

    /// Look a kind up by its handle tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dictionary => "dictionary",
            Self::Grammar => "grammar",
            Self::Alphabet => "alphabet",
        })
    }
}

/// A reference into persistent space.
///
/// Usable wherever a tool expects a path, and as the argument of
/// [`PersistentCache::unload`](super::PersistentCache::unload).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(String);

impl Handle {
    /// Build the handle for a canonical source path.
    pub fn new(kind: ResourceKind, canonical_source: &str, config: &Config) -> Self {
        Self(format!(
            "{}{}:{}",
            config.persistent_prefix,
            kind.tag(),
            canonical_source
        ))
    }

    /// Wrap an existing handle string without validation.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Split a handle string into its kind and canonical source.
    pub fn parse<'a>(text: &'a str, config: &Config) -> Option<(ResourceKind, &'a str)> {
        let rest = text.strip_prefix(config.persistent_prefix.as_str())?;
        let (tag, source) = rest.split_once(':')?;
        let kind = ResourceKind::from_tag(tag)?;
        (!source.is_empty()).then_some((kind, source))
    }

    /// The handle text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Handle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Handle> for String {
    fn from(handle: Handle) -> Self {
        handle.0
    }
}

/// Check whether `path` has the handle shape for `kind`.
///
/// Pure syntax: the answer does not depend on what is currently loaded.
pub fn is_persistent(kind: ResourceKind, path: &str, config: &Config) -> bool {
    Handle::parse(path, config).is_some_and(|(k, _)| k == kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_roundtrip() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ResourceKind::from_tag("txt"), None);
    }

    #[test]
    fn test_handle_format() {
        let config = Config::default();
        let handle = Handle::new(ResourceKind::Dictionary, "/disk/dic.bin", &config);
        assert_eq!(handle.as_str(), "$persist:dic:/disk/dic.bin");
        assert_eq!(
            Handle::parse(handle.as_str(), &config),
            Some((ResourceKind::Dictionary, "/disk/dic.bin"))
        );
    }

    #[test]
    fn test_handle_with_virtual_source() {
        let config = Config::default();
        let handle = Handle::new(ResourceKind::Grammar, "$:g/Sentence.fst2", &config);
        assert_eq!(
            Handle::parse(handle.as_str(), &config),
            Some((ResourceKind::Grammar, "$:g/Sentence.fst2"))
        );
    }

    #[test]
    fn test_is_persistent_shape_only() {
        let config = Config::default();
        let handle = Handle::new(ResourceKind::Alphabet, "/never/loaded.txt", &config);
        assert!(is_persistent(ResourceKind::Alphabet, handle.as_str(), &config));
        assert!(!is_persistent(ResourceKind::Dictionary, handle.as_str(), &config));
        assert!(!is_persistent(ResourceKind::Alphabet, "/data/Alphabet.txt", &config));
        assert!(!is_persistent(ResourceKind::Alphabet, "$persist:alph:", &config));
        assert!(!is_persistent(ResourceKind::Alphabet, "$persist:xyz:/a", &config));
    }
}
