//! Turning resource bytes into decoded, shareable state.
//!
//! The cache does not know any file format; it hands bytes to a [`Decoder`].
//! [`StandardDecoder`] only checks the structure each kind needs to be
//! usable (a dictionary image is non-empty, a grammar announces its graph
//! count, an alphabet lists letters).

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::kind::ResourceKind;
use crate::error::{Error, Result};
use crate::text::decode_utf8;

/// Decodes raw bytes for one resource kind.
///
/// Implementations must be `Send + Sync`: the cache calls them from
/// whichever thread performs the first load of a resource.
pub trait Decoder: Send + Sync {
    /// Decode `bytes` read from `source` as a resource of `kind`.
    ///
    /// Return [`Error::InvalidResource`] for malformed content.
    fn decode(&self, kind: ResourceKind, source: &str, bytes: Vec<u8>)
    -> Result<DecodedResource>;
}

/// Decoded state kept alive in persistent space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedResource {
    /// Dictionary image.
    Dictionary(Dictionary),
    /// Compiled grammar.
    Grammar(Grammar),
    /// Alphabet.
    Alphabet(Alphabet),
}

impl DecodedResource {
    /// Kind of the decoded resource.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Dictionary(_) => ResourceKind::Dictionary,
            Self::Grammar(_) => ResourceKind::Grammar,
            Self::Alphabet(_) => ResourceKind::Alphabet,
        }
    }
}

/// A dictionary image, kept as opaque shared bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    image: Arc<[u8]>,
}

impl Dictionary {
    /// Raw image bytes.
    pub fn image(&self) -> &[u8] {
        &self.image
    }
}

/// A compiled grammar with its header checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    graph_count: u32,
    text: Arc<str>,
}

impl Grammar {
    /// Number of graphs announced by the header.
    pub fn graph_count(&self) -> u32 {
        self.graph_count
    }

    /// Full grammar text (BOM stripped).
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Letters of a language with their case equivalents.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Alphabet {
    letters: FxHashSet<char>,
    lowercase: FxHashMap<char, Vec<char>>,
}

impl Alphabet {
    /// Check if `c` is a letter.
    pub fn contains(&self, c: char) -> bool {
        self.letters.contains(&c)
    }

    /// Lower-case equivalents declared for `upper`.
    pub fn lowercase_of(&self, upper: char) -> &[char] {
        self.lowercase.get(&upper).map_or(&[], Vec::as_slice)
    }

    /// Number of distinct letters.
    pub fn len(&self) -> usize {
        self.letters.len()
    }

    /// Check if no letter is defined.
    pub fn is_empty(&self) -> bool {
        self.letters.is_empty()
    }
}

// =============================================================================
// StandardDecoder
// =============================================================================

/// Structural decoder for the three built-in kinds.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDecoder;

impl Decoder for StandardDecoder {
    fn decode(
        &self,
        kind: ResourceKind,
        source: &str,
        bytes: Vec<u8>,
    ) -> Result<DecodedResource> {
        let invalid = |reason: &str| Error::invalid_resource(source, kind, reason);
        match kind {
            ResourceKind::Dictionary => {
                if bytes.is_empty() {
                    return Err(invalid("empty dictionary image"));
                }
                Ok(DecodedResource::Dictionary(Dictionary {
                    image: bytes.into(),
                }))
            }
            ResourceKind::Grammar => {
                let text = decode_utf8(&bytes).ok_or_else(|| invalid("not UTF-8 text"))?;
                let graph_count = parse_graph_count(text).map_err(invalid)?;
                Ok(DecodedResource::Grammar(Grammar {
                    graph_count,
                    text: text.into(),
                }))
            }
            ResourceKind::Alphabet => {
                let text = decode_utf8(&bytes).ok_or_else(|| invalid("not UTF-8 text"))?;
                parse_alphabet(text)
                    .map(DecodedResource::Alphabet)
                    .map_err(invalid)
            }
        }
    }
}

/// Read the graph count from the first line of a grammar.
///
/// The header may carry a sign; its magnitude is the count.
fn parse_graph_count(text: &str) -> Result<u32, &'static str> {
    let header = text.lines().next().map(str::trim).unwrap_or_default();
    if header.is_empty() {
        return Err("missing graph count header");
    }
    let count: i64 = header.parse().map_err(|_| "graph count header is not a number")?;
    match u32::try_from(count.unsigned_abs()) {
        Ok(0) => Err("grammar declares no graphs"),
        Ok(n) => Ok(n),
        Err(_) => Err("graph count out of range"),
    }
}

/// Parse alphabet lines.
///
/// `#XY` adds the inclusive range X..=Y; any other line is an upper-case
/// letter followed by its lower-case equivalents.
fn parse_alphabet(text: &str) -> Result<Alphabet, &'static str> {
    let mut alphabet = Alphabet::default();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        let chars: Vec<char> = line.chars().collect();
        match chars.as_slice() {
            [] => {}
            ['#', start, end] => {
                if start > end {
                    return Err("alphabet range is reversed");
                }
                alphabet.letters.extend(*start..=*end);
            }
            [upper, lower @ ..] => {
                alphabet.letters.insert(*upper);
                alphabet.letters.extend(lower.iter().copied());
                if !lower.is_empty() {
                    alphabet
                        .lowercase
                        .entry(*upper)
                        .or_default()
                        .extend_from_slice(lower);
                }
            }
        }
    }
    if alphabet.is_empty() {
        return Err("alphabet defines no letters");
    }
    Ok(alphabet)
}
