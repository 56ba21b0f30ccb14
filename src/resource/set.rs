//! Bulk preloading of a language's resources.
//!
//! A [`ResourceManifest`] names the files a processing pipeline needs
//! (alphabets, sentence and replace grammars, dictionaries). A
//! [`ResourceSet`] loads all of them into a [`PersistentCache`] and holds
//! the handles until it is freed or dropped.
//!
//! # Example
//!
//! ```ignore
//! let manifest = ResourceManifest::from_json(r#"{
//!     "language": "fr",
//!     "alphabet": "/lang/fr/Alphabet.txt",
//!     "sentence": "/lang/fr/Sentence.fst2",
//!     "dictionaries": ["/lang/fr/dela-fra-public.bin"]
//! }"#)?;
//! let set = ResourceSet::load(&cache, &manifest)?;
//! let sentence = set.sentence().unwrap(); // pass to tools as a path
//! ```

use std::path::Path;

use serde_json::Value;

use super::cache::PersistentCache;
use super::kind::{Handle, ResourceKind};
use crate::error::{Error, Result};

/// Files making up one language's resources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceManifest {
    /// Language code.
    pub language: String,
    /// Alphabet file.
    pub alphabet: Option<String>,
    /// Sorted alphabet file.
    pub sorted_alphabet: Option<String>,
    /// Sentence segmentation grammar (`.fst2`).
    pub sentence: Option<String>,
    /// Replacement grammar (`.fst2`).
    pub replace: Option<String>,
    /// Dictionaries: `.bin` images or `.fst2` dictionary grammars.
    pub dictionaries: Vec<String>,
}

impl ResourceManifest {
    /// Parse a manifest from JSON.
    ///
    /// Keys: `language` (required), `alphabet`, `alphabet-sort`, `sentence`,
    /// `replace`, `dictionaries`.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        Self::from_json_value(&value)
    }

    /// Build a manifest from a parsed JSON object.
    pub fn from_json_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::Config("resources: expected a JSON object".into()))?;

        let language = optional_str(obj.get("language"), "language")?
            .ok_or_else(|| Error::Config("resources: 'language' is required".into()))?;

        let dictionaries = match obj.get("dictionaries") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_owned).ok_or_else(|| {
                        Error::Config("resources: 'dictionaries' must list paths".into())
                    })
                })
                .collect::<Result<_>>()?,
            Some(_) => {
                return Err(Error::Config(
                    "resources: 'dictionaries' must be a list".into(),
                ));
            }
        };

        let manifest = Self {
            language,
            alphabet: optional_str(obj.get("alphabet"), "alphabet")?,
            sorted_alphabet: optional_str(obj.get("alphabet-sort"), "alphabet-sort")?,
            sentence: optional_str(obj.get("sentence"), "sentence")?,
            replace: optional_str(obj.get("replace"), "replace")?,
            dictionaries,
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check extensions: grammars are `.fst2`, dictionaries `.bin` or `.fst2`.
    pub fn validate(&self) -> Result<()> {
        for grammar in [&self.sentence, &self.replace].into_iter().flatten() {
            if extension(grammar) != Some("fst2") {
                return Err(Error::Config(format!(
                    "resources: grammar '{grammar}' must be a compiled .fst2"
                )));
            }
        }
        for dictionary in &self.dictionaries {
            dictionary_kind(dictionary)?;
        }
        Ok(())
    }

    /// Every declared resource with the kind it loads as, in manifest order.
    pub fn entries(&self) -> Result<Vec<(Slot, ResourceKind, &str)>> {
        let mut entries = Vec::new();
        let singles = [
            (Slot::Alphabet, ResourceKind::Alphabet, &self.alphabet),
            (Slot::SortedAlphabet, ResourceKind::Alphabet, &self.sorted_alphabet),
            (Slot::Sentence, ResourceKind::Grammar, &self.sentence),
            (Slot::Replace, ResourceKind::Grammar, &self.replace),
        ];
        for (slot, kind, path) in singles {
            if let Some(path) = path {
                entries.push((slot, kind, path.as_str()));
            }
        }
        for (i, path) in self.dictionaries.iter().enumerate() {
            entries.push((Slot::Dictionary(i), dictionary_kind(path)?, path.as_str()));
        }
        Ok(entries)
    }
}

/// Role of a resource inside a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// The alphabet.
    Alphabet,
    /// The sorted alphabet.
    SortedAlphabet,
    /// The sentence grammar.
    Sentence,
    /// The replace grammar.
    Replace,
    /// The n-th dictionary.
    Dictionary(usize),
}

fn optional_str(value: Option<&Value>, key: &str) -> Result<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(Error::Config(format!("resources: '{key}' must be a string"))),
    }
}

fn extension(path: &str) -> Option<&str> {
    Path::new(path).extension().and_then(|ext| ext.to_str())
}

fn dictionary_kind(path: &str) -> Result<ResourceKind> {
    match extension(path) {
        Some("bin") => Ok(ResourceKind::Dictionary),
        Some("fst2") => Ok(ResourceKind::Grammar),
        _ => Err(Error::Config(format!(
            "resources: dictionary '{path}' must be a compiled .bin or .fst2"
        ))),
    }
}

/// `.inf` companion of a `.bin` dictionary.
fn inf_companion(path: &str) -> Option<String> {
    path.strip_suffix(".bin").map(|stem| format!("{stem}.inf"))
}

// =============================================================================
// ResourceSet
// =============================================================================

/// Handles of a loaded manifest.
///
/// Every handle holds one reference in the cache; [`free`](Self::free) or
/// drop gives them back.
pub struct ResourceSet<'c> {
    cache: &'c PersistentCache,
    language: String,
    handles: Vec<(Slot, Handle)>,
}

impl<'c> ResourceSet<'c> {
    /// Load every resource of `manifest` into `cache`.
    ///
    /// Resources are loaded in parallel with the `batch` feature. If any
    /// load fails, those that succeeded are unloaded again and the first
    /// error (in manifest order) is returned.
    pub fn load(cache: &'c PersistentCache, manifest: &ResourceManifest) -> Result<Self> {
        let entries = manifest.entries()?;
        let results = load_all(cache, &entries);

        let mut handles = Vec::with_capacity(results.len());
        let mut first_error = None;
        for ((slot, _, _), result) in entries.iter().zip(results) {
            match result {
                Ok(handle) => handles.push((*slot, handle)),
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(_) => {}
            }
        }

        if let Some(e) = first_error {
            tracing::warn!(
                language = %manifest.language,
                rolled_back = handles.len(),
                error = %e,
                "resource set load failed"
            );
            for (_, handle) in &handles {
                cache.unload(handle.as_str());
            }
            return Err(e);
        }

        tracing::info!(language = %manifest.language, resources = handles.len(), "resource set loaded");
        Ok(Self {
            cache,
            language: manifest.language.clone(),
            handles,
        })
    }

    /// Language of the manifest.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Handle in `slot`, if the manifest declared it.
    pub fn get(&self, slot: Slot) -> Option<&Handle> {
        self.handles
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, handle)| handle)
    }

    /// The alphabet handle.
    pub fn alphabet(&self) -> Option<&Handle> {
        self.get(Slot::Alphabet)
    }

    /// The sorted alphabet handle.
    pub fn sorted_alphabet(&self) -> Option<&Handle> {
        self.get(Slot::SortedAlphabet)
    }

    /// The sentence grammar handle.
    pub fn sentence(&self) -> Option<&Handle> {
        self.get(Slot::Sentence)
    }

    /// The replace grammar handle.
    pub fn replace(&self) -> Option<&Handle> {
        self.get(Slot::Replace)
    }

    /// Dictionary handles in manifest order.
    pub fn dictionaries(&self) -> Vec<&Handle> {
        self.handles
            .iter()
            .filter(|(slot, _)| matches!(slot, Slot::Dictionary(_)))
            .map(|(_, handle)| handle)
            .collect()
    }

    /// Number of loaded handles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Check if the manifest declared nothing.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Unload every handle now.
    pub fn free(mut self) {
        self.release();
    }

    fn release(&mut self) {
        for (_, handle) in self.handles.drain(..) {
            self.cache.unload(handle.as_str());
        }
    }
}

impl Drop for ResourceSet<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

fn load_one(cache: &PersistentCache, kind: ResourceKind, path: &str) -> Result<Handle> {
    if kind == ResourceKind::Dictionary
        && let Some(inf) = inf_companion(path)
        && !cache.fs().exists(&inf)
    {
        return Err(Error::invalid_resource(path, kind, "missing .inf companion"));
    }
    cache.load(kind, path)
}

fn load_all(
    cache: &PersistentCache,
    entries: &[(Slot, ResourceKind, &str)],
) -> Vec<Result<Handle>> {
    #[cfg(feature = "batch")]
    {
        use rayon::prelude::*;

        entries
            .par_iter()
            .map(|(_, kind, path)| load_one(cache, *kind, path))
            .collect()
    }

    #[cfg(not(feature = "batch"))]
    {
        entries
            .iter()
            .map(|(_, kind, path)| load_one(cache, *kind, path))
            .collect()
    }
}
