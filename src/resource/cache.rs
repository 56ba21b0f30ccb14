//! Reference-counted cache of decoded resources.
//!
//! # Locking
//!
//! ```text
//! PersistentCache
//! └── slots: RwLock<FxHashMap<(kind, canonical source), Arc<Mutex<Slot>>>>
//!     └── Slot
//!         ├── entry: Option<Entry>   (handle, ref_count, decoded resource)
//!         └── retired: bool          (slot left the map; callers must retry)
//! ```
//!
//! The map lock is only held to find, insert or remove a slot. Reading and
//! decoding happen under the slot's own mutex, so concurrent loads of one
//! resource decode it once while loads of other resources carry on.
//!
//! A slot is retired (and removed from the map) when its last reference is
//! unloaded, when its first load fails, or when its directory is removed.
//! A caller that was waiting on a retired slot starts over with a fresh one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use super::decode::{DecodedResource, Decoder, StandardDecoder};
use super::kind::{self, Handle, ResourceKind};
use crate::error::Result;
use crate::path;
use crate::store::FileSystem;

type SlotKey = (ResourceKind, String);

struct Entry {
    handle: Handle,
    ref_count: u32,
    loaded_at: DateTime<Utc>,
    resource: Arc<DecodedResource>,
}

#[derive(Default)]
struct Slot {
    entry: Option<Entry>,
    retired: bool,
}

/// Public view of a live cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Handle returned to callers.
    pub handle: Handle,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Canonical source path.
    pub source: String,
    /// Outstanding loads.
    pub ref_count: u32,
    /// Time of the first (decoding) load.
    pub loaded_at: DateTime<Utc>,
}

/// What an [`unload`](PersistentCache::unload) call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unload {
    /// One reference dropped; this many remain.
    Retained(u32),
    /// Last reference dropped; decoded state freed.
    Released,
    /// Nothing is loaded under this handle.
    Unknown,
}

/// Persistent space: decoded resources shared by handle.
///
/// Owned and injectable; create as many isolated caches as needed.
/// Dropping the cache releases every live entry.
pub struct PersistentCache {
    fs: FileSystem,
    decoder: Arc<dyn Decoder>,
    slots: RwLock<FxHashMap<SlotKey, Arc<Mutex<Slot>>>>,
}

impl PersistentCache {
    /// Create a cache reading through `fs` with the standard decoder.
    pub fn new(fs: FileSystem) -> Self {
        Self::with_decoder(fs, StandardDecoder)
    }

    /// Create a cache with a custom decoder.
    pub fn with_decoder<D: Decoder + 'static>(fs: FileSystem, decoder: D) -> Self {
        Self {
            fs,
            decoder: Arc::new(decoder),
            slots: RwLock::new(FxHashMap::default()),
        }
    }

    /// The file system resources are read from.
    pub fn fs(&self) -> &FileSystem {
        &self.fs
    }

    fn slot(&self, key: &SlotKey) -> Arc<Mutex<Slot>> {
        if let Some(slot) = self.slots.read().get(key) {
            return Arc::clone(slot);
        }
        Arc::clone(self.slots.write().entry(key.clone()).or_default())
    }

    fn lookup(&self, handle: &str) -> Option<(SlotKey, Arc<Mutex<Slot>>)> {
        let (kind, source) = Handle::parse(handle, self.fs.config())?;
        let key = (kind, source.to_string());
        let slot = Arc::clone(self.slots.read().get(&key)?);
        Some((key, slot))
    }

    /// Remove `slot` from the map unless it was already replaced.
    fn forget(&self, key: &SlotKey, slot: &Arc<Mutex<Slot>>) {
        let mut slots = self.slots.write();
        if slots.get(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(key);
        }
    }

    /// Load a resource into persistent space and return its handle.
    ///
    /// The first load of a `(kind, source)` pair reads and decodes the file;
    /// later loads only bump the reference count and return the same handle.
    /// A failed load leaves the cache unchanged.
    pub fn load(&self, kind: ResourceKind, source: &str) -> Result<Handle> {
        let canonical = path::canonical(source, self.fs.config());
        let key = (kind, canonical);

        loop {
            let slot = self.slot(&key);
            let mut guard = slot.lock();
            if guard.retired {
                continue;
            }

            if let Some(entry) = guard.entry.as_mut() {
                entry.ref_count += 1;
                tracing::debug!(handle = %entry.handle, refs = entry.ref_count, "persistent reuse");
                return Ok(entry.handle.clone());
            }

            let decoded = self
                .fs
                .read(&key.1)
                .and_then(|bytes| self.decoder.decode(kind, &key.1, bytes));

            match decoded {
                Ok(resource) => {
                    let handle = Handle::new(kind, &key.1, self.fs.config());
                    tracing::info!(%handle, "persistent load");
                    guard.entry = Some(Entry {
                        handle: handle.clone(),
                        ref_count: 1,
                        loaded_at: Utc::now(),
                        resource: Arc::new(resource),
                    });
                    return Ok(handle);
                }
                Err(e) => {
                    guard.retired = true;
                    drop(guard);
                    self.forget(&key, &slot);
                    tracing::debug!(%kind, source, error = %e, "persistent load failed");
                    return Err(e);
                }
            }
        }
    }

    /// Drop one reference to a loaded resource.
    ///
    /// Strings that are not handles are ignored. Unloading a handle more
    /// times than it was loaded is ignored too, and logged as a warning.
    pub fn unload(&self, handle: &str) -> Unload {
        if Handle::parse(handle, self.fs.config()).is_none() {
            tracing::debug!(handle, "unload of non-handle ignored");
            return Unload::Unknown;
        }
        let over_unload = || {
            tracing::warn!(handle, "over-unload ignored, no live entry");
            Unload::Unknown
        };
        let Some((key, slot)) = self.lookup(handle) else {
            return over_unload();
        };

        let mut guard = slot.lock();
        if guard.retired {
            return over_unload();
        }
        let Some(entry) = guard.entry.as_mut() else {
            return over_unload();
        };

        // Entries leave the map at zero, so a live count is at least one.
        entry.ref_count -= 1;

        if entry.ref_count > 0 {
            tracing::debug!(handle, refs = entry.ref_count, "persistent unload");
            return Unload::Retained(entry.ref_count);
        }

        guard.entry = None;
        guard.retired = true;
        drop(guard);
        self.forget(&key, &slot);
        tracing::info!(handle, "persistent release");
        Unload::Released
    }

    /// Check whether `path` has the handle shape for `kind`.
    ///
    /// Independent of what is currently loaded.
    pub fn is_persistent(&self, kind: ResourceKind, path: &str) -> bool {
        kind::is_persistent(kind, path, self.fs.config())
    }

    /// Check whether a handle currently refers to a live entry.
    pub fn is_loaded(&self, handle: &str) -> bool {
        self.ref_count(handle) > 0
    }

    /// Outstanding references behind a handle (0 if not loaded).
    pub fn ref_count(&self, handle: &str) -> u32 {
        self.lookup(handle)
            .and_then(|(_, slot)| {
                let guard = slot.lock();
                guard.entry.as_ref().map(|e| e.ref_count)
            })
            .unwrap_or(0)
    }

    /// Decoded state behind a handle.
    pub fn get(&self, handle: &str) -> Option<Arc<DecodedResource>> {
        let (_, slot) = self.lookup(handle)?;
        let guard = slot.lock();
        guard.entry.as_ref().map(|e| Arc::clone(&e.resource))
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Check if no entry is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every live entry, sorted by handle.
    pub fn entries(&self) -> Vec<EntryInfo> {
        let slots: Vec<_> = self
            .slots
            .read()
            .iter()
            .map(|(key, slot)| (key.clone(), Arc::clone(slot)))
            .collect();

        let mut infos: Vec<EntryInfo> = slots
            .into_iter()
            .filter_map(|((kind, source), slot)| {
                let guard = slot.lock();
                guard.entry.as_ref().map(|e| EntryInfo {
                    handle: e.handle.clone(),
                    kind,
                    source,
                    ref_count: e.ref_count,
                    loaded_at: e.loaded_at,
                })
            })
            .collect();
        infos.sort_by(|a, b| a.handle.cmp(&b.handle));
        infos
    }

    /// Drop every entry whose source lies inside directory `dir`.
    ///
    /// Their handles become dangling: unloading them is a no-op and the
    /// decoded state is freed. Returns the number of entries invalidated.
    pub fn invalidate_within(&self, dir: &str) -> usize {
        let config = self.fs.config();
        let dir = path::canonical(dir, config);
        let doomed: Vec<_> = {
            let mut slots = self.slots.write();
            let keys: Vec<SlotKey> = slots
                .keys()
                .filter(|(_, source)| path::is_within(source, &dir, config))
                .cloned()
                .collect();
            keys.into_iter()
                .filter_map(|key| slots.remove(&key).map(|slot| (key, slot)))
                .collect()
        };
        self.retire_all(doomed, "invalidated with its directory")
    }

    /// Release every live entry.
    pub fn clear(&self) -> usize {
        let doomed: Vec<_> = self.slots.write().drain().collect();
        self.retire_all(doomed, "released on clear")
    }

    fn retire_all(&self, doomed: Vec<(SlotKey, Arc<Mutex<Slot>>)>, why: &str) -> usize {
        let mut count = 0;
        for ((kind, source), slot) in doomed {
            let mut guard = slot.lock();
            guard.retired = true;
            if let Some(entry) = guard.entry.take() {
                tracing::warn!(handle = %entry.handle, %kind, %source, refs = entry.ref_count, "{why}");
                count += 1;
            }
        }
        count
    }
}

impl Drop for PersistentCache {
    fn drop(&mut self) {
        let released = self.clear();
        if released > 0 {
            tracing::debug!(released, "persistent cache dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Standard decoding plus a call counter. Grammars decode slowly to
    /// widen race windows.
    struct CountingDecoder {
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl Decoder for CountingDecoder {
        fn decode(
            &self,
            kind: ResourceKind,
            source: &str,
            bytes: Vec<u8>,
        ) -> Result<DecodedResource> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if kind == ResourceKind::Grammar {
                thread::sleep(self.delay);
            }
            StandardDecoder.decode(kind, source, bytes)
        }
    }

    fn counting_cache(fs: FileSystem, delay: Duration) -> (PersistentCache, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let decoder = CountingDecoder {
            calls: Arc::clone(&calls),
            delay,
        };
        (PersistentCache::with_decoder(fs, decoder), calls)
    }

    fn disk_dictionary(dir: &TempDir) -> String {
        let path = dir.path().join("dic.bin");
        std::fs::write(&path, b"\x00\x00\x00\x2a dictionary image").unwrap();
        path.to_string_lossy().into_owned()
    }

    /// Counts warnings emitted while it is the default subscriber.
    struct WarnCounter(Arc<AtomicUsize>);

    impl tracing::Subscriber for WarnCounter {
        fn enabled(&self, _: &tracing::Metadata<'_>) -> bool {
            true
        }
        fn new_span(&self, _: &tracing::span::Attributes<'_>) -> tracing::span::Id {
            tracing::span::Id::from_u64(1)
        }
        fn record(&self, _: &tracing::span::Id, _: &tracing::span::Record<'_>) {}
        fn record_follows_from(&self, _: &tracing::span::Id, _: &tracing::span::Id) {}
        fn event(&self, event: &tracing::Event<'_>) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        fn enter(&self, _: &tracing::span::Id) {}
        fn exit(&self, _: &tracing::span::Id) {}
    }

    #[test]
    fn test_over_unload_reported_never_wraps() {
        let fs = FileSystem::default();
        fs.write("$:Alphabet.txt", b"#az\n").unwrap();
        let cache = PersistentCache::new(fs);
        let warnings = Arc::new(AtomicUsize::new(0));

        tracing::subscriber::with_default(WarnCounter(Arc::clone(&warnings)), || {
            let handle = cache.load(ResourceKind::Alphabet, "$:Alphabet.txt").unwrap();
            assert_eq!(cache.unload(handle.as_str()), Unload::Released);
            assert_eq!(warnings.load(Ordering::SeqCst), 0);

            assert_eq!(cache.unload(handle.as_str()), Unload::Unknown);
            assert_eq!(cache.unload(handle.as_str()), Unload::Unknown);
            assert_eq!(warnings.load(Ordering::SeqCst), 2);
            assert_eq!(cache.ref_count(handle.as_str()), 0);

            assert_eq!(cache.unload("$:Alphabet.txt"), Unload::Unknown);
            assert_eq!(warnings.load(Ordering::SeqCst), 2);

            let again = cache.load(ResourceKind::Alphabet, "$:Alphabet.txt").unwrap();
            assert_eq!(again, handle);
            assert_eq!(cache.ref_count(again.as_str()), 1);
        });
    }

    #[test]
    fn test_double_load_single_decode() {
        let fs = FileSystem::default();
        fs.write("$:Alphabet.txt", b"#az\n").unwrap();
        let (cache, calls) = counting_cache(fs, Duration::ZERO);

        let h1 = cache.load(ResourceKind::Alphabet, "$:Alphabet.txt").unwrap();
        let h2 = cache.load(ResourceKind::Alphabet, "$:/./Alphabet.txt").unwrap();

        assert_eq!(h1, h2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.ref_count(h1.as_str()), 2);
    }

    #[test]
    fn test_dictionary_scenario() {
        let dir = TempDir::new().unwrap();
        let source = disk_dictionary(&dir);
        let cache = PersistentCache::new(FileSystem::default());

        let h1 = cache.load(ResourceKind::Dictionary, &source).unwrap();
        let again = cache.load(ResourceKind::Dictionary, &source).unwrap();
        assert_eq!(h1, again);

        assert_eq!(cache.unload(h1.as_str()), Unload::Retained(1));
        assert!(cache.is_loaded(h1.as_str()));
        assert!(cache.get(h1.as_str()).is_some());

        assert_eq!(cache.unload(h1.as_str()), Unload::Released);
        assert!(!cache.is_loaded(h1.as_str()));
        assert!(cache.get(h1.as_str()).is_none());

        assert_eq!(cache.unload(h1.as_str()), Unload::Unknown);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_reload_after_release_decodes_again() {
        let fs = FileSystem::default();
        fs.write("$:g.fst2", b"0000000001\n").unwrap();
        let (cache, calls) = counting_cache(fs, Duration::ZERO);

        let h = cache.load(ResourceKind::Grammar, "$:g.fst2").unwrap();
        assert_eq!(cache.unload(h.as_str()), Unload::Released);
        let again = cache.load(ResourceKind::Grammar, "$:g.fst2").unwrap();

        assert_eq!(h, again);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_kinds_partition_cache() {
        let fs = FileSystem::default();
        fs.write("$:both.txt", b"0000000001\nAa\n").unwrap();
        let cache = PersistentCache::new(fs);

        let as_grammar = cache.load(ResourceKind::Grammar, "$:both.txt").unwrap();
        let as_alphabet = cache.load(ResourceKind::Alphabet, "$:both.txt").unwrap();

        assert_ne!(as_grammar, as_alphabet);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.unload(as_grammar.as_str()), Unload::Released);
        assert!(cache.is_loaded(as_alphabet.as_str()));
    }

    #[test]
    fn test_is_persistent() {
        let fs = FileSystem::default();
        fs.write("$:Alphabet.txt", b"Aa\n").unwrap();
        let cache = PersistentCache::new(fs);
        let h = cache.load(ResourceKind::Alphabet, "$:Alphabet.txt").unwrap();

        assert!(cache.is_persistent(ResourceKind::Alphabet, h.as_str()));
        assert!(!cache.is_persistent(ResourceKind::Grammar, h.as_str()));
        assert!(!cache.is_persistent(ResourceKind::Alphabet, "$:Alphabet.txt"));
        assert!(!cache.is_persistent(ResourceKind::Alphabet, "data/Alphabet.txt"));

        // Shape, not membership.
        cache.unload(h.as_str());
        assert!(cache.is_persistent(ResourceKind::Alphabet, h.as_str()));
    }

    #[test]
    fn test_failed_load_leaves_no_entry() {
        let fs = FileSystem::default();
        fs.write("$:broken.fst2", b"not a header\n").unwrap();
        let cache = PersistentCache::new(fs);

        assert!(matches!(
            cache.load(ResourceKind::Grammar, "$:broken.fst2"),
            Err(Error::InvalidResource { .. })
        ));
        assert!(cache
            .load(ResourceKind::Grammar, "$:missing.fst2")
            .unwrap_err()
            .is_not_found());
        assert!(cache.is_empty());
        assert!(cache.slots.read().is_empty());
    }

    #[test]
    fn test_unload_garbage() {
        let cache = PersistentCache::new(FileSystem::default());
        assert_eq!(cache.unload("/plain/path"), Unload::Unknown);
        assert_eq!(cache.unload("$persist:dic:/never/loaded"), Unload::Unknown);
        assert_eq!(cache.unload(""), Unload::Unknown);
    }

    #[test]
    fn test_concurrent_loads_decode_once() {
        let fs = FileSystem::default();
        fs.write("$:shared.fst2", b"0000000004\n").unwrap();
        let (cache, calls) = counting_cache(fs, Duration::from_millis(20));
        let cache = Arc::new(cache);
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.load(ResourceKind::Grammar, "$:shared.fst2").unwrap()
                })
            })
            .collect();
        let loaded: Vec<Handle> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(loaded.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.ref_count(loaded[0].as_str()), 8);
    }

    #[test]
    fn test_concurrent_unloads_release_once() {
        let fs = FileSystem::default();
        fs.write("$:a.txt", b"Aa\n").unwrap();
        let cache = Arc::new(PersistentCache::new(fs));
        let handle = cache.load(ResourceKind::Alphabet, "$:a.txt").unwrap();
        for _ in 1..16 {
            cache.load(ResourceKind::Alphabet, "$:a.txt").unwrap();
        }

        let outcomes: Vec<Unload> = (0..20)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let handle = handle.clone();
                thread::spawn(move || cache.unload(handle.as_str()))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|t| t.join().unwrap())
            .collect();

        let released = outcomes.iter().filter(|o| **o == Unload::Released).count();
        let unknown = outcomes.iter().filter(|o| **o == Unload::Unknown).count();
        assert_eq!(released, 1);
        assert_eq!(unknown, 4);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_different_resources_do_not_block() {
        let fs = FileSystem::default();
        fs.write("$:slow.fst2", b"0000000001\n").unwrap();
        fs.write("$:fast.txt", b"Aa\n").unwrap();
        let (cache, _) = counting_cache(fs, Duration::from_millis(300));
        let cache = Arc::new(cache);

        let slow = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.load(ResourceKind::Grammar, "$:slow.fst2"))
        };
        thread::sleep(Duration::from_millis(50));

        // The slow decode holds only its own slot.
        let started = std::time::Instant::now();
        let fast = cache.load(ResourceKind::Alphabet, "$:fast.txt").unwrap();
        assert!(started.elapsed() < Duration::from_millis(200));
        assert!(cache.is_loaded(fast.as_str()));

        let slow = slow.join().unwrap().unwrap();
        assert_eq!(cache.ref_count(slow.as_str()), 1);
    }

    #[test]
    fn test_invalidate_within() {
        let dir = TempDir::new().unwrap();
        let source = disk_dictionary(&dir);
        let fs = FileSystem::default();
        fs.write("$:keep/Alphabet.txt", b"Aa\n").unwrap();
        let cache = PersistentCache::new(fs);

        let dic = cache.load(ResourceKind::Dictionary, &source).unwrap();
        let alph = cache.load(ResourceKind::Alphabet, "$:keep/Alphabet.txt").unwrap();

        assert_eq!(cache.invalidate_within(dir.path().to_str().unwrap()), 1);
        assert!(!cache.is_loaded(dic.as_str()));
        assert_eq!(cache.unload(dic.as_str()), Unload::Unknown);
        assert!(cache.is_loaded(alph.as_str()));
    }

    #[test]
    fn test_entries_and_clear() {
        let fs = FileSystem::default();
        fs.write("$:a.txt", b"Aa\n").unwrap();
        fs.write("$:g.fst2", b"1\n").unwrap();
        let cache = PersistentCache::new(fs);
        cache.load(ResourceKind::Alphabet, "$:a.txt").unwrap();
        cache.load(ResourceKind::Grammar, "$:g.fst2").unwrap();
        cache.load(ResourceKind::Grammar, "$:g.fst2").unwrap();

        let entries = cache.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].handle.as_str(), "$persist:alph:$:a.txt");
        assert_eq!(entries[1].kind, ResourceKind::Grammar);
        assert_eq!(entries[1].ref_count, 2);
        assert_eq!(entries[1].source, "$:g.fst2");

        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
    }
}
