//! Persistence of per-path ACLs through an [`AclStorage`] backend.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use lru::LruCache;

use crate::acl::path::normalize;
use crate::constants::ROW_KEY_SEPARATOR;
use crate::error::{ArborError, Result};
use crate::io::{AclStorage, decode_acl, encode_acl};
use crate::types::{Acl, AclModification, apply_modifications};

/// Bounded cache of decoded ACLs.
///
/// `generation` moves on every invalidation. A reader records it before going
/// to storage and only fills the cache when it is unchanged, so a value read
/// before a concurrent write can never land in the cache after that write.
struct AclCache {
    entries: LruCache<String, Arc<Acl>>,
    generation: u64,
}

enum CacheLookup {
    Hit(Arc<Acl>),
    Miss(u64),
    Disabled,
}

/// Reads and writes ACLs keyed by `(zone, path)`.
///
/// Decoded ACLs may be cached; a cached entry is dropped whenever its key is
/// written through this store.
pub struct AclStore {
    storage: Arc<dyn AclStorage>,
    column_family: String,
    cache: Option<Mutex<AclCache>>,
}

impl AclStore {
    /// `cache_capacity` of `None` disables caching.
    #[must_use]
    pub fn new(
        storage: Arc<dyn AclStorage>,
        column_family: impl Into<String>,
        cache_capacity: Option<NonZeroUsize>,
    ) -> Self {
        Self {
            storage,
            column_family: column_family.into(),
            cache: cache_capacity.map(|capacity| {
                Mutex::new(AclCache {
                    entries: LruCache::new(capacity),
                    generation: 0,
                })
            }),
        }
    }

    #[must_use]
    pub fn storage_name(&self) -> &'static str {
        self.storage.name()
    }

    /// Number of decoded ACLs currently cached.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache
            .as_ref()
            .and_then(|cache| cache.lock().ok().map(|cache| cache.entries.len()))
            .unwrap_or(0)
    }

    /// The ACL stored at exactly `(zone, path)`; empty when none is stored.
    pub fn get(&self, zone: &str, path: &str) -> Result<Arc<Acl>> {
        let row_key = row_key(zone, path)?;
        let generation = match self.lookup(&row_key) {
            CacheLookup::Hit(acl) => return Ok(acl),
            CacheLookup::Miss(generation) => Some(generation),
            CacheLookup::Disabled => None,
        };

        let acl = match self.storage.get(&self.column_family, &row_key)? {
            Some(bytes) => decode_acl(&bytes)?,
            None => Acl::new(),
        };
        let acl = Arc::new(acl);
        if let Some(seen) = generation {
            self.fill(row_key, &acl, seen);
        }
        Ok(acl)
    }

    /// Apply a modification batch to one ACL in a single read-modify-write.
    ///
    /// The batch is validated before storage is touched; the caller is
    /// responsible for authorization.
    pub fn apply(&self, zone: &str, path: &str, modifications: &[AclModification]) -> Result<Acl> {
        let row_key = row_key(zone, path)?;
        for modification in modifications {
            modification.validate()?;
        }

        let mut updated = Acl::new();
        let result = self
            .storage
            .update(&self.column_family, &row_key, &mut |current| {
                let mut acl = match current {
                    Some(bytes) => decode_acl(&bytes)?,
                    None => Acl::new(),
                };
                apply_modifications(&mut acl, modifications);
                let encoded = encode_acl(&acl)?;
                updated = acl;
                Ok(encoded)
            });
        // Invalidate even on failure: the backend may have written before erroring.
        self.invalidate(&row_key);
        result?;

        tracing::debug!(
            acl.zone = zone,
            acl.row_key = %row_key,
            acl.modifications = modifications.len(),
            acl.entries = updated.len(),
            "acl applied"
        );
        Ok(updated)
    }

    fn cache(&self) -> Option<MutexGuard<'_, AclCache>> {
        let cache = self.cache.as_ref()?;
        Some(cache.lock().unwrap_or_else(|poisoned| {
            // A poisoned cache cannot be trusted; start over.
            let mut cache = poisoned.into_inner();
            cache.entries.clear();
            cache.generation = cache.generation.wrapping_add(1);
            cache
        }))
    }

    fn lookup(&self, row_key: &str) -> CacheLookup {
        let Some(mut cache) = self.cache() else {
            return CacheLookup::Disabled;
        };
        let generation = cache.generation;
        match cache.entries.get(row_key) {
            Some(acl) => CacheLookup::Hit(Arc::clone(acl)),
            None => CacheLookup::Miss(generation),
        }
    }

    fn fill(&self, row_key: String, acl: &Arc<Acl>, seen: u64) {
        if let Some(mut cache) = self.cache() {
            if cache.generation == seen {
                cache.entries.put(row_key, Arc::clone(acl));
            }
        }
    }

    fn invalidate(&self, row_key: &str) {
        if let Some(mut cache) = self.cache() {
            cache.generation = cache.generation.wrapping_add(1);
            cache.entries.pop(row_key);
        }
    }
}

/// Storage row key for an ACL: `<zone>;<normalized path>`.
pub fn row_key(zone: &str, path: &str) -> Result<String> {
    if zone.trim().is_empty() || zone.contains(ROW_KEY_SEPARATOR) {
        return Err(ArborError::InvalidZone {
            zone: zone.to_string(),
        });
    }
    Ok(format!("{zone}{ROW_KEY_SEPARATOR}{}", normalize(path)))
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::io::{MemoryStorage, UpdateFn};
    use crate::types::{AclOperation, Permission};

    fn store(cache: bool) -> (Arc<MemoryStorage>, AclStore) {
        let storage = Arc::new(MemoryStorage::new());
        let capacity = if cache { NonZeroUsize::new(64) } else { None };
        let store = AclStore::new(storage.clone(), "ac", capacity);
        (storage, store)
    }

    #[test]
    fn missing_acl_is_empty() {
        let (_, store) = store(true);
        assert!(store.get("CO", "nothing/here").expect("get").is_empty());
    }

    #[test]
    fn apply_persists_and_normalizes_path() {
        let (storage, store) = store(false);
        store
            .apply(
                "CO",
                "/docs/a/",
                &[AclModification::grant("u1", Permission::CAN_READ, AclOperation::Replace)],
            )
            .expect("apply");
        assert!(storage.get("ac", "CO;docs/a").expect("raw").is_some());
        let acl = store.get("CO", "docs/a").expect("get");
        assert_eq!(acl.get("u1@g"), Some(&Permission::CAN_READ.bits()));
    }

    #[test]
    fn zones_do_not_share_acls() {
        let (_, store) = store(true);
        store
            .apply(
                "CO",
                "p",
                &[AclModification::grant("u1", Permission::ALL, AclOperation::Replace)],
            )
            .expect("apply");
        assert!(store.get("AU", "p").expect("get").is_empty());
    }

    #[test]
    fn cache_is_invalidated_on_apply() {
        let (_, store) = store(true);
        let first = store.get("CO", "p").expect("get");
        assert!(first.is_empty());
        store
            .apply(
                "CO",
                "p",
                &[AclModification::grant("u1", Permission::CAN_WRITE, AclOperation::Or)],
            )
            .expect("apply");
        let second = store.get("CO", "p").expect("get");
        assert_eq!(second.get("u1@g"), Some(&Permission::CAN_WRITE.bits()));
    }

    #[test]
    fn invalid_batch_writes_nothing() {
        let (storage, store) = store(true);
        let err = store
            .apply(
                "CO",
                "p",
                &[
                    AclModification::grant("u1", Permission::CAN_READ, AclOperation::Replace),
                    AclModification::new("  ", 1, AclOperation::Or),
                ],
            )
            .expect_err("empty key");
        assert!(matches!(err, ArborError::InvalidModification { .. }));
        assert_eq!(storage.len(), 0);
    }

    #[test]
    fn bad_zone_is_rejected() {
        let (_, store) = store(true);
        assert!(matches!(store.get("", "p"), Err(ArborError::InvalidZone { .. })));
        assert!(matches!(store.get("C;O", "p"), Err(ArborError::InvalidZone { .. })));
    }

    struct FailingStorage;

    impl AclStorage for FailingStorage {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn get(&self, _: &str, _: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }

        fn put(&self, _: &str, _: &str, _: &[u8]) -> Result<()> {
            Err(ArborError::Storage {
                reason: "disk on fire".into(),
            })
        }

        fn update(&self, cf: &str, key: &str, f: &mut UpdateFn<'_>) -> Result<()> {
            let next = f(None)?;
            self.put(cf, key, &next)
        }
    }

    #[test]
    fn storage_failure_surfaces() {
        let store = AclStore::new(Arc::new(FailingStorage), "ac", NonZeroUsize::new(8));
        let err = store
            .apply(
                "CO",
                "p",
                &[AclModification::grant("u1", Permission::CAN_READ, AclOperation::Or)],
            )
            .expect_err("put fails");
        assert!(matches!(err, ArborError::Storage { .. }));
        assert!(store.get("CO", "p").expect("get").is_empty());
    }

    #[test]
    fn cache_is_bounded() {
        let storage = Arc::new(MemoryStorage::new());
        let store = AclStore::new(storage, "ac", NonZeroUsize::new(2));
        for path in ["a", "a/b", "a/b/c", "d"] {
            store.get("CO", path).expect("get");
        }
        assert_eq!(store.cached_len(), 2);

        let uncached = AclStore::new(Arc::new(MemoryStorage::new()), "ac", None);
        uncached.get("CO", "a").expect("get");
        assert_eq!(uncached.cached_len(), 0);
    }

    /// Parks the first `get` after it has read from storage until released.
    struct PausingStorage {
        inner: MemoryStorage,
        pause: AtomicBool,
        read_done: Barrier,
        resume: Barrier,
    }

    impl AclStorage for PausingStorage {
        fn name(&self) -> &'static str {
            "pausing"
        }

        fn get(&self, cf: &str, key: &str) -> Result<Option<Vec<u8>>> {
            let value = self.inner.get(cf, key)?;
            if self.pause.swap(false, Ordering::SeqCst) {
                self.read_done.wait();
                self.resume.wait();
            }
            Ok(value)
        }

        fn put(&self, cf: &str, key: &str, value: &[u8]) -> Result<()> {
            self.inner.put(cf, key, value)
        }
    }

    #[test]
    fn read_racing_a_write_does_not_cache_the_old_acl() {
        let storage = Arc::new(PausingStorage {
            inner: MemoryStorage::new(),
            pause: AtomicBool::new(true),
            read_done: Barrier::new(2),
            resume: Barrier::new(2),
        });
        let store = AclStore::new(storage.clone(), "ac", NonZeroUsize::new(16));

        let stale = std::thread::scope(|scope| {
            let reader = scope.spawn(|| store.get("CO", "p").expect("get"));
            storage.read_done.wait();
            store
                .apply(
                    "CO",
                    "p",
                    &[AclModification::deny("u", Permission::ALL, AclOperation::Replace)],
                )
                .expect("apply");
            storage.resume.wait();
            reader.join().expect("reader thread")
        });
        assert!(stale.is_empty());

        let current = store.get("CO", "p").expect("get");
        assert_eq!(current.get("u@d"), Some(&Permission::ALL.bits()));
    }
}
