//! Term cache invalidation contract.
//!
//! The manager never reads cached term data; it only tells the host's cache
//! which keys went stale. `MemoryTermCache` is a process-local cache hosts
//! can read through.
//!
//! # Invariants
//! - Every mutating manager path deletes the keys it affects.
//! - The last-changed generation strictly increases on every bump.

use crate::model::term::{ObjectId, TermId};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Cache keys invalidated by term operations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CacheKey {
    /// One term record.
    Term(TermId),
    /// Parent/child hierarchy of one taxonomy.
    TaxonomyHierarchy(String),
    /// Term set of one object within one taxonomy.
    ObjectRelationships { object_id: ObjectId, taxonomy: String },
}

/// Invalidation sink the manager writes to.
pub trait TermCache {
    /// Drops one cached entry. Missing keys are ignored.
    fn delete(&self, key: &CacheKey);
    /// Marks every cached term query as stale.
    fn set_last_changed(&self);
}

/// Cache that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTermCache;

impl TermCache for NoopTermCache {
    fn delete(&self, _key: &CacheKey) {}

    fn set_last_changed(&self) {}
}

/// In-memory key/value term cache with a last-changed generation counter.
#[derive(Debug, Default)]
pub struct MemoryTermCache {
    entries: Mutex<BTreeMap<CacheKey, String>>,
    last_changed: Mutex<u64>,
}

impl MemoryTermCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    pub fn set(&self, key: CacheKey, value: impl Into<String>) {
        lock(&self.entries).insert(key, value.into());
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        lock(&self.entries).contains_key(key)
    }

    /// Current generation; callers compare it to detect stale query caches.
    pub fn last_changed(&self) -> u64 {
        *lock(&self.last_changed)
    }
}

impl TermCache for MemoryTermCache {
    fn delete(&self, key: &CacheKey) {
        lock(&self.entries).remove(key);
    }

    fn set_last_changed(&self) {
        *lock(&self.last_changed) += 1;
    }
}

impl<C: TermCache + ?Sized> TermCache for std::sync::Arc<C> {
    fn delete(&self, key: &CacheKey) {
        (**self).delete(key);
    }

    fn set_last_changed(&self) {
        (**self).set_last_changed();
    }
}

// Poisoned guards still hold consistent data.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
