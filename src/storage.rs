//! Concurrent storage for the resolution cache
//!
//! A sharded map from [`Key`] to memoized entries. Population is per-key:
//! map guards are never held across factory execution, and each entry's
//! own cell serializes its realization.

use crate::factory::Memo;
use crate::key::Key;
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::Arc;

/// Append-only cache of key -> memoized instance.
///
/// Uses `DashMap` with `ahash`. 8 shards balances creation overhead against
/// read contention; resolvers rarely hold more than a few dozen keys.
pub(crate) struct ProviderCache {
    memos: DashMap<Key, Arc<Memo>, RandomState>,
}

impl ProviderCache {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            memos: DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8),
        }
    }

    /// Look up an existing entry
    #[inline]
    pub(crate) fn get(&self, key: &Key) -> Option<Arc<Memo>> {
        self.memos.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Insert an entry at build time (instance and implementation bindings)
    #[inline]
    pub(crate) fn seed(&self, key: Key, memo: Memo) {
        self.memos.insert(key, Arc::new(memo));
    }

    /// Insert the entry produced by the strategy, keeping any entry another
    /// thread raced in first. The shard guard is released before return.
    #[inline]
    pub(crate) fn get_or_insert(&self, key: Key, memo: Memo) -> Arc<Memo> {
        Arc::clone(
            self.memos
                .entry(key)
                .or_insert_with(|| Arc::new(memo))
                .value(),
        )
    }

    /// Number of cached keys
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.memos.len()
    }
}

impl std::fmt::Debug for ProviderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCache")
            .field("count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{InstanceSource, Memo};

    struct Marker;

    #[test]
    fn get_or_insert_keeps_first_entry() {
        let cache = ProviderCache::new();
        let key = Key::of::<Marker>();

        let first = cache.get_or_insert(key.clone(), Memo::ready(Arc::new(1u32)));
        let second = cache.get_or_insert(
            key.clone(),
            Memo::new(InstanceSource::Delegate(key.clone())),
        );

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn seeded_entries_are_visible() {
        let cache = ProviderCache::new();
        let key = Key::of::<Marker>().named("seeded");

        assert!(cache.get(&key).is_none());
        cache.seed(key.clone(), Memo::ready(Arc::new(Marker)));
        assert!(cache.get(&key).is_some());
    }
}
