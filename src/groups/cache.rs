//! Per-process group cache.
//!
//! A bounded LRU over shared group handles. Loaders publish through
//! [`GroupCache::insert_or_get`] so concurrent reconstructions of one group
//! converge on a single handle. Invalidation only drops the cache entry;
//! handles already held elsewhere keep working and age out naturally.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use coterie_proto::GroupId;

use super::group::{Group, GroupHandle};

/// Bounded cache of live groups.
pub struct GroupCache {
    inner: Mutex<LruCache<GroupId, GroupHandle>>,
}

impl GroupCache {
    /// A cache holding at most `capacity` groups. Zero is clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        GroupCache { inner: Mutex::new(LruCache::new(capacity)) }
    }

    /// The cached handle, refreshing its recency.
    pub fn get(&self, id: &str) -> Option<GroupHandle> {
        self.inner.lock().get(id).cloned()
    }

    /// Publish a freshly reconstructed group. If another loader won the
    /// race, its handle wins and the fresh state is dropped.
    pub fn insert_or_get(&self, group: Group) -> GroupHandle {
        let mut cache = self.inner.lock();
        if let Some(existing) = cache.get(&group.id) {
            return existing.clone();
        }
        let id = group.id.clone();
        let handle: GroupHandle = Arc::new(Mutex::new(group));
        cache.put(id, handle.clone());
        handle
    }

    /// Drop a group from the cache. The next load replays from the store.
    pub fn invalidate(&self, id: &str) -> bool {
        self.inner.lock().pop(id).is_some()
    }

    /// Number of cached groups.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::RateBucket;
    use std::time::Duration;

    fn group(id: &str) -> Group {
        Group::new(id, "operator", RateBucket::new(15, Duration::from_secs(120)))
    }

    #[test]
    fn insert_or_get_returns_the_racing_winner() {
        let cache = GroupCache::new(4);
        let first = cache.insert_or_get(group("a"));
        let second = cache.insert_or_get(group("a"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = GroupCache::new(2);
        cache.insert_or_get(group("a"));
        cache.insert_or_get(group("b"));
        // touch "a" so "b" is the eviction candidate
        assert!(cache.get("a").is_some());
        cache.insert_or_get(group("c"));
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn invalidation_drops_the_entry_but_not_live_handles() {
        let cache = GroupCache::new(4);
        let handle = cache.insert_or_get(group("a"));
        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert!(cache.get("a").is_none());
        // the handle held above still works
        assert_eq!(handle.lock().id, "a");
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let cache = GroupCache::new(0);
        cache.insert_or_get(group("a"));
        assert_eq!(cache.len(), 1);
    }
}
