//! Group reconstruction.
//!
//! Groups are never persisted as rows. On demand the loader queries the
//! group's stored moderation history, replays it oldest first through the
//! action registry over operator-seeded state, and caches the live handle.
//! Malformed history records are skipped, never fatal, so one bad record
//! cannot wedge a group forever.

use std::sync::Arc;

use tracing::{debug, warn};

use coterie_proto::{kind, tags::TAG_GROUP, Filter, PublicKey, Record};

use crate::config::{Config, RateLimitConfig};
use crate::limiter::RateBucket;
use crate::metrics;
use crate::store::{RecordStore, StoreError};

use super::action::ActionRegistry;
use super::cache::GroupCache;
use super::group::{Group, GroupHandle};

/// Loads groups on demand and caches the live handles.
pub struct Groups {
    store: Arc<dyn RecordStore>,
    registry: ActionRegistry,
    cache: GroupCache,
    operator: PublicKey,
    history_limit: usize,
    limits: RateLimitConfig,
}

impl Groups {
    /// Wire the loader to a store, an action registry, and the operator
    /// identity seeded as master on every group.
    pub fn new(
        store: Arc<dyn RecordStore>,
        registry: ActionRegistry,
        operator: impl Into<PublicKey>,
        config: &Config,
    ) -> Self {
        Groups {
            store,
            registry,
            cache: GroupCache::new(config.groups.cache_capacity),
            operator: operator.into(),
            history_limit: config.groups.history_limit,
            limits: config.rate_limit.clone(),
        }
    }

    /// The injected action registry.
    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// The operator pubkey.
    pub fn operator(&self) -> &str {
        &self.operator
    }

    /// Load a group the relay knows: one with stored moderation history, or
    /// a legacy marker authored under its own key. `None` otherwise.
    pub async fn load(&self, id: &str) -> Result<Option<GroupHandle>, StoreError> {
        if let Some(handle) = self.cache.get(id) {
            return Ok(Some(handle));
        }
        let history = self.history(id).await?;
        if history.is_empty() && !self.has_marker(id).await? {
            return Ok(None);
        }
        Ok(Some(self.publish(id, history)))
    }

    /// Load a group, starting from empty state when nothing is stored. Used
    /// where a group must be observable either way, like admission buckets.
    pub async fn load_or_create(&self, id: &str) -> Result<GroupHandle, StoreError> {
        if let Some(handle) = self.cache.get(id) {
            return Ok(handle);
        }
        let history = self.history(id).await?;
        Ok(self.publish(id, history))
    }

    /// Drop the cached handle; the next load replays from the store.
    pub fn invalidate(&self, id: &str) {
        if self.cache.invalidate(id) {
            debug!(group = %id, "group cache invalidated");
        }
        metrics::set_cached_groups(self.cache.len() as i64);
    }

    /// Number of groups currently cached.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    async fn history(&self, id: &str) -> Result<Vec<Record>, StoreError> {
        let filter = Filter::new()
            .kinds(self.registry.kinds())
            .tag(TAG_GROUP, [id])
            .limit(self.history_limit);
        let mut rx = self.store.query(filter).await?;
        let mut history = Vec::new();
        while let Some(record) = rx.recv().await {
            history.push(record);
        }
        // stores answer newest first; replay wants oldest first, ids
        // breaking timestamp ties
        history.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(history)
    }

    async fn has_marker(&self, id: &str) -> Result<bool, StoreError> {
        let filter = Filter::new().kinds([kind::GROUP_MARKER]).authors([id]);
        Ok(self.store.count(filter).await? > 0)
    }

    fn publish(&self, id: &str, history: Vec<Record>) -> GroupHandle {
        let mut group = Group::new(id, &self.operator, RateBucket::from_config(&self.limits));
        let mut applied = 0usize;
        for record in &history {
            match self.registry.decode(record) {
                Ok(action) => {
                    action.apply(&mut group);
                    applied += 1;
                }
                Err(error) => {
                    warn!(group = %id, record = %record.id, %error, "skipping malformed moderation record");
                }
            }
        }
        debug!(group = %id, records = history.len(), applied, "group reconstructed");
        metrics::inc_reconstructed();
        let handle = self.cache.insert_or_get(group);
        metrics::set_cached_groups(self.cache.len() as i64);
        handle
    }
}
