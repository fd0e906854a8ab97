//! DashMap-backed in-memory store.

use dashmap::DashMap;
use tokio::sync::mpsc;

use async_trait::async_trait;
use coterie_proto::{Filter, Record, RecordId};

use super::{RecordStore, StoreError, QUERY_CHANNEL_CAPACITY};

/// In-memory record store.
///
/// Records are keyed by id; a `put` with a known id replaces the earlier
/// copy. Queries snapshot the matching set, order it newest first with ids
/// breaking timestamp ties, and feed it down the channel.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<RecordId, Record>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds nothing.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn matching(&self, filter: &Filter) -> Vec<Record> {
        let mut hits: Vec<Record> = self
            .records
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        hits.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        if let Some(limit) = filter.limit {
            hits.truncate(limit);
        }
        hits
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn put(&self, record: Record) -> Result<(), StoreError> {
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn query(&self, filter: Filter) -> Result<mpsc::Receiver<Record>, StoreError> {
        let hits = self.matching(&filter);
        let (tx, rx) = mpsc::channel(QUERY_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            for record in hits {
                if tx.send(record).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    async fn count(&self, filter: Filter) -> Result<u64, StoreError> {
        let hits = self
            .records
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .count();
        Ok(hits as u64)
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.records.remove(id).is_some())
    }
}
