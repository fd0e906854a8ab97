//! Record persistence interface.
//!
//! The core never talks to a database directly; everything goes through
//! [`RecordStore`]. Query results stream over a bounded channel so large
//! histories never sit in memory at once, and dropping the receiver cancels
//! the producer. A [`MemoryStore`] ships for tests and single-process
//! embedding.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use coterie_proto::{Filter, Record};

mod memory;

pub use memory::MemoryStore;

/// Capacity of query result channels.
pub(crate) const QUERY_CHANNEL_CAPACITY: usize = 256;

/// Storage backend failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("store backend: {0}")]
    Backend(String),
}

/// Persistence surface the relay core requires.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist one record, keyed by id.
    async fn put(&self, record: Record) -> Result<(), StoreError>;

    /// Stream records matching the filter, newest first, over a bounded
    /// channel. Dropping the receiver stops the stream early.
    async fn query(&self, filter: Filter) -> Result<mpsc::Receiver<Record>, StoreError>;

    /// Count records matching the filter.
    async fn count(&self, filter: Filter) -> Result<u64, StoreError>;

    /// Remove a record by id. Returns whether it was present.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;
}
