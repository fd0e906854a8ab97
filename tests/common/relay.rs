//! In-process relay core assembly.
//!
//! Wires the store, group loader, resolver, and both pipelines the way a
//! transport embedding the crate would, with a deterministic operator key.

use std::sync::Arc;

use tokio::sync::mpsc;

use coterie::config::Config;
use coterie::groups::{ActionRegistry, Groups};
use coterie::membership::MembershipResolver;
use coterie::pipeline::{ReadPipeline, WritePipeline};
use coterie::proto::tags::{TAG_IDENTIFIER, TAG_MEMBER};
use coterie::proto::{kind, Record, Tag};
use coterie::sign::{Ed25519Signer, RecordSigner};
use coterie::store::MemoryStore;

/// A fully wired relay core over an in-memory store.
pub struct TestRelay {
    pub store: Arc<MemoryStore>,
    pub groups: Arc<Groups>,
    pub write: WritePipeline,
    pub read: ReadPipeline,
    pub operator: String,
}

impl TestRelay {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let signer = Arc::new(Ed25519Signer::from_secret_bytes(&[42u8; 32]));
        let operator = signer.public_key().to_string();
        let groups = Arc::new(Groups::new(
            store.clone(),
            ActionRegistry::standard(),
            operator.clone(),
            &config,
        ));
        let resolver = MembershipResolver::new(store.clone());
        let write = WritePipeline::new(
            store.clone(),
            groups.clone(),
            resolver.clone(),
            signer.clone(),
            &config,
        );
        let read = ReadPipeline::new(store.clone(), groups.clone(), resolver, signer, &config);
        TestRelay {
            store,
            groups,
            write,
            read,
            operator,
        }
    }
}

/// A record with a fixed id, ready for the pipelines. Signatures are not
/// verified by the core, so authors are plain strings.
pub fn record(id: &str, author: &str, kind: u16, tags: Vec<Tag>) -> Record {
    let mut record = Record::new(kind).with_author(author);
    for tag in tags {
        record = record.with_tag(tag);
    }
    record.id = id.to_string();
    record
}

/// A stored membership declaration granting `member` the given tier.
pub fn declaration(id: &str, group: &str, member: &str, tier: &str) -> Record {
    record(
        id,
        "payments",
        kind::GROUP_MEMBERS,
        vec![
            Tag::pair(TAG_IDENTIFIER, group),
            Tag::new(TAG_MEMBER, [member, tier]),
        ],
    )
}

/// Collect a stream to its end.
pub async fn drain(mut rx: mpsc::Receiver<Record>) -> Vec<Record> {
    let mut records = Vec::new();
    while let Some(record) = rx.recv().await {
        records.push(record);
    }
    records
}
