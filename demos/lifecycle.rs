//! Walks a group through its whole life over an in-memory store: creation,
//! a tiered post, a paid membership, an auto-approved join, and the two
//! read paths. Run with `cargo run --example lifecycle`.

use std::sync::Arc;

use coterie::config::Config;
use coterie::groups::{ActionRegistry, Groups};
use coterie::membership::MembershipResolver;
use coterie::pipeline::{ReadPipeline, WritePipeline};
use coterie::proto::tags::{TAG_GROUP, TAG_IDENTIFIER, TAG_MEMBER, TAG_TIER};
use coterie::proto::{kind, Filter, Record, Tag};
use coterie::sign::{Ed25519Signer, RecordSigner};
use coterie::store::{MemoryStore, RecordStore};
use coterie::metrics;
use tracing_subscriber::EnvFilter;

const GROUP: &str = "pictures";

fn post(id: &str, author: &str, tier: Option<&str>) -> Record {
    let mut record = Record::new(11)
        .with_author(author)
        .with_content("a photo set")
        .with_tag(Tag::pair(TAG_GROUP, GROUP));
    if let Some(tier) = tier {
        record = record.with_tag(Tag::pair(TAG_TIER, tier));
    }
    record.id = id.to_string();
    record.sig = Some(format!("sig-{id}"));
    record
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();
    metrics::init();

    let store = Arc::new(MemoryStore::new());
    let signer = Arc::new(Ed25519Signer::generate());
    let operator = signer.public_key().to_string();
    let config = Config::default();

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

    println!("operator key: {operator}");

    // Alice claims the group and gets every permission on it.
    write.create_group(GROUP, "alice").await?;
    println!("group '{GROUP}' created, owner alice");

    // Alice posts once publicly and once behind the Gold tier.
    write.submit(post("teaser", "alice", None)).await?;
    write.submit(post("exclusive", "alice", Some("Gold"))).await?;

    // The payment processor records carol's Gold membership.
    let mut receipt = Record::new(kind::GROUP_MEMBERS)
        .with_author("payments")
        .with_tag(Tag::pair(TAG_IDENTIFIER, GROUP))
        .with_tag(Tag::new(TAG_MEMBER, ["carol", "Gold"]));
    receipt.id = "receipt-carol".to_string();
    store.put(receipt).await?;

    // Dave knocks; the group is open, so he is let in automatically.
    let mut knock = Record::new(kind::JOIN_REQUEST)
        .with_author("dave")
        .with_tag(Tag::pair(TAG_GROUP, GROUP));
    knock.id = "knock-dave".to_string();
    write.submit(knock).await?;
    let handle = groups.load_or_create(GROUP).await?;
    println!("dave is a member: {}", handle.lock().is_member("dave"));

    // An anonymous subscription to Gold-only content is turned away.
    let gold_only = Filter::new().ids(["exclusive"]);
    match read.ensure_authorized(&gold_only, None).await {
        Ok(()) => println!("anonymous subscription allowed"),
        Err(rejection) => println!("anonymous subscription refused: {rejection}"),
    }

    // Carol paid, so she sees both posts; the tiered one arrives unsigned.
    let feed = Filter::new().kinds([11]);
    let mut rx = read.stream(feed.clone(), Some("carol")).await?;
    while let Some(record) = rx.recv().await {
        println!(
            "carol <- {} (signature {})",
            record.id,
            if record.sig.is_some() { "kept" } else { "stripped" },
        );
    }

    // Dave never paid, so the Gold post stays invisible to him.
    let mut rx = read.stream(feed, Some("dave")).await?;
    while let Some(record) = rx.recv().await {
        println!("dave  <- {}", record.id);
    }

    // Anyone can ask for the group's synthesized directory records.
    let summary = Filter::new()
        .kinds([kind::GROUP_METADATA, kind::GROUP_MEMBERS])
        .tag(TAG_IDENTIFIER, [GROUP]);
    let mut rx = read.stream(summary, Some("carol")).await?;
    while let Some(record) = rx.recv().await {
        println!("summary kind {} from {}", record.kind, record.author);
    }

    println!("---\n{}", metrics::gather_metrics());
    Ok(())
}
