//! Read-path filtering and redaction.
//!
//! Stored records flow from the store to the subscriber through a
//! per-record visibility gate: untiered records are public, tiered records
//! need a matching tier, and tier-protected records lose their signature on
//! the way out unless the subscriber authored them. For aggregate query
//! shapes the pipeline also synthesizes fresh operator-signed summary
//! records from live group state; those are never persisted.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use coterie_proto::{
    kind,
    tags::{
        TAG_CLOSED, TAG_IDENTIFIER, TAG_MEMBER, TAG_NAME, TAG_OPEN, TAG_PICTURE, TAG_PRIVATE,
        TAG_PUBLIC,
    },
    Filter, PublicKey, Record, Tag, FREE_TIER,
};

use crate::config::Config;
use crate::error::Rejection;
use crate::groups::{Group, Groups};
use crate::membership::{Membership, MembershipResolver};
use crate::metrics;
use crate::sign::RecordSigner;
use crate::store::{RecordStore, StoreError};

/// Buffered records per subscription before backpressure.
const STREAM_CAPACITY: usize = 256;

/// Per-subscriber visibility, redaction, and summary synthesis.
pub struct ReadPipeline {
    store: Arc<dyn RecordStore>,
    groups: Arc<Groups>,
    resolver: MembershipResolver,
    signer: Arc<dyn RecordSigner>,
    serve_admin_summaries: bool,
}

impl ReadPipeline {
    /// Wire the pipeline to its collaborators.
    pub fn new(
        store: Arc<dyn RecordStore>,
        groups: Arc<Groups>,
        resolver: MembershipResolver,
        signer: Arc<dyn RecordSigner>,
        config: &Config,
    ) -> Self {
        ReadPipeline {
            store,
            groups,
            resolver,
            signer,
            serve_admin_summaries: config.groups.serve_admin_summaries,
        }
    }

    /// Refuse anonymous subscriptions that could only ever match protected
    /// records. A single public match, or no match at all, lets the query
    /// through; gating then happens per record.
    pub async fn ensure_authorized(
        &self,
        filter: &Filter,
        subscriber: Option<&str>,
    ) -> Result<(), Rejection> {
        if subscriber.is_some() {
            return Ok(());
        }
        let mut rx = self.store.query(filter.clone()).await?;
        let mut protected = 0usize;
        while let Some(record) = rx.recv().await {
            let tiers = record.tiers();
            if tiers.is_empty() || tiers.contains(&FREE_TIER) {
                return Ok(());
            }
            protected += 1;
        }
        if protected > 0 {
            return Err(Rejection::AuthRequired);
        }
        Ok(())
    }

    /// Stream matching records, filtered and redacted for the subscriber.
    ///
    /// Summaries for explicitly requested aggregate kinds are sent first,
    /// then stored matches as the store yields them. Dropping the receiver
    /// cancels the stream.
    pub async fn stream(
        &self,
        filter: Filter,
        subscriber: Option<&str>,
    ) -> Result<mpsc::Receiver<Record>, StoreError> {
        let memberships = match subscriber {
            Some(subscriber) => self.resolver.memberships(subscriber).await?,
            None => Vec::new(),
        };
        let stored = self.store.query(filter.clone()).await?;
        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        let task = StreamTask {
            groups: Arc::clone(&self.groups),
            signer: Arc::clone(&self.signer),
            serve_admin_summaries: self.serve_admin_summaries,
            filter,
            subscriber: subscriber.map(PublicKey::from),
            memberships,
        };
        tokio::spawn(task.run(stored, tx));
        Ok(rx)
    }
}

struct StreamTask {
    groups: Arc<Groups>,
    signer: Arc<dyn RecordSigner>,
    serve_admin_summaries: bool,
    filter: Filter,
    subscriber: Option<PublicKey>,
    memberships: Vec<Membership>,
}

impl StreamTask {
    async fn run(self, mut stored: mpsc::Receiver<Record>, tx: mpsc::Sender<Record>) {
        if !self.send_summaries(&tx).await {
            return;
        }
        while let Some(record) = stored.recv().await {
            let subscriber = self.subscriber.as_deref();
            if !visible(&record, subscriber, &self.memberships, &self.filter) {
                continue;
            }
            let record = outbound(record, subscriber);
            metrics::inc_streamed();
            if tx.send(record).await.is_err() {
                return;
            }
        }
    }

    /// Synthesize summaries for every group the filter names. `false` when
    /// the subscriber went away.
    async fn send_summaries(&self, tx: &mpsc::Sender<Record>) -> bool {
        let Some(wanted) = self.filter.tag_values(TAG_IDENTIFIER) else {
            return true;
        };
        for group_id in wanted {
            let handle = match self.groups.load(group_id).await {
                Ok(Some(handle)) => handle,
                Ok(None) => continue,
                Err(error) => {
                    warn!(group = %group_id, %error, "failed to load group for summaries");
                    continue;
                }
            };
            let mut summaries = Vec::new();
            {
                let group = handle.lock();
                if self.filter.kinds.contains(&kind::GROUP_METADATA) {
                    summaries.push(metadata_summary(&group));
                }
                if self.filter.kinds.contains(&kind::GROUP_MEMBERS) {
                    summaries.push(members_summary(&group, self.groups.operator()));
                }
                if self.serve_admin_summaries && self.filter.kinds.contains(&kind::GROUP_ADMINS) {
                    summaries.push(admins_summary(&group));
                }
            }
            for mut summary in summaries {
                if let Err(error) = self.signer.sign(&mut summary) {
                    warn!(group = %group_id, kind = summary.kind, %error, "failed to sign summary");
                    continue;
                }
                metrics::inc_summary(summary.kind);
                if tx.send(summary).await.is_err() {
                    return false;
                }
            }
        }
        true
    }
}

/// Whether the subscriber may see this record at all.
fn visible(
    record: &Record,
    subscriber: Option<&str>,
    memberships: &[Membership],
    filter: &Filter,
) -> bool {
    let tiers = record.tiers();
    if tiers.is_empty() {
        return true;
    }
    let Some(group) = record.group_id() else {
        return true;
    };
    if subscriber == Some(group) {
        // owner namespace: full-content records only on explicit request,
        // authorship included
        if record.has_full_marker() {
            let Some(identifier) = record.identifier() else {
                return false;
            };
            return filter
                .tag_values(TAG_IDENTIFIER)
                .is_some_and(|wanted| wanted.iter().any(|value| value.as_str() == identifier));
        }
        return true;
    }
    if subscriber == Some(record.author.as_str()) {
        return true;
    }
    if tiers.contains(&FREE_TIER) {
        return true;
    }
    let held = MembershipResolver::tiers_for_group(memberships, group);
    held.iter().any(|held| tiers.contains(&held.as_str()))
}

/// Strip the signature from tier-protected records going to anyone but
/// their author.
fn outbound(record: Record, subscriber: Option<&str>) -> Record {
    let protected = record.tiers().iter().any(|tier| *tier != FREE_TIER);
    if protected && subscriber != Some(record.author.as_str()) {
        metrics::inc_redacted();
        return record.redacted();
    }
    record
}

fn metadata_summary(group: &Group) -> Record {
    let mut record = Record::new(kind::GROUP_METADATA)
        .with_content(group.about.clone())
        .with_tag(Tag::pair(TAG_IDENTIFIER, group.id.clone()));
    if !group.name.is_empty() {
        record = record.with_tag(Tag::pair(TAG_NAME, group.name.clone()));
    }
    if !group.picture.is_empty() {
        record = record.with_tag(Tag::pair(TAG_PICTURE, group.picture.clone()));
    }
    record = record.with_tag(Tag::marker(if group.private {
        TAG_PRIVATE
    } else {
        TAG_PUBLIC
    }));
    record.with_tag(Tag::marker(if group.closed { TAG_CLOSED } else { TAG_OPEN }))
}

fn members_summary(group: &Group, operator: &str) -> Record {
    let mut record = Record::new(kind::GROUP_MEMBERS)
        .with_content(format!("list of members of {}", group.id))
        .with_tag(Tag::pair(TAG_IDENTIFIER, group.id.clone()));
    for (key, role) in group.members() {
        if key == operator {
            continue;
        }
        let mut values = vec![key.to_string()];
        if role.is_elevated() {
            values.extend(role.permissions().map(|p| p.as_str().to_string()));
        }
        record = record.with_tag(Tag::new(TAG_MEMBER, values));
    }
    record
}

fn admins_summary(group: &Group) -> Record {
    let mut record = Record::new(kind::GROUP_ADMINS)
        .with_content(format!("list of admins for group {}", group.id))
        .with_tag(Tag::pair(TAG_IDENTIFIER, group.id.clone()));
    for (key, role) in group.members() {
        if !role.is_elevated() {
            continue;
        }
        let mut values = vec![key.to_string(), "admin".to_string()];
        values.extend(role.permissions().map(|p| p.as_str().to_string()));
        record = record.with_tag(Tag::new(TAG_MEMBER, values));
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::Permission;
    use crate::limiter::RateBucket;
    use coterie_proto::tags::{TAG_FULL, TAG_GROUP, TAG_TIER};
    use std::time::Duration;

    fn tiered(author: &str, group: Option<&str>, tiers: &[&str]) -> Record {
        let mut record = Record::new(11).with_author(author);
        if let Some(group) = group {
            record = record.with_tag(Tag::pair(TAG_GROUP, group));
        }
        for tier in tiers {
            record = record.with_tag(Tag::pair(TAG_TIER, *tier));
        }
        record.id = "r1".to_string();
        record
    }

    fn gold_membership() -> Vec<Membership> {
        vec![Membership {
            group: "grp".to_string(),
            tiers: vec!["Gold".to_string()],
        }]
    }

    fn group() -> Group {
        Group::new("grp", "operator", RateBucket::new(15, Duration::from_secs(120)))
    }

    #[test]
    fn untiered_records_are_visible_to_everyone() {
        let record = tiered("alice", Some("grp"), &[]);
        let filter = Filter::new();
        assert!(visible(&record, None, &[], &filter));
        assert!(visible(&record, Some("bob"), &[], &filter));
    }

    #[test]
    fn tiered_records_need_a_matching_tier() {
        let record = tiered("alice", Some("grp"), &["Gold"]);
        let filter = Filter::new();
        assert!(!visible(&record, None, &[], &filter));
        assert!(!visible(&record, Some("bob"), &[], &filter));
        assert!(visible(&record, Some("bob"), &gold_membership(), &filter));
        assert!(visible(&record, Some("alice"), &[], &filter));
    }

    #[test]
    fn free_tagged_records_are_visible_without_standing() {
        let record = tiered("alice", Some("grp"), &["Gold", "Free"]);
        let filter = Filter::new();
        assert!(visible(&record, None, &[], &filter));
        assert!(visible(&record, Some("bob"), &[], &filter));
    }

    #[test]
    fn groupless_tiered_records_are_forwarded() {
        let record = tiered("alice", None, &["Gold"]);
        assert!(visible(&record, Some("bob"), &[], &Filter::new()));
    }

    #[test]
    fn owner_namespace_gates_full_records_on_explicit_request() {
        let mut record = tiered("alice", Some("owner"), &["Gold"])
            .with_tag(Tag::marker(TAG_FULL))
            .with_tag(Tag::pair(TAG_IDENTIFIER, "post-1"));
        record.id = "r2".to_string();

        let broad = Filter::new();
        assert!(!visible(&record, Some("owner"), &[], &broad));

        let explicit = Filter::new().tag(TAG_IDENTIFIER, ["post-1"]);
        assert!(visible(&record, Some("owner"), &[], &explicit));

        let partial = tiered("alice", Some("owner"), &["Gold"]);
        assert!(visible(&partial, Some("owner"), &[], &broad));
    }

    #[test]
    fn authorship_does_not_bypass_the_owner_namespace_gate() {
        let mut own = tiered("owner", Some("owner"), &["Gold"])
            .with_tag(Tag::marker(TAG_FULL))
            .with_tag(Tag::pair(TAG_IDENTIFIER, "post-2"));
        own.id = "r3".to_string();

        assert!(!visible(&own, Some("owner"), &[], &Filter::new()));

        let explicit = Filter::new().tag(TAG_IDENTIFIER, ["post-2"]);
        assert!(visible(&own, Some("owner"), &[], &explicit));
    }

    #[test]
    fn protection_strips_signatures_for_non_authors() {
        let mut record = tiered("alice", Some("grp"), &["Gold"]);
        record.sig = Some("sig".to_string());
        let stripped = outbound(record, Some("bob"));
        assert_eq!(stripped.sig, None);

        let mut own = tiered("alice", Some("grp"), &["Gold"]);
        own.sig = Some("sig".to_string());
        let kept = outbound(own, Some("alice"));
        assert_eq!(kept.sig.as_deref(), Some("sig"));

        let mut with_free = tiered("alice", Some("grp"), &["Gold", "Free"]);
        with_free.sig = Some("sig".to_string());
        let stripped = outbound(with_free, Some("bob"));
        assert_eq!(stripped.sig, None);

        let mut free_only = tiered("alice", Some("grp"), &["Free"]);
        free_only.sig = Some("sig".to_string());
        let kept = outbound(free_only, Some("bob"));
        assert_eq!(kept.sig.as_deref(), Some("sig"));

        let mut public = tiered("alice", Some("grp"), &[]);
        public.sig = Some("sig".to_string());
        let kept = outbound(public, None);
        assert_eq!(kept.sig.as_deref(), Some("sig"));
    }

    #[test]
    fn metadata_summary_reflects_group_state() {
        let mut group = group();
        let summary = metadata_summary(&group);
        assert_eq!(summary.kind, kind::GROUP_METADATA);
        assert_eq!(summary.tags.first_value(TAG_IDENTIFIER), Some("grp"));
        assert!(summary.tags.contains(TAG_PUBLIC));
        assert!(summary.tags.contains(TAG_OPEN));
        assert!(!summary.tags.contains(TAG_NAME));

        group.name = "Pictures".to_string();
        group.about = "a picture group".to_string();
        group.set_status(Some(true), Some(true));
        let summary = metadata_summary(&group);
        assert_eq!(summary.tags.first_value(TAG_NAME), Some("Pictures"));
        assert_eq!(summary.content, "a picture group");
        assert!(summary.tags.contains(TAG_PRIVATE));
        assert!(summary.tags.contains(TAG_CLOSED));
    }

    #[test]
    fn members_summary_lists_everyone_but_the_operator() {
        let mut group = group();
        group.add_member("carol");
        group.grant("mod", Permission::AddUser);
        let summary = members_summary(&group, "operator");
        assert_eq!(summary.kind, kind::GROUP_MEMBERS);

        let entries: Vec<&[String]> = summary
            .tags
            .all(TAG_MEMBER)
            .map(|tag| tag.values())
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ["carol"]);
        assert_eq!(entries[1], ["mod", "add-user"]);
    }

    #[test]
    fn admins_summary_lists_only_elevated_members() {
        let mut group = group();
        group.add_member("carol");
        group.grant("mod", Permission::AddUser);
        group.grant("mod", Permission::RemoveUser);
        let summary = admins_summary(&group);
        assert_eq!(summary.kind, kind::GROUP_ADMINS);

        let entries: Vec<&[String]> = summary
            .tags
            .all(TAG_MEMBER)
            .map(|tag| tag.values())
            .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0], ["mod", "admin", "add-user", "remove-user"]);
    }
}
