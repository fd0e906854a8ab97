//! Write-path admission.
//!
//! Every inbound record passes an ordered gate chain before it may be
//! stored: structural tag caps, group scoping with parent tier checks,
//! moderation authorization, and last the group's admission bucket. The
//! first failing gate wins and its wire string is the client-visible
//! verdict. Side effects that follow durable storage never reject.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use coterie_proto::{
    kind,
    tags::{TAG_GROUP, TAG_MEMBER, TAG_PERMISSION},
    Filter, Record, RecordId, Tag, FREE_TIER,
};

use crate::config::{Config, PolicyConfig};
use crate::error::Rejection;
use crate::groups::{Groups, ModerationAction, Permission};
use crate::membership::MembershipResolver;
use crate::metrics;
use crate::sign::RecordSigner;
use crate::store::RecordStore;

/// Ordered admission gate in front of the store.
pub struct WritePipeline {
    store: Arc<dyn RecordStore>,
    groups: Arc<Groups>,
    resolver: MembershipResolver,
    signer: Arc<dyn RecordSigner>,
    policy: PolicyConfig,
}

impl WritePipeline {
    /// Wire the pipeline to its collaborators.
    pub fn new(
        store: Arc<dyn RecordStore>,
        groups: Arc<Groups>,
        resolver: MembershipResolver,
        signer: Arc<dyn RecordSigner>,
        config: &Config,
    ) -> Self {
        WritePipeline {
            store,
            groups,
            resolver,
            signer,
            policy: config.policy.clone(),
        }
    }

    /// Run the gate chain without storing anything.
    pub async fn admit(&self, record: &Record) -> Result<(), Rejection> {
        let verdict = self.gates(record).await;
        if let Err(rejection) = &verdict {
            metrics::inc_rejected(rejection.error_code());
            debug!(record = %record.id, kind = record.kind, %rejection, "record rejected");
        }
        verdict
    }

    /// Admit, store, and run the post-commit side effects.
    pub async fn submit(&self, record: Record) -> Result<(), Rejection> {
        self.admit(&record).await?;
        self.store.put(record.clone()).await?;
        metrics::inc_admitted();
        debug!(record = %record.id, kind = record.kind, "record admitted");
        self.on_stored(&record).await;
        Ok(())
    }

    /// Post-commit side effects: replay moderation into the cached group,
    /// delete targeted records, auto-approve joins to open groups. Runs
    /// only after durable acceptance and never rejects; failures are
    /// logged and swallowed.
    pub async fn on_stored(&self, record: &Record) {
        if kind::is_moderation(record.kind) {
            self.apply_moderation(record).await;
        } else if record.kind == kind::JOIN_REQUEST {
            self.answer_join_request(record).await;
        }
    }

    /// Create a group by storing an operator-signed bootstrap action that
    /// hands the owner the full permission set.
    pub async fn create_group(&self, group_id: &str, owner: &str) -> Result<Record, Rejection> {
        let taken = self
            .store
            .count(Filter::new().tag(TAG_GROUP, [group_id]).limit(1))
            .await?;
        if taken > 0 {
            return Err(Rejection::GroupAlreadyExists);
        }

        let mut bootstrap = Record::new(kind::ADD_PERMISSION)
            .with_tag(Tag::pair(TAG_GROUP, group_id))
            .with_tag(Tag::pair(TAG_MEMBER, owner));
        for permission in Permission::ALL {
            bootstrap = bootstrap.with_tag(Tag::pair(TAG_PERMISSION, permission.as_str()));
        }
        self.signer.sign(&mut bootstrap)?;
        self.store.put(bootstrap.clone()).await?;
        self.on_stored(&bootstrap).await;
        debug!(group = %group_id, owner = %owner, "group created");
        Ok(bootstrap)
    }

    async fn gates(&self, record: &Record) -> Result<(), Rejection> {
        self.check_indexable_cap(record)?;
        self.check_group_scoping(record).await?;
        self.check_moderation(record).await?;
        self.check_rate(record).await
    }

    fn check_indexable_cap(&self, record: &Record) -> Result<(), Rejection> {
        if self.policy.capped_kinds.contains(&record.kind)
            && record.tags.indexable_count() > self.policy.max_indexable_tags
        {
            return Err(Rejection::TooManyIndexableTags);
        }
        Ok(())
    }

    /// Records written into a group by anyone but the group's own key must
    /// reference at least one record already stored under that group, and
    /// may only reference tiered parents the author's tiers unlock.
    async fn check_group_scoping(&self, record: &Record) -> Result<(), Rejection> {
        let Some(group) = record.group_id() else {
            return Ok(());
        };
        if record.author == group {
            return Ok(());
        }
        let parents = record.parent_ids();
        if parents.is_empty() {
            return Ok(());
        }

        let filter = Filter::new().ids(parents).tag(TAG_GROUP, [group]);
        let mut rx = self.store.query(filter).await?;
        let mut stored = Vec::new();
        while let Some(parent) = rx.recv().await {
            stored.push(parent);
        }
        if stored.is_empty() {
            return Err(Rejection::UnknownParent);
        }

        // resolved once, on the first tiered parent
        let mut author_tiers: Option<Vec<String>> = None;
        for parent in &stored {
            let tiers = parent.tiers();
            if tiers.is_empty() || tiers.contains(&FREE_TIER) {
                continue;
            }
            if author_tiers.is_none() {
                author_tiers =
                    Some(self.resolver.tiers_on_group(&record.author, group).await?);
            }
            let held = author_tiers.as_deref().unwrap_or(&[]);
            if !held.iter().any(|held| tiers.contains(&held.as_str())) {
                return Err(Rejection::InsufficientPermissions);
            }
        }
        Ok(())
    }

    async fn check_moderation(&self, record: &Record) -> Result<(), Rejection> {
        if !kind::is_moderation(record.kind) {
            return Ok(());
        }
        let registry = self.groups.registry();
        if !registry.contains(record.kind) {
            return Err(Rejection::UnknownModerationAction);
        }
        let action = registry.decode(record)?;

        let Some(group_id) = record.group_id() else {
            // decoders demand the group tag
            return Ok(());
        };
        if record.author == group_id || record.author == self.groups.operator() {
            return Ok(());
        }
        let Some(handle) = self.groups.load(group_id).await? else {
            return Err(Rejection::UnknownAdmin);
        };
        let group = handle.lock();
        let Some(role) = group.role(&record.author) else {
            return Err(Rejection::UnknownAdmin);
        };
        if !role.grants(action.required_permission()) {
            return Err(Rejection::InsufficientPermissions);
        }
        Ok(())
    }

    async fn check_rate(&self, record: &Record) -> Result<(), Rejection> {
        let Some(group_id) = record.group_id() else {
            return Ok(());
        };
        let handle = self.groups.load_or_create(group_id).await?;
        let admitted = handle.lock().try_admit();
        if !admitted {
            warn!(group = %group_id, author = %record.author, "admission bucket empty");
            return Err(Rejection::RateLimited);
        }
        Ok(())
    }

    async fn apply_moderation(&self, record: &Record) {
        let Ok(action) = self.groups.registry().decode(record) else {
            return;
        };
        let Some(group_id) = record.group_id() else {
            return;
        };
        let handle = match self.groups.load_or_create(group_id).await {
            Ok(handle) => handle,
            Err(error) => {
                warn!(group = %group_id, %error, "failed to load group for replay");
                return;
            }
        };
        {
            let mut group = handle.lock();
            action.apply(&mut group);
        }
        if let ModerationAction::DeleteRecord { ids } = &action {
            self.delete_targets(group_id, ids).await;
        }
    }

    async fn delete_targets(&self, group_id: &str, ids: &[RecordId]) {
        let cutoff = Utc::now().timestamp() - self.policy.delete_max_age_secs;
        let filter = Filter::new()
            .ids(ids.iter().map(String::as_str))
            .tag(TAG_GROUP, [group_id]);
        let mut rx = match self.store.query(filter).await {
            Ok(rx) => rx,
            Err(error) => {
                warn!(group = %group_id, %error, "failed to look up delete targets");
                return;
            }
        };
        while let Some(target) = rx.recv().await {
            if target.created_at < cutoff {
                warn!(group = %group_id, record = %target.id, "delete target too old, skipping");
                continue;
            }
            if let Err(error) = self.store.delete(&target.id).await {
                warn!(group = %group_id, record = %target.id, %error, "failed to delete record");
            }
        }
    }

    async fn answer_join_request(&self, record: &Record) {
        if !self.policy.auto_approve_joins {
            return;
        }
        let Some(group_id) = record.group_id() else {
            return;
        };
        let handle = match self.groups.load_or_create(group_id).await {
            Ok(handle) => handle,
            Err(error) => {
                warn!(group = %group_id, %error, "failed to load group for join request");
                return;
            }
        };
        {
            let group = handle.lock();
            if group.closed {
                debug!(group = %group_id, requester = %record.author, "join request left for moderators");
                return;
            }
            if group.is_member(&record.author) {
                return;
            }
        }

        let mut approval = Record::new(kind::ADD_USER)
            .with_tag(Tag::pair(TAG_GROUP, group_id))
            .with_tag(Tag::pair(TAG_MEMBER, record.author.as_str()));
        if let Err(error) = self.signer.sign(&mut approval) {
            warn!(group = %group_id, requester = %record.author, %error, "failed to sign auto-approval");
            return;
        }
        if let Err(error) = self.store.put(approval).await {
            warn!(group = %group_id, requester = %record.author, %error, "failed to store auto-approval");
            return;
        }
        handle.lock().add_member(&record.author);
        debug!(group = %group_id, member = %record.author, "join request auto-approved");
    }
}
