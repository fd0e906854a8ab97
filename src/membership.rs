//! Subscriber standing: which groups, which tiers.
//!
//! Membership is declared out of band by billing: stored member-summary
//! records whose `d` tag names the group and whose `p` tags pair each
//! member with an optional tier. A `p` entry without a tier value means the
//! free tier, and a subscriber with no declaration at all still holds the
//! free tier everywhere.

use std::sync::Arc;

use coterie_proto::{
    kind,
    tags::{TAG_IDENTIFIER, TAG_MEMBER},
    Filter, GroupId, FREE_TIER,
};

use crate::store::{RecordStore, StoreError};

/// One subscriber's standing in one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    /// The group the declaration points at.
    pub group: GroupId,
    /// Held tiers, deduplicated, newest declaration first.
    pub tiers: Vec<String>,
}

/// Resolves subscriber standing from stored membership declarations.
#[derive(Clone)]
pub struct MembershipResolver {
    store: Arc<dyn RecordStore>,
}

impl MembershipResolver {
    /// Wire the resolver to a store.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        MembershipResolver { store }
    }

    /// Every group the subscriber is declared into, with held tiers.
    pub async fn memberships(&self, subscriber: &str) -> Result<Vec<Membership>, StoreError> {
        let filter = Filter::new()
            .kinds([kind::GROUP_MEMBERS])
            .tag(TAG_MEMBER, [subscriber]);
        let mut rx = self.store.query(filter).await?;
        let mut memberships: Vec<Membership> = Vec::new();
        while let Some(record) = rx.recv().await {
            let Some(group) = record.identifier() else {
                continue;
            };
            for (key, tier) in record.member_entries() {
                if key != subscriber {
                    continue;
                }
                let tier = tier.unwrap_or(FREE_TIER).to_string();
                match memberships.iter_mut().find(|m| m.group == group) {
                    Some(membership) => {
                        if !membership.tiers.contains(&tier) {
                            membership.tiers.push(tier);
                        }
                    }
                    None => memberships.push(Membership {
                        group: group.to_string(),
                        tiers: vec![tier],
                    }),
                }
            }
        }
        Ok(memberships)
    }

    /// Tiers the subscriber holds on one group, resolved directly from
    /// matching declarations, repeats included.
    pub async fn tiers_on_group(
        &self,
        subscriber: &str,
        group: &str,
    ) -> Result<Vec<String>, StoreError> {
        let filter = Filter::new()
            .kinds([kind::GROUP_MEMBERS])
            .tag(TAG_MEMBER, [subscriber])
            .tag(TAG_IDENTIFIER, [group]);
        let mut rx = self.store.query(filter).await?;
        let mut tiers: Vec<String> = Vec::new();
        while let Some(record) = rx.recv().await {
            for (key, tier) in record.member_entries() {
                if key != subscriber {
                    continue;
                }
                tiers.push(tier.unwrap_or(FREE_TIER).to_string());
            }
        }
        Ok(tiers)
    }

    /// Tiers held on `group` out of resolved memberships. Subscribers with
    /// no declaration hold exactly the free tier.
    pub fn tiers_for_group(memberships: &[Membership], group: &str) -> Vec<String> {
        memberships
            .iter()
            .find(|m| m.group == group)
            .map(|m| m.tiers.clone())
            .unwrap_or_else(|| vec![FREE_TIER.to_string()])
    }
}
