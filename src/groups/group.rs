//! One live group.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use coterie_proto::{GroupId, PublicKey, RecordId};

use super::role::{Permission, Role};
use crate::limiter::RateBucket;

/// Shared handle to a live group.
///
/// All access goes through the lock. Hold it only across synchronous work;
/// never across an await.
pub type GroupHandle = Arc<Mutex<Group>>;

/// Reconstructed group state.
///
/// Nothing here is persisted directly: every field is the fold of the
/// group's stored moderation history over the operator-seeded initial
/// state.
#[derive(Debug)]
pub struct Group {
    /// Group id, conventionally the pubkey the group was created under.
    pub id: GroupId,
    /// Display name, empty until edited.
    pub name: String,
    /// Picture URL, empty when unset.
    pub picture: String,
    /// Description, empty when unset.
    pub about: String,
    /// Hidden from public listings when set.
    pub private: bool,
    /// Join requests need explicit approval when set.
    pub closed: bool,
    members: BTreeMap<PublicKey, Role>,
    deleted: HashSet<RecordId>,
    bucket: RateBucket,
}

impl Group {
    /// A fresh group with the operator seeded as master.
    pub(crate) fn new(id: &str, operator: &str, bucket: RateBucket) -> Self {
        let mut members = BTreeMap::new();
        members.insert(operator.to_string(), Role::master());
        Group {
            id: id.to_string(),
            name: String::new(),
            picture: String::new(),
            about: String::new(),
            private: false,
            closed: false,
            members,
            deleted: HashSet::new(),
            bucket,
        }
    }

    /// The member's role, if the key is known to the group.
    pub fn role(&self, key: &str) -> Option<&Role> {
        self.members.get(key)
    }

    /// Whether the key is known to the group at all.
    pub fn is_member(&self, key: &str) -> bool {
        self.members.contains_key(key)
    }

    /// Whether the member holds the permission. Absent members hold none.
    pub fn grants(&self, key: &str, permission: Permission) -> bool {
        self.members
            .get(key)
            .is_some_and(|role| role.grants(permission))
    }

    /// Members and their roles, ordered by key.
    pub fn members(&self) -> impl Iterator<Item = (&str, &Role)> {
        self.members.iter().map(|(key, role)| (key.as_str(), role))
    }

    /// Number of known members, operator included.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Whether a record id was deleted from this group.
    pub fn is_deleted(&self, id: &str) -> bool {
        self.deleted.contains(id)
    }

    /// Spend one admission token.
    pub fn try_admit(&self) -> bool {
        self.bucket.try_admit()
    }

    pub(crate) fn add_member(&mut self, key: &str) {
        self.members
            .entry(key.to_string())
            .or_insert_with(Role::member);
    }

    pub(crate) fn remove_member(&mut self, key: &str) {
        if self.members.get(key).is_some_and(Role::is_master) {
            return;
        }
        self.members.remove(key);
    }

    pub(crate) fn grant(&mut self, key: &str, permission: Permission) {
        let role = self
            .members
            .entry(key.to_string())
            .or_insert_with(Role::admin);
        if role.is_master() {
            return;
        }
        role.grant(permission);
    }

    pub(crate) fn revoke(&mut self, key: &str, permission: Permission) {
        let Some(role) = self.members.get_mut(key) else {
            return;
        };
        if role.is_master() {
            return;
        }
        role.revoke(permission);
        if role.has_no_permissions() {
            // collapses to the plain-membership sentinel
            *role = Role::member();
        }
    }

    pub(crate) fn mark_deleted(&mut self, id: &str) {
        self.deleted.insert(id.to_string());
    }

    pub(crate) fn set_status(&mut self, private: Option<bool>, closed: Option<bool>) {
        if let Some(private) = private {
            self.private = private;
        }
        if let Some(closed) = closed {
            self.closed = closed;
        }
    }
}
