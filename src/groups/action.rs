//! The moderation action registry.
//!
//! Every moderation kind the relay accepts maps to a decoder. Decoding
//! validates a record's shape exactly once; the resulting action then
//! applies to a group without further failure, which keeps history replay
//! and post-commit application on one code path. Kinds inside the reserved
//! moderation range with no registered decoder are rejected outright.

use std::collections::HashMap;

use thiserror::Error;

use coterie_proto::{
    kind,
    tags::{
        TAG_ABOUT, TAG_CLOSED, TAG_MEMBER, TAG_NAME, TAG_OPEN, TAG_PERMISSION, TAG_PICTURE,
        TAG_PRIVATE, TAG_PUBLIC,
    },
    PublicKey, Record, RecordId,
};

use super::group::Group;
use super::role::{Permission, UnknownPermission};

/// A moderation record that did not decode into its action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionDecodeError {
    /// Every moderation record must be scoped to a group.
    #[error("missing group ('h') tag")]
    MissingGroupTag,
    /// The action names members but carries no `p` tag.
    #[error("missing member ('p') tag")]
    MissingMemberTag,
    /// The action targets records but carries no `e` tag.
    #[error("missing target ('e') tag")]
    MissingTargetTag,
    /// A permission grant or revocation carries no `permission` tag.
    #[error("missing permission tag")]
    MissingPermissionTag,
    /// A permission tag value outside the closed set.
    #[error(transparent)]
    UnknownPermission(#[from] UnknownPermission),
    /// Both markers of a status pair on one record.
    #[error("contradictory status tags")]
    ContradictoryStatus,
    /// The kind has no registered decoder.
    #[error("unregistered moderation kind {0}")]
    UnregisteredKind(u16),
}

/// One decoded moderation action, ready to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationAction {
    /// Adds members, leaving existing roles alone.
    AddUser {
        /// Pubkeys to add.
        members: Vec<PublicKey>,
    },
    /// Removes members. The master sentinel is immune.
    RemoveUser {
        /// Pubkeys to remove.
        members: Vec<PublicKey>,
    },
    /// Edits display metadata; absent fields stay untouched.
    EditMetadata {
        /// New display name.
        name: Option<String>,
        /// New picture URL.
        picture: Option<String>,
        /// New description.
        about: Option<String>,
    },
    /// Grants permissions to one member, materializing a role if needed.
    AddPermission {
        /// Target pubkey.
        member: PublicKey,
        /// Permissions to grant.
        permissions: Vec<Permission>,
    },
    /// Revokes permissions; an emptied role collapses to plain membership.
    RemovePermission {
        /// Target pubkey.
        member: PublicKey,
        /// Permissions to revoke.
        permissions: Vec<Permission>,
    },
    /// Marks records deleted in group state; storage removal is the write
    /// pipeline's job.
    DeleteRecord {
        /// Target record ids.
        ids: Vec<RecordId>,
    },
    /// Flips the private/closed flags named by marker tags.
    EditGroupStatus {
        /// `Some(true)` on a `private` marker, `Some(false)` on `public`.
        private: Option<bool>,
        /// `Some(true)` on a `closed` marker, `Some(false)` on `open`.
        closed: Option<bool>,
    },
}

impl ModerationAction {
    /// The kind number this action travels as.
    pub fn kind(&self) -> u16 {
        match self {
            ModerationAction::AddUser { .. } => kind::ADD_USER,
            ModerationAction::RemoveUser { .. } => kind::REMOVE_USER,
            ModerationAction::EditMetadata { .. } => kind::EDIT_METADATA,
            ModerationAction::AddPermission { .. } => kind::ADD_PERMISSION,
            ModerationAction::RemovePermission { .. } => kind::REMOVE_PERMISSION,
            ModerationAction::DeleteRecord { .. } => kind::DELETE_RECORD,
            ModerationAction::EditGroupStatus { .. } => kind::EDIT_GROUP_STATUS,
        }
    }

    /// The permission an author needs before this action is accepted.
    pub fn required_permission(&self) -> Permission {
        match self {
            ModerationAction::AddUser { .. } => Permission::AddUser,
            ModerationAction::RemoveUser { .. } => Permission::RemoveUser,
            ModerationAction::EditMetadata { .. } => Permission::EditMetadata,
            ModerationAction::AddPermission { .. } => Permission::AddPermission,
            ModerationAction::RemovePermission { .. } => Permission::RemovePermission,
            ModerationAction::DeleteRecord { .. } => Permission::DeleteEvent,
            ModerationAction::EditGroupStatus { .. } => Permission::EditGroupStatus,
        }
    }

    /// Fold the action into group state. Never fails: all validation
    /// happened at decode time, and edits that would touch the master
    /// sentinel are silently skipped.
    pub fn apply(&self, group: &mut Group) {
        match self {
            ModerationAction::AddUser { members } => {
                for member in members {
                    group.add_member(member);
                }
            }
            ModerationAction::RemoveUser { members } => {
                for member in members {
                    group.remove_member(member);
                }
            }
            ModerationAction::EditMetadata { name, picture, about } => {
                if let Some(name) = name {
                    group.name = name.clone();
                }
                if let Some(picture) = picture {
                    group.picture = picture.clone();
                }
                if let Some(about) = about {
                    group.about = about.clone();
                }
            }
            ModerationAction::AddPermission { member, permissions } => {
                for permission in permissions {
                    group.grant(member, *permission);
                }
            }
            ModerationAction::RemovePermission { member, permissions } => {
                for permission in permissions {
                    group.revoke(member, *permission);
                }
            }
            ModerationAction::DeleteRecord { ids } => {
                for id in ids {
                    group.mark_deleted(id);
                }
            }
            ModerationAction::EditGroupStatus { private, closed } => {
                group.set_status(*private, *closed);
            }
        }
    }
}

type Decoder = fn(&Record) -> Result<ModerationAction, ActionDecodeError>;

/// Maps moderation kinds to decoders.
///
/// Injected into the loader and the write pipeline rather than consulted
/// through a global, so embedders can narrow or extend the accepted set.
#[derive(Clone)]
pub struct ActionRegistry {
    decoders: HashMap<u16, Decoder>,
}

impl ActionRegistry {
    /// The built-in action set: kinds 9000 through 9006.
    pub fn standard() -> Self {
        let mut registry = ActionRegistry { decoders: HashMap::new() };
        registry.register(kind::ADD_USER, decode_add_user);
        registry.register(kind::REMOVE_USER, decode_remove_user);
        registry.register(kind::EDIT_METADATA, decode_edit_metadata);
        registry.register(kind::ADD_PERMISSION, decode_add_permission);
        registry.register(kind::REMOVE_PERMISSION, decode_remove_permission);
        registry.register(kind::DELETE_RECORD, decode_delete_record);
        registry.register(kind::EDIT_GROUP_STATUS, decode_edit_group_status);
        registry
    }

    /// An empty registry, for embedders building a custom set.
    pub fn empty() -> Self {
        ActionRegistry { decoders: HashMap::new() }
    }

    /// Register a decoder for a kind, replacing any earlier entry.
    pub fn register(&mut self, kind: u16, decoder: Decoder) {
        self.decoders.insert(kind, decoder);
    }

    /// Whether the kind has a registered decoder.
    pub fn contains(&self, kind: u16) -> bool {
        self.decoders.contains_key(&kind)
    }

    /// Registered kinds, sorted. Used to build history filters.
    pub fn kinds(&self) -> Vec<u16> {
        let mut kinds: Vec<u16> = self.decoders.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    /// Decode a record into its action.
    pub fn decode(&self, record: &Record) -> Result<ModerationAction, ActionDecodeError> {
        let decoder = self
            .decoders
            .get(&record.kind)
            .ok_or(ActionDecodeError::UnregisteredKind(record.kind))?;
        decoder(record)
    }
}

fn require_group(record: &Record) -> Result<(), ActionDecodeError> {
    if record.group_id().is_none() {
        return Err(ActionDecodeError::MissingGroupTag);
    }
    Ok(())
}

fn named_members(record: &Record) -> Result<Vec<PublicKey>, ActionDecodeError> {
    let members: Vec<PublicKey> = record
        .member_entries()
        .map(|(key, _)| key.to_string())
        .collect();
    if members.is_empty() {
        return Err(ActionDecodeError::MissingMemberTag);
    }
    Ok(members)
}

fn named_permissions(record: &Record) -> Result<Vec<Permission>, ActionDecodeError> {
    let mut permissions = Vec::new();
    for value in record.tags.values(TAG_PERMISSION) {
        permissions.push(value.parse::<Permission>()?);
    }
    if permissions.is_empty() {
        return Err(ActionDecodeError::MissingPermissionTag);
    }
    Ok(permissions)
}

fn decode_add_user(record: &Record) -> Result<ModerationAction, ActionDecodeError> {
    require_group(record)?;
    Ok(ModerationAction::AddUser { members: named_members(record)? })
}

fn decode_remove_user(record: &Record) -> Result<ModerationAction, ActionDecodeError> {
    require_group(record)?;
    Ok(ModerationAction::RemoveUser { members: named_members(record)? })
}

fn decode_edit_metadata(record: &Record) -> Result<ModerationAction, ActionDecodeError> {
    require_group(record)?;
    Ok(ModerationAction::EditMetadata {
        name: record.tags.first_value(TAG_NAME).map(str::to_string),
        picture: record.tags.first_value(TAG_PICTURE).map(str::to_string),
        about: record.tags.first_value(TAG_ABOUT).map(str::to_string),
    })
}

fn decode_add_permission(record: &Record) -> Result<ModerationAction, ActionDecodeError> {
    require_group(record)?;
    let member = record
        .tags
        .first_value(TAG_MEMBER)
        .ok_or(ActionDecodeError::MissingMemberTag)?
        .to_string();
    Ok(ModerationAction::AddPermission { member, permissions: named_permissions(record)? })
}

fn decode_remove_permission(record: &Record) -> Result<ModerationAction, ActionDecodeError> {
    require_group(record)?;
    let member = record
        .tags
        .first_value(TAG_MEMBER)
        .ok_or(ActionDecodeError::MissingMemberTag)?
        .to_string();
    Ok(ModerationAction::RemovePermission { member, permissions: named_permissions(record)? })
}

fn decode_delete_record(record: &Record) -> Result<ModerationAction, ActionDecodeError> {
    require_group(record)?;
    let ids: Vec<RecordId> = record.parent_ids().iter().map(|id| id.to_string()).collect();
    if ids.is_empty() {
        return Err(ActionDecodeError::MissingTargetTag);
    }
    Ok(ModerationAction::DeleteRecord { ids })
}

fn decode_edit_group_status(record: &Record) -> Result<ModerationAction, ActionDecodeError> {
    require_group(record)?;
    let tags = &record.tags;
    let private = match (tags.contains(TAG_PRIVATE), tags.contains(TAG_PUBLIC)) {
        (true, true) => return Err(ActionDecodeError::ContradictoryStatus),
        (true, false) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    };
    let closed = match (tags.contains(TAG_CLOSED), tags.contains(TAG_OPEN)) {
        (true, true) => return Err(ActionDecodeError::ContradictoryStatus),
        (true, false) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    };
    Ok(ModerationAction::EditGroupStatus { private, closed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::RateBucket;
    use coterie_proto::Tag;
    use std::time::Duration;

    fn group() -> Group {
        Group::new("grp", "operator", RateBucket::new(15, Duration::from_secs(120)))
    }

    fn record(kind: u16) -> Record {
        Record::new(kind).with_tag(Tag::pair("h", "grp"))
    }

    #[test]
    fn standard_registry_covers_the_built_in_kinds() {
        let registry = ActionRegistry::standard();
        assert_eq!(registry.kinds(), [9000, 9001, 9002, 9003, 9004, 9005, 9006]);
        assert!(registry.contains(kind::DELETE_RECORD));
        assert!(!registry.contains(9007));
        assert!(!registry.contains(kind::JOIN_REQUEST));
    }

    #[test]
    fn decoding_requires_the_group_tag() {
        let registry = ActionRegistry::standard();
        let bare = Record::new(kind::ADD_USER).with_tag(Tag::pair("p", "alice"));
        assert_eq!(
            registry.decode(&bare).unwrap_err().to_string(),
            "missing group ('h') tag"
        );
    }

    #[test]
    fn add_user_needs_members_and_applies_them() {
        let registry = ActionRegistry::standard();
        assert_eq!(
            registry.decode(&record(kind::ADD_USER)).unwrap_err(),
            ActionDecodeError::MissingMemberTag
        );

        let action = registry
            .decode(
                &record(kind::ADD_USER)
                    .with_tag(Tag::pair("p", "alice"))
                    .with_tag(Tag::pair("p", "bob")),
            )
            .unwrap();
        let mut group = group();
        action.apply(&mut group);
        assert!(group.is_member("alice"));
        assert!(group.is_member("bob"));
    }

    #[test]
    fn permission_grants_parse_the_closed_set() {
        let registry = ActionRegistry::standard();
        let action = registry
            .decode(
                &record(kind::ADD_PERMISSION)
                    .with_tag(Tag::pair("p", "mod"))
                    .with_tag(Tag::pair("permission", "add-user"))
                    .with_tag(Tag::pair("permission", "delete-event")),
            )
            .unwrap();
        assert_eq!(action.required_permission(), Permission::AddPermission);

        let mut group = group();
        action.apply(&mut group);
        assert!(group.grants("mod", Permission::AddUser));
        assert!(group.grants("mod", Permission::DeleteEvent));
        assert!(!group.grants("mod", Permission::RemoveUser));

        let err = registry
            .decode(
                &record(kind::ADD_PERMISSION)
                    .with_tag(Tag::pair("p", "mod"))
                    .with_tag(Tag::pair("permission", "fly")),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown permission: fly");
    }

    #[test]
    fn revocation_collapses_emptied_roles() {
        let registry = ActionRegistry::standard();
        let mut group = group();
        group.grant("mod", Permission::AddUser);

        let action = registry
            .decode(
                &record(kind::REMOVE_PERMISSION)
                    .with_tag(Tag::pair("p", "mod"))
                    .with_tag(Tag::pair("permission", "add-user")),
            )
            .unwrap();
        action.apply(&mut group);
        assert!(group.is_member("mod"));
        assert!(!group.grants("mod", Permission::AddUser));
    }

    #[test]
    fn delete_record_marks_state_only() {
        let registry = ActionRegistry::standard();
        let action = registry
            .decode(&record(kind::DELETE_RECORD).with_tag(Tag::pair("e", "r1")))
            .unwrap();
        let mut group = group();
        action.apply(&mut group);
        assert!(group.is_deleted("r1"));

        assert_eq!(
            registry.decode(&record(kind::DELETE_RECORD)).unwrap_err(),
            ActionDecodeError::MissingTargetTag
        );
    }

    #[test]
    fn status_markers_decode_and_contradict() {
        let registry = ActionRegistry::standard();
        let action = registry
            .decode(
                &record(kind::EDIT_GROUP_STATUS)
                    .with_tag(Tag::marker("private"))
                    .with_tag(Tag::marker("open")),
            )
            .unwrap();
        assert_eq!(
            action,
            ModerationAction::EditGroupStatus { private: Some(true), closed: Some(false) }
        );

        let err = registry
            .decode(
                &record(kind::EDIT_GROUP_STATUS)
                    .with_tag(Tag::marker("closed"))
                    .with_tag(Tag::marker("open")),
            )
            .unwrap_err();
        assert_eq!(err, ActionDecodeError::ContradictoryStatus);
    }

    #[test]
    fn unregistered_kinds_do_not_decode() {
        let registry = ActionRegistry::standard();
        let err = registry.decode(&record(9015)).unwrap_err();
        assert_eq!(err, ActionDecodeError::UnregisteredKind(9015));
    }
}
