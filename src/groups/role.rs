//! Roles and the closed permission set.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Everything a role can be allowed to do.
///
/// The set is closed and the wire names are stable: they appear as
/// `permission` tag values on grant records and in member summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    /// Add members to the group.
    AddUser,
    /// Edit the group's display metadata.
    EditMetadata,
    /// Delete stored records from the group.
    DeleteEvent,
    /// Remove members from the group.
    RemoveUser,
    /// Grant permissions to members.
    AddPermission,
    /// Revoke permissions from members.
    RemovePermission,
    /// Flip the group's private/closed flags.
    EditGroupStatus,
}

impl Permission {
    /// Every permission, in wire order.
    pub const ALL: [Permission; 7] = [
        Permission::AddUser,
        Permission::EditMetadata,
        Permission::DeleteEvent,
        Permission::RemoveUser,
        Permission::AddPermission,
        Permission::RemovePermission,
        Permission::EditGroupStatus,
    ];

    /// Stable wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::AddUser => "add-user",
            Permission::EditMetadata => "edit-metadata",
            Permission::DeleteEvent => "delete-event",
            Permission::RemoveUser => "remove-user",
            Permission::AddPermission => "add-permission",
            Permission::RemovePermission => "remove-permission",
            Permission::EditGroupStatus => "edit-group-status",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A permission value naming nothing in the closed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown permission: {0}")]
pub struct UnknownPermission(pub String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add-user" => Ok(Permission::AddUser),
            "edit-metadata" => Ok(Permission::EditMetadata),
            "delete-event" => Ok(Permission::DeleteEvent),
            "remove-user" => Ok(Permission::RemoveUser),
            "add-permission" => Ok(Permission::AddPermission),
            "remove-permission" => Ok(Permission::RemovePermission),
            "edit-group-status" => Ok(Permission::EditGroupStatus),
            other => Err(UnknownPermission(other.to_string())),
        }
    }
}

const MASTER: &str = "master";
const MEMBER: &str = "member";
const ADMIN: &str = "admin";

/// A named permission set attached to one member.
///
/// Two sentinels matter. `master` is seeded for the operator on every group,
/// holds every permission, and is immune to membership and permission edits.
/// `member` means known with zero permissions, which is distinct from not
/// being in the group at all. Other names are cosmetic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    name: String,
    permissions: BTreeSet<Permission>,
}

impl Role {
    /// The operator sentinel: every permission, immune to edits.
    pub fn master() -> Self {
        Role {
            name: MASTER.to_string(),
            permissions: Permission::ALL.into_iter().collect(),
        }
    }

    /// The plain-membership sentinel: known, zero permissions.
    pub fn member() -> Self {
        Role {
            name: MEMBER.to_string(),
            permissions: BTreeSet::new(),
        }
    }

    /// A role materialized by a permission grant, before grants land.
    pub(crate) fn admin() -> Self {
        Role {
            name: ADMIN.to_string(),
            permissions: BTreeSet::new(),
        }
    }

    /// The role's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is the operator sentinel.
    pub fn is_master(&self) -> bool {
        self.name == MASTER
    }

    /// Whether the role carries permissions without being master. These are
    /// the members an admin summary lists.
    pub fn is_elevated(&self) -> bool {
        !self.is_master() && !self.permissions.is_empty()
    }

    /// Whether the role allows the permission.
    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Held permissions in wire order.
    pub fn permissions(&self) -> impl Iterator<Item = Permission> + '_ {
        self.permissions.iter().copied()
    }

    pub(crate) fn grant(&mut self, permission: Permission) {
        self.permissions.insert(permission);
    }

    pub(crate) fn revoke(&mut self, permission: Permission) {
        self.permissions.remove(&permission);
    }

    pub(crate) fn has_no_permissions(&self) -> bool {
        self.permissions.is_empty()
    }
}
