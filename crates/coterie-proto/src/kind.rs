//! Record kind numbers.
//!
//! Kinds partition records into plain content, moderation actions, join
//! requests, and relay-synthesized summaries. The moderation range is
//! reserved: kinds inside it that no action decoder claims are rejected,
//! never stored.

/// Adds a member to a group. Moderation.
pub const ADD_USER: u16 = 9000;

/// Removes a member from a group. Moderation.
pub const REMOVE_USER: u16 = 9001;

/// Edits group display metadata. Moderation.
pub const EDIT_METADATA: u16 = 9002;

/// Grants permissions to a member. Moderation.
pub const ADD_PERMISSION: u16 = 9003;

/// Revokes permissions from a member. Moderation.
pub const REMOVE_PERMISSION: u16 = 9004;

/// Deletes a previously stored record from a group. Moderation.
pub const DELETE_RECORD: u16 = 9005;

/// Flips the group's private/closed status flags. Moderation.
pub const EDIT_GROUP_STATUS: u16 = 9006;

/// Asks to join a group; may be auto-approved.
pub const JOIN_REQUEST: u16 = 9021;

/// Legacy group existence marker, authored under the group's own key.
pub const GROUP_MARKER: u16 = 37001;

/// Synthesized summary: group name, picture, about, status flags.
pub const GROUP_METADATA: u16 = 39000;

/// Synthesized summary: members holding elevated permissions.
pub const GROUP_ADMINS: u16 = 39001;

/// Synthesized summary: full member list.
pub const GROUP_MEMBERS: u16 = 39002;

/// First kind of the reserved moderation range.
pub const MODERATION_MIN: u16 = 9000;

/// Last kind of the reserved moderation range.
pub const MODERATION_MAX: u16 = 9020;

/// Whether a kind falls inside the reserved moderation range.
pub fn is_moderation(kind: u16) -> bool {
    (MODERATION_MIN..=MODERATION_MAX).contains(&kind)
}

/// Whether a kind is one of the relay-synthesized summaries.
pub fn is_summary(kind: u16) -> bool {
    matches!(kind, GROUP_METADATA | GROUP_ADMINS | GROUP_MEMBERS)
}
