//! Rejection reasons and their wire strings.
//!
//! Every write-path refusal carries one of these. The `Display` strings are
//! the contract transports hand back verbatim, so they are stable; change
//! one and conforming clients break. Internal failures (storage, signing)
//! ride the same enum for `?` ergonomics but are not wire contract.

use thiserror::Error;

use crate::groups::ActionDecodeError;
use crate::sign::SignError;
use crate::store::StoreError;

/// Why a record or subscription was refused.
#[derive(Debug, Error)]
pub enum Rejection {
    /// Structural cap on indexable tags for capped kinds.
    #[error("too many indexable tags")]
    TooManyIndexableTags,

    /// A reply references parents not stored under its group.
    #[error("unknown parent event")]
    UnknownParent,

    /// The author lacks the permission the action needs, or replies to
    /// content above their tier.
    #[error("insufficient permissions")]
    InsufficientPermissions,

    /// A kind in the reserved moderation range with no registered action.
    #[error("unknown moderation action")]
    UnknownModerationAction,

    /// The action kind is known but the record does not decode.
    #[error("invalid moderation action: {0}")]
    InvalidModerationAction(#[from] ActionDecodeError),

    /// Moderation from a key the group does not know at all.
    #[error("unknown admin")]
    UnknownAdmin,

    /// The group's admission bucket is empty.
    #[error("rate-limited")]
    RateLimited,

    /// Group creation over an id already in use.
    #[error("group already exists")]
    GroupAlreadyExists,

    /// Anonymous subscription that could only ever match protected records.
    #[error("auth-required: authenticate please")]
    AuthRequired,

    /// Storage failure. Not wire contract.
    #[error("storage: {0}")]
    Store(#[from] StoreError),

    /// Operator signing failure. Not wire contract.
    #[error("signing: {0}")]
    Sign(#[from] SignError),
}

impl Rejection {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TooManyIndexableTags => "too_many_indexable_tags",
            Self::UnknownParent => "unknown_parent",
            Self::InsufficientPermissions => "insufficient_permissions",
            Self::UnknownModerationAction => "unknown_moderation_action",
            Self::InvalidModerationAction(_) => "invalid_moderation_action",
            Self::UnknownAdmin => "unknown_admin",
            Self::RateLimited => "rate_limited",
            Self::GroupAlreadyExists => "group_already_exists",
            Self::AuthRequired => "auth_required",
            Self::Store(_) => "store",
            Self::Sign(_) => "sign",
        }
    }

    /// Whether this is an internal failure rather than a policy verdict.
    ///
    /// Internal failures should not be echoed to clients verbatim.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Sign(_))
    }
}
