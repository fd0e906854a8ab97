//! Group state: roles, moderation actions, reconstruction, caching.
//!
//! A group is never stored as a row. Its state is the fold of its stored
//! moderation records over operator-seeded initial state; [`Groups`]
//! replays that history on demand and caches live handles per process.

mod action;
mod cache;
mod group;
mod loader;
mod role;

pub use action::{ActionDecodeError, ActionRegistry, ModerationAction};
pub use cache::GroupCache;
pub use group::{Group, GroupHandle};
pub use loader::Groups;
pub use role::{Permission, Role, UnknownPermission};
