//! coterie - the authorization and visibility core of a tiered group relay.
//!
//! Groups are reconstructed on demand from their stored moderation history,
//! writes pass an ordered admission gate, and reads are filtered and
//! redacted per subscriber tier.

pub mod config;
pub mod error;
pub mod groups;
pub mod limiter;
pub mod membership;
pub mod metrics;
pub mod pipeline;
pub mod sign;
pub mod store;

pub use coterie_proto as proto;

pub use config::Config;
pub use error::Rejection;
pub use groups::{ActionRegistry, Groups, ModerationAction, Permission, Role};
pub use limiter::RateBucket;
pub use membership::{Membership, MembershipResolver};
pub use pipeline::{ReadPipeline, WritePipeline};
pub use sign::{Ed25519Signer, RecordSigner};
pub use store::{MemoryStore, RecordStore, StoreError};
