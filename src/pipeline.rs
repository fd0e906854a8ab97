//! Write and read pipelines.
//!
//! The write side is an ordered gate chain in front of the store; the read
//! side filters, redacts, and augments query results per subscriber. Both
//! lean on the group loader for live state and on the membership resolver
//! for tier entitlements.

mod read;
mod write;

pub use read::ReadPipeline;
pub use write::WritePipeline;
