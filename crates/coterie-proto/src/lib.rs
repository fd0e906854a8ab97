//! # coterie-proto
//!
//! The data model spoken by the coterie relay core: signed, timestamped,
//! tagged content records, the tag vocabulary the relay interprets, and the
//! query filters exchanged between the core and its record store.
//!
//! ## Features
//!
//! - Flat `["name", "value", ...]` tag arrays with positional semantics
//! - The relay tag vocabulary: `h`, `e`, `p`, `f`, `d`, `full`
//! - Moderation, join-request, and summary kind numbers
//! - Conjunctive query filters with local match evaluation
//! - Canonical signing payloads for deriving record ids

#![deny(clippy::all)]
#![warn(missing_docs)]

//! ## Quick Start
//!
//! ### Building records
//!
//! ```rust
//! use coterie_proto::{kind, Record, Tag};
//!
//! let record = Record::new(kind::ADD_USER)
//!     .with_author("owner-pubkey")
//!     .with_tag(Tag::pair("h", "pictures"))
//!     .with_tag(Tag::new("p", ["alice-pubkey", "Gold"]));
//!
//! assert_eq!(record.group_id(), Some("pictures"));
//! let members: Vec<_> = record.member_entries().collect();
//! assert_eq!(members, [("alice-pubkey", Some("Gold"))]);
//! ```
//!
//! ### Querying with filters
//!
//! ```rust
//! use coterie_proto::{kind, Filter, Record, Tag};
//!
//! let membership = Record::new(kind::GROUP_MEMBERS)
//!     .with_tag(Tag::pair("d", "pictures"))
//!     .with_tag(Tag::new("p", ["alice-pubkey", "Gold"]));
//!
//! let filter = Filter::new()
//!     .kinds([kind::GROUP_MEMBERS])
//!     .tag("p", ["alice-pubkey"]);
//! assert!(filter.matches(&membership));
//! ```

pub mod filter;
pub mod kind;
pub mod record;
pub mod tags;

pub use filter::Filter;
pub use record::{GroupId, PublicKey, Record, RecordId, FREE_TIER};
pub use tags::{Tag, Tags};
