//! Signed, timestamped, tagged content records.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::tags::{Tag, Tags, TAG_FULL, TAG_GROUP, TAG_IDENTIFIER, TAG_MEMBER, TAG_PARENT, TAG_TIER};

/// Hex digest identifying a record.
pub type RecordId = String;

/// Hex-encoded public key of a record author or member.
pub type PublicKey = String;

/// Group identifier. By convention the pubkey the group was created under.
pub type GroupId = String;

/// The tier every subscriber implicitly holds.
pub const FREE_TIER: &str = "Free";

/// One record as authored, stored, and forwarded.
///
/// `id` and `sig` are filled by signing; records built locally carry empty
/// strings until then. `sig` is the only field the relay ever redacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Digest over the signing payload.
    pub id: RecordId,
    /// Author pubkey, hex.
    pub author: PublicKey,
    /// Unix seconds.
    pub created_at: i64,
    /// Kind number, see [`crate::kind`].
    pub kind: u16,
    /// Ordered tag list.
    pub tags: Tags,
    /// Free-form payload.
    pub content: String,
    /// Detached signature over `id`, hex. Absent on redacted copies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
}

impl Record {
    /// Builds an unsigned record of the given kind, stamped now.
    pub fn new(kind: u16) -> Self {
        Record {
            id: String::new(),
            author: String::new(),
            created_at: Utc::now().timestamp(),
            kind,
            tags: Tags::new(),
            content: String::new(),
            sig: None,
        }
    }

    /// Appends a tag.
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    /// Sets the content payload.
    pub fn with_content<S: Into<String>>(mut self, content: S) -> Self {
        self.content = content.into();
        self
    }

    /// Sets the author pubkey.
    pub fn with_author<S: Into<String>>(mut self, author: S) -> Self {
        self.author = author.into();
        self
    }

    /// Overrides the creation timestamp.
    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }

    /// The group this record is scoped to: first `h` tag value.
    pub fn group_id(&self) -> Option<&str> {
        self.tags.first_value(TAG_GROUP)
    }

    /// Referenced parent record ids: first value of each `e` tag.
    pub fn parent_ids(&self) -> Vec<&str> {
        self.tags.values(TAG_PARENT).collect()
    }

    /// Tiers this record is restricted to: first value of each `f` tag.
    /// Empty means public.
    pub fn tiers(&self) -> Vec<&str> {
        self.tags.values(TAG_TIER).collect()
    }

    /// Addressable identifier: first `d` tag value.
    pub fn identifier(&self) -> Option<&str> {
        self.tags.first_value(TAG_IDENTIFIER)
    }

    /// Whether the record carries the bare `full` marker.
    pub fn has_full_marker(&self) -> bool {
        self.tags.contains(TAG_FULL)
    }

    /// Members named by `p` tags, paired with their optional tier.
    pub fn member_entries(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.tags.all(TAG_MEMBER).filter_map(|tag| {
            let mut values = tag.values().iter();
            let key = values.next()?;
            Some((key.as_str(), values.next().map(String::as_str)))
        })
    }

    /// Canonical payload the record id is derived from: the JSON array
    /// `[0, author, created_at, kind, tags, content]` with no whitespace.
    pub fn signing_payload(&self) -> String {
        serde_json::json!([0, self.author, self.created_at, self.kind, self.tags, self.content])
            .to_string()
    }

    /// A copy with the signature stripped. Everything else is untouched.
    pub fn redacted(mut self) -> Self {
        self.sig = None;
        self
    }
}
