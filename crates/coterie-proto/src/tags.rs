//! Record tags and the tag vocabulary the relay interprets.
//!
//! A tag is a flat array of strings whose first element is the tag name and
//! whose remaining elements are positional values, e.g. `["p", "<pubkey>",
//! "<tier>"]`. Records carry an ordered list of tags; duplicate names are
//! allowed and meaningful (one `p` tag per listed member, one `f` tag per
//! tier a record is visible to).

use std::fmt;
use std::slice;

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Scopes a record to the group it belongs to. Value: group id.
pub const TAG_GROUP: &str = "h";

/// References a parent record. Value: record id.
pub const TAG_PARENT: &str = "e";

/// Names a member. Values: pubkey, then optionally the member's tier.
pub const TAG_MEMBER: &str = "p";

/// Restricts a record to subscribers holding the named tier.
pub const TAG_TIER: &str = "f";

/// Addressable identifier; on summaries it carries the group id.
pub const TAG_IDENTIFIER: &str = "d";

/// Marks a personal-namespace record as served only on exact request.
pub const TAG_FULL: &str = "full";

/// Group display name on metadata records.
pub const TAG_NAME: &str = "name";

/// Group picture URL on metadata records.
pub const TAG_PICTURE: &str = "picture";

/// Group description on metadata edits.
pub const TAG_ABOUT: &str = "about";

/// Grants a named permission on permission records.
pub const TAG_PERMISSION: &str = "permission";

/// Status marker: hide the group from public listings.
pub const TAG_PRIVATE: &str = "private";

/// Status marker: list the group publicly.
pub const TAG_PUBLIC: &str = "public";

/// Status marker: join requests need explicit approval.
pub const TAG_CLOSED: &str = "closed";

/// Status marker: join requests are auto-approved.
pub const TAG_OPEN: &str = "open";

/// One named tuple of strings attached to a record.
///
/// The name is never empty; values may be. Serializes to and from the flat
/// JSON array form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    name: String,
    values: Vec<String>,
}

impl Tag {
    /// Builds a tag from a name and any number of values.
    pub fn new<N, I, V>(name: N, values: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Tag {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds a bare marker tag with no values, e.g. `["full"]`.
    pub fn marker<N: Into<String>>(name: N) -> Self {
        Tag { name: name.into(), values: Vec::new() }
    }

    /// Builds the common two-element form `["name", "value"]`.
    pub fn pair<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Tag { name: name.into(), values: vec![value.into()] }
    }

    /// The tag name (first array element).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All positional values after the name.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// The first value, if any.
    pub fn value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    /// Whether stores index this tag: single-character name with a value.
    pub fn is_indexable(&self) -> bool {
        self.name.chars().count() == 1 && !self.values.is_empty()
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(1 + self.values.len()))?;
        seq.serialize_element(&self.name)?;
        for value in &self.values {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TagVisitor;

        impl<'de> Visitor<'de> for TagVisitor {
            type Value = Tag;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a non-empty array of strings")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Tag, A::Error> {
                let name: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let mut values = Vec::new();
                while let Some(value) = seq.next_element::<String>()? {
                    values.push(value);
                }
                Ok(Tag { name, values })
            }
        }

        deserializer.deserialize_seq(TagVisitor)
    }
}

/// The ordered tag list of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(Vec<Tag>);

impl Tags {
    /// An empty tag list.
    pub fn new() -> Self {
        Tags(Vec::new())
    }

    /// Appends a tag, preserving order.
    pub fn push(&mut self, tag: Tag) {
        self.0.push(tag);
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over all tags in order.
    pub fn iter(&self) -> slice::Iter<'_, Tag> {
        self.0.iter()
    }

    /// The first tag with the given name.
    pub fn find(&self, name: &str) -> Option<&Tag> {
        self.0.iter().find(|tag| tag.name() == name)
    }

    /// All tags with the given name, in order.
    pub fn all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Tag> + 'a {
        self.0.iter().filter(move |tag| tag.name() == name)
    }

    /// The first value of the first tag with the given name.
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.find(name).and_then(Tag::value)
    }

    /// The first value of every tag with the given name, in order.
    pub fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.all(name).filter_map(Tag::value)
    }

    /// Whether any tag with the given name is present, valued or not.
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|tag| tag.name() == name)
    }

    /// Number of tags a store would index.
    pub fn indexable_count(&self) -> usize {
        self.0.iter().filter(|tag| tag.is_indexable()).count()
    }
}

impl From<Vec<Tag>> for Tags {
    fn from(tags: Vec<Tag>) -> Self {
        Tags(tags)
    }
}

impl FromIterator<Tag> for Tags {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Tags(iter.into_iter().collect())
    }
}

impl IntoIterator for Tags {
    type Item = Tag;
    type IntoIter = std::vec::IntoIter<Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Tags {
    type Item = &'a Tag;
    type IntoIter = slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_to_flat_array() {
        let tag = Tag::new("p", ["abc", "Silver"]);
        let json = serde_json::to_string(&tag).unwrap();
        assert_eq!(json, r#"["p","abc","Silver"]"#);

        let marker = Tag::marker("full");
        assert_eq!(serde_json::to_string(&marker).unwrap(), r#"["full"]"#);
    }

    #[test]
    fn deserializes_from_flat_array() {
        let tag: Tag = serde_json::from_str(r#"["h","pictures","extra"]"#).unwrap();
        assert_eq!(tag.name(), "h");
        assert_eq!(tag.value(), Some("pictures"));
        assert_eq!(tag.values(), ["pictures", "extra"]);

        let err = serde_json::from_str::<Tag>("[]");
        assert!(err.is_err());
    }

    #[test]
    fn tags_round_trip_preserves_order_and_duplicates() {
        let tags: Tags = vec![
            Tag::pair("p", "alice"),
            Tag::new("p", ["bob", "Gold"]),
            Tag::marker("full"),
        ]
        .into();
        let json = serde_json::to_string(&tags).unwrap();
        let back: Tags = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tags);
        assert_eq!(back.values("p").collect::<Vec<_>>(), ["alice", "bob"]);
    }

    #[test]
    fn indexable_counts_single_char_valued_tags_only() {
        let tags: Tags = vec![
            Tag::pair("h", "grp"),
            Tag::pair("p", "alice"),
            Tag::marker("full"),
            Tag::pair("name", "Pictures"),
            Tag::marker("e"),
        ]
        .into();
        assert_eq!(tags.indexable_count(), 2);
    }

    #[test]
    fn first_value_picks_first_matching_tag() {
        let tags: Tags = vec![Tag::pair("f", "Silver"), Tag::pair("f", "Gold")].into();
        assert_eq!(tags.first_value("f"), Some("Silver"));
        assert!(tags.contains("f"));
        assert!(!tags.contains("d"));
    }
}
