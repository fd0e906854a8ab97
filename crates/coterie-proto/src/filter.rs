//! Store-facing query filters.
//!
//! A filter is a conjunction: every populated dimension must match. Within a
//! dimension the listed values are alternatives. An empty dimension matches
//! everything, so `Filter::new()` matches every record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::{PublicKey, Record, RecordId};

/// One store query.
///
/// `limit` caps the result set at the newest `limit` matches; it plays no
/// part in [`Filter::matches`], which evaluates a single record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Exact record ids.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<RecordId>,
    /// Author pubkeys.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<PublicKey>,
    /// Kind numbers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<u16>,
    /// Tag constraints: name to accepted first values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, Vec<String>>,
    /// Inclusive lower bound on `created_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<i64>,
    /// Inclusive upper bound on `created_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<i64>,
    /// Cap on returned records, newest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Filter {
    /// An unconstrained filter.
    pub fn new() -> Self {
        Filter::default()
    }

    /// Constrains to the given record ids.
    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Constrains to the given authors.
    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    /// Constrains to the given kinds.
    pub fn kinds<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        self.kinds = kinds.into_iter().collect();
        self
    }

    /// Constrains a tag name to a set of accepted first values.
    pub fn tag<N, I, S>(mut self, name: N, values: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the inclusive lower timestamp bound.
    pub fn since(mut self, since: i64) -> Self {
        self.since = Some(since);
        self
    }

    /// Sets the inclusive upper timestamp bound.
    pub fn until(mut self, until: i64) -> Self {
        self.until = Some(until);
        self
    }

    /// Caps the result set at the newest `limit` matches.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Accepted values for a constrained tag name, if constrained.
    pub fn tag_values(&self, name: &str) -> Option<&[String]> {
        self.tags.get(name).map(Vec::as_slice)
    }

    /// Whether the filter would accept records of this kind.
    pub fn wants_kind(&self, kind: u16) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }

    /// Evaluates the filter against one record, ignoring `limit`.
    pub fn matches(&self, record: &Record) -> bool {
        if !self.ids.is_empty() && !self.ids.contains(&record.id) {
            return false;
        }
        if !self.authors.is_empty() && !self.authors.contains(&record.author) {
            return false;
        }
        if !self.wants_kind(record.kind) {
            return false;
        }
        if let Some(since) = self.since {
            if record.created_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if record.created_at > until {
                return false;
            }
        }
        for (name, accepted) in &self.tags {
            let hit = record
                .tags
                .values(name)
                .any(|value| accepted.iter().any(|a| a == value));
            if !hit {
                return false;
            }
        }
        true
    }
}
