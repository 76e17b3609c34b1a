//! Boundary with the record transport/storage provider.
//!
//! The core only needs two operations: fetch records matching filters from
//! either the local cache or the network, and publish a record.

use crate::types::{RawRecord, RecordKind};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Which side of the provider a fetch is routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheUsage {
    CacheOnly,
    NetworkOnly,
}

/// "Records of these kinds, by these authorities, with these identifiers."
///
/// Empty sets mean "any".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub kinds: BTreeSet<u32>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub authors: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub identifiers: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: RecordKind) -> Self {
        self.kinds.insert(kind.code());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.authors.insert(author.into());
        self
    }

    pub fn identifiers<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.identifiers
            .extend(identifiers.into_iter().map(Into::into));
        self
    }

    pub fn since(mut self, since: i64) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: i64) -> Self {
        self.until = Some(until);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a record satisfies every constraint of this filter.
    /// `limit` is applied by the caller, not per record.
    pub fn matches(&self, record: &RawRecord) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&record.kind) {
            return false;
        }
        if !self.authors.is_empty() && !self.authors.contains(&record.authority) {
            return false;
        }
        if !self.identifiers.is_empty() {
            match record.identifier() {
                Some(identifier) if self.identifiers.contains(identifier) => {}
                _ => return false,
            }
        }
        if self.since.is_some_and(|since| record.created_at < since) {
            return false;
        }
        if self.until.is_some_and(|until| record.created_at > until) {
            return false;
        }
        true
    }
}

/// Apply a set of filters to records the way a provider would: a record
/// matches if any filter matches; each filter's `limit` caps its own matches
/// (newest first).
pub fn apply_filters<'a, I>(filters: &[Filter], records: I) -> Vec<RawRecord>
where
    I: IntoIterator<Item = &'a RawRecord>,
{
    let mut candidates: Vec<&RawRecord> = records.into_iter().collect();
    candidates.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)));

    let mut selected: Vec<RawRecord> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for filter in filters {
        let matching = candidates.iter().filter(|r| filter.matches(r));
        let capped: Box<dyn Iterator<Item = &&RawRecord>> = match filter.limit {
            Some(limit) => Box::new(matching.take(limit)),
            None => Box::new(matching),
        };
        for record in capped {
            if seen.insert(record.id.as_str()) {
                selected.push((*record).clone());
            }
        }
    }
    selected
}

/// External record transport/storage.
#[async_trait]
pub trait RecordProvider: Send + Sync {
    /// Fetch every record matching any of `filters` from the chosen side.
    ///
    /// `timeout` is advisory for the provider; callers enforce it as well.
    async fn fetch_records(
        &self,
        filters: &[Filter],
        usage: CacheUsage,
        timeout: Duration,
    ) -> Result<Vec<RawRecord>>;

    /// Persist a record.
    async fn publish_record(&self, record: &RawRecord) -> Result<()>;
}
