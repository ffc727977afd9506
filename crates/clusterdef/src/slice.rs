//! Sparse index addressing for a facet's servers
//!
//! A facet declares `instances = N`, making `0..N` its valid indexes.
//! Servers are materialized lazily. Addressing a single index always
//! succeeds, creating a *bogus* server when the index is out of range;
//! addressing through a list or a text range only ever creates in-range
//! servers and silently skips out-of-range indexes nobody materialized.

use clusterdef_types::{ClusterError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Caller-supplied selector naming a subset of a facet's servers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SliceSpec {
    /// Every index: the valid range plus anything materialized
    #[default]
    All,
    /// One index, materialized (as bogus if out of range) on demand
    Index(u32),
    /// Listed indexes; only existing or in-range indexes are returned
    Indexes(Vec<u32>),
    /// Parsed text ranges, resolved like a list
    Ranges(Vec<RangeInclusive<u32>>),
}

impl SliceSpec {
    /// Parse `"0-1,3-4"`, `"69"` or `""` (= all).
    ///
    /// A range with `low > high` contributes nothing. Non-numeric tokens and
    /// malformed ranges are rejected.
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::All);
        }

        let mut ranges = Vec::new();
        for token in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            ranges.push(parse_token(token)?);
        }
        Ok(Self::Ranges(ranges))
    }

    pub fn is_all(&self) -> bool {
        match self {
            Self::All => true,
            Self::Indexes(list) => list.is_empty(),
            Self::Index(_) | Self::Ranges(_) => false,
        }
    }
}

fn parse_token(token: &str) -> Result<RangeInclusive<u32>> {
    match token.split_once('-') {
        Some((low, high)) => {
            let low = parse_index(token, low)?;
            let high = parse_index(token, high)?;
            Ok(low..=high)
        }
        None => {
            let index = parse_index(token, token)?;
            Ok(index..=index)
        }
    }
}

fn parse_index(token: &str, part: &str) -> Result<u32> {
    let part = part.trim();
    if part.is_empty() {
        return Err(ClusterError::slice_parse(token, "missing range bound"));
    }
    part.parse::<u32>()
        .map_err(|e| ClusterError::slice_parse(token, format!("'{part}' is not an index: {e}")))
}

impl FromStr for SliceSpec {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<u32> for SliceSpec {
    fn from(index: u32) -> Self {
        Self::Index(index)
    }
}

impl From<Vec<u32>> for SliceSpec {
    fn from(indexes: Vec<u32>) -> Self {
        if indexes.is_empty() {
            Self::All
        } else {
            Self::Indexes(indexes)
        }
    }
}

impl From<&[u32]> for SliceSpec {
    fn from(indexes: &[u32]) -> Self {
        Self::from(indexes.to_vec())
    }
}

impl<T: Into<SliceSpec>> From<Option<T>> for SliceSpec {
    fn from(spec: Option<T>) -> Self {
        spec.map_or(Self::All, Into::into)
    }
}

impl fmt::Display for SliceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Index(index) => write!(f, "{index}"),
            Self::Indexes(list) => {
                let parts: Vec<String> = list.iter().map(u32::to_string).collect();
                write!(f, "[{}]", parts.join(","))
            }
            Self::Ranges(ranges) => {
                let parts: Vec<String> = ranges
                    .iter()
                    .map(|r| {
                        if r.start() == r.end() {
                            r.start().to_string()
                        } else {
                            format!("{}-{}", r.start(), r.end())
                        }
                    })
                    .collect();
                f.write_str(&parts.join(","))
            }
        }
    }
}

/// Sparse map from index to entity handle
#[derive(Debug, Clone)]
pub struct IndexedCollection<T> {
    instances: u32,
    entries: BTreeMap<u32, T>,
}

impl<T: Clone> Default for IndexedCollection<T> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<T: Clone> IndexedCollection<T> {
    pub fn new(instances: u32) -> Self {
        Self {
            instances,
            entries: BTreeMap::new(),
        }
    }

    /// Declared instance count
    pub fn instances(&self) -> u32 {
        self.instances
    }

    /// Change the declared count. Materialized entries are kept either way.
    pub fn set_instances(&mut self, instances: u32) {
        self.instances = instances;
    }

    pub fn is_valid(&self, index: u32) -> bool {
        index < self.instances
    }

    /// `0..instances`
    pub fn valid_indexes(&self) -> Vec<u32> {
        (0..self.instances).collect()
    }

    /// Valid indexes plus every materialized one, ascending
    pub fn indexes(&self) -> Vec<u32> {
        let mut all: BTreeSet<u32> = (0..self.instances).collect();
        all.extend(self.entries.keys().copied());
        all.into_iter().collect()
    }

    pub fn contains(&self, index: u32) -> bool {
        self.entries.contains_key(&index)
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        self.entries.get(&index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Materialized entries in index order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.entries.iter().map(|(index, value)| (*index, value))
    }

    /// Existing entry at `index`, or a new one from `create(index, bogus)`
    pub fn materialize_with<F>(&mut self, index: u32, create: F) -> &T
    where
        F: FnOnce(u32, bool) -> T,
    {
        let bogus = !self.is_valid(index);
        self.entries
            .entry(index)
            .or_insert_with(|| create(index, bogus))
    }

    /// Indexes a selector names, sorted and deduplicated, before materialization
    pub fn plan(&self, spec: &SliceSpec) -> Vec<u32> {
        match spec {
            SliceSpec::All => self.indexes(),
            SliceSpec::Index(index) => vec![*index],
            SliceSpec::Indexes(list) if list.is_empty() => self.indexes(),
            SliceSpec::Indexes(list) => {
                let addressable: BTreeSet<u32> = list
                    .iter()
                    .copied()
                    .filter(|i| self.contains(*i) || self.is_valid(*i))
                    .collect();
                addressable.into_iter().collect()
            }
            SliceSpec::Ranges(ranges) => self
                .indexes()
                .into_iter()
                .filter(|i| ranges.iter().any(|r| r.contains(i)))
                .collect(),
        }
    }

    /// Resolve `spec` to entries in ascending index order, creating the
    /// ones the selector is allowed to create.
    pub fn resolve_with<F>(&mut self, spec: &SliceSpec, mut create: F) -> Vec<T>
    where
        F: FnMut(u32, bool) -> T,
    {
        self.plan(spec)
            .into_iter()
            .map(|index| self.materialize_with(index, &mut create).clone())
            .collect()
    }
}
