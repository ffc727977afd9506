//! Run lists: ordered role and recipe entries
//!
//! Each entry carries a [`Placement`] bucket and a rank handed out by a
//! process-wide sequence. Within a bucket entries sort by rank; `first`
//! entries precede `normal`, which precede `last`.

use crate::error::ClusterError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Position class of a run-list entry
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    First,
    #[default]
    Normal,
    Last,
}

impl Placement {
    /// Buckets in assembly order
    pub const ORDER: [Placement; 3] = [Placement::First, Placement::Normal, Placement::Last];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Normal => "normal",
            Self::Last => "last",
        }
    }

    /// Parse an optional placement token; absent means `normal`.
    pub fn parse_optional(token: Option<&str>) -> Result<Self, ClusterError> {
        token.map_or(Ok(Self::Normal), |t| t.parse())
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Placement {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "normal" => Ok(Self::Normal),
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            other => Err(ClusterError::InvalidPlacement(other.to_string())),
        }
    }
}

/// One role or recipe on a run list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunListEntry {
    pub item: String,
    pub placement: Placement,
    pub rank: u64,
}

/// Run-list entries of a single cluster, facet or server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunList {
    entries: Vec<RunListEntry>,
}

impl RunList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `item` with the given placement and rank.
    ///
    /// Adding an item that is already present keeps the original rank and
    /// placement and returns the existing entry.
    pub fn add(&mut self, item: impl Into<String>, placement: Placement, rank: u64) -> &RunListEntry {
        let item = item.into();
        let position = match self.entries.iter().position(|e| e.item == item) {
            Some(position) => position,
            None => {
                self.entries.push(RunListEntry {
                    item,
                    placement,
                    rank,
                });
                self.entries.len() - 1
            }
        };
        &self.entries[position]
    }

    pub fn get(&self, item: &str) -> Option<&RunListEntry> {
        self.entries.iter().find(|e| e.item == item)
    }

    pub fn contains(&self, item: &str) -> bool {
        self.get(item).is_some()
    }

    pub fn entries(&self) -> &[RunListEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Items grouped by placement, each group in ascending rank order
    pub fn groups(&self) -> RunListGroups {
        let mut sorted: Vec<&RunListEntry> = self.entries.iter().collect();
        sorted.sort_by_key(|e| e.rank);

        let mut groups = RunListGroups::default();
        for entry in sorted {
            let bucket = match entry.placement {
                Placement::First => &mut groups.first,
                Placement::Normal => &mut groups.normal,
                Placement::Last => &mut groups.last,
            };
            bucket.push(entry.item.clone());
        }
        groups
    }

    /// Final ordered, deduplicated list for this entity alone
    pub fn ordered(&self) -> Vec<String> {
        compose_run_lists([self.groups().into_items()])
    }
}

/// Run-list items split by placement bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunListGroups {
    pub first: Vec<String>,
    pub normal: Vec<String>,
    pub last: Vec<String>,
}

impl RunListGroups {
    pub fn into_items(self) -> Vec<String> {
        let mut items = self.first;
        items.extend(self.normal);
        items.extend(self.last);
        items
    }
}

/// Concatenate run lists level by level, keeping the first occurrence of
/// every item. A later duplicate never moves an item.
pub fn compose_run_lists<I, L>(levels: I) -> Vec<String>
where
    I: IntoIterator<Item = L>,
    L: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    let mut composed = Vec::new();
    for item in levels.into_iter().flatten() {
        if seen.insert(item.clone()) {
            composed.push(item);
        }
    }
    composed
}

/// `role[name]`, leaving an already wrapped name untouched
pub fn role_item(name: &str) -> String {
    wrap_item("role", name)
}

/// `recipe[name]`, leaving an already wrapped name untouched
pub fn recipe_item(name: &str) -> String {
    wrap_item("recipe", name)
}

fn wrap_item(kind: &str, name: &str) -> String {
    let name = name.trim();
    if name.starts_with(kind) && name[kind.len()..].starts_with('[') && name.ends_with(']') {
        name.to_string()
    } else {
        format!("{kind}[{name}]")
    }
}
