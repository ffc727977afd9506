//! Computed server snapshots handed to provisioning

use crate::cluster::NodeId;
use clusterdef_types::{CloudSettings, SecurityGroup, VolumeSettings};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Everything provisioning needs to know about one server
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerView {
    #[serde(skip)]
    pub node: NodeId,
    pub fullname: String,
    pub cluster_name: String,
    pub facet_name: String,
    pub facet_index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bogosity: Option<String>,
    pub run_list: Vec<String>,
    pub attributes: Map<String, Value>,
    pub cloud: CloudSettings,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, VolumeSettings>,
}

impl ServerView {
    pub fn is_bogus(&self) -> bool {
        self.bogosity.is_some()
    }
}

/// Ordered selection of servers across one or more facets
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ServerSlice {
    servers: Vec<ServerView>,
}

impl ServerSlice {
    pub fn new(servers: Vec<ServerView>) -> Self {
        Self { servers }
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ServerView> {
        self.servers.iter()
    }

    pub fn as_slice(&self) -> &[ServerView] {
        &self.servers
    }

    pub fn names(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.fullname.as_str()).collect()
    }

    /// Server names separated by `", "`
    pub fn joined_names(&self) -> String {
        self.names().join(", ")
    }

    /// Index within each facet, in slice order
    pub fn indexes(&self) -> Vec<u32> {
        self.servers.iter().map(|s| s.facet_index).collect()
    }

    /// Security groups of every server in the slice, merged by name
    pub fn security_groups(&self) -> BTreeMap<String, SecurityGroup> {
        let mut groups: BTreeMap<String, SecurityGroup> = BTreeMap::new();
        for server in &self.servers {
            for (name, group) in &server.cloud.security_groups {
                groups.entry(name.clone()).or_default().absorb(group);
            }
        }
        groups
    }

    /// Run list of each server, keyed by server name
    pub fn run_lists(&self) -> BTreeMap<String, Vec<String>> {
        self.servers
            .iter()
            .map(|s| (s.fullname.clone(), s.run_list.clone()))
            .collect()
    }
}

impl IntoIterator for ServerSlice {
    type Item = ServerView;
    type IntoIter = std::vec::IntoIter<ServerView>;

    fn into_iter(self) -> Self::IntoIter {
        self.servers.into_iter()
    }
}

impl<'a> IntoIterator for &'a ServerSlice {
    type Item = &'a ServerView;
    type IntoIter = std::slice::Iter<'a, ServerView>;

    fn into_iter(self) -> Self::IntoIter {
        self.servers.iter()
    }
}
