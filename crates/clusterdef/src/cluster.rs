//! Cluster arena
//!
//! A [`Cluster`] owns every entity defined under it: the cluster node
//! itself, its facets and their servers. Entities refer to their parent by
//! [`NodeId`], an index into the arena, so lookups can walk up the chain
//! without the parent owning the child through that link.

use crate::server_slice::{ServerSlice, ServerView};
use crate::slice::{IndexedCollection, SliceSpec};
use chrono::{DateTime, Utc};
use clusterdef_types::{
    compose_run_lists, AttributeStore, CloudSettings, ClusterError, Provider, Result, RunList,
    VolumeSettings,
};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Bogosity reason recorded on servers addressed past the declared count
pub const OUT_OF_RANGE: &str = "index_out_of_range";

/// Shared handle to a defined cluster
pub type ClusterHandle = Arc<RwLock<Cluster>>;

/// Handle of an entity inside its cluster's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    /// The cluster's own node
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// Which layer an entity belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Cluster,
    Facet,
    Server,
}

/// Identity of a server within its cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ServerIdentity {
    pub facet_name: String,
    pub facet_index: u32,
}

/// One cluster, facet or server
#[derive(Debug, Clone)]
pub struct ComputeNode {
    id: NodeId,
    parent: Option<NodeId>,
    kind: EntityKind,
    identity: Option<ServerIdentity>,
    pub(crate) settings: AttributeStore,
    pub(crate) run_list: RunList,
    pub(crate) cloud: Option<CloudSettings>,
    pub(crate) volumes: BTreeMap<String, VolumeSettings>,
}

impl ComputeNode {
    fn new(id: NodeId, parent: Option<NodeId>, kind: EntityKind, name: &str) -> Self {
        let mut settings = AttributeStore::new();
        settings.set("name", name);
        Self {
            id,
            parent,
            kind,
            identity: None,
            settings,
            run_list: RunList::new(),
            cloud: None,
            volumes: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn identity(&self) -> Option<&ServerIdentity> {
        self.identity.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.settings.get_str("name")
    }

    pub fn settings(&self) -> &AttributeStore {
        &self.settings
    }

    pub fn run_list(&self) -> &RunList {
        &self.run_list
    }

    pub fn cloud(&self) -> Option<&CloudSettings> {
        self.cloud.as_ref()
    }

    pub fn volumes(&self) -> &BTreeMap<String, VolumeSettings> {
        &self.volumes
    }

    /// Reason this entity is bogus, if any. A truthy non-string setting
    /// reads back as its JSON text.
    pub fn bogosity(&self) -> Option<String> {
        match self.settings.get("bogosity")? {
            Value::String(reason) => Some(reason.clone()),
            value if truthy(value) => Some(value.to_string()),
            _ => None,
        }
    }

    pub fn is_bogus(&self) -> bool {
        self.bogosity().is_some()
    }
}

fn truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

#[derive(Debug, Clone)]
pub(crate) struct FacetEntry {
    pub(crate) name: String,
    pub(crate) node: NodeId,
    pub(crate) servers: IndexedCollection<NodeId>,
}

/// A named cluster and every entity defined under it
#[derive(Debug, Clone)]
pub struct Cluster {
    name: String,
    provider: Provider,
    nodes: Vec<ComputeNode>,
    facets: Vec<FacetEntry>,
    source: Option<PathBuf>,
    defined_at: DateTime<Utc>,
}

impl Cluster {
    pub fn new(name: impl Into<String>, provider: Provider) -> Self {
        let name = name.into();
        let root = ComputeNode::new(NodeId::ROOT, None, EntityKind::Cluster, &name);
        Self {
            name,
            provider,
            nodes: vec![root],
            facets: Vec::new(),
            source: None,
            defined_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Definition file this cluster was loaded from
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub(crate) fn set_source(&mut self, path: PathBuf) {
        self.source = Some(path);
    }

    pub fn defined_at(&self) -> DateTime<Utc> {
        self.defined_at
    }

    pub fn root(&self) -> &ComputeNode {
        &self.nodes[NodeId::ROOT.0]
    }

    pub fn node(&self, id: NodeId) -> Option<&ComputeNode> {
        self.nodes.get(id.0)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut ComputeNode {
        &mut self.nodes[id.0]
    }

    /// Facet names in definition order
    pub fn facet_names(&self) -> Vec<&str> {
        self.facets.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn facet(&self, name: &str) -> Option<&ComputeNode> {
        self.facet_position(name)
            .map(|position| &self.nodes[self.facets[position].node.0])
    }

    pub(crate) fn facet_position(&self, name: &str) -> Option<usize> {
        self.facets.iter().position(|f| f.name == name)
    }

    pub(crate) fn facet_entry(&self, position: usize) -> &FacetEntry {
        &self.facets[position]
    }

    pub(crate) fn facet_entry_mut(&mut self, position: usize) -> &mut FacetEntry {
        &mut self.facets[position]
    }

    /// Position of facet `name`, creating it if needed
    pub(crate) fn ensure_facet(&mut self, name: &str) -> usize {
        if let Some(position) = self.facet_position(name) {
            return position;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(ComputeNode::new(
            id,
            Some(NodeId::ROOT),
            EntityKind::Facet,
            name,
        ));
        self.facets.push(FacetEntry {
            name: name.to_string(),
            node: id,
            servers: IndexedCollection::new(0),
        });
        debug!(cluster = %self.name, facet = name, "Created facet");
        self.facets.len() - 1
    }

    /// Server at `index` of the facet at `position`, creating it if needed
    pub(crate) fn materialize_server(&mut self, position: usize, index: u32) -> NodeId {
        let cluster_name = self.name.as_str();
        let entry = &mut self.facets[position];
        let (facet_name, facet_node) = (entry.name.as_str(), entry.node);
        let nodes = &mut self.nodes;
        *entry.servers.materialize_with(index, |index, bogus| {
            create_server(nodes, cluster_name, facet_node, facet_name, index, bogus)
        })
    }

    /// Change the declared server count of the facet at `position`.
    ///
    /// Materialized servers are kept; the out-of-range marker is added to
    /// servers now past the count and cleared from those back inside it.
    /// Other bogosity reasons are left alone.
    pub(crate) fn set_instances(&mut self, position: usize, instances: u32) {
        let entry = &mut self.facets[position];
        entry.servers.set_instances(instances);
        for (index, id) in entry.servers.iter() {
            let settings = &mut self.nodes[id.0].settings;
            let marked = settings.get_str("bogosity") == Some(OUT_OF_RANGE);
            if index >= instances && !marked && !settings.get("bogosity").is_some_and(truthy) {
                settings.set("bogosity", OUT_OF_RANGE);
            } else if index < instances && marked {
                settings.remove("bogosity");
            } else {
                continue;
            }
            debug!(
                cluster = %self.name,
                facet = %entry.name,
                index,
                bogus = index >= instances,
                "Re-evaluated server range"
            );
        }
    }

    /// Servers of the facet at `position` named by `spec`
    pub(crate) fn resolve_servers(&mut self, position: usize, spec: &SliceSpec) -> Vec<NodeId> {
        let cluster_name = self.name.as_str();
        let entry = &mut self.facets[position];
        let (facet_name, facet_node) = (entry.name.as_str(), entry.node);
        let nodes = &mut self.nodes;
        entry.servers.resolve_with(spec, |index, bogus| {
            create_server(nodes, cluster_name, facet_node, facet_name, index, bogus)
        })
    }

    /// Fill the node's unset attributes from its parent
    pub(crate) fn inherit(&mut self, id: NodeId) {
        let Some(parent) = self.nodes[id.0].parent else {
            return;
        };
        let inherited = self.nodes[parent.0].settings.clone();
        self.nodes[id.0].settings.reverse_merge(&inherited);
    }

    /// The node followed by its ancestors, nearest first
    fn chain(&self, id: NodeId) -> Vec<&ComputeNode> {
        let mut chain = Vec::new();
        let mut next = self.node(id);
        while let Some(node) = next {
            chain.push(node);
            next = node.parent.and_then(|parent| self.node(parent));
        }
        chain
    }

    /// Value of `key` on the node, falling back up the parent chain
    pub fn lookup(&self, id: NodeId, key: &str) -> Option<&Value> {
        self.chain(id)
            .into_iter()
            .find_map(|node| node.settings.get(key))
    }

    /// Attributes of the node with unset keys filled from its ancestors
    pub fn to_attributes(&self, id: NodeId) -> Map<String, Value> {
        let mut chain = self.chain(id).into_iter();
        let Some(node) = chain.next() else {
            return Map::new();
        };
        let mut attributes = node.settings.clone();
        for ancestor in chain {
            attributes.reverse_merge(&ancestor.settings);
        }
        attributes.into_map()
    }

    /// The node's own ordered run list
    pub fn run_list(&self, id: NodeId) -> Vec<String> {
        self.node(id)
            .map(|node| node.run_list.ordered())
            .unwrap_or_default()
    }

    /// Cluster, then facet, then server run lists, first occurrence wins
    pub fn combined_run_list(&self, id: NodeId) -> Vec<String> {
        let mut chain = self.chain(id);
        chain.reverse();
        compose_run_lists(chain.into_iter().map(|node| node.run_list.ordered()))
    }

    /// Cloud settings of the node layered over its ancestors'
    pub fn effective_cloud(&self, id: NodeId) -> CloudSettings {
        let mut cloud = CloudSettings::default();
        for node in self.chain(id) {
            if let Some(settings) = &node.cloud {
                cloud.reverse_merge(settings);
            }
        }
        cloud
    }

    /// Volumes of the node layered over same-named volumes of its ancestors
    pub fn composite_volumes(&self, id: NodeId) -> BTreeMap<String, VolumeSettings> {
        let mut volumes: BTreeMap<String, VolumeSettings> = BTreeMap::new();
        for node in self.chain(id) {
            for (name, volume) in &node.volumes {
                volumes
                    .entry(name.clone())
                    .and_modify(|v| v.reverse_merge(volume))
                    .or_insert_with(|| volume.clone());
            }
        }
        volumes
    }

    pub fn has_server(&self, facet: &str, index: u32) -> bool {
        self.facet_position(facet)
            .is_some_and(|position| self.facets[position].servers.contains(index))
    }

    pub fn server_id(&self, facet: &str, index: u32) -> Option<NodeId> {
        let position = self.facet_position(facet)?;
        self.facets[position].servers.get(index).copied()
    }

    /// Snapshot of a server as the provisioning layer consumes it
    pub fn server_view(&self, id: NodeId) -> Option<ServerView> {
        let node = self.node(id)?;
        let identity = node.identity.clone()?;
        let attributes = self.to_attributes(id);
        let fullname = attributes
            .get("name")
            .map(value_to_name)
            .unwrap_or_else(|| default_server_name(&self.name, &identity.facet_name, identity.facet_index));

        Some(ServerView {
            node: id,
            fullname,
            cluster_name: self.name.clone(),
            facet_name: identity.facet_name,
            facet_index: identity.facet_index,
            bogosity: node.bogosity(),
            run_list: self.combined_run_list(id),
            attributes,
            cloud: self.effective_cloud(id),
            volumes: self.composite_volumes(id),
        })
    }

    /// Servers named by `spec`, in one facet or (with `None`) in every facet
    /// in definition order. Missing in-range servers are materialized.
    pub fn slice(&mut self, facet: Option<&str>, spec: &SliceSpec) -> Result<ServerSlice> {
        let positions: Vec<usize> = match facet {
            Some(name) => vec![self
                .facet_position(name)
                .ok_or_else(|| ClusterError::FacetNotFound {
                    cluster: self.name.clone(),
                    facet: name.to_string(),
                })?],
            None => (0..self.facets.len()).collect(),
        };

        let mut ids = Vec::new();
        for position in positions {
            ids.extend(self.resolve_servers(position, spec));
        }
        Ok(ServerSlice::new(
            ids.into_iter()
                .filter_map(|id| self.server_view(id))
                .collect(),
        ))
    }

    /// Every server of every facet
    pub fn servers(&mut self) -> ServerSlice {
        let mut ids = Vec::new();
        for position in 0..self.facets.len() {
            ids.extend(self.resolve_servers(position, &SliceSpec::All));
        }
        ServerSlice::new(
            ids.into_iter()
                .filter_map(|id| self.server_view(id))
                .collect(),
        )
    }

    /// Structural overview of the cluster
    pub fn summary(&self) -> ClusterSummary {
        ClusterSummary {
            name: self.name.clone(),
            provider: self.provider,
            source: self.source.clone(),
            defined_at: self.defined_at,
            run_list: self.run_list(NodeId::ROOT),
            facets: self
                .facets
                .iter()
                .map(|entry| FacetSummary {
                    name: entry.name.clone(),
                    instances: entry.servers.instances(),
                    indexes: entry.servers.indexes(),
                    run_list: self.run_list(entry.node),
                })
                .collect(),
        }
    }
}

fn create_server(
    nodes: &mut Vec<ComputeNode>,
    cluster_name: &str,
    facet_node: NodeId,
    facet_name: &str,
    index: u32,
    bogus: bool,
) -> NodeId {
    let id = NodeId(nodes.len());
    let mut node = ComputeNode::new(
        id,
        Some(facet_node),
        EntityKind::Server,
        &default_server_name(cluster_name, facet_name, index),
    );
    node.identity = Some(ServerIdentity {
        facet_name: facet_name.to_string(),
        facet_index: index,
    });
    node.settings.set("facet_name", facet_name);
    node.settings.set("facet_index", index);
    if bogus {
        node.settings.set("bogosity", OUT_OF_RANGE);
    }
    node.settings.reverse_merge(&nodes[facet_node.0].settings);
    nodes.push(node);

    debug!(
        cluster = cluster_name,
        facet = facet_name,
        index,
        bogus,
        "Materialized server"
    );
    id
}

/// `"{cluster}-{facet}-{index}"`
pub fn default_server_name(cluster: &str, facet: &str, index: u32) -> String {
    format!("{cluster}-{facet}-{index}")
}

fn value_to_name(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Overview of a cluster's facets and run list
#[derive(Debug, Clone, Serialize)]
pub struct ClusterSummary {
    pub name: String,
    pub provider: Provider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    pub defined_at: DateTime<Utc>,
    pub run_list: Vec<String>,
    pub facets: Vec<FacetSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FacetSummary {
    pub name: String,
    pub instances: u32,
    pub indexes: Vec<u32>,
    pub run_list: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_with_facet(instances: u32) -> (Cluster, usize) {
        let mut cluster = Cluster::new("test", Provider::Static);
        let position = cluster.ensure_facet("namenode");
        cluster.set_instances(position, instances);
        (cluster, position)
    }

    #[test]
    fn test_servers_get_default_names() {
        let (mut cluster, position) = cluster_with_facet(2);
        let id = cluster.materialize_server(position, 1);
        let node = cluster.node(id).unwrap();

        assert_eq!(node.kind(), EntityKind::Server);
        assert_eq!(node.name(), Some("test-namenode-1"));
        assert!(!node.is_bogus());
        assert_eq!(node.parent(), Some(cluster.facet_entry(position).node));
    }

    #[test]
    fn test_out_of_range_server_is_bogus() {
        let (mut cluster, position) = cluster_with_facet(2);
        let id = cluster.materialize_server(position, 69);
        let node = cluster.node(id).unwrap();

        assert!(node.is_bogus());
        assert_eq!(node.bogosity().as_deref(), Some(OUT_OF_RANGE));
        assert!(cluster.has_server("namenode", 69));
        assert_eq!(cluster.server_id("namenode", 69), Some(id));
    }

    #[test]
    fn test_instance_changes_move_the_range() {
        let (mut cluster, position) = cluster_with_facet(0);
        let early = cluster.materialize_server(position, 2);
        assert!(cluster.node(early).unwrap().is_bogus());

        cluster.set_instances(position, 5);
        assert!(!cluster.node(early).unwrap().is_bogus());
        let late = cluster.materialize_server(position, 4);

        cluster.set_instances(position, 3);
        assert!(!cluster.node(early).unwrap().is_bogus());
        assert_eq!(
            cluster.node(late).unwrap().bogosity().as_deref(),
            Some(OUT_OF_RANGE)
        );
    }

    #[test]
    fn test_instance_changes_keep_explicit_bogosity() {
        let (mut cluster, position) = cluster_with_facet(1);
        let id = cluster.materialize_server(position, 3);
        cluster.node_mut(id).settings.set("bogosity", "decommissioned");

        cluster.set_instances(position, 5);
        assert_eq!(
            cluster.node(id).unwrap().bogosity().as_deref(),
            Some("decommissioned")
        );
    }

    #[test]
    fn test_non_string_bogosity_has_a_reason() {
        let (mut cluster, position) = cluster_with_facet(2);
        let id = cluster.materialize_server(position, 0);
        cluster.node_mut(id).settings.set("bogosity", true);

        let node = cluster.node(id).unwrap();
        assert!(node.is_bogus());
        assert_eq!(node.bogosity().as_deref(), Some("true"));
        let view = cluster.server_view(id).unwrap();
        assert!(view.is_bogus());
        assert_eq!(view.bogosity.as_deref(), Some("true"));

        cluster.node_mut(id).settings.set("bogosity", false);
        assert!(!cluster.node(id).unwrap().is_bogus());
        assert!(!cluster.server_view(id).unwrap().is_bogus());
    }

    #[test]
    fn test_materialize_is_idempotent() {
        let (mut cluster, position) = cluster_with_facet(3);
        let first = cluster.materialize_server(position, 2);
        let second = cluster.materialize_server(position, 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_lookup_walks_parents() {
        let (mut cluster, position) = cluster_with_facet(1);
        cluster.node_mut(NodeId::ROOT).settings.set("environment", "prod");
        let id = cluster.materialize_server(position, 0);

        assert_eq!(
            cluster.lookup(id, "environment"),
            Some(&Value::String("prod".into()))
        );
        assert_eq!(
            cluster.to_attributes(id).get("environment"),
            Some(&Value::String("prod".into()))
        );
        assert_eq!(cluster.lookup(id, "missing"), None);
    }

    #[test]
    fn test_unknown_facet_slice_fails() {
        let (mut cluster, _) = cluster_with_facet(1);
        let err = cluster.slice(Some("nope"), &SliceSpec::All).unwrap_err();
        assert!(matches!(err, ClusterError::FacetNotFound { .. }));
    }

    #[test]
    fn test_summary_lists_facets_in_order() {
        let mut cluster = Cluster::new("hadoop", Provider::Vsphere);
        for name in ["master", "worker", "client"] {
            cluster.ensure_facet(name);
        }
        let summary = cluster.summary();
        let names: Vec<&str> = summary.facets.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["master", "worker", "client"]);
        assert_eq!(cluster.facet_names(), names);
    }
}
