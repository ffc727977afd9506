//! Configuration scopes
//!
//! Definition blocks never touch a [`Cluster`] directly. They receive a
//! scope bound to one entity, which knows which engine issues ranks and
//! implications and where in the arena the entity lives.

use crate::cluster::{Cluster, EntityKind, NodeId};
use crate::engine::Engine;
use crate::slice::SliceSpec;
use clusterdef_types::{
    recipe_item, role_item, CloudSettings, ClusterError, Placement, Provider, Result, RunList,
    VolumeSettings,
};
use serde_json::{Map, Value};
use std::ops::{Deref, DerefMut};
use tracing::debug;

/// Options for the first `cloud` call on a cluster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloudOptions {
    /// Skip the self-authorizing security group named after the cluster
    pub no_security_group: bool,
}

/// Scope over a single cluster, facet or server
pub struct ComputeScope<'a> {
    engine: &'a Engine,
    cluster: &'a mut Cluster,
    node: NodeId,
}

impl<'a> ComputeScope<'a> {
    pub(crate) fn new(engine: &'a Engine, cluster: &'a mut Cluster, node: NodeId) -> Self {
        Self {
            engine,
            cluster,
            node,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn engine(&self) -> &Engine {
        self.engine
    }

    pub fn kind(&self) -> EntityKind {
        self.cluster
            .node(self.node)
            .map_or(EntityKind::Cluster, |node| node.kind())
    }

    pub fn cluster_name(&self) -> &str {
        self.cluster.name()
    }

    pub fn provider(&self) -> Provider {
        self.cluster.provider()
    }

    /// Read-only view of the whole cluster
    pub fn cluster(&self) -> &Cluster {
        self.cluster
    }

    /// Set `key` unless `value` is null
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.cluster.node_mut(self.node).settings.set(key, value);
        self
    }

    /// The entity's own value for `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.cluster
            .node(self.node)
            .and_then(|node| node.settings().get(key))
    }

    /// Value for `key`, falling back to ancestors
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        self.cluster.lookup(self.node, key)
    }

    pub fn environment(&mut self, environment: &str) -> &mut Self {
        self.set("environment", environment)
    }

    pub fn bogosity(&mut self, reason: &str) -> &mut Self {
        self.set("bogosity", reason)
    }

    /// Set `chef_attributes.<key>`
    pub fn chef_attribute(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        if value.is_null() {
            return self;
        }
        let settings = &mut self.cluster.node_mut(self.node).settings;
        let mut attributes = match settings.get("chef_attributes") {
            Some(Value::Object(existing)) => existing.clone(),
            _ => Map::new(),
        };
        attributes.insert(key.to_string(), value);
        settings.set("chef_attributes", attributes);
        self
    }

    /// Apply `overrides` on top of the entity's settings, skipping nulls
    pub fn configure(&mut self, overrides: &Map<String, Value>) -> &mut Self {
        self.cluster
            .node_mut(self.node)
            .settings
            .merge_overrides(overrides);
        self
    }

    pub fn role(&mut self, name: &str) -> Result<&mut Self> {
        self.role_at(name, Placement::Normal)
    }

    /// Add `role[name]` and run the role's implication, if one is registered.
    ///
    /// The implication runs on every call, even when the role is already on
    /// the list.
    pub fn role_at(&mut self, name: &str, placement: Placement) -> Result<&mut Self> {
        let rank = self.engine.ranks().next_rank();
        self.cluster
            .node_mut(self.node)
            .run_list
            .add(role_item(name), placement, rank);

        let engine = self.engine;
        engine.implications().apply(self, name)?;
        Ok(self)
    }

    pub fn recipe(&mut self, name: &str) -> &mut Self {
        self.recipe_at(name, Placement::Normal)
    }

    pub fn recipe_at(&mut self, name: &str, placement: Placement) -> &mut Self {
        let rank = self.engine.ranks().next_rank();
        self.cluster
            .node_mut(self.node)
            .run_list
            .add(recipe_item(name), placement, rank);
        self
    }

    /// The entity's own run-list entries
    pub fn run_list(&self) -> Option<&RunList> {
        self.cluster.node(self.node).map(|node| node.run_list())
    }

    /// Ordered items of the entity's own run list
    pub fn ordered_run_list(&self) -> Vec<String> {
        self.cluster.run_list(self.node)
    }

    pub fn cloud<F>(&mut self, block: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut CloudSettings),
    {
        self.cloud_with(CloudOptions::default(), block)
    }

    /// Create the entity's cloud settings on first use, then run `block`
    /// against them.
    ///
    /// The first call on an ec2 cluster adds the `ssh` role and a security
    /// group named after the cluster that authorizes itself.
    pub fn cloud_with<F>(&mut self, options: CloudOptions, block: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut CloudSettings),
    {
        let node = self.cluster.node_mut(self.node);
        let created = node.cloud.is_none();
        if created {
            node.cloud = Some(CloudSettings::default());
        }

        if created && self.kind() == EntityKind::Cluster && self.provider() == Provider::Ec2 {
            self.after_cloud_created(options)?;
        }

        if let Some(cloud) = self.cluster.node_mut(self.node).cloud.as_mut() {
            block(cloud);
        }
        Ok(self)
    }

    fn after_cloud_created(&mut self, options: CloudOptions) -> Result<()> {
        debug!(cluster = %self.cluster_name(), "Applying ec2 cluster defaults");
        self.role("ssh")?;
        if !options.no_security_group {
            let name = self.cluster_name().to_string();
            if let Some(cloud) = self.cluster.node_mut(self.node).cloud.as_mut() {
                cloud.security_group(name.clone()).authorize_group(name);
            }
        }
        Ok(())
    }

    /// Named volume, created on first use
    pub fn volume<F>(&mut self, name: &str, block: F) -> &mut Self
    where
        F: FnOnce(&mut VolumeSettings),
    {
        let volume = self
            .cluster
            .node_mut(self.node)
            .volumes
            .entry(name.to_string())
            .or_insert_with(|| VolumeSettings::new(name));
        block(volume);
        self
    }

    pub fn root_volume<F>(&mut self, block: F) -> &mut Self
    where
        F: FnOnce(&mut VolumeSettings),
    {
        self.volume("root", block)
    }

    /// Short-lived scope over another entity of the same cluster
    fn child(&mut self, node: NodeId) -> ComputeScope<'_> {
        ComputeScope {
            engine: self.engine,
            cluster: &mut *self.cluster,
            node,
        }
    }

    fn cluster_mut(&mut self) -> &mut Cluster {
        self.cluster
    }
}

impl std::fmt::Debug for ComputeScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeScope")
            .field("cluster", &self.cluster.name())
            .field("node", &self.node)
            .field("kind", &self.kind())
            .finish()
    }
}

/// Scope handed to a cluster definition block
#[derive(Debug)]
pub struct ClusterScope<'a> {
    inner: ComputeScope<'a>,
}

impl<'a> ClusterScope<'a> {
    pub(crate) fn new(engine: &'a Engine, cluster: &'a mut Cluster) -> Self {
        Self {
            inner: ComputeScope::new(engine, cluster, NodeId::ROOT),
        }
    }

    /// Define or reopen facet `name`.
    ///
    /// The facet inherits the cluster's settings once `block` returns.
    pub fn facet<F>(&mut self, name: &str, block: F) -> Result<NodeId>
    where
        F: FnOnce(&mut FacetScope<'_>) -> Result<()>,
    {
        let position = self.inner.cluster_mut().ensure_facet(name);
        let node = self.inner.cluster.facet_entry(position).node;
        {
            let mut facet = FacetScope {
                inner: self.inner.child(node),
                position,
            };
            block(&mut facet)?;
        }
        self.inner.cluster_mut().inherit(node);
        Ok(node)
    }

    pub fn has_facet(&self, name: &str) -> bool {
        self.inner.cluster.facet_position(name).is_some()
    }
}

impl<'a> Deref for ClusterScope<'a> {
    type Target = ComputeScope<'a>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for ClusterScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

/// Scope handed to a facet definition block
#[derive(Debug)]
pub struct FacetScope<'a> {
    inner: ComputeScope<'a>,
    position: usize,
}

impl FacetScope<'_> {
    pub fn facet_name(&self) -> &str {
        &self.inner.cluster.facet_entry(self.position).name
    }

    /// Declare how many servers the facet should have
    pub fn instances(&mut self, count: u32) -> &mut Self {
        self.inner.set("instances", count);
        let position = self.position;
        self.inner.cluster_mut().set_instances(position, count);
        self
    }

    /// Define or reopen the server at `index`.
    ///
    /// An index past the declared count yields a bogus server. The server
    /// inherits the facet's settings once `block` returns.
    pub fn server<F>(&mut self, index: u32, block: F) -> Result<NodeId>
    where
        F: FnOnce(&mut ServerScope<'_>) -> Result<()>,
    {
        let node = self.inner.cluster_mut().materialize_server(self.position, index);
        {
            let mut server = ServerScope {
                inner: self.inner.child(node),
            };
            block(&mut server)?;
        }
        self.inner.cluster_mut().inherit(node);
        Ok(node)
    }

    pub fn has_server(&self, index: u32) -> bool {
        self.inner
            .cluster
            .facet_entry(self.position)
            .servers
            .contains(index)
    }

    pub fn indexes(&self) -> Vec<u32> {
        self.inner.cluster.facet_entry(self.position).servers.indexes()
    }

    pub fn valid_indexes(&self) -> Vec<u32> {
        self.inner
            .cluster
            .facet_entry(self.position)
            .servers
            .valid_indexes()
    }

    /// Servers of this facet named by `spec`, materializing as needed
    pub fn slice(&mut self, spec: impl Into<SliceSpec>) -> Vec<NodeId> {
        let spec = spec.into();
        self.inner
            .cluster_mut()
            .resolve_servers(self.position, &spec)
    }
}

impl<'a> Deref for FacetScope<'a> {
    type Target = ComputeScope<'a>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for FacetScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

/// Scope handed to a server definition block
#[derive(Debug)]
pub struct ServerScope<'a> {
    inner: ComputeScope<'a>,
}

impl ServerScope<'_> {
    /// Override the default `cluster-facet-index` name
    pub fn named(&mut self, name: &str) -> &mut Self {
        self.inner.set("name", name);
        self
    }

    pub fn fullname(&self) -> Option<&str> {
        self.inner.get("name").and_then(Value::as_str)
    }

    pub fn facet_name(&self) -> Result<&str> {
        self.identity().map(|(facet, _)| facet)
    }

    pub fn facet_index(&self) -> Result<u32> {
        self.identity().map(|(_, index)| index)
    }

    pub fn is_bogus(&self) -> bool {
        self.inner
            .cluster
            .node(self.inner.node)
            .is_some_and(|node| node.is_bogus())
    }

    fn identity(&self) -> Result<(&str, u32)> {
        self.inner
            .cluster
            .node(self.inner.node)
            .and_then(|node| node.identity())
            .map(|identity| (identity.facet_name.as_str(), identity.facet_index))
            .ok_or_else(|| {
                ClusterError::configuration(
                    self.inner.cluster.name(),
                    format!("{} is not a server", self.inner.node),
                )
            })
    }
}

impl<'a> Deref for ServerScope<'a> {
    type Target = ComputeScope<'a>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for ServerScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}
