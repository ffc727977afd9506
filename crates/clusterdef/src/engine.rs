//! The engine: rank sequence, role implications and cluster cache
//!
//! Everything that was process-global in older cluster tooling lives on an
//! [`Engine`] value, so several engines with different cluster paths or
//! implications can coexist in one process.

use crate::catalog::ClusterCatalog;
use crate::cluster::{Cluster, ClusterHandle};
use crate::config::EngineConfig;
use crate::definition::{ClusterDefinition, ProvisionRequest};
use crate::implications::RoleImplications;
use crate::scope::{ClusterScope, ComputeScope};
use crate::sequence::RankSequence;
use crate::server_slice::ServerSlice;
use crate::slice::SliceSpec;
use clusterdef_types::{ClusterError, Provider, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Per-name cell; empty until the cluster is defined or loaded
type ClusterSlot = Arc<Mutex<Option<ClusterHandle>>>;

/// Cluster definition engine
pub struct Engine {
    config: EngineConfig,
    ranks: RankSequence,
    implications: RoleImplications,
    clusters: Mutex<HashMap<String, ClusterSlot>>,
    catalog: ClusterCatalog,
}

impl Engine {
    /// Engine with no role implications registered
    pub fn new(config: EngineConfig) -> Self {
        Self::with_implications(config, RoleImplications::new())
    }

    pub fn with_implications(config: EngineConfig, implications: RoleImplications) -> Self {
        let catalog = ClusterCatalog::new(config.cluster_path.clone());
        Self {
            config,
            ranks: RankSequence::new(),
            implications,
            clusters: Mutex::new(HashMap::new()),
            catalog,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ranks(&self) -> &RankSequence {
        &self.ranks
    }

    pub fn implications(&self) -> &RoleImplications {
        &self.implications
    }

    pub fn catalog(&self) -> &ClusterCatalog {
        &self.catalog
    }

    /// Slot for `name`, created empty if unknown. The map lock is released
    /// before the slot is returned.
    fn slot(&self, name: &str) -> ClusterSlot {
        self.clusters
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Drop `slot` from the map if it is still registered under `name`
    /// and never got a cluster. A slot locked by a retrying load is kept.
    fn forget_empty(&self, name: &str, slot: &ClusterSlot) {
        let mut clusters = self.clusters.lock();
        let unused = clusters
            .get(name)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && current.try_lock().is_some_and(|entry| entry.is_none()));
        if unused {
            clusters.remove(name);
        }
    }

    /// Register `procedure` to run whenever `role` is added to a run list
    pub fn role_implication<F>(&self, role: &str, procedure: F)
    where
        F: Fn(&mut ComputeScope<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.implications.register(role, procedure);
    }

    /// Define cluster `name`, or reopen it if already defined, and run
    /// `block` against it.
    ///
    /// Concurrent callers for the same name share one cluster.
    #[instrument(skip(self, block))]
    pub fn define_cluster<F>(&self, provider: Provider, name: &str, block: F) -> Result<ClusterHandle>
    where
        F: FnOnce(&mut ClusterScope<'_>) -> Result<()>,
    {
        if name.trim().is_empty() {
            return Err(ClusterError::EmptyClusterName);
        }

        let handle = self
            .slot(name)
            .lock()
            .get_or_insert_with(|| {
                debug!(cluster = name, %provider, "Creating cluster");
                Arc::new(RwLock::new(Cluster::new(name, provider)))
            })
            .clone();

        let mut cluster = handle.write();
        if cluster.provider() != provider {
            warn!(
                cluster = name,
                defined = %cluster.provider(),
                requested = %provider,
                "Cluster already defined with another provider, keeping the original"
            );
        }
        {
            let mut scope = ClusterScope::new(self, &mut cluster);
            block(&mut scope)?;
        }
        drop(cluster);
        Ok(handle)
    }

    /// Already-defined cluster, without touching the cluster path.
    ///
    /// A cluster whose definition is still being applied is not returned.
    pub fn cluster(&self, name: &str) -> Option<ClusterHandle> {
        let slot = self.clusters.lock().get(name).cloned()?;
        let entry = slot.try_lock()?;
        entry.as_ref().cloned()
    }

    /// Names of the clusters defined so far, sorted
    pub fn cluster_names(&self) -> Vec<String> {
        let slots: Vec<(String, ClusterSlot)> = self
            .clusters
            .lock()
            .iter()
            .map(|(name, slot)| (name.clone(), slot.clone()))
            .collect();
        let mut names: Vec<String> = slots
            .into_iter()
            .filter(|(_, slot)| slot.try_lock().is_some_and(|entry| entry.is_some()))
            .map(|(name, _)| name)
            .collect();
        names.sort();
        names
    }

    /// Cluster names available on the cluster path
    pub fn available_clusters(&self) -> Result<Vec<String>> {
        self.catalog.names()
    }

    /// Return cluster `name`, loading its definition file on first use.
    ///
    /// The name's slot is held from lookup to insertion, so concurrent
    /// loads of one name read and apply the file once. Loads of other
    /// names and engine queries from role implications do not wait on it.
    #[instrument(skip(self))]
    pub fn load_cluster(&self, name: &str) -> Result<ClusterHandle> {
        if name.trim().is_empty() {
            return Err(ClusterError::EmptyClusterName);
        }

        let slot = self.slot(name);
        let mut entry = slot.lock();
        if let Some(handle) = entry.as_ref() {
            return Ok(handle.clone());
        }

        let loaded = self.materialize(name);
        match loaded {
            Ok(cluster) => {
                let handle = Arc::new(RwLock::new(cluster));
                *entry = Some(handle.clone());
                Ok(handle)
            }
            Err(err) => {
                drop(entry);
                self.forget_empty(name, &slot);
                Err(err)
            }
        }
    }

    /// Read and apply the definition file of `name`
    fn materialize(&self, name: &str) -> Result<Cluster> {
        let path = self.catalog.locate(name)?;
        let definition = ClusterDefinition::from_file(&path)?;
        if definition.name != name {
            return Err(ClusterError::DuplicateClusterDefinition {
                expected: name.to_string(),
                found: definition.name,
                path,
            });
        }

        let provider = definition.provider.unwrap_or(self.config.default_provider);
        let mut cluster = Cluster::new(name, provider);
        {
            let mut scope = ClusterScope::new(self, &mut cluster);
            definition.apply(&mut scope)?;
        }
        cluster.set_source(path);

        info!(
            cluster = name,
            facets = cluster.facet_names().len(),
            "Loaded cluster definition"
        );
        Ok(cluster)
    }

    /// Forget every defined cluster and the scanned cluster path
    pub fn clear_clusters(&self) {
        self.clusters.lock().clear();
        self.catalog.invalidate();
        debug!("Cleared cluster cache");
    }

    /// Turn a provisioning request into a definition file on the cluster
    /// path and load the cluster it defines.
    #[instrument(skip(self, request), fields(request = %request.display()))]
    pub fn import_definition(&self, request: &Path, overwrite: bool) -> Result<ClusterHandle> {
        let definition = ProvisionRequest::from_file(request)?.into_definition(request)?;
        let name = definition.name.clone();
        self.catalog.write_definition(&definition, overwrite)?;
        self.clusters.lock().remove(&name);
        self.load_cluster(&name)
    }

    /// Servers of `cluster` named by `spec`, in one facet or all of them
    #[instrument(skip(self, spec), fields(spec = %spec))]
    pub fn slice(&self, cluster: &str, facet: Option<&str>, spec: &SliceSpec) -> Result<ServerSlice> {
        let handle = self.load_cluster(cluster)?;
        let mut cluster = handle.write();
        cluster.slice(facet, spec)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("cluster_path", &self.config.cluster_path)
            .field("clusters", &self.cluster_names())
            .field("implications", &self.implications)
            .finish()
    }
}
