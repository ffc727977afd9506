//! Declarative cluster definitions
//!
//! A definition document (YAML or JSON) describes one cluster. Applying it
//! drives the same scope API a hand-written definition block uses, so
//! documents and code obey identical layering rules.
//!
//! ```yaml
//! name: hadoop
//! provider: ec2
//! environment: prod
//! run_list:
//!   - role: base
//!     placement: first
//! facets:
//!   - name: worker
//!     instances: 3
//!     run_list:
//!       - role: hadoop_datanode
//!       - recipe: tuning::io
//!         placement: last
//! ```

use crate::scope::{ClusterScope, ComputeScope, FacetScope};
use clusterdef_types::{CloudSettings, ClusterError, Placement, Provider, Result, VolumeSettings};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// A whole cluster, as stored on the cluster path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    #[serde(flatten)]
    pub common: ComputeDefinition,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<FacetDefinition>,
}

/// Settings any cluster, facet or server may carry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComputeDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub settings: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud: Option<CloudSettings>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub run_list: Vec<RunListDirective>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instances: Option<u32>,
    #[serde(flatten)]
    pub common: ComputeDefinition,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<ServerDefinition>,
}

/// Per-index server overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDefinition {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub common: ComputeDefinition,
}

/// One `role:` or `recipe:` line of a run list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunListDirective {
    Role {
        role: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        placement: Option<String>,
    },
    Recipe {
        recipe: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        placement: Option<String>,
    },
}

impl RunListDirective {
    pub fn role(name: impl Into<String>) -> Self {
        Self::Role {
            role: name.into(),
            placement: None,
        }
    }

    pub fn recipe(name: impl Into<String>) -> Self {
        Self::Recipe {
            recipe: name.into(),
            placement: None,
        }
    }
}

impl ClusterDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: None,
            common: ComputeDefinition::default(),
            facets: Vec::new(),
        }
    }

    /// Read a definition file; `.json` files are JSON, anything else YAML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| ClusterError::io(path, e))?;
        Self::parse(&text, path)
    }

    /// Parse `text` in the format implied by `path`'s extension
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let parsed = if is_json {
            serde_json::from_str(text).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(text).map_err(|e| e.to_string())
        };
        parsed.map_err(|message| ClusterError::Definition {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Apply the cluster-level settings, then every facet in order
    pub fn apply(&self, scope: &mut ClusterScope<'_>) -> Result<()> {
        self.common.apply(scope)?;
        for facet in &self.facets {
            scope.facet(&facet.name, |facet_scope| facet.apply(facet_scope))?;
        }
        Ok(())
    }
}

impl ComputeDefinition {
    pub fn apply(&self, scope: &mut ComputeScope<'_>) -> Result<()> {
        if let Some(environment) = &self.environment {
            scope.environment(environment);
        }
        scope.configure(&self.settings);
        if let Some(cloud) = &self.cloud {
            scope.cloud(|settings| settings.overlay(cloud))?;
        }
        for volume in &self.volumes {
            scope.volume(&volume.name, |settings| settings.overlay(volume));
        }
        for directive in &self.run_list {
            match directive {
                RunListDirective::Role { role, placement } => {
                    scope.role_at(role, Placement::parse_optional(placement.as_deref())?)?;
                }
                RunListDirective::Recipe { recipe, placement } => {
                    scope.recipe_at(recipe, Placement::parse_optional(placement.as_deref())?);
                }
            }
        }
        Ok(())
    }
}

impl FacetDefinition {
    pub fn apply(&self, scope: &mut FacetScope<'_>) -> Result<()> {
        if let Some(instances) = self.instances {
            scope.instances(instances);
        }
        self.common.apply(scope)?;
        for server in &self.servers {
            scope.server(server.index, |server_scope| {
                if let Some(name) = &server.name {
                    server_scope.named(name);
                }
                server.common.apply(server_scope)
            })?;
        }
        Ok(())
    }
}

/// Provisioning request, as submitted by an external cluster manager
///
/// ```json
/// {
///   "cluster_definition": {
///     "name": "hadoop",
///     "distro": "apache",
///     "roles": ["hadoop"],
///     "groups": [{"name": "worker", "instance_num": 3, "roles": ["hadoop_datanode"]}]
///   },
///   "cloud_provider": {"name": "vsphere"}
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionRequest {
    pub cluster_definition: RequestedCluster,
    #[serde(default)]
    pub cloud_provider: Option<RequestedProvider>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestedCluster {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub distro: Option<String>,
    #[serde(default)]
    pub distro_vendor: Option<String>,
    #[serde(default)]
    pub distro_version: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub flavor: Option<String>,
    #[serde(default)]
    pub groups: Vec<RequestedGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestedGroup {
    pub name: String,
    #[serde(default)]
    pub instance_num: Option<u32>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub ha: Option<Value>,
    #[serde(default)]
    pub template_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestedProvider {
    pub name: String,
}

/// Flavor every imported cluster starts with
pub const DEFAULT_FLAVOR: &str = "default";

impl ProvisionRequest {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| ClusterError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| ClusterError::Definition {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Translate the request into a cluster definition.
    ///
    /// `path` only labels errors; a request without a cluster name is
    /// rejected.
    pub fn into_definition(self, path: &Path) -> Result<ClusterDefinition> {
        let requested = self.cluster_definition;
        let name = requested
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ClusterError::Definition {
                path: path.to_path_buf(),
                message: "'name' of cluster is not specified".to_string(),
            })?;
        let provider = self
            .cloud_provider
            .map(|p| p.name.parse::<Provider>())
            .transpose()?;

        let mut definition = ClusterDefinition::new(name);
        definition.provider = provider;

        let mut cloud = CloudSettings::default();
        cloud.flavor(requested.flavor.as_deref().unwrap_or(DEFAULT_FLAVOR));
        if let Some(template) = &requested.template_id {
            cloud.image_name(template.as_str());
        }
        definition.common.cloud = Some(cloud);

        let settings = &mut definition.common.settings;
        for (key, value) in [
            ("hadoop_distro", requested.distro),
            ("distro_vendor", requested.distro_vendor),
            ("distro_version", requested.distro_version),
        ] {
            if let Some(value) = value {
                settings.insert(key.to_string(), Value::String(value));
            }
        }
        definition.common.run_list = requested
            .roles
            .into_iter()
            .map(RunListDirective::role)
            .collect();

        definition.facets = requested
            .groups
            .into_iter()
            .map(|group| {
                let mut facet = FacetDefinition {
                    name: group.name,
                    instances: group.instance_num,
                    common: ComputeDefinition::default(),
                    servers: Vec::new(),
                };
                if let Some(template) = group.template_id {
                    let mut cloud = CloudSettings::default();
                    cloud.image_name(template);
                    facet.common.cloud = Some(cloud);
                }
                if let Some(ha) = group.ha {
                    facet
                        .common
                        .settings
                        .insert("ha_enabled".to_string(), Value::Bool(ha_enabled(&ha)));
                }
                facet.common.run_list =
                    group.roles.into_iter().map(RunListDirective::role).collect();
                facet
            })
            .collect();

        Ok(definition)
    }
}

/// `"on"` and `"ft"` (fault tolerant) enable HA; `true` is accepted too.
fn ha_enabled(value: &Value) -> bool {
    match value {
        Value::String(mode) => ["on", "ft"].contains(&mode.as_str()),
        Value::Bool(enabled) => *enabled,
        _ => false,
    }
}
