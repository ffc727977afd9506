//! clusterdef - layered cluster / facet / server configuration engine
//!
//! A cluster is composed of facets; a facet is composed of indexed servers.
//! For each server this crate computes the identity, attributes, cloud
//! settings and ordered run list it must receive before provisioning:
//!
//! - **Engine**: owns the rank sequence, role implications and cluster cache
//! - **Scopes**: the API definition blocks use to configure each level
//! - **IndexedCollection / SliceSpec**: sparse server addressing per facet
//! - **ClusterCatalog / ClusterDefinition**: YAML and JSON definitions on a search path
//!
//! ## Example
//!
//! ```
//! use clusterdef::{Engine, EngineConfig, RoleImplications, SliceSpec};
//! use clusterdef_types::Provider;
//!
//! let engine = Engine::with_implications(EngineConfig::default(), RoleImplications::standard());
//! let handle = engine
//!     .define_cluster(Provider::Static, "hadoop", |cluster| {
//!         cluster.role("base")?;
//!         cluster.facet("worker", |facet| {
//!             facet.instances(3);
//!             facet.role("hadoop_datanode")?;
//!             Ok(())
//!         })?;
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let slice = handle
//!     .write()
//!     .slice(Some("worker"), &SliceSpec::parse("0-1").unwrap())
//!     .unwrap();
//! assert_eq!(slice.joined_names(), "hadoop-worker-0, hadoop-worker-1");
//! assert_eq!(
//!     slice.iter().next().unwrap().run_list,
//!     vec!["role[base]", "role[hadoop_datanode]"]
//! );
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod catalog;
pub mod cluster;
pub mod config;
pub mod definition;
pub mod engine;
pub mod implications;
pub mod scope;
pub mod sequence;
pub mod server_slice;
pub mod slice;

// Re-exports
pub use catalog::ClusterCatalog;
pub use cluster::{
    default_server_name, Cluster, ClusterHandle, ClusterSummary, ComputeNode, EntityKind,
    FacetSummary, NodeId, ServerIdentity, OUT_OF_RANGE,
};
pub use config::{EngineConfig, LoggingConfig};
pub use definition::{
    ClusterDefinition, ComputeDefinition, FacetDefinition, ProvisionRequest, RunListDirective,
    ServerDefinition,
};
pub use engine::Engine;
pub use implications::{ImplicationFn, RoleImplications};
pub use scope::{CloudOptions, ClusterScope, ComputeScope, FacetScope, ServerScope};
pub use sequence::RankSequence;
pub use server_slice::{ServerSlice, ServerView};
pub use slice::{IndexedCollection, SliceSpec};
