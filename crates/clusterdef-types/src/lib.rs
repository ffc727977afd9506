//! clusterdef Types - Core value types for cluster configuration
//!
//! A cluster is described in three layers: the cluster itself, its facets
//! (homogeneous groups of machines) and the indexed servers of each facet.
//! Every layer carries the same kinds of values, defined here:
//!
//! - **AttributeStore**: set-if-present key/value settings with reverse merge
//! - **RunList**: role and recipe entries with a placement class and a rank
//! - **CloudSettings**: provider-facing machine settings and security groups
//! - **VolumeSettings**: named volumes attached to a machine
//!
//! The engine that layers these values and addresses servers lives in the
//! `clusterdef` crate.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod attributes;
pub mod cloud;
pub mod error;
pub mod run_list;
pub mod volume;

// Re-export main types
pub use attributes::AttributeStore;
pub use cloud::{CloudSettings, PortRange, Provider, SecurityGroup};
pub use error::{ClusterError, Result};
pub use run_list::{
    compose_run_lists, recipe_item, role_item, Placement, RunList, RunListEntry, RunListGroups,
};
pub use volume::VolumeSettings;
