//! Error types shared by every clusterdef crate

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while defining, loading or addressing clusters
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("Malformed slice token '{token}': {reason}")]
    SliceParse { token: String, reason: String },

    #[error("Run list placement must be one of first, normal or last (got '{0}')")]
    InvalidPlacement(String),

    #[error(
        "{} was supposed to define cluster '{expected}', but defined '{found}'",
        path.display()
    )]
    DuplicateClusterDefinition {
        expected: String,
        found: String,
        path: PathBuf,
    },

    #[error("Configuration failed in {context}: {message}")]
    ConfigurationEvaluation { context: String, message: String },

    #[error("Unknown cloud provider '{0}'; supported providers are ec2, vsphere and static")]
    UnknownProvider(String),

    #[error("Cluster name must not be empty")]
    EmptyClusterName,

    #[error("No definition for cluster '{name}' in cluster path {searched:?}")]
    ClusterNotFound { name: String, searched: Vec<PathBuf> },

    #[error("Cluster '{name}' already exists in {}", path.display())]
    ClusterExists { name: String, path: PathBuf },

    #[error("Cluster '{cluster}' has no facet '{facet}'")]
    FacetNotFound { cluster: String, facet: String },

    #[error("Invalid definition in {}: {message}", path.display())]
    Definition { path: PathBuf, message: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ClusterError {
    /// Error raised from inside a configuration block or role implication
    pub fn configuration(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigurationEvaluation {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn slice_parse(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SliceParse {
            token: token.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for clusterdef operations
pub type Result<T> = std::result::Result<T, ClusterError>;
