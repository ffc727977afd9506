//! Engine configuration

use clusterdef_types::Provider;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directories searched, in order, for cluster definition files
    #[serde(default = "default_cluster_path")]
    pub cluster_path: Vec<PathBuf>,

    /// Provider assumed by definitions that do not name one
    #[serde(default)]
    pub default_provider: Provider,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cluster_path: default_cluster_path(),
            default_provider: Provider::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_cluster_path() -> Vec<PathBuf> {
    vec![PathBuf::from("clusters")]
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EngineConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `CLUSTERDEF_*` environment variables.
    ///
    /// `CLUSTERDEF_CLUSTER_PATH` takes a `:`-separated directory list;
    /// nested keys use `__` (`CLUSTERDEF_LOGGING__LEVEL`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&EngineConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("CLUSTERDEF")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(":")
                .with_list_parse_key("cluster_path"),
        );

        builder.build()?.try_deserialize()
    }

    /// Replace the search path
    pub fn with_cluster_path<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.cluster_path = dirs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_default_provider(mut self, provider: Provider) -> Self {
        self.default_provider = provider;
        self
    }
}
