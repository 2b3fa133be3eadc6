//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Index names and document kinds
    #[serde(default)]
    pub index: IndexConfig,

    /// Work order correlation retry settings
    #[serde(default)]
    pub correlation: CorrelationConfig,

    /// Index store backend selection
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Batch replay settings
    #[serde(default)]
    pub consumer: ConsumerConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("index.ci_index", &self.index.ci_index),
            ("index.event_index", &self.index.event_index),
            ("index.work_order_pattern", &self.index.work_order_pattern),
            ("index.document_kind", &self.index.document_kind),
            ("index.event_channel", &self.index.event_channel),
            ("index.work_order_kind", &self.index.work_order_kind),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::validation(format!("{name} is empty")));
            }
        }
        if self.correlation.max_attempts == 0 {
            return Err(AppError::validation(
                "correlation.max_attempts must be > 0",
            ));
        }
        if self.store.timeout_secs == 0 {
            return Err(AppError::validation("store.timeout_secs must be > 0"));
        }
        if self.store.backend == StoreBackend::Elastic {
            url::Url::parse(&self.store.elastic_url)?;
        }
        if self.consumer.max_concurrent == 0 {
            return Err(AppError::validation("consumer.max_concurrent must be > 0"));
        }
        Ok(())
    }
}

/// Where documents live in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index holding the CI search documents
    #[serde(default = "defaults::ci_index")]
    pub ci_index: String,

    /// Index receiving the raw event projections
    #[serde(default = "defaults::event_index")]
    pub event_index: String,

    /// Index pattern searched for work orders
    #[serde(default = "defaults::work_order_pattern")]
    pub work_order_pattern: String,

    /// Kind of the primary CI documents
    #[serde(default = "defaults::document_kind")]
    pub document_kind: String,

    /// Channel used for the raw event projection
    #[serde(default = "defaults::event_channel")]
    pub event_channel: String,

    #[serde(default = "defaults::work_order_kind")]
    pub work_order_kind: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            ci_index: defaults::ci_index(),
            event_index: defaults::event_index(),
            work_order_pattern: defaults::work_order_pattern(),
            document_kind: defaults::document_kind(),
            event_channel: defaults::event_channel(),
            work_order_kind: defaults::work_order_kind(),
        }
    }
}

/// Bounded polling against the eventually-consistent work order index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Lookup attempts before falling back to the stored document
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Wait after an empty lookup, in milliseconds
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            retry_delay_ms: defaults::retry_delay(),
        }
    }
}

/// Available index store implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// JSON files on the local filesystem
    #[default]
    Local,
    /// Elasticsearch-compatible REST endpoint
    Elastic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Root directory for the local backend
    #[serde(default = "defaults::local_root")]
    pub local_root: String,

    /// Base URL for the elastic backend
    #[serde(default = "defaults::elastic_url")]
    pub elastic_url: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            local_root: defaults::local_root(),
            elastic_url: defaults::elastic_url(),
            timeout_secs: defaults::timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter when RUST_LOG is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Events processed concurrently during a replay
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

mod defaults {
    // Index defaults
    pub fn ci_index() -> String {
        "cms-ci".into()
    }
    pub fn event_index() -> String {
        "cms-event".into()
    }
    pub fn work_order_pattern() -> String {
        "cms-2*".into()
    }
    pub fn document_kind() -> String {
        "ci".into()
    }
    pub fn event_channel() -> String {
        "ci".into()
    }
    pub fn work_order_kind() -> String {
        "workorder".into()
    }

    // Correlation defaults
    pub fn max_attempts() -> u32 {
        5
    }
    pub fn retry_delay() -> u64 {
        5000
    }

    // Store defaults
    pub fn local_root() -> String {
        "storage".into()
    }
    pub fn elastic_url() -> String {
        "http://localhost:9200".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    pub fn log_level() -> String {
        "info".into()
    }
    pub fn max_concurrent() -> usize {
        4
    }
}
