use std::sync::Arc;

use crate::config::StoreConfig;
use crate::kv::KvStore;

use super::metrics::StorageMetrics;

/// Namespace graph tables are created in unless configured otherwise.
pub const DEFAULT_NAMESPACE: &str = "graphbase";

/// Configuration options supplied when opening a [`super::GraphStorage`].
#[derive(Clone)]
pub struct StorageOptions {
    /// Store client shared by every graph.
    pub store: Arc<dyn KvStore>,
    /// Namespace holding the graph tables.
    pub namespace: String,
    /// Whether new tables use LZ4 block compression.
    pub compression: bool,
    /// Regions each new table is pre-split into.
    pub splits: u32,
    /// Optional metrics collection implementation.
    pub metrics: Option<Arc<dyn StorageMetrics>>,
}

impl StorageOptions {
    /// Creates options with default settings.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            namespace: DEFAULT_NAMESPACE.to_owned(),
            compression: true,
            splits: 1,
            metrics: None,
        }
    }

    /// Creates options from the `[store]` config section.
    pub fn from_config(store: Arc<dyn KvStore>, config: &StoreConfig) -> Self {
        Self::new(store)
            .namespace(config.namespace.clone())
            .compression(config.compression)
            .splits(config.splits)
    }

    /// Sets the namespace.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Enables or disables table compression.
    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Sets the pre-split region count.
    pub fn splits(mut self, splits: u32) -> Self {
        self.splits = splits;
        self
    }

    /// Sets the metrics collection implementation.
    pub fn metrics(mut self, metrics: Arc<dyn StorageMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}
