use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::kv::{KvStore, StoreError, TableName};
use crate::model::GraphConfiguration;

use super::metrics::{default_metrics, StorageMetrics};
use super::options::StorageOptions;
use super::schema::{self, EntityKind};

mod edge_ops;
mod helpers;
mod node_ops;
mod scan_ops;

pub use scan_ops::EntityStream;

/// Graph layer over a column-family store.
///
/// Each graph owns a node table and a relationship table. Every entity is one
/// row; create and delete are single check-and-mutate calls against the
/// row's marker column, so they are atomic per entity. Nothing spans rows.
pub struct GraphStorage {
    store: Arc<dyn KvStore>,
    namespace: String,
    compression: bool,
    splits: u32,
    metrics: Arc<dyn StorageMetrics>,
}

impl GraphStorage {
    /// Opens the storage layer, creating the namespace when missing.
    pub fn open(options: StorageOptions) -> Result<Self> {
        let StorageOptions {
            store,
            namespace,
            compression,
            splits,
            metrics,
        } = options;
        if store.create_namespace(&namespace)? {
            info!(namespace = %namespace, "storage.open.namespace_created");
        }
        Ok(Self {
            store,
            namespace,
            compression,
            splits,
            metrics: metrics.unwrap_or_else(default_metrics),
        })
    }

    /// Namespace holding the graph tables.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Creates the node and relationship tables of a graph. Tables that
    /// already exist are left untouched.
    pub fn create_graph(&self, config: &GraphConfiguration) -> Result<()> {
        for kind in [EntityKind::Node, EntityKind::Relationship] {
            let descriptor = schema::table_descriptor(
                &self.namespace,
                &config.graph_id,
                kind,
                self.compression,
                self.splits,
            );
            match self.store.create_table(&descriptor) {
                Ok(()) => info!(
                    graph = %config.graph_id,
                    table = %descriptor.name,
                    regions = descriptor.split_keys.len() + 1,
                    "storage.create_graph.table_created"
                ),
                Err(StoreError::TableExists(table)) => {
                    debug!(table = %table, "storage.create_graph.table_exists")
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    /// Drops both tables of a graph. Missing tables are not an error.
    pub fn drop_graph(&self, config: &GraphConfiguration) -> Result<()> {
        for kind in [EntityKind::Node, EntityKind::Relationship] {
            let table = self.table(config, kind);
            match self.store.delete_table(&table) {
                Ok(()) => info!(
                    graph = %config.graph_id,
                    table = %table,
                    "storage.drop_graph.table_deleted"
                ),
                Err(StoreError::TableNotFound(table)) => {
                    warn!(table = %table, "storage.drop_graph.table_missing")
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    /// Returns whether both tables of a graph exist.
    pub fn graph_tables_exist(&self, config: &GraphConfiguration) -> Result<bool> {
        for kind in [EntityKind::Node, EntityKind::Relationship] {
            if !self.store.table_exists(&self.table(config, kind))? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn table(&self, config: &GraphConfiguration, kind: EntityKind) -> TableName {
        schema::table_name(&self.namespace, &config.graph_id, kind)
    }
}
