//! Graph-level entry point: resolves graph ids through the catalog and
//! delegates entity operations to the storage engine.

use std::sync::Arc;

use tracing::{info, warn};

use crate::catalog::{CatalogOptions, GraphCatalog, MemCoordinator};
use crate::config::GraphbaseConfig;
use crate::error::{GraphError, Result};
use crate::kv::MemStore;
use crate::model::{GraphConfiguration, Mutation, Node, Relationship, RelationshipId};
use crate::query::{EntityQuery, PropertyProjection};
use crate::storage::{EntityStream, GraphStorage, StorageOptions};

/// Orchestrates the catalog and the storage engine.
///
/// Graph lifecycle calls touch two independent systems, catalog first, with
/// no compensation when the second step fails; [`GraphService::repair_graph`]
/// reconciles a graph left half-created. Catalog reads are eventually
/// consistent, so entity calls right after [`GraphService::create_graph`] may
/// still report [`GraphError::GraphNotFound`].
pub struct GraphService {
    catalog: GraphCatalog,
    storage: GraphStorage,
}

impl GraphService {
    /// Assembles a service from a started catalog and an open engine.
    pub fn new(catalog: GraphCatalog, storage: GraphStorage) -> Self {
        Self { catalog, storage }
    }

    /// Opens the storage engine and starts the catalog.
    pub fn open(storage: StorageOptions, catalog: CatalogOptions) -> Result<Self> {
        let storage = GraphStorage::open(storage)?;
        let catalog = GraphCatalog::start(catalog)?;
        Ok(Self::new(catalog, storage))
    }

    /// Runs the service over the in-process store and coordination backends.
    pub fn in_memory(config: &GraphbaseConfig) -> Result<Self> {
        let store = MemStore::with_scan_batch_size(config.store.scan_batch_size);
        let coordinator = MemCoordinator::new();
        Self::open(
            StorageOptions::from_config(Arc::new(store), &config.store),
            CatalogOptions::from_config(Arc::new(coordinator), &config.catalog),
        )
    }

    /// The catalog cache.
    pub fn catalog(&self) -> &GraphCatalog {
        &self.catalog
    }

    /// The storage engine.
    pub fn storage(&self) -> &GraphStorage {
        &self.storage
    }

    /// Publishes the catalog entry, then creates the graph's tables.
    pub fn create_graph(&self, config: &GraphConfiguration) -> Result<()> {
        validate_graph_id(&config.graph_id)?;
        if self.catalog.graph_exists(&config.graph_id) {
            return Err(GraphError::GraphAlreadyExists(config.graph_id.clone()));
        }
        self.catalog.create_graph(config)?;
        self.storage.create_graph(config)?;
        info!(graph = %config.graph_id, "service.create_graph.done");
        Ok(())
    }

    /// Removes the catalog entry, then drops the graph's tables.
    pub fn drop_graph(&self, graph_id: &str) -> Result<()> {
        let config = self.resolve(graph_id)?;
        self.catalog.drop_graph(graph_id)?;
        self.storage.drop_graph(&config)?;
        info!(graph = graph_id, "service.drop_graph.done");
        Ok(())
    }

    /// Cached configuration of `graph_id`.
    pub fn get_graph_configuration(&self, graph_id: &str) -> Option<GraphConfiguration> {
        self.catalog.get_graph_configuration(graph_id)
    }

    /// Whether the catalog currently knows `graph_id`.
    pub fn graph_exists(&self, graph_id: &str) -> bool {
        self.catalog.graph_exists(graph_id)
    }

    /// Re-creates missing tables of a catalogued graph. Returns whether
    /// anything had to be created.
    pub fn repair_graph(&self, graph_id: &str) -> Result<bool> {
        let config = self.resolve(graph_id)?;
        if self.storage.graph_tables_exist(&config)? {
            return Ok(false);
        }
        warn!(graph = graph_id, "service.repair_graph.tables_missing");
        self.storage.create_graph(&config)?;
        Ok(true)
    }

    /// Stops the catalog worker. Further entity calls keep working against
    /// the last cached catalog state.
    pub fn close(&self) {
        self.catalog.shutdown();
        info!("service.close");
    }

    /// See [`GraphStorage::add_node`].
    pub fn add_node(&self, graph_id: &str, node: &Node) -> Result<()> {
        self.storage.add_node(&self.resolve(graph_id)?, node)
    }

    /// See [`GraphStorage::delete_node`].
    pub fn delete_node(&self, graph_id: &str, node_id: &str) -> Result<()> {
        self.storage.delete_node(&self.resolve(graph_id)?, node_id)
    }

    /// See [`GraphStorage::update_node`].
    pub fn update_node(&self, graph_id: &str, node_id: &str, update: &Mutation) -> Result<()> {
        self.storage
            .update_node(&self.resolve(graph_id)?, node_id, update)
    }

    /// See [`GraphStorage::get_node`].
    pub fn get_node(
        &self,
        graph_id: &str,
        node_id: &str,
        projection: &PropertyProjection,
    ) -> Result<Option<Node>> {
        self.storage
            .get_node(&self.resolve(graph_id)?, node_id, projection)
    }

    /// See [`GraphStorage::node_exists`].
    pub fn node_exists(&self, graph_id: &str, node_id: &str) -> Result<bool> {
        self.storage.node_exists(&self.resolve(graph_id)?, node_id)
    }

    /// See [`GraphStorage::get_nodes`].
    pub fn get_nodes(&self, graph_id: &str, query: &EntityQuery) -> Result<EntityStream<Node>> {
        self.storage.get_nodes(&self.resolve(graph_id)?, query)
    }

    /// See [`GraphStorage::add_relationship`].
    pub fn add_relationship(&self, graph_id: &str, relationship: &Relationship) -> Result<()> {
        self.storage
            .add_relationship(&self.resolve(graph_id)?, relationship)
    }

    /// See [`GraphStorage::delete_relationship`].
    pub fn delete_relationship(&self, graph_id: &str, id: &RelationshipId) -> Result<()> {
        self.storage
            .delete_relationship(&self.resolve(graph_id)?, id)
    }

    /// See [`GraphStorage::update_relationship`].
    pub fn update_relationship(
        &self,
        graph_id: &str,
        id: &RelationshipId,
        update: &Mutation,
    ) -> Result<()> {
        self.storage
            .update_relationship(&self.resolve(graph_id)?, id, update)
    }

    /// See [`GraphStorage::get_relationship`].
    pub fn get_relationship(
        &self,
        graph_id: &str,
        id: &RelationshipId,
        projection: &PropertyProjection,
    ) -> Result<Option<Relationship>> {
        self.storage
            .get_relationship(&self.resolve(graph_id)?, id, projection)
    }

    /// See [`GraphStorage::relationship_exists`].
    pub fn relationship_exists(&self, graph_id: &str, id: &RelationshipId) -> Result<bool> {
        self.storage
            .relationship_exists(&self.resolve(graph_id)?, id)
    }

    /// See [`GraphStorage::get_relationships`].
    pub fn get_relationships(
        &self,
        graph_id: &str,
        query: &EntityQuery,
    ) -> Result<EntityStream<Relationship>> {
        self.storage
            .get_relationships(&self.resolve(graph_id)?, query)
    }

    fn resolve(&self, graph_id: &str) -> Result<GraphConfiguration> {
        self.catalog
            .get_graph_configuration(graph_id)
            .ok_or_else(|| GraphError::GraphNotFound(graph_id.to_owned()))
    }
}

/// Graph ids name a coordination child path and two tables.
fn validate_graph_id(graph_id: &str) -> Result<()> {
    if graph_id.is_empty() {
        return Err(GraphError::invalid("graph id must not be empty"));
    }
    if graph_id.contains('/') {
        return Err(GraphError::invalid(format!(
            "graph id '{graph_id}' must not contain '/'"
        )));
    }
    Ok(())
}
