use tracing::debug;

use super::helpers::key_hex;
use super::scan_ops::{self, EntityStream};
use super::GraphStorage;
use crate::error::{GraphError, Result};
use crate::kv::{CompareOp, Condition, RowFilter, RowMutation};
use crate::model::{GraphConfiguration, Mutation, Node};
use crate::query::{EntityQuery, PropertyProjection};
use crate::storage::schema::{EntityKind, MARKER_QUALIFIER};
use crate::storage::{keys, node, patch};

impl GraphStorage {
    /// Creates a node. Fails with [`GraphError::NodeAlreadyExists`] when the
    /// id already has a live type column.
    pub fn add_node(&self, config: &GraphConfiguration, new: &Node) -> Result<()> {
        let mutation = node::encode(new)?;
        let table = self.table(config, EntityKind::Node);
        if !self
            .store
            .check_and_mutate(&table, MARKER_QUALIFIER, &Condition::Absent, &mutation)?
        {
            return Err(GraphError::NodeAlreadyExists(new.id.clone()));
        }
        self.metrics.node_created();
        debug!(
            graph = %config.graph_id,
            node = %new.id,
            row = %key_hex(&mutation.row),
            "storage.node.created"
        );
        Ok(())
    }

    /// Deletes every column of a node. Fails with
    /// [`GraphError::NodeNotFound`] unless the node is live.
    pub fn delete_node(&self, config: &GraphConfiguration, node_id: &str) -> Result<()> {
        let table = self.table(config, EntityKind::Node);
        let mutation = RowMutation::delete_row(keys::node_row_key(node_id));
        if !self.store.check_and_mutate(
            &table,
            MARKER_QUALIFIER,
            &EntityKind::Node.exists_condition(),
            &mutation,
        )? {
            return Err(GraphError::NodeNotFound(node_id.to_owned()));
        }
        self.metrics.node_deleted();
        debug!(graph = %config.graph_id, node = node_id, "storage.node.deleted");
        Ok(())
    }

    /// Writes `update.set_properties` and removes `update.delete_keys` in one
    /// atomic row mutation.
    ///
    /// The existence check and the mutation are separate calls; a concurrent
    /// delete in between leaves the updated columns behind without a type.
    pub fn update_node(
        &self,
        config: &GraphConfiguration,
        node_id: &str,
        update: &Mutation,
    ) -> Result<()> {
        let table = self.table(config, EntityKind::Node);
        let mutation = patch::row_mutation(keys::node_row_key(node_id), update)?;
        if !self.update_entity_row(&table, mutation)? {
            return Err(GraphError::NodeNotFound(node_id.to_owned()));
        }
        debug!(
            graph = %config.graph_id,
            node = node_id,
            set = update.set_properties.len(),
            deleted = update.delete_keys.len(),
            "storage.node.updated"
        );
        Ok(())
    }

    /// Reads one node; `None` when it does not exist.
    pub fn get_node(
        &self,
        config: &GraphConfiguration,
        node_id: &str,
        projection: &PropertyProjection,
    ) -> Result<Option<Node>> {
        let table = self.table(config, EntityKind::Node);
        self.read_entity_row(&table, EntityKind::Node, keys::node_row_key(node_id), projection)?
            .map(|row| node::decode(&row, projection))
            .transpose()
    }

    /// Returns whether the node exists.
    pub fn node_exists(&self, config: &GraphConfiguration, node_id: &str) -> Result<bool> {
        let table = self.table(config, EntityKind::Node);
        self.marker_exists(&table, &keys::node_row_key(node_id))
    }

    /// Scans the node table through the query pipeline. The type allow-list
    /// is evaluated by the store.
    pub fn get_nodes(
        &self,
        config: &GraphConfiguration,
        query: &EntityQuery,
    ) -> Result<EntityStream<Node>> {
        let table = self.table(config, EntityKind::Node);
        let row_filter = if query.types.is_empty() {
            EntityKind::Node.exists_filter()
        } else {
            RowFilter::AnyOf(
                query
                    .types
                    .iter()
                    .map(|t| RowFilter::column(MARKER_QUALIFIER, CompareOp::Equal, t.as_bytes()))
                    .collect(),
            )
        };
        scan_ops::run(
            self,
            &table,
            EntityKind::Node,
            row_filter,
            query,
            None,
            node::decode,
        )
    }
}
