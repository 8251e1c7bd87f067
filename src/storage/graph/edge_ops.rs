use tracing::debug;

use super::helpers::key_hex;
use super::scan_ops::{self, EntityStream, TypeGate};
use super::GraphStorage;
use crate::error::{GraphError, Result};
use crate::kv::{Condition, RowMutation};
use crate::model::{GraphConfiguration, Mutation, Relationship, RelationshipId};
use crate::query::{EntityQuery, PropertyProjection};
use crate::storage::schema::{EntityKind, MARKER_QUALIFIER};
use crate::storage::{edge, keys, patch};

impl GraphStorage {
    /// Creates a relationship. Endpoints are not checked against the node
    /// table.
    pub fn add_relationship(
        &self,
        config: &GraphConfiguration,
        relationship: &Relationship,
    ) -> Result<()> {
        let mutation = edge::encode(relationship)?;
        let table = self.table(config, EntityKind::Relationship);
        if !self
            .store
            .check_and_mutate(&table, MARKER_QUALIFIER, &Condition::Absent, &mutation)?
        {
            return Err(GraphError::RelationshipAlreadyExists(relationship.id()));
        }
        self.metrics.relationship_created();
        debug!(
            graph = %config.graph_id,
            relationship = %relationship.id(),
            row = %key_hex(&mutation.row),
            "storage.relationship.created"
        );
        Ok(())
    }

    /// Deletes a relationship row. Fails with
    /// [`GraphError::RelationshipNotFound`] unless its marker is live.
    pub fn delete_relationship(
        &self,
        config: &GraphConfiguration,
        id: &RelationshipId,
    ) -> Result<()> {
        edge::validate_id(id)?;
        let table = self.table(config, EntityKind::Relationship);
        let mutation = RowMutation::delete_row(keys::relationship_row_key(id));
        if !self.store.check_and_mutate(
            &table,
            MARKER_QUALIFIER,
            &EntityKind::Relationship.exists_condition(),
            &mutation,
        )? {
            return Err(GraphError::RelationshipNotFound(id.clone()));
        }
        self.metrics.relationship_deleted();
        debug!(graph = %config.graph_id, relationship = %id, "storage.relationship.deleted");
        Ok(())
    }

    /// Applies a property update; same race caveat as
    /// [`GraphStorage::update_node`].
    pub fn update_relationship(
        &self,
        config: &GraphConfiguration,
        id: &RelationshipId,
        update: &Mutation,
    ) -> Result<()> {
        edge::validate_id(id)?;
        let table = self.table(config, EntityKind::Relationship);
        let mutation = patch::row_mutation(keys::relationship_row_key(id), update)?;
        if !self.update_entity_row(&table, mutation)? {
            return Err(GraphError::RelationshipNotFound(id.clone()));
        }
        debug!(graph = %config.graph_id, relationship = %id, "storage.relationship.updated");
        Ok(())
    }

    /// Reads one relationship; `None` when it does not exist.
    pub fn get_relationship(
        &self,
        config: &GraphConfiguration,
        id: &RelationshipId,
        projection: &PropertyProjection,
    ) -> Result<Option<Relationship>> {
        edge::validate_id(id)?;
        let table = self.table(config, EntityKind::Relationship);
        let row = keys::relationship_row_key(id);
        self.read_entity_row(&table, EntityKind::Relationship, row, projection)?
            .map(|row| edge::decode(&row, projection))
            .transpose()
    }

    /// Returns whether the relationship exists.
    pub fn relationship_exists(
        &self,
        config: &GraphConfiguration,
        id: &RelationshipId,
    ) -> Result<bool> {
        edge::validate_id(id)?;
        let table = self.table(config, EntityKind::Relationship);
        self.marker_exists(&table, &keys::relationship_row_key(id))
    }

    /// Scans the relationship table through the query pipeline. The type is
    /// part of the row key, so the allow-list is applied after decoding.
    pub fn get_relationships(
        &self,
        config: &GraphConfiguration,
        query: &EntityQuery,
    ) -> Result<EntityStream<Relationship>> {
        let table = self.table(config, EntityKind::Relationship);
        let gate: Option<TypeGate<Relationship>> = if query.types.is_empty() {
            None
        } else {
            let types = query.types.clone();
            Some(Box::new(move |rel: &Relationship| types.contains(&rel.rel_type)))
        };
        scan_ops::run(
            self,
            &table,
            EntityKind::Relationship,
            EntityKind::Relationship.exists_filter(),
            query,
            gate,
            edge::decode,
        )
    }
}
