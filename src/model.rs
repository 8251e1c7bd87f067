//! Graph entities and request payloads.
//!
//! Nodes and relationships are transient: every read constructs fresh
//! instances owned by the caller. [`GraphConfiguration`] is the only value
//! persisted in the coordination service.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::query::value::{Properties, Value};

/// Derived property holding the write timestamp (milliseconds since the Unix
/// epoch) of an entity's existence marker. A stored property of the same
/// name is not rejected and shadows the derived value on read.
pub const PROPERTY_ADDED_AT: &str = "_added_at";

/// Identifies a logical graph namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphConfiguration {
    /// Graph identifier; names both the catalog entry and the storage tables.
    pub graph_id: String,
}

impl GraphConfiguration {
    /// Creates a configuration for `graph_id`.
    pub fn new(graph_id: impl Into<String>) -> Self {
        Self {
            graph_id: graph_id.into(),
        }
    }
}

/// Accessors shared by nodes and relationships for the query pipeline.
pub trait Entity {
    /// All materialized properties.
    fn properties(&self) -> &Properties;

    /// Mutable access used when trimming projections.
    fn properties_mut(&mut self) -> &mut Properties;

    /// Looks up a property for filtering and sorting. A stored JSON null reads
    /// the same as an absent property.
    fn property_value(&self, key: &str) -> Option<&Value> {
        match self.properties().get(key) {
            Some(Value::Null) | None => None,
            Some(value) => Some(value),
        }
    }
}

/// A node. Identity is `(graph, id)`; `node_type` is fixed at creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node identifier, unique within its graph.
    pub id: String,
    /// Node type label.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Node properties.
    #[serde(default)]
    pub properties: Properties,
}

impl Node {
    /// Creates a node value.
    pub fn new(
        id: impl Into<String>,
        node_type: impl Into<String>,
        properties: Properties,
    ) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            properties,
        }
    }
}

impl Entity for Node {
    fn properties(&self) -> &Properties {
        &self.properties
    }

    fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }
}

/// Composite identity of a relationship.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipId {
    /// Source node id.
    pub out_node_id: String,
    /// Relationship type.
    #[serde(rename = "type")]
    pub rel_type: String,
    /// Target node id.
    pub in_node_id: String,
}

impl RelationshipId {
    /// Creates a relationship identity.
    pub fn new(
        out_node_id: impl Into<String>,
        rel_type: impl Into<String>,
        in_node_id: impl Into<String>,
    ) -> Self {
        Self {
            out_node_id: out_node_id.into(),
            rel_type: rel_type.into(),
            in_node_id: in_node_id.into(),
        }
    }
}

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({})-[{}]->({})",
            self.out_node_id, self.rel_type, self.in_node_id
        )
    }
}

/// A directed, typed relationship between two node ids. Endpoints are not
/// checked against existing nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    /// Source node id.
    pub out_node_id: String,
    /// Relationship type.
    #[serde(rename = "type")]
    pub rel_type: String,
    /// Target node id.
    pub in_node_id: String,
    /// Relationship properties.
    #[serde(default)]
    pub properties: Properties,
}

impl Relationship {
    /// Creates a relationship value.
    pub fn new(
        out_node_id: impl Into<String>,
        rel_type: impl Into<String>,
        in_node_id: impl Into<String>,
        properties: Properties,
    ) -> Self {
        Self {
            out_node_id: out_node_id.into(),
            rel_type: rel_type.into(),
            in_node_id: in_node_id.into(),
            properties,
        }
    }

    /// Returns the composite identity.
    pub fn id(&self) -> RelationshipId {
        RelationshipId::new(&self.out_node_id, &self.rel_type, &self.in_node_id)
    }
}

impl Entity for Relationship {
    fn properties(&self) -> &Properties {
        &self.properties
    }

    fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }
}

/// Partial property update: keys to set and keys to delete.
///
/// Sets are applied before deletes, so a key named in both ends up deleted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Mutation {
    /// Properties to write.
    pub set_properties: Properties,
    /// Property keys to remove.
    pub delete_keys: BTreeSet<String>,
}

impl Mutation {
    /// Creates an empty mutation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a property write.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_properties.insert(key.into(), value.into());
        self
    }

    /// Adds a property delete.
    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.delete_keys.insert(key.into());
        self
    }

    /// Returns true if this mutation changes nothing.
    pub fn is_empty(&self) -> bool {
        self.set_properties.is_empty() && self.delete_keys.is_empty()
    }
}
