//! Node row codec.

use crate::error::{GraphError, Result};
use crate::kv::{RowMutation, RowResult};
use crate::model::Node;
use crate::query::PropertyProjection;

use super::{keys, props, schema::MARKER_QUALIFIER};

/// Builds the mutation creating `node`: the type in the marker column plus
/// one column per property.
pub fn encode(node: &Node) -> Result<RowMutation> {
    if node.node_type.is_empty() {
        return Err(GraphError::invalid("node type must be non-empty"));
    }
    let mut mutation = RowMutation::new(keys::node_row_key(&node.id));
    mutation.put(MARKER_QUALIFIER, node.node_type.as_bytes());
    props::put_properties(&mut mutation, &node.properties)?;
    Ok(mutation)
}

/// Rebuilds a node from its row.
pub fn decode(row: &RowResult, projection: &PropertyProjection) -> Result<Node> {
    let id = keys::decode_node_row_key(&row.row)?;
    let marker = row
        .cell(MARKER_QUALIFIER)
        .ok_or_else(|| GraphError::Corruption(format!("node '{id}' has no type column")))?;
    let node_type = String::from_utf8(marker.value.clone())
        .map_err(|_| GraphError::Corruption(format!("node '{id}' type is not UTF-8")))?;
    let properties = props::decode_properties(row, projection)?;
    Ok(Node {
        id,
        node_type,
        properties,
    })
}
