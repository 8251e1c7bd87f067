//! Relationship row codec. The relationship type lives in the row key; the
//! marker column only records existence.

use crate::error::{GraphError, Result};
use crate::kv::{RowMutation, RowResult};
use crate::model::{Relationship, RelationshipId};
use crate::query::PropertyProjection;

use super::{keys, props, schema};

/// Rejects identities whose NUL-terminated fields would make the key
/// ambiguous.
pub fn validate_id(id: &RelationshipId) -> Result<()> {
    if id.out_node_id.contains('\0') || id.rel_type.contains('\0') {
        return Err(GraphError::invalid(
            "relationship out-node id and type must not contain NUL",
        ));
    }
    Ok(())
}

/// Builds the mutation creating `relationship`.
pub fn encode(relationship: &Relationship) -> Result<RowMutation> {
    let id = relationship.id();
    validate_id(&id)?;
    let mut mutation = RowMutation::new(keys::relationship_row_key(&id));
    mutation.put(schema::MARKER_QUALIFIER, schema::RELATIONSHIP_MARKER);
    props::put_properties(&mut mutation, &relationship.properties)?;
    Ok(mutation)
}

/// Rebuilds a relationship from its row.
pub fn decode(row: &RowResult, projection: &PropertyProjection) -> Result<Relationship> {
    let id = keys::decode_relationship_row_key(&row.row)?;
    let properties = props::decode_properties(row, projection)?;
    Ok(Relationship {
        out_node_id: id.out_node_id,
        rel_type: id.rel_type,
        in_node_id: id.in_node_id,
        properties,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::kv::Cell;
    use crate::query::{properties, Value};

    #[test]
    fn nul_in_terminated_fields_is_rejected() {
        let rel = Relationship::new("a\0b", "T", "c", Default::default());
        assert!(matches!(encode(&rel), Err(GraphError::InvalidArgument(_))));
        let rel = Relationship::new("a", "T", "c\0d", Default::default());
        assert!(encode(&rel).is_ok());
    }

    #[test]
    fn decode_takes_identity_from_key() {
        let id = RelationshipId::new("a", "KNOWS", "b");
        let row = RowResult {
            row: keys::relationship_row_key(&id),
            cells: BTreeMap::from([
                (
                    Vec::new(),
                    Cell {
                        value: vec![0],
                        timestamp: 42,
                    },
                ),
                (
                    b"w".to_vec(),
                    Cell {
                        value: b"1.5".to_vec(),
                        timestamp: 42,
                    },
                ),
            ]),
        };
        let rel = decode(&row, &PropertyProjection::All).unwrap();
        assert_eq!(rel.id(), id);
        assert_eq!(
            rel.properties,
            properties([("_added_at", Value::Int(42)), ("w", Value::Float(1.5))])
        );
    }
}
