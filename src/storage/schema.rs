//! Physical layout of a graph: table names, column families, and the fixed
//! marker columns.

use crate::kv::{CompareOp, Compression, Condition, RowFilter, TableDescriptor, TableName};

use super::keys;

/// Column family of node tables.
pub const NODE_FAMILY: &[u8] = b"n";
/// Column family of relationship tables.
pub const RELATIONSHIP_FAMILY: &[u8] = b"r";
/// Zero-length qualifier of the marker column. Holds the node type for nodes
/// and [`RELATIONSHIP_MARKER`] for relationships.
pub const MARKER_QUALIFIER: &[u8] = b"";
/// Value of the relationship existence marker.
pub const RELATIONSHIP_MARKER: &[u8] = &[0];

const NODE_TABLE_SUFFIX: &str = "_node";
const RELATIONSHIP_TABLE_SUFFIX: &str = "_rel";

/// Entity kind stored in a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    /// Node table.
    Node,
    /// Relationship table.
    Relationship,
}

impl EntityKind {
    /// Label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Node => "node",
            EntityKind::Relationship => "relationship",
        }
    }

    fn family(self) -> &'static [u8] {
        match self {
            EntityKind::Node => NODE_FAMILY,
            EntityKind::Relationship => RELATIONSHIP_FAMILY,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            EntityKind::Node => NODE_TABLE_SUFFIX,
            EntityKind::Relationship => RELATIONSHIP_TABLE_SUFFIX,
        }
    }

    /// Condition under which the entity is considered live: a non-empty node
    /// type, or the relationship marker byte.
    pub fn exists_condition(self) -> Condition {
        let (op, value) = self.marker_test();
        Condition::Compare { op, value }
    }

    /// Server-side filter equivalent of [`Self::exists_condition`].
    pub fn exists_filter(self) -> RowFilter {
        let (op, value) = self.marker_test();
        RowFilter::column(MARKER_QUALIFIER, op, value)
    }

    fn marker_test(self) -> (CompareOp, Vec<u8>) {
        match self {
            EntityKind::Node => (CompareOp::GreaterOrEqual, vec![0]),
            EntityKind::Relationship => (CompareOp::Equal, RELATIONSHIP_MARKER.to_vec()),
        }
    }
}

/// Table holding `kind` entities of `graph_id`.
pub fn table_name(namespace: &str, graph_id: &str, kind: EntityKind) -> TableName {
    TableName::new(namespace, format!("{graph_id}{}", kind.suffix()))
}

/// Descriptor a graph's table is created with: one family, every version
/// retained, deleted cells kept, pre-split into `splits` regions.
pub fn table_descriptor(
    namespace: &str,
    graph_id: &str,
    kind: EntityKind,
    compression: bool,
    splits: u32,
) -> TableDescriptor {
    TableDescriptor {
        name: table_name(namespace, graph_id, kind),
        family: kind.family().to_vec(),
        max_versions: u32::MAX,
        keep_deleted_cells: true,
        compression: if compression {
            Compression::Lz4
        } else {
            Compression::None
        },
        split_keys: keys::split_keys(splits),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_descriptors() {
        let node = table_descriptor("graphbase", "g1", EntityKind::Node, true, 4);
        assert_eq!(node.name.to_string(), "graphbase:g1_node");
        assert_eq!(node.family, b"n");
        assert_eq!(node.compression, Compression::Lz4);
        assert!(node.keep_deleted_cells);
        assert_eq!(node.max_versions, u32::MAX);
        assert_eq!(node.split_keys.len(), 3);

        let rel = table_descriptor("graphbase", "g1", EntityKind::Relationship, false, 1);
        assert_eq!(rel.name.to_string(), "graphbase:g1_rel");
        assert_eq!(rel.family, b"r");
        assert_eq!(rel.compression, Compression::None);
        assert!(rel.split_keys.is_empty());
    }
}
