//! Row-key layouts for nodes and relationships.
//!
//! Node: `[ROW_TYPE][salt(id) u32 BE][id]`.
//! Relationship: `[ROW_TYPE][salt(out) u32 BE][out NUL][type NUL][in]`.
//!
//! The salt is Murmur3 of the primary id and only scatters keys across
//! regions; reads recompute it from the supplied id. `out` and `type` must not
//! contain NUL.

use crate::error::{GraphError, Result};
use crate::model::RelationshipId;
use crate::primitives::bytes::{buf::Cursor, hash, ord, term};

/// Row-type tag of live entity rows.
pub const ROW_TYPE_EXISTS: u8 = 1;

const SALT_LEN: usize = 4;

/// Encodes the row key of node `id`.
pub fn node_row_key(id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + SALT_LEN + id.len());
    key.push(ROW_TYPE_EXISTS);
    ord::put_u32_be(&mut key, hash::row_salt(id));
    term::put_raw(&mut key, id);
    key
}

/// Recovers the node id from a row key.
pub fn decode_node_row_key(key: &[u8]) -> Result<String> {
    let mut cursor = prefixed(key)?;
    utf8(cursor.rest(), key)
}

/// Encodes the row key of a relationship.
pub fn relationship_row_key(id: &RelationshipId) -> Vec<u8> {
    let mut key = Vec::with_capacity(
        1 + SALT_LEN + id.out_node_id.len() + id.rel_type.len() + id.in_node_id.len() + 2,
    );
    key.push(ROW_TYPE_EXISTS);
    ord::put_u32_be(&mut key, hash::row_salt(&id.out_node_id));
    term::put_terminated(&mut key, &id.out_node_id);
    term::put_terminated(&mut key, &id.rel_type);
    term::put_raw(&mut key, &id.in_node_id);
    key
}

/// Recovers the relationship identity from a row key.
pub fn decode_relationship_row_key(key: &[u8]) -> Result<RelationshipId> {
    let mut cursor = prefixed(key)?;
    let out = cursor
        .take_until(term::NUL)
        .ok_or_else(|| corrupt("relationship key missing out-node terminator", key))?;
    let rel_type = cursor
        .take_until(term::NUL)
        .ok_or_else(|| corrupt("relationship key missing type terminator", key))?;
    let in_node = cursor.rest();
    Ok(RelationshipId {
        out_node_id: utf8(out, key)?,
        rel_type: utf8(rel_type, key)?,
        in_node_id: utf8(in_node, key)?,
    })
}

/// `[start, stop)` covering every live row of one entity table.
pub fn scan_range() -> (Vec<u8>, Vec<u8>) {
    (vec![ROW_TYPE_EXISTS], vec![ROW_TYPE_EXISTS + 1])
}

/// `regions - 1` boundaries dividing the first two salt bytes evenly.
/// Zero or one region yields no boundaries.
pub fn split_keys(regions: u32) -> Vec<Vec<u8>> {
    if regions <= 1 {
        return Vec::new();
    }
    let space = u64::from(u16::MAX) + 1;
    let regions = u64::from(regions).min(space);
    (1..regions)
        .map(|i| {
            let boundary = (space * i / regions) as u16;
            let mut key = Vec::with_capacity(3);
            key.push(ROW_TYPE_EXISTS);
            ord::put_u16_be(&mut key, boundary);
            key
        })
        .collect()
}

fn prefixed(key: &[u8]) -> Result<Cursor<'_>> {
    let mut cursor = Cursor::new(key);
    match cursor.take(1) {
        Some([ROW_TYPE_EXISTS]) => {}
        _ => return Err(corrupt("unexpected row type", key)),
    }
    cursor
        .take(SALT_LEN)
        .ok_or_else(|| corrupt("row key shorter than salt", key))?;
    Ok(cursor)
}

fn utf8(bytes: &[u8], key: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| corrupt("row key field is not UTF-8", key))
}

fn corrupt(what: &str, key: &[u8]) -> GraphError {
    GraphError::Corruption(format!("{what}: {}", hex::encode(key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn node_key_layout() {
        let key = node_row_key("n1");
        assert_eq!(key[0], ROW_TYPE_EXISTS);
        assert_eq!(ord::get_u32_be(&key[1..]), Some(hash::row_salt("n1")));
        assert_eq!(&key[5..], b"n1");
        assert_eq!(decode_node_row_key(&key).unwrap(), "n1");
    }

    #[test]
    fn relationship_key_layout() {
        let id = RelationshipId::new("a", "KNOWS", "b");
        let key = relationship_row_key(&id);
        assert_eq!(&key[5..], b"a\0KNOWS\0b");
        assert_eq!(decode_relationship_row_key(&key).unwrap(), id);
    }

    #[test]
    fn relationships_of_one_source_share_a_prefix() {
        let a = relationship_row_key(&RelationshipId::new("src", "X", "1"));
        let b = relationship_row_key(&RelationshipId::new("src", "Y", "2"));
        assert_eq!(a[..9], b[..9]);
    }

    #[test]
    fn malformed_keys_are_corruption() {
        assert!(matches!(
            decode_node_row_key(&[2, 0, 0, 0, 0]),
            Err(GraphError::Corruption(_))
        ));
        assert!(matches!(
            decode_node_row_key(&[1, 0, 0]),
            Err(GraphError::Corruption(_))
        ));
        assert!(matches!(
            decode_relationship_row_key(&[1, 0, 0, 0, 0, b'a']),
            Err(GraphError::Corruption(_))
        ));
    }

    #[test]
    fn split_boundaries() {
        assert!(split_keys(0).is_empty());
        assert!(split_keys(1).is_empty());
        assert_eq!(split_keys(2), vec![vec![1, 0x80, 0x00]]);
        assert_eq!(
            split_keys(4),
            vec![vec![1, 0x40, 0x00], vec![1, 0x80, 0x00], vec![1, 0xc0, 0x00]]
        );
        let many = split_keys(7);
        assert_eq!(many.len(), 6);
        assert!(many.windows(2).all(|w| w[0] < w[1]));
    }

    proptest! {
        #[test]
        fn node_key_roundtrip(id in "\\PC*") {
            let key = node_row_key(&id);
            prop_assert_eq!(decode_node_row_key(&key).unwrap(), id);
        }

        #[test]
        fn relationship_key_roundtrip(
            out in "[^\\x00]*",
            rel_type in "[^\\x00]*",
            inn in "\\PC*",
        ) {
            let id = RelationshipId::new(out, rel_type, inn);
            let key = relationship_row_key(&id);
            prop_assert_eq!(decode_relationship_row_key(&key).unwrap(), id);
        }

        #[test]
        fn keys_fall_inside_scan_range(id in "\\PC*", other in "\\PC*") {
            let (start, stop) = scan_range();
            let node = node_row_key(&id);
            let rel = relationship_row_key(&RelationshipId::new(id.clone(), "T", other));
            prop_assert!(start <= node && node < stop);
            prop_assert!(start <= rel && rel < stop);
        }
    }
}
