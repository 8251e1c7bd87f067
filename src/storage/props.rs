//! Property column codec.
//!
//! Every property lives in its own column, qualified by the property key and
//! holding the JSON encoding of its value. The zero-length qualifier is the
//! marker column and never carries a property.

use std::collections::BTreeSet;

use crate::error::{GraphError, Result};
use crate::kv::{ColumnSelection, RowMutation, RowResult};
use crate::model::PROPERTY_ADDED_AT;
use crate::query::{Properties, PropertyProjection, Value};

use super::schema::MARKER_QUALIFIER;

/// Rejects keys that would collide with the marker column.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(GraphError::invalid("property keys must be non-empty"));
    }
    Ok(())
}

/// Encodes one property value.
pub fn encode_value(value: &Value) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Decodes one property value.
pub fn decode_value(bytes: &[u8]) -> Result<Value> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Appends one put per property to `mutation`.
pub fn put_properties(mutation: &mut RowMutation, properties: &Properties) -> Result<()> {
    for (key, value) in properties {
        validate_key(key)?;
        mutation.put(key.as_bytes(), encode_value(value)?);
    }
    Ok(())
}

/// Columns a read needs under `projection`: the marker plus the projected
/// property columns.
pub fn column_selection(projection: &PropertyProjection) -> ColumnSelection {
    match projection {
        PropertyProjection::All => ColumnSelection::All,
        PropertyProjection::Nothing => {
            ColumnSelection::Columns(BTreeSet::from([MARKER_QUALIFIER.to_vec()]))
        }
        PropertyProjection::Partial(keys) => {
            let mut columns: BTreeSet<Vec<u8>> =
                keys.iter().map(|k| k.as_bytes().to_vec()).collect();
            columns.insert(MARKER_QUALIFIER.to_vec());
            ColumnSelection::Columns(columns)
        }
    }
}

/// Rebuilds the property map of a row.
///
/// `_added_at` is derived from the marker cell's write timestamp when the
/// projection asks for it. A stored property of the same name overrides the
/// derived value.
pub fn decode_properties(row: &RowResult, projection: &PropertyProjection) -> Result<Properties> {
    let mut properties = Properties::new();
    if projection.includes(PROPERTY_ADDED_AT) {
        if let Some(marker) = row.cell(MARKER_QUALIFIER) {
            let added_at = i64::try_from(marker.timestamp).unwrap_or(i64::MAX);
            properties.insert(PROPERTY_ADDED_AT.to_owned(), Value::Int(added_at));
        }
    }
    for (qualifier, cell) in &row.cells {
        if qualifier.as_slice() == MARKER_QUALIFIER {
            continue;
        }
        let key = std::str::from_utf8(qualifier).map_err(|_| {
            GraphError::Corruption(format!(
                "property qualifier is not UTF-8: {}",
                hex::encode(qualifier)
            ))
        })?;
        if !projection.includes(key) {
            continue;
        }
        properties.insert(key.to_owned(), decode_value(&cell.value)?);
    }
    Ok(properties)
}
