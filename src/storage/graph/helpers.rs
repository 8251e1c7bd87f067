use crate::error::Result;
use crate::kv::{Get, RowMutation, RowResult, TableName};
use crate::query::PropertyProjection;
use crate::storage::props;
use crate::storage::schema::{EntityKind, MARKER_QUALIFIER};

use super::GraphStorage;

/// Hex rendering of a row key for log fields.
pub(crate) fn key_hex(row: &[u8]) -> String {
    hex::encode(row)
}

impl GraphStorage {
    /// Point read of a live entity row restricted to `projection`.
    pub(super) fn read_entity_row(
        &self,
        table: &TableName,
        kind: EntityKind,
        row: Vec<u8>,
        projection: &PropertyProjection,
    ) -> Result<Option<RowResult>> {
        let get = Get {
            row,
            columns: props::column_selection(projection),
            filter: Some(kind.exists_filter()),
        };
        Ok(self.store.get(table, &get)?)
    }

    /// Existence check on the marker column only.
    pub(super) fn marker_exists(&self, table: &TableName, row: &[u8]) -> Result<bool> {
        Ok(self.store.exists(table, row, MARKER_QUALIFIER)?)
    }

    /// Applies a property update to an existing row. Returns false when the
    /// row has no live marker; an empty update only checks existence.
    pub(super) fn update_entity_row(
        &self,
        table: &TableName,
        mutation: RowMutation,
    ) -> Result<bool> {
        if !self.marker_exists(table, &mutation.row)? {
            return Ok(false);
        }
        if !mutation.is_empty() {
            self.store.mutate_row(table, &mutation)?;
        }
        Ok(true)
    }
}
