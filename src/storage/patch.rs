use crate::error::Result;
use crate::kv::RowMutation;
use crate::model::Mutation;

use super::props;

/// Translates a property update into one row mutation: puts for the set
/// keys, then column deletes for the delete keys, so a key named in both ends
/// up deleted.
pub fn row_mutation(row: Vec<u8>, update: &Mutation) -> Result<RowMutation> {
    let mut mutation = RowMutation::new(row);
    props::put_properties(&mut mutation, &update.set_properties)?;
    for key in &update.delete_keys {
        props::validate_key(key)?;
        mutation.delete_column(key.as_bytes());
    }
    Ok(mutation)
}
