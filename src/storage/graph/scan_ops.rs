use tracing::debug;

use super::GraphStorage;
use crate::error::Result;
use crate::kv::{RowFilter, RowResult, Scan, TableName};
use crate::model::Entity;
use crate::query::{EntityQuery, FilterExecutor, PropertyProjection, SortComparator};
use crate::storage::keys;
use crate::storage::props;
use crate::storage::schema::EntityKind;

/// Single-pass stream of entities produced by a bulk read. Unsorted streams
/// pull rows from the store as they are consumed.
pub type EntityStream<T> = Box<dyn Iterator<Item = Result<T>> + Send>;

pub(super) type Decoder<T> = fn(&RowResult, &PropertyProjection) -> Result<T>;

/// Client-side type check for entities whose type is not a column.
pub(super) type TypeGate<T> = Box<dyn Fn(&T) -> bool + Send>;

/// Scan, decode, filter, sort, and project one entity table.
///
/// Columns are read under the query's effective projection so that filter
/// and sort keys are always materialized; the caller's projection is applied
/// last. Sorting buffers the whole filtered result before returning.
pub(super) fn run<T>(
    storage: &GraphStorage,
    table: &TableName,
    kind: EntityKind,
    row_filter: RowFilter,
    query: &EntityQuery,
    type_gate: Option<TypeGate<T>>,
    decode: Decoder<T>,
) -> Result<EntityStream<T>>
where
    T: Entity + Send + 'static,
{
    // Compile patterns before touching the store.
    let executor = query.filter.clone().map(FilterExecutor::new).transpose()?;
    let effective = query.effective_projection();
    let (start, stop) = keys::scan_range();
    let scan = Scan {
        start,
        stop,
        columns: props::column_selection(&effective),
        filter: Some(row_filter),
    };
    let rows = storage.store.scan(table, &scan)?;
    storage.metrics.scan(kind.as_str());
    debug!(
        table = %table,
        types = query.types.len(),
        filtered = executor.is_some(),
        sorts = query.sorts.len(),
        "storage.scan.started"
    );

    let mut stream: EntityStream<T> = Box::new(rows.map(move |row| {
        let row = row?;
        decode(&row, &effective)
    }));

    if let Some(gate) = type_gate {
        stream = Box::new(stream.filter(move |item| item.as_ref().map_or(true, |e| gate(e))));
    }

    if let Some(executor) = executor {
        stream = Box::new(stream.filter_map(move |item| match item {
            Ok(entity) => match executor.execute(&entity) {
                Ok(true) => Some(Ok(entity)),
                Ok(false) => None,
                Err(err) => Some(Err(err)),
            },
            Err(err) => Some(Err(err)),
        }));
    }

    if !query.sorts.is_empty() {
        let comparator = SortComparator::new(query.sorts.clone());
        let mut buffered = stream.collect::<Result<Vec<T>>>()?;
        buffered.sort_by(|a, b| comparator.compare(a, b));
        storage.metrics.sorted_buffer(buffered.len());
        debug!(table = %table, rows = buffered.len(), "storage.scan.sorted");
        stream = Box::new(buffered.into_iter().map(Ok));
    }

    let projection = query.projection.clone();
    Ok(Box::new(stream.map(move |item| {
        item.map(|mut entity| {
            let fetched = std::mem::take(entity.properties_mut());
            *entity.properties_mut() = projection.filter(fetched);
            entity
        })
    })))
}
