use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::{
    Cell, ColumnOp, ColumnSelection, Condition, Get, KvStore, RowFilter, RowMutation, RowResult,
    RowScanner, Scan, StoreError, StoreResult, TableDescriptor, TableName,
};

const DEFAULT_SCAN_BATCH: usize = 100;

/// In-process [`KvStore`] with versioned cells, tombstones, and batched
/// scanners. Clones share the same tables.
#[derive(Clone)]
pub struct MemStore {
    inner: Arc<Inner>,
}

struct Inner {
    namespaces: RwLock<BTreeSet<String>>,
    tables: RwLock<HashMap<TableName, Arc<MemTable>>>,
    clock: Mutex<u64>,
    scan_batch_size: usize,
    available: AtomicBool,
}

struct MemTable {
    descriptor: TableDescriptor,
    rows: RwLock<BTreeMap<Vec<u8>, MemRow>>,
}

/// Column qualifier to versions, newest first. `None` marks a delete.
type MemRow = BTreeMap<Vec<u8>, Vec<Version>>;

#[derive(Clone, Debug)]
struct Version {
    timestamp: u64,
    value: Option<Vec<u8>>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::with_scan_batch_size(DEFAULT_SCAN_BATCH)
    }

    /// Creates an empty store whose scanners fetch `batch` rows per round trip.
    pub fn with_scan_batch_size(batch: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                namespaces: RwLock::new(BTreeSet::new()),
                tables: RwLock::new(HashMap::new()),
                clock: Mutex::new(0),
                scan_batch_size: batch.max(1),
                available: AtomicBool::new(true),
            }),
        }
    }

    /// Simulates the store going away (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, AtomicOrdering::SeqCst);
    }

    /// Descriptor a table was created with.
    pub fn descriptor(&self, table: &TableName) -> Option<TableDescriptor> {
        self.inner
            .tables
            .read()
            .get(table)
            .map(|t| t.descriptor.clone())
    }

    /// Number of regions a table was pre-split into.
    pub fn regions(&self, table: &TableName) -> Option<usize> {
        self.descriptor(table).map(|d| d.split_keys.len() + 1)
    }

    /// Number of rows physically held by a table, including rows that only
    /// carry deleted cells.
    pub fn row_count(&self, table: &TableName) -> Option<usize> {
        let tables = self.inner.tables.read();
        tables.get(table).map(|t| t.rows.read().len())
    }

    /// Full version history of one cell, newest first. Deletes appear as
    /// `None` when the table keeps deleted cells.
    pub fn cell_history(
        &self,
        table: &TableName,
        row: &[u8],
        qualifier: &[u8],
    ) -> Vec<(u64, Option<Vec<u8>>)> {
        let Ok(table) = self.table(table) else {
            return Vec::new();
        };
        let rows = table.rows.read();
        rows.get(row)
            .and_then(|r| r.get(qualifier))
            .map(|versions| {
                versions
                    .iter()
                    .map(|v| (v.timestamp, v.value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.inner.available.load(AtomicOrdering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store offline".into()))
        }
    }

    fn table(&self, name: &TableName) -> StoreResult<Arc<MemTable>> {
        self.check_available()?;
        self.inner
            .tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::TableNotFound(name.clone()))
    }

    // Strictly increasing so that two writes in the same millisecond still
    // order correctly.
    fn next_timestamp(&self) -> u64 {
        let mut last = self.inner.clock.lock();
        let now = now_millis();
        *last = now.max(*last + 1);
        *last
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn latest<'r>(row: &'r MemRow, qualifier: &[u8]) -> Option<(u64, &'r [u8])> {
    let newest = row.get(qualifier)?.first()?;
    newest
        .value
        .as_deref()
        .map(|value| (newest.timestamp, value))
}

fn passes(row: &MemRow, filter: Option<&RowFilter>) -> bool {
    match filter {
        None => true,
        Some(filter) => filter.accepts(&|q: &[u8]| latest(row, q).map(|(_, v)| v)),
    }
}

fn materialize(
    key: &[u8],
    row: &MemRow,
    columns: &ColumnSelection,
    filter: Option<&RowFilter>,
) -> Option<RowResult> {
    if !passes(row, filter) {
        return None;
    }
    let cells: BTreeMap<Vec<u8>, Cell> = row
        .keys()
        .filter(|q| columns.contains(q))
        .filter_map(|q| {
            latest(row, q).map(|(timestamp, value)| {
                (
                    q.clone(),
                    Cell {
                        value: value.to_vec(),
                        timestamp,
                    },
                )
            })
        })
        .collect();
    if cells.is_empty() {
        return None;
    }
    Some(RowResult {
        row: key.to_vec(),
        cells,
    })
}

impl MemTable {
    fn apply(&self, rows: &mut BTreeMap<Vec<u8>, MemRow>, mutation: &RowMutation, ts: u64) {
        let keep_deleted = self.descriptor.keep_deleted_cells;
        let max_versions = self.descriptor.max_versions.max(1) as usize;
        let row = rows.entry(mutation.row.clone()).or_default();
        for op in &mutation.ops {
            match op {
                ColumnOp::Put { qualifier, value } => {
                    let versions = row.entry(qualifier.clone()).or_default();
                    versions.insert(
                        0,
                        Version {
                            timestamp: ts,
                            value: Some(value.clone()),
                        },
                    );
                    versions.truncate(max_versions);
                }
                ColumnOp::DeleteColumn { qualifier } => {
                    delete_column(row, qualifier, ts, keep_deleted, max_versions);
                }
                ColumnOp::DeleteRow => {
                    let qualifiers: Vec<Vec<u8>> = row.keys().cloned().collect();
                    for qualifier in qualifiers {
                        delete_column(row, &qualifier, ts, keep_deleted, max_versions);
                    }
                }
            }
        }
        if row.is_empty() {
            rows.remove(&mutation.row);
        }
    }
}

fn delete_column(row: &mut MemRow, qualifier: &[u8], ts: u64, keep_deleted: bool, max: usize) {
    if !keep_deleted {
        row.remove(qualifier);
        return;
    }
    let Some(versions) = row.get_mut(qualifier) else {
        return;
    };
    if versions.first().is_some_and(|v| v.value.is_none()) {
        return;
    }
    versions.insert(
        0,
        Version {
            timestamp: ts,
            value: None,
        },
    );
    // The tombstone does not count against retained versions.
    versions.truncate(max + 1);
}

impl KvStore for MemStore {
    fn create_namespace(&self, namespace: &str) -> StoreResult<bool> {
        self.check_available()?;
        let created = self.inner.namespaces.write().insert(namespace.to_owned());
        if created {
            debug!(namespace, "kv.mem.namespace_created");
        }
        Ok(created)
    }

    fn create_table(&self, descriptor: &TableDescriptor) -> StoreResult<()> {
        self.check_available()?;
        if !self
            .inner
            .namespaces
            .read()
            .contains(&descriptor.name.namespace)
        {
            return Err(StoreError::NamespaceNotFound(
                descriptor.name.namespace.clone(),
            ));
        }
        let mut tables = self.inner.tables.write();
        if tables.contains_key(&descriptor.name) {
            return Err(StoreError::TableExists(descriptor.name.clone()));
        }
        tables.insert(
            descriptor.name.clone(),
            Arc::new(MemTable {
                descriptor: descriptor.clone(),
                rows: RwLock::new(BTreeMap::new()),
            }),
        );
        debug!(
            table = %descriptor.name,
            regions = descriptor.split_keys.len() + 1,
            "kv.mem.table_created"
        );
        Ok(())
    }

    fn delete_table(&self, table: &TableName) -> StoreResult<()> {
        self.check_available()?;
        match self.inner.tables.write().remove(table) {
            Some(_) => {
                debug!(table = %table, "kv.mem.table_deleted");
                Ok(())
            }
            None => Err(StoreError::TableNotFound(table.clone())),
        }
    }

    fn table_exists(&self, table: &TableName) -> StoreResult<bool> {
        self.check_available()?;
        Ok(self.inner.tables.read().contains_key(table))
    }

    fn get(&self, table: &TableName, get: &Get) -> StoreResult<Option<RowResult>> {
        let table = self.table(table)?;
        let rows = table.rows.read();
        Ok(rows
            .get(&get.row)
            .and_then(|row| materialize(&get.row, row, &get.columns, get.filter.as_ref())))
    }

    fn exists(&self, table: &TableName, row: &[u8], qualifier: &[u8]) -> StoreResult<bool> {
        let table = self.table(table)?;
        let rows = table.rows.read();
        Ok(rows
            .get(row)
            .is_some_and(|r| latest(r, qualifier).is_some()))
    }

    fn check_and_mutate(
        &self,
        table: &TableName,
        qualifier: &[u8],
        condition: &Condition,
        mutation: &RowMutation,
    ) -> StoreResult<bool> {
        let table = self.table(table)?;
        let mut rows = table.rows.write();
        let current = rows
            .get(&mutation.row)
            .and_then(|r| latest(r, qualifier))
            .map(|(_, v)| v);
        let holds = match condition {
            Condition::Absent => current.is_none(),
            Condition::Compare { op, value } => current.is_some_and(|c| op.matches(c, value)),
        };
        if !holds {
            return Ok(false);
        }
        let ts = self.next_timestamp();
        table.apply(&mut rows, mutation, ts);
        Ok(true)
    }

    fn mutate_row(&self, table: &TableName, mutation: &RowMutation) -> StoreResult<()> {
        let table = self.table(table)?;
        let mut rows = table.rows.write();
        let ts = self.next_timestamp();
        table.apply(&mut rows, mutation, ts);
        Ok(())
    }

    fn scan(&self, table: &TableName, scan: &Scan) -> StoreResult<RowScanner> {
        let table = self.table(table)?;
        let done = scan.start >= scan.stop;
        Ok(Box::new(MemScanner {
            table,
            store: self.clone(),
            next_start: Bound::Included(scan.start.clone()),
            stop: scan.stop.clone(),
            columns: scan.columns.clone(),
            filter: scan.filter.clone(),
            batch: VecDeque::new(),
            batch_size: self.inner.scan_batch_size,
            done,
        }))
    }
}

/// Scanner that takes the table lock once per batch and resumes after the
/// last row it examined.
struct MemScanner {
    table: Arc<MemTable>,
    store: MemStore,
    next_start: Bound<Vec<u8>>,
    stop: Vec<u8>,
    columns: ColumnSelection,
    filter: Option<RowFilter>,
    batch: VecDeque<RowResult>,
    batch_size: usize,
    done: bool,
}

impl MemScanner {
    fn fill(&mut self) -> StoreResult<()> {
        self.store.check_available()?;
        let rows = self.table.rows.read();
        let range = rows.range::<Vec<u8>, _>((
            self.next_start.clone(),
            Bound::Excluded(self.stop.clone()),
        ));
        let mut last = None;
        let mut exhausted = true;
        for (key, row) in range {
            last = Some(key);
            if let Some(result) = materialize(key, row, &self.columns, self.filter.as_ref()) {
                self.batch.push_back(result);
                if self.batch.len() >= self.batch_size {
                    exhausted = false;
                    break;
                }
            }
        }
        if let Some(last) = last {
            self.next_start = Bound::Excluded(last.clone());
        }
        self.done = exhausted;
        Ok(())
    }
}

impl Iterator for MemScanner {
    type Item = StoreResult<RowResult>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.batch.is_empty() && !self.done {
            if let Err(err) = self.fill() {
                self.done = true;
                return Some(Err(err));
            }
        }
        self.batch.pop_front().map(Ok)
    }
}
