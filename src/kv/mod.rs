//! Contract of the sorted, column-family key-value store the graph layer
//! runs on.
//!
//! The store offers row-level atomicity only: point reads and writes,
//! check-and-mutate against one column of one row, atomic multi-column
//! mutations of one row, and ordered range scans with simple server-side
//! column-value filters. Cells are multi-versioned and carry their write
//! timestamp.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use thiserror::Error;

mod memory;

pub use memory::MemStore;

/// Result alias for store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures reported by a [`KvStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The table does not exist.
    #[error("table {0} not found")]
    TableNotFound(TableName),
    /// A create named an existing table.
    #[error("table {0} already exists")]
    TableExists(TableName),
    /// The namespace does not exist.
    #[error("namespace {0} not found")]
    NamespaceNotFound(String),
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Fully qualified table name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableName {
    /// Deployment namespace.
    pub namespace: String,
    /// Table name inside the namespace.
    pub qualifier: String,
}

impl TableName {
    /// Creates a table name.
    pub fn new(namespace: impl Into<String>, qualifier: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            qualifier: qualifier.into(),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.qualifier)
    }
}

/// Block compression applied to a column family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    /// Uncompressed blocks.
    None,
    /// LZ4-compressed blocks.
    Lz4,
}

/// Physical layout of a table with a single column family.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Table name.
    pub name: TableName,
    /// Column family name.
    pub family: Vec<u8>,
    /// Versions retained per cell.
    pub max_versions: u32,
    /// Whether deleted cells stay readable in history instead of being purged.
    pub keep_deleted_cells: bool,
    /// Block compression.
    pub compression: Compression,
    /// Region boundaries the table is pre-split at.
    pub split_keys: Vec<Vec<u8>>,
}

/// Comparison of a column's current value against an operand, evaluated as
/// `current OP operand` with bytewise ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `>=`
    GreaterOrEqual,
    /// `>`
    Greater,
}

impl CompareOp {
    /// Applies the comparison to `current` and `operand`.
    pub fn matches(self, current: &[u8], operand: &[u8]) -> bool {
        let ord = current.cmp(operand);
        match self {
            CompareOp::Less => ord == Ordering::Less,
            CompareOp::LessOrEqual => ord != Ordering::Greater,
            CompareOp::Equal => ord == Ordering::Equal,
            CompareOp::NotEqual => ord != Ordering::Equal,
            CompareOp::GreaterOrEqual => ord != Ordering::Less,
            CompareOp::Greater => ord == Ordering::Greater,
        }
    }
}

/// Server-side row filter. A row missing the tested column never passes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowFilter {
    /// Passes when the column's latest value satisfies `current OP value`.
    Column {
        /// Column qualifier.
        qualifier: Vec<u8>,
        /// Comparison.
        op: CompareOp,
        /// Operand.
        value: Vec<u8>,
    },
    /// Passes when any child passes.
    AnyOf(Vec<RowFilter>),
}

impl RowFilter {
    /// Single-column filter.
    pub fn column(qualifier: impl Into<Vec<u8>>, op: CompareOp, value: impl Into<Vec<u8>>) -> Self {
        RowFilter::Column {
            qualifier: qualifier.into(),
            op,
            value: value.into(),
        }
    }

    /// Evaluates the filter given a lookup of each column's latest value.
    pub fn accepts<'a, F>(&self, latest: &F) -> bool
    where
        F: Fn(&[u8]) -> Option<&'a [u8]>,
    {
        match self {
            RowFilter::Column {
                qualifier,
                op,
                value,
            } => latest(qualifier).is_some_and(|current| op.matches(current, value)),
            RowFilter::AnyOf(filters) => filters.iter().any(|f| f.accepts(latest)),
        }
    }
}

/// Which columns a read returns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnSelection {
    /// Every column of the family.
    All,
    /// Only these qualifiers.
    Columns(BTreeSet<Vec<u8>>),
}

impl ColumnSelection {
    /// Returns whether `qualifier` is selected.
    pub fn contains(&self, qualifier: &[u8]) -> bool {
        match self {
            ColumnSelection::All => true,
            ColumnSelection::Columns(columns) => columns.contains(qualifier),
        }
    }
}

/// Point read of one row.
#[derive(Clone, Debug)]
pub struct Get {
    /// Row key.
    pub row: Vec<u8>,
    /// Returned columns.
    pub columns: ColumnSelection,
    /// Optional filter; a rejected row reads as absent.
    pub filter: Option<RowFilter>,
}

/// Range scan over `[start, stop)`.
#[derive(Clone, Debug)]
pub struct Scan {
    /// Inclusive start row.
    pub start: Vec<u8>,
    /// Exclusive stop row.
    pub stop: Vec<u8>,
    /// Returned columns.
    pub columns: ColumnSelection,
    /// Optional filter applied per row.
    pub filter: Option<RowFilter>,
}

/// Precondition of a check-and-mutate call on one column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    /// The column has no live value.
    Absent,
    /// The column's live value satisfies `current OP value`.
    Compare {
        /// Comparison.
        op: CompareOp,
        /// Operand.
        value: Vec<u8>,
    },
}

/// One step of a row mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnOp {
    /// Writes a new version of a column.
    Put {
        /// Column qualifier.
        qualifier: Vec<u8>,
        /// Cell value.
        value: Vec<u8>,
    },
    /// Deletes every version of a column.
    DeleteColumn {
        /// Column qualifier.
        qualifier: Vec<u8>,
    },
    /// Deletes every column of the row.
    DeleteRow,
}

/// Ordered column operations applied atomically to one row under a single
/// write timestamp. Later operations win over earlier ones on the same column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowMutation {
    /// Row key.
    pub row: Vec<u8>,
    /// Operations in application order.
    pub ops: Vec<ColumnOp>,
}

impl RowMutation {
    /// Creates an empty mutation of `row`.
    pub fn new(row: Vec<u8>) -> Self {
        Self {
            row,
            ops: Vec::new(),
        }
    }

    /// Mutation deleting the whole row.
    pub fn delete_row(row: Vec<u8>) -> Self {
        Self {
            row,
            ops: vec![ColumnOp::DeleteRow],
        }
    }

    /// Appends a column write.
    pub fn put(&mut self, qualifier: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(ColumnOp::Put {
            qualifier: qualifier.into(),
            value: value.into(),
        });
    }

    /// Appends a column delete.
    pub fn delete_column(&mut self, qualifier: impl Into<Vec<u8>>) {
        self.ops.push(ColumnOp::DeleteColumn {
            qualifier: qualifier.into(),
        });
    }

    /// Returns true when no operation is queued.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Latest live version of one column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    /// Cell value.
    pub value: Vec<u8>,
    /// Write timestamp in milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// One row as returned by a get or scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowResult {
    /// Row key.
    pub row: Vec<u8>,
    /// Selected live columns keyed by qualifier.
    pub cells: BTreeMap<Vec<u8>, Cell>,
}

impl RowResult {
    /// Cell stored under `qualifier`, if returned.
    pub fn cell(&self, qualifier: &[u8]) -> Option<&Cell> {
        self.cells.get(qualifier)
    }
}

/// Lazy stream of scanned rows; fetches from the store as it is consumed.
pub type RowScanner = Box<dyn Iterator<Item = StoreResult<RowResult>> + Send>;

/// Client of a sorted column-family store. Implementations are shared across
/// requests for the process lifetime and must be safe for concurrent use.
pub trait KvStore: Send + Sync {
    /// Creates `namespace`; returns false when it already existed.
    fn create_namespace(&self, namespace: &str) -> StoreResult<bool>;

    /// Creates a table; fails with [`StoreError::TableExists`] if present.
    fn create_table(&self, descriptor: &TableDescriptor) -> StoreResult<()>;

    /// Drops a table; fails with [`StoreError::TableNotFound`] if missing.
    fn delete_table(&self, table: &TableName) -> StoreResult<()>;

    /// Returns whether `table` exists.
    fn table_exists(&self, table: &TableName) -> StoreResult<bool>;

    /// Point read; `None` when the row has no selected live cells or the
    /// filter rejects it.
    fn get(&self, table: &TableName, get: &Get) -> StoreResult<Option<RowResult>>;

    /// Returns whether `qualifier` holds a live value in `row`.
    fn exists(&self, table: &TableName, row: &[u8], qualifier: &[u8]) -> StoreResult<bool>;

    /// Applies `mutation` iff `qualifier` of `row` satisfies `condition`.
    /// Returns whether the mutation was applied.
    fn check_and_mutate(
        &self,
        table: &TableName,
        qualifier: &[u8],
        condition: &Condition,
        mutation: &RowMutation,
    ) -> StoreResult<bool>;

    /// Applies `mutation` unconditionally and atomically.
    fn mutate_row(&self, table: &TableName, mutation: &RowMutation) -> StoreResult<()>;

    /// Starts a range scan.
    fn scan(&self, table: &TableName, scan: &Scan) -> StoreResult<RowScanner>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_op_reads_current_first() {
        assert!(CompareOp::GreaterOrEqual.matches(b"T", &[0]));
        assert!(!CompareOp::GreaterOrEqual.matches(b"", &[0]));
        assert!(CompareOp::Less.matches(b"a", b"b"));
        assert!(CompareOp::NotEqual.matches(b"a", b"b"));
    }

    #[test]
    fn any_of_filter() {
        let filter = RowFilter::AnyOf(vec![
            RowFilter::column(b"".to_vec(), CompareOp::Equal, b"A".to_vec()),
            RowFilter::column(b"".to_vec(), CompareOp::Equal, b"B".to_vec()),
        ]);
        let b_row = |q: &[u8]| if q.is_empty() { Some(&b"B"[..]) } else { None };
        let c_row = |q: &[u8]| if q.is_empty() { Some(&b"C"[..]) } else { None };
        let missing = |_: &[u8]| None;
        assert!(filter.accepts(&b_row));
        assert!(!filter.accepts(&c_row));
        assert!(!filter.accepts(&missing));
    }
}
