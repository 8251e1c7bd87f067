//! Graph storage engine over a column-family key-value store.
//!
//! Nodes and relationships are stored one entity per row in two tables per
//! graph. Row keys are salted so sequential ids spread across regions, and
//! existence is tracked by a marker column guarded with check-and-mutate.

/// Row-key codec and region pre-split boundaries.
pub mod keys;

/// Table names, column families, and marker columns.
pub mod schema;

mod edge;
mod graph;
mod metrics;
mod node;
mod options;
mod patch;
mod props;

/// Storage engine and bulk-read stream type.
pub use graph::{EntityStream, GraphStorage};

/// Metrics and profiling.
pub use metrics::{default_metrics, CounterMetrics, NoopMetrics, StorageMetrics};

/// Storage configuration options.
pub use options::{StorageOptions, DEFAULT_NAMESPACE};
