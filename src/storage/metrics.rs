use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Trait for tracking storage operations of the graph layer.
///
/// Implementations receive a callback for every successful entity create or
/// delete, every scan started by a bulk query, and every sorted query that had
/// to buffer its result set in memory.
pub trait StorageMetrics: Send + Sync {
    /// Records the creation of a node.
    fn node_created(&self);

    /// Records the deletion of a node.
    fn node_deleted(&self);

    /// Records the creation of a relationship.
    fn relationship_created(&self);

    /// Records the deletion of a relationship.
    fn relationship_deleted(&self);

    /// Records a table scan.
    ///
    /// # Parameters
    /// * `kind` - `"node"` or `"relationship"`.
    fn scan(&self, kind: &'static str);

    /// Records a sorted query materializing `rows` entities before emitting
    /// the first one.
    fn sorted_buffer(&self, rows: usize);
}

/// A no-op implementation of [`StorageMetrics`] that discards all recorded metrics.
#[derive(Default)]
pub struct NoopMetrics;

impl StorageMetrics for NoopMetrics {
    fn node_created(&self) {}
    fn node_deleted(&self) {}
    fn relationship_created(&self) {}
    fn relationship_deleted(&self) {}
    fn scan(&self, _kind: &'static str) {}
    fn sorted_buffer(&self, _rows: usize) {}
}

/// A thread-safe counter-based implementation of [`StorageMetrics`].
#[derive(Default)]
pub struct CounterMetrics {
    /// Number of nodes created.
    pub nodes_created: AtomicU64,

    /// Number of nodes deleted.
    pub nodes_deleted: AtomicU64,

    /// Number of relationships created.
    pub relationships_created: AtomicU64,

    /// Number of relationships deleted.
    pub relationships_deleted: AtomicU64,

    /// Number of node table scans.
    pub node_scans: AtomicU64,

    /// Number of relationship table scans.
    pub relationship_scans: AtomicU64,

    /// Number of sorted queries.
    pub sorted_queries: AtomicU64,

    /// Largest result set buffered by a sorted query.
    pub max_sorted_buffer: AtomicU64,
}

impl StorageMetrics for CounterMetrics {
    fn node_created(&self) {
        self.nodes_created.fetch_add(1, Ordering::Relaxed);
    }

    fn node_deleted(&self) {
        self.nodes_deleted.fetch_add(1, Ordering::Relaxed);
    }

    fn relationship_created(&self) {
        self.relationships_created.fetch_add(1, Ordering::Relaxed);
    }

    fn relationship_deleted(&self) {
        self.relationships_deleted.fetch_add(1, Ordering::Relaxed);
    }

    fn scan(&self, kind: &'static str) {
        match kind {
            "node" => {
                self.node_scans.fetch_add(1, Ordering::Relaxed);
            }
            "relationship" => {
                self.relationship_scans.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    fn sorted_buffer(&self, rows: usize) {
        self.sorted_queries.fetch_add(1, Ordering::Relaxed);
        self.max_sorted_buffer
            .fetch_max(rows as u64, Ordering::Relaxed);
    }
}

/// Returns the default metrics implementation, [`NoopMetrics`], wrapped in an [`Arc`].
pub fn default_metrics() -> Arc<dyn StorageMetrics> {
    Arc::new(NoopMetrics)
}
