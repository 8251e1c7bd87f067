//! Contract of the hierarchical coordination service backing the catalog.

use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Result alias for coordination calls.
pub type CoordinationResult<T> = std::result::Result<T, CoordinationError>;

/// Failures reported by a [`Coordinator`].
#[derive(Debug, Error)]
pub enum CoordinationError {
    /// The path does not exist.
    #[error("node {0} does not exist")]
    NoNode(String),
    /// A create named an existing path.
    #[error("node {0} already exists")]
    NodeExists(String),
    /// A delete named a path that still has children.
    #[error("node {0} has children")]
    NotEmpty(String),
    /// Transient; the call may be retried.
    #[error("connection to the coordination service was lost")]
    ConnectionLoss,
    /// The session ended and will not recover.
    #[error("coordination session is closed")]
    Closed,
}

/// Kind of change a watch reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchEventKind {
    /// The watched node was created.
    NodeCreated,
    /// The watched node was deleted.
    NodeDeleted,
    /// The watched node's data changed.
    NodeDataChanged,
    /// The watched node's child list changed.
    NodeChildrenChanged,
}

/// Notification delivered to a [`Watcher`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchedEvent {
    /// What happened.
    pub kind: WatchEventKind,
    /// Path the watch was set on.
    pub path: String,
}

/// One-shot watch callback. It fires at most once and must be re-registered
/// to keep observing a path. Callbacks run on the coordination client's
/// threads.
pub type Watcher = Box<dyn FnOnce(WatchedEvent) + Send>;

/// Client of a hierarchical coordination namespace.
pub trait Coordinator: Send + Sync {
    /// Creates `path` holding `data`. The parent must exist.
    fn create(&self, path: &str, data: &[u8]) -> CoordinationResult<()>;

    /// Creates `path` and any missing ancestors, all empty. Existing nodes
    /// are left untouched.
    fn create_all(&self, path: &str) -> CoordinationResult<()> {
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            match self.create(&current, &[]) {
                Ok(()) | Err(CoordinationError::NodeExists(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Reads the data of `path`, registering `watcher` for its next data
    /// change or deletion. No watch is left when the node is missing.
    fn get_data(&self, path: &str, watcher: Option<Watcher>) -> CoordinationResult<Vec<u8>>;

    /// Overwrites the data of `path`.
    fn set_data(&self, path: &str, data: &[u8]) -> CoordinationResult<()>;

    /// Lists the child names of `path`, registering `watcher` for the next
    /// change of that list.
    fn get_children(&self, path: &str, watcher: Option<Watcher>)
        -> CoordinationResult<Vec<String>>;

    /// Deletes `path`, which must have no children.
    fn delete(&self, path: &str) -> CoordinationResult<()>;

    /// Blocks until the session is established or `timeout` elapses.
    fn await_connected(&self, _timeout: Duration) -> CoordinationResult<()> {
        Ok(())
    }
}

/// Retries a call up to `retries` extra times when the connection drops,
/// sleeping `sleep` between attempts. Other failures return immediately.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryNTimes {
    /// Extra attempts after the first.
    pub retries: u32,
    /// Pause between attempts.
    pub sleep: Duration,
}

impl RetryNTimes {
    /// Creates a policy.
    pub fn new(retries: u32, sleep: Duration) -> Self {
        Self { retries, sleep }
    }

    /// Runs `op` under this policy.
    pub fn call<T>(
        &self,
        op_name: &'static str,
        mut op: impl FnMut() -> CoordinationResult<T>,
    ) -> CoordinationResult<T> {
        let mut attempt = 0;
        loop {
            match op() {
                Err(CoordinationError::ConnectionLoss) if attempt < self.retries => {
                    attempt += 1;
                    warn!(op = op_name, attempt, "catalog.retry.connection_loss");
                    thread::sleep(self.sleep);
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn retries_connection_loss_only() {
        let policy = RetryNTimes::new(2, Duration::ZERO);
        let calls = Cell::new(0);
        let result = policy.call("test", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(CoordinationError::ConnectionLoss)
            } else {
                Ok(calls.get())
            }
        });
        assert_eq!(result.unwrap(), 3);

        let calls = Cell::new(0);
        let result: CoordinationResult<()> = policy.call("test", || {
            calls.set(calls.get() + 1);
            Err(CoordinationError::ConnectionLoss)
        });
        assert!(matches!(result, Err(CoordinationError::ConnectionLoss)));
        assert_eq!(calls.get(), 3);

        let calls = Cell::new(0);
        let result: CoordinationResult<()> = policy.call("test", || {
            calls.set(calls.get() + 1);
            Err(CoordinationError::NoNode("/x".into()))
        });
        assert!(matches!(result, Err(CoordinationError::NoNode(_))));
        assert_eq!(calls.get(), 1);
    }
}
