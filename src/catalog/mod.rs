//! Watch-driven cache of graph configurations held in a coordination service.
//!
//! Every graph is one child of the base path whose data is the JSON-encoded
//! [`GraphConfiguration`]. Reads are served from a local map that a single
//! worker thread keeps in sync: watch callbacks only enqueue events, and the
//! worker re-fetches, re-arms the watches, and applies the result. Reads can
//! therefore lag a write by one watch round trip.

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::CatalogConfig;
use crate::error::{GraphError, Result};
use crate::model::GraphConfiguration;

mod coordinator;
mod memory;

pub use coordinator::{
    CoordinationError, CoordinationResult, Coordinator, RetryNTimes, WatchEventKind,
    WatchedEvent, Watcher,
};
pub use memory::MemCoordinator;

/// Default coordination path graph entries live under.
pub const DEFAULT_BASE_PATH: &str = "/graphbase/catalog";

/// Options for [`GraphCatalog::start`].
#[derive(Clone)]
pub struct CatalogOptions {
    /// Coordination client shared for the process lifetime.
    pub coordinator: Arc<dyn Coordinator>,
    /// Parent path of the graph entries.
    pub base_path: String,
    /// Retry policy for calls that lose the connection.
    pub retry: RetryNTimes,
    /// How long `start` waits for the session.
    pub connection_timeout: Duration,
}

impl CatalogOptions {
    /// Creates options with default settings.
    pub fn new(coordinator: Arc<dyn Coordinator>) -> Self {
        Self {
            coordinator,
            base_path: DEFAULT_BASE_PATH.to_owned(),
            retry: RetryNTimes::new(10, Duration::from_millis(100)),
            connection_timeout: Duration::from_secs(10),
        }
    }

    /// Creates options from the `[catalog]` config section.
    pub fn from_config(coordinator: Arc<dyn Coordinator>, config: &CatalogConfig) -> Self {
        Self::new(coordinator)
            .base_path(config.base_path.clone())
            .retry(RetryNTimes::new(
                config.retry_count,
                Duration::from_millis(config.retry_sleep_ms),
            ))
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
    }

    /// Sets the base path.
    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = path.into();
        self
    }

    /// Sets the retry policy.
    pub fn retry(mut self, retry: RetryNTimes) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the connection timeout.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }
}

enum CatalogEvent {
    ChildrenChanged,
    DataChanged(String),
    Shutdown,
}

struct Shared {
    coordinator: Arc<dyn Coordinator>,
    base_path: String,
    retry: RetryNTimes,
    graphs: RwLock<HashMap<String, GraphConfiguration>>,
}

/// Eventually consistent mirror of the graph catalog.
///
/// When a watch re-arm still loses the connection after the retry policy is
/// exhausted, the worker waits one retry pause and replays the event, so the
/// cache catches up once the coordination service is reachable again. Other
/// re-arm failures are logged and leave the affected watch unarmed until the
/// next event for that path.
pub struct GraphCatalog {
    shared: Arc<Shared>,
    sender: Mutex<Option<Sender<CatalogEvent>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl GraphCatalog {
    /// Ensures the base path exists, loads every entry present, arms the
    /// watches, and starts the sync worker.
    pub fn start(options: CatalogOptions) -> Result<Self> {
        let CatalogOptions {
            coordinator,
            base_path,
            retry,
            connection_timeout,
        } = options;
        coordinator.await_connected(connection_timeout)?;
        retry.call("create_all", || coordinator.create_all(&base_path))?;

        let shared = Arc::new(Shared {
            coordinator,
            base_path: base_path.trim_end_matches('/').to_owned(),
            retry,
            graphs: RwLock::new(HashMap::new()),
        });
        let (sender, receiver) = mpsc::channel();
        let mut armed = HashSet::new();
        shared.sync_children(&sender, &mut armed)?;
        info!(
            base_path = %shared.base_path,
            graphs = shared.graphs.read().len(),
            "catalog.start.synced"
        );

        let worker_shared = Arc::clone(&shared);
        let worker_sender = sender.clone();
        let worker = thread::Builder::new()
            .name("graphbase-catalog".into())
            .spawn(move || Self::sync_loop(worker_shared, receiver, worker_sender, armed))?;

        Ok(Self {
            shared,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Publishes `config`. Creates the entry unless this catalog already
    /// knows the graph, then overwrites its data, so repeated calls behave as
    /// an upsert. The local map only changes once the watch fires.
    pub fn create_graph(&self, config: &GraphConfiguration) -> Result<()> {
        let path = self.shared.child_path(&config.graph_id);
        let data = serde_json::to_vec(config)?;
        let coordinator = &self.shared.coordinator;
        if !self.graph_exists(&config.graph_id) {
            match self
                .shared
                .retry
                .call("create", || coordinator.create(&path, &data))
            {
                Ok(()) | Err(CoordinationError::NodeExists(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }
        self.shared
            .retry
            .call("set_data", || coordinator.set_data(&path, &data))?;
        info!(graph = %config.graph_id, path = %path, "catalog.create_graph.published");
        Ok(())
    }

    /// Removes the entry of `graph_id`. A missing entry is not an error. The
    /// local map only changes once the watch fires.
    pub fn drop_graph(&self, graph_id: &str) -> Result<()> {
        let path = self.shared.child_path(graph_id);
        let coordinator = &self.shared.coordinator;
        match self.shared.retry.call("delete", || coordinator.delete(&path)) {
            Ok(()) => info!(graph = graph_id, path = %path, "catalog.drop_graph.deleted"),
            Err(CoordinationError::NoNode(_)) => {
                warn!(graph = graph_id, path = %path, "catalog.drop_graph.already_absent")
            }
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }

    /// Local lookup; never touches the network.
    pub fn graph_exists(&self, graph_id: &str) -> bool {
        self.shared.graphs.read().contains_key(graph_id)
    }

    /// Local lookup; never touches the network.
    pub fn get_graph_configuration(&self, graph_id: &str) -> Option<GraphConfiguration> {
        self.shared.graphs.read().get(graph_id).cloned()
    }

    /// Ids of every cached graph, sorted.
    pub fn graph_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.shared.graphs.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Stops the sync worker. The cache keeps its last contents.
    pub fn shutdown(&self) {
        if let Some(sender) = self.sender.lock().take() {
            let _ = sender.send(CatalogEvent::Shutdown);
        }
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                error!("catalog.shutdown.worker_panicked");
            }
        }
    }

    fn sync_loop(
        shared: Arc<Shared>,
        receiver: Receiver<CatalogEvent>,
        sender: Sender<CatalogEvent>,
        mut armed: HashSet<String>,
    ) {
        while let Ok(event) = receiver.recv() {
            match event {
                CatalogEvent::ChildrenChanged => {
                    debug!("catalog.watch.children_changed");
                    if let Err(err) = shared.sync_children(&sender, &mut armed) {
                        error!(error = %err, "catalog.watch.children_rearm_failed");
                        if is_connection_loss(&err) {
                            shared.replay(&sender, CatalogEvent::ChildrenChanged);
                        }
                    }
                }
                CatalogEvent::DataChanged(graph_id) => {
                    debug!(graph = %graph_id, "catalog.watch.data_changed");
                    armed.remove(&graph_id);
                    if let Err(err) = shared.refresh(&sender, &mut armed, &graph_id) {
                        error!(graph = %graph_id, error = %err, "catalog.watch.data_rearm_failed");
                        if is_connection_loss(&err) {
                            shared.replay(&sender, CatalogEvent::DataChanged(graph_id));
                        }
                    }
                }
                CatalogEvent::Shutdown => break,
            }
        }
        debug!("catalog.worker.stopped");
    }
}

impl Drop for GraphCatalog {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn is_connection_loss(err: &GraphError) -> bool {
    matches!(err, GraphError::Coordination(CoordinationError::ConnectionLoss))
}

impl Shared {
    fn child_path(&self, graph_id: &str) -> String {
        format!("{}/{}", self.base_path, graph_id)
    }

    /// Queues `event` again after one retry pause. Events already queued,
    /// including a shutdown, are handled first.
    fn replay(&self, sender: &Sender<CatalogEvent>, event: CatalogEvent) {
        thread::sleep(self.retry.sleep);
        debug!("catalog.watch.replayed");
        let _ = sender.send(event);
    }

    /// Re-lists the base path with a fresh children watch, loads children
    /// without a pending data watch, and evicts children that disappeared.
    fn sync_children(
        &self,
        sender: &Sender<CatalogEvent>,
        armed: &mut HashSet<String>,
    ) -> Result<()> {
        let children = self.retry.call("get_children", || {
            let tx = sender.clone();
            let watcher: Watcher = Box::new(move |_event: WatchedEvent| {
                let _ = tx.send(CatalogEvent::ChildrenChanged);
            });
            self.coordinator.get_children(&self.base_path, Some(watcher))
        })?;
        let listed: HashSet<String> = children.into_iter().collect();
        for graph_id in &listed {
            if armed.contains(graph_id) {
                continue;
            }
            if let Err(err) = self.refresh(sender, armed, graph_id) {
                error!(graph = %graph_id, error = %err, "catalog.sync.load_failed");
                if is_connection_loss(&err) {
                    let _ = sender.send(CatalogEvent::DataChanged(graph_id.clone()));
                }
            }
        }
        let mut graphs = self.graphs.write();
        graphs.retain(|graph_id, _| {
            let keep = listed.contains(graph_id);
            if !keep {
                debug!(graph = %graph_id, "catalog.sync.evicted");
            }
            keep
        });
        Ok(())
    }

    /// Re-reads one entry with a fresh data watch. A missing entry is evicted.
    fn refresh(
        &self,
        sender: &Sender<CatalogEvent>,
        armed: &mut HashSet<String>,
        graph_id: &str,
    ) -> Result<()> {
        let path = self.child_path(graph_id);
        let fetched = self.retry.call("get_data", || {
            let tx = sender.clone();
            let id = graph_id.to_owned();
            let watcher: Watcher = Box::new(move |_event: WatchedEvent| {
                let _ = tx.send(CatalogEvent::DataChanged(id));
            });
            self.coordinator.get_data(&path, Some(watcher))
        });
        match fetched {
            Ok(data) => {
                armed.insert(graph_id.to_owned());
                let config: GraphConfiguration = serde_json::from_slice(&data)?;
                debug!(graph = %graph_id, "catalog.sync.loaded");
                self.graphs.write().insert(graph_id.to_owned(), config);
                Ok(())
            }
            Err(CoordinationError::NoNode(_)) => {
                if self.graphs.write().remove(graph_id).is_some() {
                    debug!(graph = %graph_id, "catalog.sync.evicted");
                }
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
