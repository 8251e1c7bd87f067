use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use super::coordinator::{
    CoordinationError, CoordinationResult, Coordinator, WatchEventKind, WatchedEvent, Watcher,
};

/// In-process hierarchical namespace with one-shot watches.
///
/// Watchers fire synchronously on the thread that made the change, after the
/// internal lock is released. Clones share the same namespace.
#[derive(Clone, Default)]
pub struct MemCoordinator {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    nodes: BTreeMap<String, Vec<u8>>,
    data_watches: HashMap<String, Vec<Watcher>>,
    child_watches: HashMap<String, Vec<Watcher>>,
    connection_losses: u32,
    closed: bool,
}

type Fired = Vec<(Watcher, WatchedEvent)>;

impl MemCoordinator {
    /// Creates an empty namespace holding only the root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `calls` operations fail with
    /// [`CoordinationError::ConnectionLoss`].
    pub fn inject_connection_loss(&self, calls: u32) {
        self.state.lock().connection_losses = calls;
    }

    /// Closes the session: pending watches are dropped and every later call
    /// fails with [`CoordinationError::Closed`].
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.data_watches.clear();
        state.child_watches.clear();
    }

    /// Number of watches currently registered on `path`, data and child
    /// watches combined.
    pub fn watch_count(&self, path: &str) -> usize {
        let state = self.state.lock();
        state.data_watches.get(path).map_or(0, Vec::len)
            + state.child_watches.get(path).map_or(0, Vec::len)
    }
}

impl State {
    fn enter(&mut self) -> CoordinationResult<()> {
        if self.closed {
            return Err(CoordinationError::Closed);
        }
        if self.connection_losses > 0 {
            self.connection_losses -= 1;
            return Err(CoordinationError::ConnectionLoss);
        }
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        path == "/" || self.nodes.contains_key(path)
    }

    fn children(&self, path: &str) -> Vec<String> {
        let prefix = if path == "/" {
            "/".to_owned()
        } else {
            format!("{path}/")
        };
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(p, _)| p.starts_with(&prefix))
            .map(|(p, _)| &p[prefix.len()..])
            .filter(|rest| !rest.contains('/'))
            .map(str::to_owned)
            .collect()
    }

    fn take(
        watches: &mut HashMap<String, Vec<Watcher>>,
        path: &str,
        kind: WatchEventKind,
        fired: &mut Fired,
    ) {
        if let Some(list) = watches.remove(path) {
            for watcher in list {
                fired.push((
                    watcher,
                    WatchedEvent {
                        kind,
                        path: path.to_owned(),
                    },
                ));
            }
        }
    }
}

fn parent(path: &str) -> CoordinationResult<&str> {
    if !path.starts_with('/') || path.len() < 2 || path.ends_with('/') {
        return Err(CoordinationError::NoNode(path.to_owned()));
    }
    match path.rfind('/') {
        Some(0) => Ok("/"),
        Some(idx) => Ok(&path[..idx]),
        None => Err(CoordinationError::NoNode(path.to_owned())),
    }
}

fn fire(fired: Fired) {
    for (watcher, event) in fired {
        watcher(event);
    }
}

impl Coordinator for MemCoordinator {
    fn create(&self, path: &str, data: &[u8]) -> CoordinationResult<()> {
        let mut fired = Fired::new();
        {
            let mut state = self.state.lock();
            state.enter()?;
            let parent = parent(path)?;
            if !state.exists(parent) {
                return Err(CoordinationError::NoNode(parent.to_owned()));
            }
            if state.exists(path) {
                return Err(CoordinationError::NodeExists(path.to_owned()));
            }
            state.nodes.insert(path.to_owned(), data.to_vec());
            State::take(
                &mut state.child_watches,
                parent,
                WatchEventKind::NodeChildrenChanged,
                &mut fired,
            );
        }
        fire(fired);
        Ok(())
    }

    fn get_data(&self, path: &str, watcher: Option<Watcher>) -> CoordinationResult<Vec<u8>> {
        let mut state = self.state.lock();
        state.enter()?;
        let data = state
            .nodes
            .get(path)
            .cloned()
            .ok_or_else(|| CoordinationError::NoNode(path.to_owned()))?;
        if let Some(watcher) = watcher {
            state
                .data_watches
                .entry(path.to_owned())
                .or_default()
                .push(watcher);
        }
        Ok(data)
    }

    fn set_data(&self, path: &str, data: &[u8]) -> CoordinationResult<()> {
        let mut fired = Fired::new();
        {
            let mut state = self.state.lock();
            state.enter()?;
            let slot = state
                .nodes
                .get_mut(path)
                .ok_or_else(|| CoordinationError::NoNode(path.to_owned()))?;
            *slot = data.to_vec();
            State::take(
                &mut state.data_watches,
                path,
                WatchEventKind::NodeDataChanged,
                &mut fired,
            );
        }
        fire(fired);
        Ok(())
    }

    fn get_children(
        &self,
        path: &str,
        watcher: Option<Watcher>,
    ) -> CoordinationResult<Vec<String>> {
        let mut state = self.state.lock();
        state.enter()?;
        if !state.exists(path) {
            return Err(CoordinationError::NoNode(path.to_owned()));
        }
        let children = state.children(path);
        if let Some(watcher) = watcher {
            state
                .child_watches
                .entry(path.to_owned())
                .or_default()
                .push(watcher);
        }
        Ok(children)
    }

    fn delete(&self, path: &str) -> CoordinationResult<()> {
        let mut fired = Fired::new();
        {
            let mut state = self.state.lock();
            state.enter()?;
            let parent = parent(path)?;
            if !state.nodes.contains_key(path) {
                return Err(CoordinationError::NoNode(path.to_owned()));
            }
            if !state.children(path).is_empty() {
                return Err(CoordinationError::NotEmpty(path.to_owned()));
            }
            state.nodes.remove(path);
            State::take(
                &mut state.data_watches,
                path,
                WatchEventKind::NodeDeleted,
                &mut fired,
            );
            State::take(
                &mut state.child_watches,
                path,
                WatchEventKind::NodeDeleted,
                &mut fired,
            );
            State::take(
                &mut state.child_watches,
                parent,
                WatchEventKind::NodeChildrenChanged,
                &mut fired,
            );
        }
        fire(fired);
        Ok(())
    }
}
