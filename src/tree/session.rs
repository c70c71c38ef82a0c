//! Sessions on the reference tree

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::MutexGuard;

use super::state::{fire, TreeState};
use super::MemoryTree;
use crate::service::{
    Coordinator, CreateMode, MultiError, Request, Response, ServiceError, ServiceResult, Stat,
};
use crate::version::{NativeVersion, ANY_VERSION};
use crate::watch::{WatchHandle, WatchKind};

/// One client session. Ephemeral nodes it creates live as long as it does.
pub struct MemorySession {
    tree: MemoryTree,
    id: u64,
    closed: AtomicBool,
}

impl MemorySession {
    pub(super) fn new(tree: MemoryTree, id: u64) -> Self {
        Self {
            tree,
            id,
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The tree this session talks to
    pub fn tree(&self) -> &MemoryTree {
        &self.tree
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Lock the tree, failing if the session already ended
    fn lock(&self) -> ServiceResult<MutexGuard<'_, TreeState>> {
        let state = self.tree.state().lock();
        if self.is_closed() {
            return Err(ServiceError::SessionClosed);
        }
        Ok(state)
    }

    fn apply_one(&self, request: Request) -> ServiceResult<Response> {
        let mut state = self.lock()?;
        let mut undo = Vec::new();
        let mut changes = Vec::new();
        let response = state.apply(&request, self.id, &mut undo, &mut changes)?;
        let pending = state.collect_triggers(changes);
        drop(state);

        fire(pending);
        Ok(response)
    }
}

impl Coordinator for MemorySession {
    fn create(&self, path: &str, data: Bytes, mode: CreateMode) -> ServiceResult<String> {
        match self.apply_one(Request::Create { path: path.to_string(), data, mode })? {
            Response::Create { path } => Ok(path),
            other => Err(ServiceError::BadArguments(format!(
                "unexpected response to create: {:?}",
                other
            ))),
        }
    }

    fn set_data(&self, path: &str, data: Bytes, version: NativeVersion) -> ServiceResult<Stat> {
        match self.apply_one(Request::SetData { path: path.to_string(), data, version })? {
            Response::SetData { stat } => Ok(stat),
            other => Err(ServiceError::BadArguments(format!(
                "unexpected response to set: {:?}",
                other
            ))),
        }
    }

    fn delete(&self, path: &str, version: NativeVersion) -> ServiceResult<()> {
        self.apply_one(Request::Delete { path: path.to_string(), version })
            .map(|_| ())
    }

    fn exists(&self, path: &str, watch: bool)
        -> ServiceResult<(Option<Stat>, Option<WatchHandle>)> {
        let mut state = self.lock()?;
        let stat = match state.node(path) {
            Ok(node) => Some(node.stat()),
            Err(ServiceError::NoNode) => None,
            Err(e) => return Err(e),
        };
        let handle = watch.then(|| state.watch(path, WatchKind::Exists, self.id));
        Ok((stat, handle))
    }

    fn get_data(&self, path: &str, watch: bool)
        -> ServiceResult<(Bytes, Stat, Option<WatchHandle>)> {
        let mut state = self.lock()?;
        let node = state.node(path)?;
        let (data, stat) = (node.data.clone(), node.stat());
        let handle = watch.then(|| state.watch(path, WatchKind::Data, self.id));
        Ok((data, stat, handle))
    }

    fn children(&self, path: &str, watch: bool)
        -> ServiceResult<(Vec<String>, Option<WatchHandle>)> {
        let mut state = self.lock()?;
        let names = state.node(path)?.children.iter().cloned().collect();
        let handle = watch.then(|| state.watch(path, WatchKind::Children, self.id));
        Ok((names, handle))
    }

    fn multi(&self, requests: Vec<Request>) -> Result<Vec<Response>, MultiError> {
        let mut state = self.lock().map_err(MultiError::Service)?;
        tracing::trace!("Session {} submitting batch of {} requests", self.id, requests.len());

        let mut undo = Vec::new();
        let mut changes = Vec::new();
        let mut responses = Vec::with_capacity(requests.len());

        for (index, request) in requests.iter().enumerate() {
            match state.apply(request, self.id, &mut undo, &mut changes) {
                Ok(response) => responses.push(response),
                Err(error) => {
                    state.rollback(undo);
                    tracing::trace!("Batch rejected at item {}: {}", index, error);
                    return Err(MultiError::Item { index, error });
                }
            }
        }

        let pending = state.collect_triggers(changes);
        drop(state);

        fire(pending);
        Ok(responses)
    }

    fn close(&self) {
        let mut state = self.tree.state().lock();
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut pending = state.drop_watches_of(self.id);

        let mut undo = Vec::new();
        let mut changes = Vec::new();
        for path in state.ephemerals_of(self.id) {
            let request = Request::Delete { path, version: ANY_VERSION };
            if let Err(e) = state.apply(&request, self.id, &mut undo, &mut changes) {
                tracing::debug!(
                    "Session {} could not remove ephemeral node {}: {}",
                    self.id,
                    request.path(),
                    e
                );
            }
        }
        let removed = changes.len();
        pending.extend(state.collect_triggers(changes));
        drop(state);

        if removed > 0 {
            tracing::debug!("Session {} closed, removed {} ephemeral nodes", self.id, removed);
        }
        fire(pending);
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.close();
    }
}
