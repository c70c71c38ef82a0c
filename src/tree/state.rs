//! Node table of the reference service
//!
//! All mutation goes through `TreeState::apply`, which records an undo entry
//! for every change so a failed batch can be rolled back in reverse order.

use std::collections::{BTreeSet, HashMap};

use bytes::Bytes;

use crate::service::{CreateMode, Request, Response, ServiceError, ServiceResult, Stat};
use crate::version::{NativeVersion, ANY_VERSION};
use crate::watch::{WatchEvent, WatchHandle, WatchKind, WatchTrigger};

pub(crate) const ROOT: &str = "/";

/// A single node
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) data: Bytes,
    pub(crate) version: NativeVersion,
    pub(crate) ephemeral_owner: Option<u64>,
    pub(crate) children: BTreeSet<String>,
}

impl Node {
    pub(crate) fn new(data: Bytes, ephemeral_owner: Option<u64>) -> Self {
        Self {
            data,
            version: 0,
            ephemeral_owner,
            children: BTreeSet::new(),
        }
    }

    pub(crate) fn stat(&self) -> Stat {
        Stat {
            version: self.version,
            ephemeral_owner: self.ephemeral_owner,
            num_children: self.children.len(),
        }
    }
}

/// How to revert one applied change
#[derive(Debug)]
pub(crate) enum Undo {
    Remove(String),
    Restore(String, Node),
    RestoreData(String, Bytes, NativeVersion),
}

/// A change that may fire watches once it is committed
#[derive(Debug)]
pub(crate) enum Change {
    Created(String),
    DataChanged(String),
    Deleted(String),
}

/// Watch notifications to deliver after the state lock is released
pub(crate) type Pending = Vec<(WatchTrigger, WatchEvent)>;

#[derive(Debug)]
pub(crate) struct TreeState {
    nodes: HashMap<String, Node>,
    watches: HashMap<(String, WatchKind), Vec<WatchTrigger>>,
}

impl Default for TreeState {
    fn default() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT.to_string(), Node::new(Bytes::new(), None));
        Self {
            nodes,
            watches: HashMap::new(),
        }
    }
}

/// Split `/a/b` into (`/a`, `b`) and `/a` into (`/`, `a`)
pub(crate) fn split_parent(path: &str) -> Option<(&str, &str)> {
    if path == ROOT {
        return None;
    }
    let idx = path.rfind('/')?;
    let parent = if idx == 0 { ROOT } else { &path[..idx] };
    Some((parent, &path[idx + 1..]))
}

pub(crate) fn validate_path(path: &str) -> ServiceResult<()> {
    if path == ROOT {
        return Ok(());
    }
    if !path.starts_with('/') || path.ends_with('/') || path[1..].split('/').any(str::is_empty) {
        return Err(ServiceError::BadArguments(format!("invalid path {:?}", path)));
    }
    Ok(())
}

fn version_matches(expected: NativeVersion, actual: NativeVersion) -> bool {
    expected == ANY_VERSION || expected == actual
}

impl TreeState {
    // =========================================================================
    // Reads
    // =========================================================================

    pub(crate) fn node(&self, path: &str) -> ServiceResult<&Node> {
        validate_path(path)?;
        self.nodes.get(path).ok_or(ServiceError::NoNode)
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.nodes.iter()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Apply one request, logging how to undo it and what changed
    pub(crate) fn apply(
        &mut self,
        request: &Request,
        session: u64,
        undo: &mut Vec<Undo>,
        changes: &mut Vec<Change>,
    ) -> ServiceResult<Response> {
        validate_path(request.path())?;

        match request {
            Request::CheckVersion { path, version } => {
                let node = self.nodes.get(path).ok_or(ServiceError::NoNode)?;
                if !version_matches(*version, node.version) {
                    return Err(ServiceError::BadVersion);
                }
                Ok(Response::CheckVersion)
            }

            Request::Create { path, data, mode } => {
                let (parent_path, name) = split_parent(path).ok_or(ServiceError::NodeExists)?;
                let parent = self.nodes.get(parent_path).ok_or(ServiceError::NoNode)?;
                if parent.ephemeral_owner.is_some() {
                    return Err(ServiceError::NoChildrenForEphemerals);
                }
                if self.nodes.contains_key(path) {
                    return Err(ServiceError::NodeExists);
                }

                let owner = match mode {
                    CreateMode::Ephemeral => Some(session),
                    CreateMode::Persistent => None,
                };
                self.link(parent_path, name);
                self.nodes.insert(path.clone(), Node::new(data.clone(), owner));

                undo.push(Undo::Remove(path.clone()));
                changes.push(Change::Created(path.clone()));
                Ok(Response::Create { path: path.clone() })
            }

            Request::SetData { path, data, version } => {
                let node = self.nodes.get_mut(path).ok_or(ServiceError::NoNode)?;
                if !version_matches(*version, node.version) {
                    return Err(ServiceError::BadVersion);
                }

                let old_data = std::mem::replace(&mut node.data, data.clone());
                undo.push(Undo::RestoreData(path.clone(), old_data, node.version));
                node.version += 1;

                changes.push(Change::DataChanged(path.clone()));
                Ok(Response::SetData { stat: node.stat() })
            }

            Request::Delete { path, version } => {
                let (parent_path, name) = split_parent(path)
                    .ok_or_else(|| ServiceError::BadArguments("cannot delete root".to_string()))?;
                let node = self.nodes.get(path).ok_or(ServiceError::NoNode)?;
                if !version_matches(*version, node.version) {
                    return Err(ServiceError::BadVersion);
                }
                if !node.children.is_empty() {
                    return Err(ServiceError::NotEmpty);
                }

                let parent_path = parent_path.to_string();
                let name = name.to_string();
                if let Some(node) = self.nodes.remove(path) {
                    self.unlink(&parent_path, &name);
                    undo.push(Undo::Restore(path.clone(), node));
                }

                changes.push(Change::Deleted(path.clone()));
                Ok(Response::Delete)
            }
        }
    }

    /// Revert applied changes, newest first
    pub(crate) fn rollback(&mut self, undo: Vec<Undo>) {
        for entry in undo.into_iter().rev() {
            match entry {
                Undo::Remove(path) => {
                    self.nodes.remove(&path);
                    if let Some((parent, name)) = split_parent(&path) {
                        self.unlink(parent, name);
                    }
                }
                Undo::Restore(path, node) => {
                    if let Some((parent, name)) = split_parent(&path) {
                        self.link(parent, name);
                    }
                    self.nodes.insert(path, node);
                }
                Undo::RestoreData(path, data, version) => {
                    if let Some(node) = self.nodes.get_mut(&path) {
                        node.data = data;
                        node.version = version;
                    }
                }
            }
        }
    }

    /// Insert a node restored from a snapshot; the parent must already exist
    pub(crate) fn insert_restored(&mut self, path: String, node: Node) -> ServiceResult<()> {
        validate_path(&path)?;
        let (parent, name) = split_parent(&path)
            .ok_or_else(|| ServiceError::BadArguments("root cannot be restored".to_string()))?;
        if !self.nodes.contains_key(parent) {
            return Err(ServiceError::NoNode);
        }
        if self.nodes.contains_key(&path) {
            return Err(ServiceError::NodeExists);
        }
        self.link(parent, name);
        self.nodes.insert(path, node);
        Ok(())
    }

    fn link(&mut self, parent: &str, name: &str) {
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.insert(name.to_string());
        }
    }

    fn unlink(&mut self, parent: &str, name: &str) {
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.remove(name);
        }
    }

    /// Paths of every ephemeral node owned by `session`
    pub(crate) fn ephemerals_of(&self, session: u64) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.ephemeral_owner == Some(session))
            .map(|(path, _)| path.clone())
            .collect()
    }

    // =========================================================================
    // Watches
    // =========================================================================

    pub(crate) fn watch(&mut self, path: &str, kind: WatchKind, session: u64) -> WatchHandle {
        let (trigger, handle) = WatchHandle::channel(session);
        self.watches
            .entry((path.to_string(), kind))
            .or_default()
            .push(trigger);
        handle
    }

    /// Detach the watches the given changes fire
    pub(crate) fn collect_triggers(&mut self, changes: Vec<Change>) -> Pending {
        let mut pending = Vec::new();
        for change in changes {
            match change {
                Change::Created(path) => {
                    self.take(&path, WatchKind::Exists, WatchEvent::NodeCreated, &mut pending);
                    self.take(&path, WatchKind::Data, WatchEvent::NodeCreated, &mut pending);
                    self.take_parent(&path, &mut pending);
                }
                Change::DataChanged(path) => {
                    self.take(&path, WatchKind::Exists, WatchEvent::DataChanged, &mut pending);
                    self.take(&path, WatchKind::Data, WatchEvent::DataChanged, &mut pending);
                }
                Change::Deleted(path) => {
                    self.take(&path, WatchKind::Exists, WatchEvent::NodeDeleted, &mut pending);
                    self.take(&path, WatchKind::Data, WatchEvent::NodeDeleted, &mut pending);
                    self.take(&path, WatchKind::Children, WatchEvent::NodeDeleted, &mut pending);
                    self.take_parent(&path, &mut pending);
                }
            }
        }
        pending
    }

    /// Detach every watch armed by `session`
    pub(crate) fn drop_watches_of(&mut self, session: u64) -> Pending {
        let mut pending = Vec::new();
        for triggers in self.watches.values_mut() {
            let (mine, others): (Vec<_>, Vec<_>) =
                triggers.drain(..).partition(|t| t.session() == session);
            *triggers = others;
            pending.extend(mine.into_iter().map(|t| (t, WatchEvent::SessionClosed)));
        }
        self.watches.retain(|_, triggers| !triggers.is_empty());
        pending
    }

    fn take(&mut self, path: &str, kind: WatchKind, event: WatchEvent, pending: &mut Pending) {
        if let Some(triggers) = self.watches.remove(&(path.to_string(), kind)) {
            pending.extend(triggers.into_iter().map(|t| (t, event)));
        }
    }

    fn take_parent(&mut self, path: &str, pending: &mut Pending) {
        if let Some((parent, _)) = split_parent(path) {
            let parent = parent.to_string();
            self.take(&parent, WatchKind::Children, WatchEvent::ChildrenChanged, pending);
        }
    }
}

/// Deliver notifications collected under the lock
pub(crate) fn fire(pending: Pending) {
    for (trigger, event) in pending {
        trigger.fire(event);
    }
}
