//! One-shot watches
//!
//! A watch resolves exactly once. The service keeps the `WatchTrigger` and
//! fires it on the first matching change; the caller holds the
//! `WatchHandle` and blocks on it. Nothing is re-armed.

use crossbeam::channel::{self, Receiver, Sender};

/// What a watch observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEvent {
    /// The node was created
    NodeCreated,

    /// The node was deleted
    NodeDeleted,

    /// The node's data changed
    DataChanged,

    /// A child was added or removed
    ChildrenChanged,

    /// The session owning the watch ended before any change
    SessionClosed,
}

/// Which part of a node a watch observes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchKind {
    Exists,
    Data,
    Children,
}

/// Caller side of a one-shot watch
#[derive(Debug)]
pub struct WatchHandle {
    rx: Receiver<WatchEvent>,
}

/// Service side of a one-shot watch
#[derive(Debug)]
pub struct WatchTrigger {
    tx: Sender<WatchEvent>,
    session: u64,
}

impl WatchHandle {
    /// Create a connected trigger/handle pair owned by `session`
    pub fn channel(session: u64) -> (WatchTrigger, WatchHandle) {
        let (tx, rx) = channel::bounded(1);
        (WatchTrigger { tx, session }, WatchHandle { rx })
    }

    /// Block until the watch fires.
    ///
    /// If the service drops the trigger without firing it (it shut down),
    /// this returns `WatchEvent::SessionClosed`.
    pub fn wait(self) -> WatchEvent {
        self.rx.recv().unwrap_or(WatchEvent::SessionClosed)
    }

    /// Non-blocking check, `None` while the watch is pending
    pub fn try_wait(&self) -> Option<WatchEvent> {
        self.rx.try_recv().ok()
    }
}

impl WatchTrigger {
    /// Session that armed the watch
    pub fn session(&self) -> u64 {
        self.session
    }

    /// Resolve the watch. A caller that already dropped its handle is ignored.
    pub fn fire(self, event: WatchEvent) {
        let _ = self.tx.try_send(event);
    }
}
