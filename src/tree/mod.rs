//! Reference Coordination Service
//!
//! An in-process tree with ZooKeeper semantics: versioned nodes, ephemeral
//! nodes bound to sessions, one-shot watches and an all-or-nothing batch.
//!
//! ## Concurrency Model
//! - One `parking_lot::Mutex` guards the whole node table, so every request
//!   (batches included) is applied atomically with respect to every other
//! - Watch notifications are collected under the lock and delivered after it
//!   is released
//!
//! ```text
//!   MemorySession ─┐
//!   MemorySession ─┼──► MemoryTree (Arc) ──► Mutex<TreeState>
//!   MemorySession ─┘
//! ```

mod session;
pub mod snapshot;
mod state;

pub use session::MemorySession;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{KvError, Result};
use crate::service::Connector;
use state::TreeState;

/// Address scheme accepted by `MemoryTree` as a `Connector`
pub const MEMORY_SCHEME: &str = "mem://";

/// Handle on a shared in-memory tree. Cloning shares the same tree.
#[derive(Clone, Default)]
pub struct MemoryTree {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<TreeState>,
    next_session: AtomicU64,
}

impl MemoryTree {
    /// Create an empty tree holding only the root node
    pub fn new() -> Self {
        Self::default()
    }

    fn from_state(state: TreeState) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                next_session: AtomicU64::new(0),
            }),
        }
    }

    /// Open a new session
    pub fn session(&self) -> MemorySession {
        let id = self.shared.next_session.fetch_add(1, Ordering::Relaxed) + 1;
        MemorySession::new(self.clone(), id)
    }

    /// Number of nodes, root included
    pub fn node_count(&self) -> usize {
        self.shared.state.lock().len()
    }

    pub(crate) fn state(&self) -> &Mutex<TreeState> {
        &self.shared.state
    }
}

impl Connector for MemoryTree {
    type Session = MemorySession;

    /// Accepts `mem://<name>`; the name is informational only
    fn connect(&self, address: &str, session_timeout: Duration) -> Result<MemorySession> {
        match address.strip_prefix(MEMORY_SCHEME) {
            Some(name) if !name.is_empty() => {
                let session = self.session();
                tracing::info!(
                    "Opened session {} on {} (timeout {:?})",
                    session.id(),
                    address,
                    session_timeout
                );
                Ok(session)
            }
            _ => Err(KvError::InvalidAddress(address.to_string())),
        }
    }
}
