//! Coordination Service Contract
//!
//! The operations treekv needs from a hierarchical coordination service.
//! Paths are absolute (`/a/b`), versions are native (0-based, `-1` = any).
//!
//! ## Batch semantics
//! `multi` applies every request or none. On failure it names the first
//! request that failed; everything before it succeeded in isolation and
//! everything after it was never evaluated.

use bytes::Bytes;
use thiserror::Error;

use crate::version::NativeVersion;
use crate::watch::WatchHandle;

/// Result type alias for raw service calls
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Error codes reported by the coordination service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("node already exists")]
    NodeExists,

    #[error("node does not exist")]
    NoNode,

    #[error("version mismatch")]
    BadVersion,

    #[error("node has children")]
    NotEmpty,

    #[error("ephemeral nodes may not have children")]
    NoChildrenForEphemerals,

    #[error("bad arguments: {0}")]
    BadArguments(String),

    #[error("session closed")]
    SessionClosed,
}

/// Node metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// Number of data modifications since creation
    pub version: NativeVersion,

    /// Owning session for ephemeral nodes
    pub ephemeral_owner: Option<u64>,

    /// Number of direct children
    pub num_children: usize,
}

/// How a node is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Lives until deleted
    Persistent,

    /// Deleted when the creating session ends
    Ephemeral,
}

impl CreateMode {
    pub fn leased(lease: bool) -> Self {
        if lease {
            CreateMode::Ephemeral
        } else {
            CreateMode::Persistent
        }
    }
}

/// One item of an atomic batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Assert the node's version, no side effect
    CheckVersion { path: String, version: NativeVersion },

    Create { path: String, data: Bytes, mode: CreateMode },

    SetData { path: String, data: Bytes, version: NativeVersion },

    Delete { path: String, version: NativeVersion },
}

impl Request {
    pub fn path(&self) -> &str {
        match self {
            Request::CheckVersion { path, .. }
            | Request::Create { path, .. }
            | Request::SetData { path, .. }
            | Request::Delete { path, .. } => path,
        }
    }
}

/// Per-item result of a successful batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    CheckVersion,
    Create { path: String },
    SetData { stat: Stat },
    Delete,
}

/// Why a batch was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MultiError {
    /// Request `index` failed, nothing was applied
    #[error("batch item {index} failed: {error}")]
    Item { index: usize, error: ServiceError },

    /// The batch failed as a whole (transport, session)
    #[error("batch failed: {0}")]
    Service(ServiceError),
}

/// A session with a hierarchical coordination service
pub trait Coordinator {
    /// Create a node; the parent must exist. Returns the created path.
    fn create(&self, path: &str, data: Bytes, mode: CreateMode) -> ServiceResult<String>;

    /// Overwrite data if the version matches (`ANY_VERSION` always matches)
    fn set_data(&self, path: &str, data: Bytes, version: NativeVersion) -> ServiceResult<Stat>;

    /// Delete a childless node if the version matches
    fn delete(&self, path: &str, version: NativeVersion) -> ServiceResult<()>;

    /// Stat of the node if present; the watch may be armed on absent nodes
    fn exists(&self, path: &str, watch: bool)
        -> ServiceResult<(Option<Stat>, Option<WatchHandle>)>;

    fn get_data(&self, path: &str, watch: bool)
        -> ServiceResult<(Bytes, Stat, Option<WatchHandle>)>;

    /// Names (not paths) of the direct children
    fn children(&self, path: &str, watch: bool)
        -> ServiceResult<(Vec<String>, Option<WatchHandle>)>;

    /// Apply all requests atomically
    fn multi(&self, requests: Vec<Request>) -> std::result::Result<Vec<Response>, MultiError>;

    /// End the session. Further calls fail with `SessionClosed`.
    /// Closing twice is a no-op.
    fn close(&self);
}

/// Opens sessions given an address
pub trait Connector {
    type Session: Coordinator;

    fn connect(&self, address: &str, session_timeout: std::time::Duration)
        -> std::result::Result<Self::Session, crate::error::KvError>;
}
