//! Error types for treekv
//!
//! `KvError` is what callers of the flat store see. Errors reported by the
//! coordination service (`ServiceError`) are translated into it; codes with
//! no flat-store meaning pass through untouched as `KvError::Service`.

use thiserror::Error;

use crate::service::ServiceError;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for treekv operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // Input Errors
    // -------------------------------------------------------------------------
    #[error("malformed key: {0}")]
    MalformedKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("entry exists")]
    EntryExists,

    #[error("no entry")]
    NoEntry,

    #[error("leased keys cannot have children")]
    EphemeralNotAllowed,

    #[error("transaction failed (failed operation index: {index})")]
    TxnFailed { index: usize },

    #[error("gave up after {attempts} attempts on a contended subtree")]
    RetriesExhausted { attempts: u32 },

    // -------------------------------------------------------------------------
    // Backend Errors
    // -------------------------------------------------------------------------
    #[error("coordination service error: {0}")]
    Service(ServiceError),

    // -------------------------------------------------------------------------
    // Snapshot Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<ServiceError> for KvError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NodeExists => KvError::EntryExists,
            ServiceError::NoNode => KvError::NoEntry,
            ServiceError::NoChildrenForEphemerals => KvError::EphemeralNotAllowed,
            other => KvError::Service(other),
        }
    }
}
