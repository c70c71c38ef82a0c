//! # treekv
//!
//! A flat, versioned key-value store on top of a hierarchical coordination
//! service (ZooKeeper-style):
//! - 1-based key versions with compare-and-set
//! - Leased (ephemeral) keys tied to the client session
//! - One-shot watches on existence, data and children
//! - Recursive erase and multi-key transactions, both atomic
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Client                               │
//! │     create / set / cas / get / exists / children             │
//! └──────┬──────────────────────┬────────────────────┬──────────┘
//!        │                      │                    │
//!        ▼                      ▼                    ▼
//!  ┌───────────┐        ┌──────────────┐     ┌──────────────┐
//!  │ Path/Ver  │        │ Erase Engine │◄────│  Txn Engine  │
//!  │ Translate │        └──────┬───────┘     └──────┬───────┘
//!  └─────┬─────┘               │                    │
//!        └─────────────────────┼────────────────────┘
//!                              ▼
//!                 ┌─────────────────────────┐
//!                 │  Coordinator (trait)    │
//!                 │  e.g. MemoryTree        │
//!                 └─────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod key;
pub mod version;
pub mod watch;
pub mod service;
pub mod tree;
pub mod txn;
pub mod client;

mod erase;
mod retry;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use client::Client;
pub use config::{Config, RetryPolicy};
pub use error::{KvError, Result};
pub use service::{Connector, Coordinator};
pub use tree::{MemorySession, MemoryTree};
pub use txn::{Transaction, TxnCheck, TxnOp, TxnOpResult};
pub use version::{Version, SET_RACE_VERSION};
pub use watch::{WatchEvent, WatchHandle};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of treekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
