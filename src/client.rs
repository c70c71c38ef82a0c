//! Client Module
//!
//! The flat key-value surface. Every call maps keys to node paths, talks to
//! the coordination service in one or a few round trips, and translates
//! versions and errors on the way back. Nothing is cached between calls.

use bytes::Bytes;

use crate::config::{Config, RetryPolicy};
use crate::erase::{self, EraseOutcome};
use crate::error::{KvError, Result};
use crate::key::PathMapper;
use crate::retry::RetryLoop;
use crate::service::{Connector, Coordinator, CreateMode, ServiceError};
use crate::txn::{Reconciled, Transaction, TxnOpResult, TxnPlan};
use crate::version::{to_native, to_user, Version, ANY_VERSION, SET_RACE_VERSION};
use crate::watch::WatchHandle;

/// A flat, versioned key-value store over one coordination service session
///
/// ## Versions
/// - `0` means the key does not exist
/// - A key at version `V` has been written `V - 1` times since creation
pub struct Client<S: Coordinator> {
    service: S,
    paths: PathMapper,
    retry: RetryPolicy,
}

impl<S: Coordinator> Client<S> {
    /// Open a session through `connector` and prepare the namespace
    ///
    /// ```
    /// use treekv::{Client, Config, MemoryTree};
    ///
    /// let tree = MemoryTree::new();
    /// let config = Config::builder().address("mem://local").prefix("/app").build();
    /// let client = Client::connect(&tree, config).unwrap();
    ///
    /// assert_eq!(client.create("/key", "value", false).unwrap(), 1);
    /// ```
    pub fn connect<C>(connector: &C, config: Config) -> Result<Self>
    where
        C: Connector<Session = S>,
    {
        config.validate()?;
        let service = connector.connect(&config.address, config.session_timeout())?;
        Self::with_service(service, &config)
    }

    /// Wrap an already open session and prepare the namespace
    pub fn with_service(service: S, config: &Config) -> Result<Self> {
        config.validate()?;
        let paths = PathMapper::from_prefix(&config.prefix)?;

        if let Err(e) = paths.ensure_namespace(&service) {
            tracing::error!("Failed to create namespace {}: {}", paths.root(), e);
            service.close();
            return Err(e);
        }

        Ok(Self {
            service,
            paths,
            retry: config.retry,
        })
    }

    // =========================================================================
    // Single-Key Operations
    // =========================================================================

    /// Create a key; its parent must exist. Returns the initial version, 1.
    ///
    /// With `lease`, the key is removed when this client's session ends.
    pub fn create(&self, key: &str, value: impl Into<Bytes>, lease: bool) -> Result<Version> {
        let path = self.paths.node_path(key)?;
        self.service
            .create(&path, value.into(), CreateMode::leased(lease))?;
        Ok(1)
    }

    /// Write a value whether or not the key exists.
    ///
    /// Returns `SET_RACE_VERSION` if the key was deleted concurrently between
    /// the create attempt and the overwrite.
    pub fn set(&self, key: &str, value: impl Into<Bytes>) -> Result<Version> {
        let path = self.paths.node_path(key)?;
        let value = value.into();

        match self.service.create(&path, value.clone(), CreateMode::Persistent) {
            Ok(_) => return Ok(1),
            Err(ServiceError::NodeExists) => {}
            Err(e) => return Err(e.into()),
        }

        match self.service.set_data(&path, value, ANY_VERSION) {
            Ok(stat) => Ok(to_user(stat.version)),
            Err(ServiceError::NoNode) => {
                tracing::debug!("Set on {} raced with a delete", key);
                Ok(SET_RACE_VERSION)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Compare-and-set. Version `0` creates the key.
    ///
    /// Returns the new version, or `0` if the key was not at `version`.
    /// A key missing when `version > 0` is an error (`NoEntry`).
    pub fn cas(&self, key: &str, value: impl Into<Bytes>, version: Version) -> Result<Version> {
        if version == 0 {
            return match self.create(key, value, false) {
                Err(KvError::EntryExists) => Ok(0),
                other => other,
            };
        }

        let path = self.paths.node_path(key)?;
        match self.service.set_data(&path, value.into(), to_native(version)) {
            Ok(stat) => Ok(to_user(stat.version)),
            Err(ServiceError::BadVersion) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Current version, `0` if absent. The watch fires on creation,
    /// deletion or data change.
    pub fn exists(&self, key: &str, watch: bool) -> Result<(Version, Option<WatchHandle>)> {
        let path = self.paths.node_path(key)?;
        let (stat, handle) = self.service.exists(&path, watch)?;
        Ok((stat.map_or(0, |s| to_user(s.version)), handle))
    }

    /// Current version and value. The watch fires on deletion or data change.
    pub fn get(&self, key: &str, watch: bool) -> Result<(Version, Bytes, Option<WatchHandle>)> {
        let path = self.paths.node_path(key)?;
        let (data, stat, handle) = self.service.get_data(&path, watch)?;
        Ok((to_user(stat.version), data, handle))
    }

    /// Direct children as full keys. The watch fires when a child is added
    /// or removed, or the key itself is deleted.
    pub fn children(&self, key: &str, watch: bool) -> Result<(Vec<String>, Option<WatchHandle>)> {
        let path = self.paths.node_path(key)?;
        let (names, handle) = self.service.children(&path, watch)?;
        let keys = names
            .into_iter()
            .map(|name| format!("{}/{}", key, name))
            .collect();
        Ok((keys, handle))
    }

    // =========================================================================
    // Recursive Erase
    // =========================================================================

    /// Remove a key and all its descendants atomically.
    ///
    /// Version `0` erases unconditionally. If the key is not at `version`,
    /// nothing is removed and the call still succeeds. A missing key is
    /// `NoEntry`.
    pub fn erase(&self, key: &str, version: Version) -> Result<()> {
        let path = self.paths.node_path(key)?;
        let mut retry = RetryLoop::new(self.retry, "erase");

        loop {
            let requests = erase::plan(&self.service, &path, version)?;
            retry.submit();

            match erase::reconcile(self.service.multi(requests))? {
                EraseOutcome::Done => return Ok(()),
                EraseOutcome::Retry => retry.race(key)?,
            }
        }
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Apply a transaction all-or-nothing.
    ///
    /// Returns one result per `Create`/`Set` op, in op order. A failed check
    /// or op is reported as `TxnFailed { index }`, where checks are numbered
    /// first and ops continue after them.
    pub fn commit(&self, txn: &Transaction) -> Result<Vec<TxnOpResult>> {
        let steps = txn.resolve(&self.paths)?;
        let mut retry = RetryLoop::new(self.retry, "commit");

        loop {
            let plan = TxnPlan::build(&self.service, &steps)?;
            tracing::trace!("Commit attempt with {} batch requests", plan.len());
            retry.submit();

            match plan.submit(&self.service)? {
                Reconciled::Committed(results) => return Ok(results),
                Reconciled::Conflict(index) => return Err(KvError::TxnFailed { index }),
                Reconciled::Retry => retry.race("transaction")?,
            }
        }
    }

    // =========================================================================
    // Lifecycle & Accessors
    // =========================================================================

    /// End the session. Leased keys disappear.
    pub fn close(self) {
        self.service.close();
    }

    /// The underlying session
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Node path of the namespace root
    pub fn namespace_root(&self) -> String {
        self.paths.root()
    }
}
