//! Transaction Engine
//!
//! A transaction is a list of version checks followed by a list of
//! operations, applied all-or-nothing. Each user-level step expands into one
//! or more batch requests:
//!
//! ```text
//!   checks[0]  ─► CheckVersion                      (defining)
//!   Create     ─► Create                            (defining)
//!   Set        ─► SetData(any)                      (defining)
//!   Erase      ─► Delete(leaf) .. Delete(leaf)      (auxiliary)
//!                 Delete(target)                    (defining)
//! ```
//!
//! A failing defining request is the step's own precondition failing and is
//! reported with the step's index. A failing auxiliary request only means an
//! erased subtree changed shape; the whole batch is rebuilt. Nodes an earlier
//! step already deletes are never listed again as auxiliary requests, so a
//! rebuilt batch cannot fail on its own overlap.

use std::collections::HashSet;

use bytes::Bytes;

use crate::erase;
use crate::error::{KvError, Result};
use crate::key::PathMapper;
use crate::service::{
    Coordinator, CreateMode, MultiError, Request, Response, ServiceError,
};
use crate::version::{to_native, to_user, Version, ANY_VERSION};

/// Requires `key` to be at `version` (`0` only requires it to exist)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxnCheck {
    pub key: String,
    pub version: Version,
}

/// A mutating transaction step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxnOp {
    /// Create a key that must not exist; its parent must
    Create { key: String, value: Bytes, lease: bool },

    /// Overwrite a key that must exist
    Set { key: String, value: Bytes },

    /// Remove a key and everything below it
    Erase { key: String },
}

impl TxnOp {
    pub fn key(&self) -> &str {
        match self {
            TxnOp::Create { key, .. } | TxnOp::Set { key, .. } | TxnOp::Erase { key } => key,
        }
    }
}

/// Checks then operations, committed as one unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    pub checks: Vec<TxnCheck>,
    pub ops: Vec<TxnOp>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(mut self, key: impl Into<String>, version: Version) -> Self {
        self.checks.push(TxnCheck { key: key.into(), version });
        self
    }

    pub fn create(mut self, key: impl Into<String>, value: impl Into<Bytes>, lease: bool) -> Self {
        self.ops.push(TxnOp::Create { key: key.into(), value: value.into(), lease });
        self
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.ops.push(TxnOp::Set { key: key.into(), value: value.into() });
        self
    }

    pub fn erase(mut self, key: impl Into<String>) -> Self {
        self.ops.push(TxnOp::Erase { key: key.into() });
        self
    }

    /// Number of user-level steps, checks included
    pub fn len(&self) -> usize {
        self.checks.len() + self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty() && self.ops.is_empty()
    }

    /// Map every key to its node path, rejecting malformed keys up front
    pub(crate) fn resolve(&self, paths: &PathMapper) -> Result<Vec<Step>> {
        let checks = self.checks.iter().map(|check| -> Result<Step> {
            Ok(Step::Check {
                path: paths.node_path(&check.key)?,
                version: check.version,
            })
        });
        let ops = self.ops.iter().map(|op| -> Result<Step> {
            let path = paths.node_path(op.key())?;
            Ok(match op {
                TxnOp::Create { value, lease, .. } => Step::Create {
                    path,
                    value: value.clone(),
                    lease: *lease,
                },
                TxnOp::Set { value, .. } => Step::Set { path, value: value.clone() },
                TxnOp::Erase { .. } => Step::Erase { path },
            })
        });
        checks.chain(ops).collect()
    }
}

/// Result of a committed Create or Set, in operation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnOpResult {
    Create(Version),
    Set(Version),
}

impl TxnOpResult {
    pub fn version(&self) -> Version {
        match *self {
            TxnOpResult::Create(v) | TxnOpResult::Set(v) => v,
        }
    }
}

/// A user-level step with its key already mapped to a node path
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Check { path: String, version: Version },
    Create { path: String, value: Bytes, lease: bool },
    Set { path: String, value: Bytes },
    Erase { path: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResultKind {
    Create,
    Set,
    Nothing,
}

/// Bookkeeping for one batch request
#[derive(Debug, Clone, Copy)]
struct ItemTag {
    /// Index of the owning step, checks counted first
    owner: usize,
    defining: bool,
    kind: ResultKind,
}

/// How a submitted plan ended
#[derive(Debug)]
pub(crate) enum Reconciled {
    Committed(Vec<TxnOpResult>),
    Conflict(usize),
    Retry,
}

/// One attempt's batch
#[derive(Debug, Default)]
pub(crate) struct TxnPlan {
    requests: Vec<Request>,
    tags: Vec<ItemTag>,
}

impl TxnPlan {
    /// Expand every step against the current tree
    pub(crate) fn build<S: Coordinator>(service: &S, steps: &[Step]) -> Result<Self> {
        let mut plan = TxnPlan::default();
        let mut deleted = HashSet::new();

        for (owner, step) in steps.iter().enumerate() {
            match step {
                Step::Check { path, version } => plan.push(
                    Request::CheckVersion { path: path.clone(), version: to_native(*version) },
                    owner,
                    true,
                    ResultKind::Nothing,
                ),
                Step::Create { path, value, lease } => plan.push(
                    Request::Create {
                        path: path.clone(),
                        data: value.clone(),
                        mode: CreateMode::leased(*lease),
                    },
                    owner,
                    true,
                    ResultKind::Create,
                ),
                Step::Set { path, value } => plan.push(
                    Request::SetData { path: path.clone(), data: value.clone(), version: ANY_VERSION },
                    owner,
                    true,
                    ResultKind::Set,
                ),
                Step::Erase { path } => {
                    let target = Request::Delete { path: path.clone(), version: ANY_VERSION };
                    let mut deletes = Vec::new();

                    // an earlier step already removes this node: the target
                    // delete alone decides the outcome
                    if deleted.contains(path) {
                        deletes.push(target);
                    } else {
                        match erase::expand_subtree(service, path, &deleted, &mut deletes) {
                            Ok(()) => {}
                            // let the batch fail on the target's own delete
                            Err(ServiceError::NoNode) => deletes.push(target),
                            Err(e) => return Err(e.into()),
                        }
                    }

                    let last = deletes.len() - 1;
                    for (i, request) in deletes.into_iter().enumerate() {
                        deleted.insert(request.path().to_string());
                        plan.push(request, owner, i == last, ResultKind::Nothing);
                    }
                }
            }
        }

        Ok(plan)
    }

    fn push(&mut self, request: Request, owner: usize, defining: bool, kind: ResultKind) {
        self.requests.push(request);
        self.tags.push(ItemTag { owner, defining, kind });
    }

    pub(crate) fn len(&self) -> usize {
        self.requests.len()
    }

    /// Submit the batch and map the per-request outcome back onto steps
    pub(crate) fn submit<S: Coordinator>(self, service: &S) -> Result<Reconciled> {
        let TxnPlan { requests, tags } = self;

        match service.multi(requests) {
            Ok(responses) => {
                let mut results = Vec::new();
                for (tag, response) in tags.iter().zip(responses) {
                    match (tag.kind, response) {
                        (ResultKind::Create, _) => results.push(TxnOpResult::Create(1)),
                        (ResultKind::Set, Response::SetData { stat }) => {
                            results.push(TxnOpResult::Set(to_user(stat.version)))
                        }
                        (ResultKind::Set, other) => {
                            return Err(KvError::Service(ServiceError::BadArguments(format!(
                                "unexpected response to set: {:?}",
                                other
                            ))))
                        }
                        (ResultKind::Nothing, _) => {}
                    }
                }
                Ok(Reconciled::Committed(results))
            }

            Err(MultiError::Item { index, error }) => match tags.get(index) {
                Some(tag) if tag.defining => {
                    tracing::debug!("Transaction step {} failed: {}", tag.owner, error);
                    Ok(Reconciled::Conflict(tag.owner))
                }
                Some(tag) => {
                    tracing::debug!(
                        "Auxiliary request {} of step {} failed: {}",
                        index,
                        tag.owner,
                        error
                    );
                    Ok(Reconciled::Retry)
                }
                None => Err(KvError::Service(error)),
            },

            Err(MultiError::Service(error)) => Err(error.into()),
        }
    }
}
