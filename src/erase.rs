//! Recursive Erase Engine
//!
//! The service refuses to delete a node that still has children, so erasing a
//! key means listing its subtree and deleting it leaves-first in one batch.
//! The listing goes stale the moment it is taken; a batch that fails because
//! of it is rebuilt from a fresh listing.

use std::collections::HashSet;

use crate::error::{KvError, Result};
use crate::service::{Coordinator, MultiError, Request, Response, ServiceError, ServiceResult};
use crate::version::{to_native, Version, ANY_VERSION};

/// What to do after an erase batch came back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EraseOutcome {
    /// Subtree removed, or the version check did not hold
    Done,

    /// The subtree changed shape under us
    Retry,
}

/// Append deletes for the subtree at `path`, descendants before the node.
///
/// Fails with `NoNode` if `path` itself is gone. Descendants that vanish
/// while being listed are skipped, as are descendants in `skip` (already
/// deleted earlier in the same batch) together with their subtrees.
pub(crate) fn expand_subtree<S: Coordinator>(
    service: &S,
    path: &str,
    skip: &HashSet<String>,
    out: &mut Vec<Request>,
) -> ServiceResult<()> {
    let (children, _) = service.children(path, false)?;

    for child in children {
        let child = format!("{}/{}", path, child);
        if skip.contains(&child) {
            continue;
        }
        match expand_subtree(service, &child, skip, out) {
            Ok(()) | Err(ServiceError::NoNode) => {}
            Err(e) => return Err(e),
        }
    }

    out.push(Request::Delete {
        path: path.to_string(),
        version: ANY_VERSION,
    });
    Ok(())
}

/// Version check on the target followed by the subtree deletes
pub(crate) fn plan<S: Coordinator>(service: &S, path: &str, version: Version) -> Result<Vec<Request>> {
    let mut requests = vec![Request::CheckVersion {
        path: path.to_string(),
        version: to_native(version),
    }];
    expand_subtree(service, path, &HashSet::new(), &mut requests)?;
    Ok(requests)
}

/// Classify the batch result. Item 0 is always the target's version check.
pub(crate) fn reconcile(
    outcome: std::result::Result<Vec<Response>, MultiError>,
) -> Result<EraseOutcome> {
    match outcome {
        Ok(_) => Ok(EraseOutcome::Done),
        Err(MultiError::Item { error: ServiceError::BadVersion, .. }) => Ok(EraseOutcome::Done),
        Err(MultiError::Item { error: ServiceError::NotEmpty, .. }) => Ok(EraseOutcome::Retry),
        Err(MultiError::Item { index: 0, error: ServiceError::NoNode }) => Err(KvError::NoEntry),
        Err(MultiError::Item { error: ServiceError::NoNode, .. }) => Ok(EraseOutcome::Retry),
        Err(MultiError::Item { error, .. }) | Err(MultiError::Service(error)) => Err(error.into()),
    }
}
