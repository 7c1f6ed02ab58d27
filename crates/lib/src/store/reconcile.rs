//! Settling writes whose outcome is ambiguous.
//!
//! A create or delete can fail on the wire after the server applied it, or be
//! retried by the transport and then report a conflict caused by its own first
//! attempt. Before surfacing such a failure the store re-reads the node and, if
//! the tree already looks the way the write intended, reports success instead.
//!
//! For creates the comparison is on payload bytes only. A node created
//! concurrently by someone else with identical bytes is indistinguishable from
//! our own.

use tracing::{debug, warn};

use super::{NodeStore, Operation};
use crate::{Error, Result};

/// Resolves a failed create of `path` with payload `expected`.
pub(super) async fn after_failed_create(
    store: &NodeStore,
    path: &str,
    expected: &[u8],
    failure: Error,
) -> Result<()> {
    if failure.is_interrupted() {
        return Err(failure);
    }
    match store.read_optional(Operation::Create, path).await {
        Ok(Some(node)) if node.data == expected => {
            warn!(
                path = %path,
                error = %failure,
                "Create failed but the node holds the requested data, treating it as applied"
            );
            Ok(())
        }
        Ok(_) => Err(failure),
        Err(recheck) if recheck.is_interrupted() => Err(recheck),
        Err(recheck) => {
            debug!(path = %path, error = %recheck, "Could not re-check node after failed create");
            Err(failure)
        }
    }
}

/// Resolves a failed delete of `path`: if the node is gone the delete counts.
pub(super) async fn after_failed_delete(
    store: &NodeStore,
    path: &str,
    failure: Error,
) -> Result<()> {
    if failure.is_interrupted() {
        return Err(failure);
    }
    match store.stat_optional(Operation::Delete, path).await {
        Ok(None) => {
            if failure.is_not_found() {
                debug!(path = %path, "Node already absent, nothing to delete");
            } else {
                warn!(
                    path = %path,
                    error = %failure,
                    "Delete reported a failure but the node is gone, treating it as applied"
                );
            }
            Ok(())
        }
        Ok(Some(_)) => Err(failure),
        Err(recheck) if recheck.is_interrupted() => Err(recheck),
        Err(recheck) => {
            debug!(path = %path, error = %recheck, "Could not re-check node after failed delete");
            Err(failure)
        }
    }
}
