//! Composite operations, each submitted as a single transaction.

use std::collections::VecDeque;

use tracing::debug;

use super::{NodeStore, Operation, PendingTransaction, StoreError};
use crate::fault::FaultCode;
use crate::path;
use crate::transport::CreateMode;
use crate::Result;

impl NodeStore {
    /// Moves the node at `source` to `dest` and returns its payload.
    ///
    /// The source is deleted conditionally on the version read, so a write to
    /// the source between the read and the commit fails the move with a
    /// version conflict and leaves both paths untouched. The destination is
    /// always created persistent. A source with children cannot be moved.
    pub async fn move_node(&self, source: &str, dest: &str) -> Result<Vec<u8>> {
        path::validate(source)?;
        path::validate(dest)?;

        let node = self.read_node(Operation::Move, source).await?;
        let mut txn = PendingTransaction::new(Operation::Move);
        txn.delete(source, Some(node.stat.version))
            .create(dest, node.data.clone(), CreateMode::Persistent);
        txn.commit(self).await?;

        debug!(source = %source, dest = %dest, "Node moved");
        Ok(node.data)
    }

    /// Atomically creates `new_path` holding `data` and deletes every path in
    /// `old_paths`.
    ///
    /// If any delete targets a missing node, or the create conflicts, nothing
    /// changes.
    pub async fn replace<S: AsRef<str>>(
        &self,
        old_paths: &[S],
        new_path: &str,
        data: &[u8],
        ephemeral: bool,
    ) -> Result<()> {
        path::validate(new_path)?;

        let mut txn = PendingTransaction::new(Operation::Replace);
        txn.create(new_path, data.to_vec(), CreateMode::from_ephemeral(ephemeral));
        for old in old_paths {
            let old = old.as_ref();
            path::validate(old)?;
            txn.delete(old, None);
        }
        txn.commit(self).await?;

        debug!(new_path = %new_path, replaced = old_paths.len(), "Nodes replaced");
        Ok(())
    }

    /// Copies the subtree rooted at `source` to `target` in one transaction and
    /// returns the number of nodes created.
    ///
    /// Payloads and relative structure are copied; every copy is persistent.
    /// The source is read node by node while it may be changing, so the copy
    /// can mix earlier and later states of the source. Nodes that disappear
    /// during the walk are left out.
    ///
    /// Preconditions, checked in this order:
    /// - `source` and `target` differ and neither contains the other,
    /// - `source` exists,
    /// - the parent of `target` exists,
    /// - `target` does not exist.
    pub async fn clone_subtree(&self, source: &str, target: &str) -> Result<usize> {
        path::validate(source)?;
        path::validate(target)?;

        if source == target
            || path::is_ancestor(source, target)
            || path::is_ancestor(target, source)
        {
            return Err(StoreError::invalid(
                Operation::Clone,
                format!("cannot clone {source} onto overlapping path {target}"),
            )
            .into());
        }
        // Root contains every other path, so the overlap check covers it.
        let Some(target_parent) = path::parent(target) else {
            return Err(StoreError::invalid(Operation::Clone, "cannot clone onto the root").into());
        };

        let Some(root) = self.read_optional(Operation::Clone, source).await? else {
            return Err(StoreError::detected(Operation::Clone, source, FaultCode::NoNode).into());
        };
        if self.stat_optional(Operation::Clone, target_parent).await?.is_none() {
            return Err(
                StoreError::detected(Operation::Clone, target_parent, FaultCode::NoNode).into(),
            );
        }
        if self.stat_optional(Operation::Clone, target).await?.is_some() {
            return Err(
                StoreError::detected(Operation::Clone, target, FaultCode::NodeExists).into(),
            );
        }

        let mut txn = PendingTransaction::new(Operation::Clone);
        txn.create(target, root.data, CreateMode::Persistent);

        let mut worklist = VecDeque::from([(source.to_string(), target.to_string())]);
        while let Some((from, to)) = worklist.pop_front() {
            let children = match self.children_of(Operation::Clone, &from).await {
                Ok(children) => children,
                Err(err) if err.is_not_found() => {
                    debug!(path = %from, "Node vanished while cloning, skipping its children");
                    continue;
                }
                Err(err) => return Err(err),
            };
            for child in children {
                let child_from = path::join([from.as_str(), child.as_str()])?;
                let Some(node) = self.read_optional(Operation::Clone, &child_from).await? else {
                    debug!(path = %child_from, "Node vanished while cloning, skipping");
                    continue;
                };
                let child_to = path::join([to.as_str(), child.as_str()])?;
                txn.create(child_to.clone(), node.data, CreateMode::Persistent);
                worklist.push_back((child_from, child_to));
            }
        }

        let created = txn.len();
        txn.commit(self).await?;
        debug!(source = %source, target = %target, nodes = created, "Subtree cloned");
        Ok(created)
    }
}
