//! The node store: primitive operations on the remote tree.
//!
//! [`NodeStore`] is a thin facade over a [`Transport`]. Each call validates its
//! paths, sends one request bounded by the operation timeout, and turns any
//! failure into a typed [`crate::Error`]: transport faults are classified (see
//! [`crate::fault`]) and wrapped in [`StoreError`], while interruption is
//! surfaced as [`crate::Error::Interrupted`] untouched.
//!
//! `create` and `delete` additionally settle ambiguous outcomes (a request that
//! failed on the wire but may have been applied) by re-reading the node; see
//! the `reconcile` module.
//!
//! Composite operations built on top of these primitives (`move_node`,
//! `replace`, `clone_subtree`) live in the `composite` module.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;

use crate::constants::{DEFAULT_OPERATION_TIMEOUT_MS, ROOT};
use crate::fault::{FaultCode, RawFault, classify};
use crate::path;
use crate::transport::{CreateMode, NodeData, Op, OpResult, Stat, Transport, TransportError};
use crate::{Error, Result};

mod composite;
pub mod errors;
mod reconcile;
pub mod transaction;
mod typed;

pub use errors::{Operation, StoreError};
pub use transaction::{PendingTransaction, TransactionState};

/// Primitive operations on the coordination store.
///
/// Cloning a `NodeStore` is cheap; clones share the transport and its session.
#[derive(Clone)]
pub struct NodeStore {
    transport: Arc<dyn Transport>,
    operation_timeout: Duration,
}

impl NodeStore {
    /// Creates a store over `transport` with the default operation timeout.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
        }
    }

    /// Bounds every request by `operation_timeout`.
    pub fn with_operation_timeout(mut self, operation_timeout: Duration) -> Self {
        self.operation_timeout = operation_timeout;
        self
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    /// Sends one request and maps its failure to a typed error naming `paths`.
    pub(crate) async fn call<T>(
        &self,
        operation: Operation,
        paths: &[&str],
        request: impl Future<Output = std::result::Result<T, TransportError>>,
    ) -> Result<T> {
        let outcome = match timeout(self.operation_timeout, request).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransportError::Fault(RawFault::new(
                FaultCode::OperationTimeout,
            ))),
        };
        outcome.map_err(|err| match err {
            TransportError::Interrupted => Error::Interrupted {
                operation,
                target: paths.join(", "),
            },
            TransportError::Fault(raw) => StoreError::Fault {
                operation,
                paths: paths.iter().map(|p| p.to_string()).collect(),
                fault: classify(raw),
            }
            .into(),
        })
    }

    pub(crate) async fn read_node(&self, operation: Operation, path: &str) -> Result<NodeData> {
        self.call(operation, &[path], self.transport.read_node(path)).await
    }

    /// Reads a node, mapping "not found" to `None`.
    pub(crate) async fn read_optional(
        &self,
        operation: Operation,
        path: &str,
    ) -> Result<Option<NodeData>> {
        match self.read_node(operation, path).await {
            Ok(node) => Ok(Some(node)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub(crate) async fn stat_optional(
        &self,
        operation: Operation,
        path: &str,
    ) -> Result<Option<Stat>> {
        self.call(operation, &[path], self.transport.stat(path)).await
    }

    pub(crate) async fn children_of(
        &self,
        operation: Operation,
        path: &str,
    ) -> Result<Vec<String>> {
        self.call(operation, &[path], self.transport.list_children(path)).await
    }

    /// Returns the payload of the node at `path`.
    ///
    /// Fails with a not-found fault if there is no such node.
    pub async fn get(&self, path: &str) -> Result<Vec<u8>> {
        path::validate(path)?;
        Ok(self.read_node(Operation::Get, path).await?.data)
    }

    /// Whether a node exists at `path`. Absence is not an error.
    pub async fn exists(&self, path: &str) -> Result<bool> {
        path::validate(path)?;
        Ok(self.stat_optional(Operation::Exists, path).await?.is_some())
    }

    /// Returns the metadata of the node at `path`.
    pub async fn stat(&self, path: &str) -> Result<Stat> {
        path::validate(path)?;
        self.stat_optional(Operation::Stat, path)
            .await?
            .ok_or_else(|| StoreError::detected(Operation::Stat, path, FaultCode::NoNode).into())
    }

    /// Number of immediate children of the node at `path`.
    pub async fn num_children(&self, path: &str) -> Result<usize> {
        Ok(self.stat(path).await?.num_children)
    }

    /// Names of the children of `path`, in the order the store reports them.
    pub async fn list_children(&self, path: &str) -> Result<Vec<String>> {
        path::validate(path)?;
        self.children_of(Operation::ListChildren, path).await
    }

    /// Breadth-first list of `path` and every node below it.
    pub async fn list_subtree_paths(&self, path: &str) -> Result<Vec<String>> {
        path::validate(path)?;
        let mut visited = Vec::new();
        let mut queue = VecDeque::from([path.to_string()]);
        while let Some(current) = queue.pop_front() {
            for child in self.children_of(Operation::ListSubtree, &current).await? {
                queue.push_back(path::join([current.as_str(), child.as_str()])?);
            }
            visited.push(current);
        }
        Ok(visited)
    }

    /// Creates a node at `path` holding `data`.
    ///
    /// Fails with an already-exists fault, without sending the create, if a node
    /// is already at `path`. With `create_parents` missing ancestors are created
    /// as empty persistent nodes; otherwise a missing parent fails not-found.
    ///
    /// If the create itself fails and a re-read then finds a node at `path`
    /// holding exactly `data`, the create is taken to have been applied and the
    /// call succeeds.
    pub async fn create(
        &self,
        path: &str,
        data: &[u8],
        ephemeral: bool,
        create_parents: bool,
    ) -> Result<()> {
        path::validate(path)?;
        if self.stat_optional(Operation::Create, path).await?.is_some() {
            return Err(StoreError::detected(Operation::Create, path, FaultCode::NodeExists).into());
        }

        let op = Op::Create {
            path: path.to_string(),
            data: data.to_vec(),
            mode: CreateMode::from_ephemeral(ephemeral),
            create_parents,
        };
        match self.call(Operation::Create, &[path], self.transport.submit(op)).await {
            Ok(_) => {
                debug!(path = %path, ephemeral, "Node created");
                Ok(())
            }
            Err(failure) => reconcile::after_failed_create(self, path, data, failure).await,
        }
    }

    /// Creates a persistent node.
    pub async fn create_persistent(
        &self,
        path: &str,
        data: &[u8],
        create_parents: bool,
    ) -> Result<()> {
        self.create(path, data, false, create_parents).await
    }

    /// Creates an ephemeral node, removed when this client's session ends.
    pub async fn create_ephemeral(&self, path: &str, data: &[u8]) -> Result<()> {
        self.create(path, data, true, false).await
    }

    /// Creates a persistent node named `name_prefix` plus a sequence number under
    /// `parent` and returns the generated name.
    pub async fn create_sequential(
        &self,
        parent: &str,
        name_prefix: &str,
        data: &[u8],
    ) -> Result<String> {
        let prefix = path::join([parent, name_prefix])?;
        path::validate(&prefix)?;

        let op = Op::Create {
            path: prefix.clone(),
            data: data.to_vec(),
            mode: CreateMode::PersistentSequential,
            create_parents: false,
        };
        let result = self
            .call(Operation::CreateSequential, &[&prefix], self.transport.submit(op))
            .await?;
        let OpResult::Created { path: created } = result else {
            return Err(StoreError::detected(
                Operation::CreateSequential,
                &prefix,
                FaultCode::SystemError,
            )
            .into());
        };
        debug!(path = %created, "Sequential node created");
        Ok(path::name(&created).to_string())
    }

    /// Replaces the payload of the node at `path`.
    pub async fn set_data(&self, path: &str, data: &[u8]) -> Result<()> {
        path::validate(path)?;
        let op = Op::SetData {
            path: path.to_string(),
            data: data.to_vec(),
            version: None,
        };
        self.call(Operation::SetData, &[path], self.transport.submit(op))
            .await?;
        debug!(path = %path, bytes = data.len(), "Node data set");
        Ok(())
    }

    /// Deletes the node at `path`.
    ///
    /// Without `recursive` a node with children fails not-empty. With it the
    /// whole subtree is removed by the server in one step.
    ///
    /// If the delete fails and a re-check finds no node at `path`, the call
    /// succeeds; deleting an absent node is therefore not an error.
    pub async fn delete(&self, path: &str, recursive: bool) -> Result<()> {
        path::validate(path)?;
        if path == ROOT {
            return Err(
                StoreError::invalid(Operation::Delete, "the root node cannot be deleted").into(),
            );
        }

        let op = Op::Delete {
            path: path.to_string(),
            recursive,
            version: None,
        };
        match self.call(Operation::Delete, &[path], self.transport.submit(op)).await {
            Ok(_) => {
                debug!(path = %path, recursive, "Node deleted");
                Ok(())
            }
            Err(failure) => reconcile::after_failed_delete(self, path, failure).await,
        }
    }

    /// Deletes every child subtree of `path`, keeping `path` itself.
    pub async fn delete_children(&self, path: &str) -> Result<()> {
        path::validate(path)?;
        for child in self.children_of(Operation::DeleteChildren, path).await? {
            self.delete(&path::join([path, child.as_str()])?, true)
                .await?;
        }
        Ok(())
    }
}
