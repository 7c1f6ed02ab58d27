//! Transport abstractions for talking to the coordination store.
//!
//! This module defines the capability interface the store layer consumes. A
//! transport owns the session with the coordination service, submits single
//! operations and multi-operation transactions, and reports connection-state
//! changes. Session establishment, reconnection and wire encoding all live
//! behind this trait.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::fault::RawFault;

pub mod in_memory;
pub mod retry;

pub use in_memory::{FaultPlan, InMemoryTransport, Injected};
pub use retry::{RetryPolicy, RetryingTransport};

/// How a created node behaves across sessions and whether its name is suffixed
/// with a sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CreateMode {
    /// Survives the creating session.
    #[default]
    Persistent,
    /// Removed when the creating session ends.
    Ephemeral,
    /// Persistent, with a monotonically increasing suffix appended to the name.
    PersistentSequential,
    /// Ephemeral, with a monotonically increasing suffix appended to the name.
    EphemeralSequential,
}

impl CreateMode {
    pub fn from_ephemeral(ephemeral: bool) -> Self {
        if ephemeral {
            CreateMode::Ephemeral
        } else {
            CreateMode::Persistent
        }
    }

    pub fn is_ephemeral(self) -> bool {
        matches!(self, CreateMode::Ephemeral | CreateMode::EphemeralSequential)
    }

    pub fn is_sequential(self) -> bool {
        matches!(
            self,
            CreateMode::PersistentSequential | CreateMode::EphemeralSequential
        )
    }
}

/// Node metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stat {
    /// Data version, incremented by every write to the node's payload.
    pub version: i32,
    /// Number of immediate children.
    pub num_children: usize,
    /// Payload length in bytes.
    pub data_length: usize,
    /// Session that owns the node if it is ephemeral.
    pub ephemeral_owner: Option<u64>,
}

impl Stat {
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral_owner.is_some()
    }
}

/// A node's payload together with its metadata, read in one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeData {
    pub data: Vec<u8>,
    pub stat: Stat,
}

/// Kind of request, used to target injected faults and for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Create,
    Delete,
    SetData,
    Transaction,
    Read,
    Stat,
    ListChildren,
}

/// A primitive write, submitted alone or as part of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Create {
        path: String,
        data: Vec<u8>,
        mode: CreateMode,
        create_parents: bool,
    },
    Delete {
        path: String,
        recursive: bool,
        /// Expected data version; `None` deletes unconditionally.
        version: Option<i32>,
    },
    SetData {
        path: String,
        data: Vec<u8>,
        /// Expected data version; `None` writes unconditionally.
        version: Option<i32>,
    },
}

impl Op {
    pub fn path(&self) -> &str {
        match self {
            Op::Create { path, .. } | Op::Delete { path, .. } | Op::SetData { path, .. } => path,
        }
    }

    pub fn kind(&self) -> OpKind {
        match self {
            Op::Create { .. } => OpKind::Create,
            Op::Delete { .. } => OpKind::Delete,
            Op::SetData { .. } => OpKind::SetData,
        }
    }
}

/// Result of one applied [`Op`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpResult {
    /// The node was created at `path`. For sequential modes this carries the
    /// generated name.
    Created { path: String },
    Deleted,
    DataSet { stat: Stat },
}

/// State of the session between client and coordination service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// First successful connection.
    Connected,
    /// The connection dropped; the session may still be alive.
    Suspended,
    /// The connection came back after a suspension or a lost session.
    Reconnected,
    /// The session is gone, and ephemeral nodes owned by it with it.
    Lost,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Reconnected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Suspended => "SUSPENDED",
            ConnectionState::Reconnected => "RECONNECTED",
            ConnectionState::Lost => "LOST",
        };
        f.write_str(name)
    }
}

/// Timeouts handed to the transport when the session is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    pub connection: Duration,
    pub session: Duration,
}

/// Failure of a transport request.
///
/// Interruption is kept apart from faults: it says nothing about the store, only
/// that the caller stopped waiting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request interrupted")]
    Interrupted,

    #[error(transparent)]
    Fault(#[from] RawFault),
}

impl TransportError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, TransportError::Interrupted)
    }
}

impl From<crate::fault::FaultCode> for TransportError {
    fn from(code: crate::fault::FaultCode) -> Self {
        TransportError::Fault(RawFault::new(code))
    }
}

/// Capability interface over a session with the coordination service.
///
/// Implementations must be safe to call concurrently; requests from one
/// transport instance share its single session.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establishes the session, returning once connected.
    async fn connect(
        &self,
        addresses: &str,
        timeouts: SessionTimeouts,
    ) -> Result<(), TransportError>;

    /// Closes the session. Ephemeral nodes owned by it go away.
    async fn disconnect(&self);

    /// Subscribes to connection-state changes from this point on.
    fn subscribe_state(&self) -> broadcast::Receiver<ConnectionState>;

    /// Submits a single primitive write.
    async fn submit(&self, op: Op) -> Result<OpResult, TransportError>;

    /// Submits `ops` as one transaction, applied in order and all-or-nothing.
    ///
    /// On failure the returned fault carries the path of the first failing op.
    async fn submit_transaction(&self, ops: Vec<Op>) -> Result<Vec<OpResult>, TransportError>;

    /// Reads a node's payload and metadata.
    async fn read_node(&self, path: &str) -> Result<NodeData, TransportError>;

    /// Reads a node's metadata, `None` if there is no node at `path`.
    async fn stat(&self, path: &str) -> Result<Option<Stat>, TransportError>;

    /// Lists child names in creation order.
    async fn list_children(&self, path: &str) -> Result<Vec<String>, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn connect(
        &self,
        addresses: &str,
        timeouts: SessionTimeouts,
    ) -> Result<(), TransportError> {
        (**self).connect(addresses, timeouts).await
    }

    async fn disconnect(&self) {
        (**self).disconnect().await
    }

    fn subscribe_state(&self) -> broadcast::Receiver<ConnectionState> {
        (**self).subscribe_state()
    }

    async fn submit(&self, op: Op) -> Result<OpResult, TransportError> {
        (**self).submit(op).await
    }

    async fn submit_transaction(&self, ops: Vec<Op>) -> Result<Vec<OpResult>, TransportError> {
        (**self).submit_transaction(ops).await
    }

    async fn read_node(&self, path: &str) -> Result<NodeData, TransportError> {
        (**self).read_node(path).await
    }

    async fn stat(&self, path: &str) -> Result<Option<Stat>, TransportError> {
        (**self).stat(path).await
    }

    async fn list_children(&self, path: &str) -> Result<Vec<String>, TransportError> {
        (**self).list_children(path).await
    }
}
