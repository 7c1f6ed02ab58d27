//!
//! coordtree: a client-side toolkit for hierarchical coordination stores.
//!
//! A coordination store is a tree of nodes addressed by `/`-separated paths,
//! each node holding a byte payload, optionally ephemeral (tied to the
//! creating session) and able to apply several writes as one all-or-nothing
//! transaction.
//!
//! ## Core Concepts
//!
//! * **Paths (`path`)**: Pure helpers for joining, validating and splitting node paths.
//! * **Transports (`transport::Transport`)**: The capability interface to the store. A
//!   transport owns the session, submits single writes and transactions, and reports
//!   connection-state changes. `InMemoryTransport` is a complete in-process
//!   implementation with fault injection; `RetryingTransport` adds retries.
//! * **Faults (`fault`)**: Classification of raw transport failures into a small set of
//!   kinds that say whether retrying may help.
//! * **NodeStore (`store::NodeStore`)**: Typed primitives (`get`, `create`, `delete`, ...)
//!   and composite operations (`move_node`, `replace`, `clone_subtree`) that settle
//!   ambiguous write outcomes before reporting them.
//! * **Client (`client::Client`)**: Connects a transport from a `config::ClientConfig` and
//!   forwards connection-state changes to a listener.

pub mod client;
pub mod config;
pub mod constants;
pub mod fault;
pub mod path;
pub mod store;
pub mod transport;

pub use client::Client;
pub use store::NodeStore;

use crate::fault::FaultKind;
use crate::store::Operation;

/// Result type used throughout the coordtree library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the coordtree library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed path arguments
    #[error(transparent)]
    Path(path::PathError),

    /// Structured errors from store operations
    #[error(transparent)]
    Store(store::StoreError),

    /// Structured errors from client startup
    #[error(transparent)]
    Client(client::ClientError),

    /// Configuration loading and validation errors
    #[error(transparent)]
    Config(config::ConfigError),

    /// The caller stopped waiting. Says nothing about the state of the store.
    #[error("{operation} of {target} was interrupted")]
    Interrupted { operation: Operation, target: String },
}

/// What an error means to the caller, independent of where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    NotEmpty,
    /// A conditional write found the node changed since it was read.
    VersionConflict,
    InvalidArgument,
    TransientUnavailable,
    Interrupted,
    OtherFatal,
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Path(_) => "path",
            Error::Store(_) => "store",
            Error::Client(_) => "client",
            Error::Config(_) => "config",
            Error::Interrupted { .. } => "interrupted",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Path(_) | Error::Config(_) => ErrorKind::InvalidArgument,
            Error::Interrupted { .. } => ErrorKind::Interrupted,
            Error::Store(store_err) => match store_err.fault_kind() {
                Some(kind) => ErrorKind::from(kind),
                None => ErrorKind::InvalidArgument,
            },
            Error::Client(client_err) => match client_err {
                client::ClientError::ConnectTimeout { .. } => ErrorKind::TransientUnavailable,
                client::ClientError::ConnectFailed { fault, .. } => ErrorKind::from(fault.kind),
            },
        }
    }

    /// Check if resubmitting the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_retryable(),
            Error::Client(client_err) => client_err.is_retryable(),
            _ => false,
        }
    }

    /// Check if this error indicates a node was not found.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Check if this error indicates a node already exists.
    pub fn is_already_exists(&self) -> bool {
        self.kind() == ErrorKind::AlreadyExists
    }

    pub fn is_not_empty(&self) -> bool {
        self.kind() == ErrorKind::NotEmpty
    }

    pub fn is_version_conflict(&self) -> bool {
        self.kind() == ErrorKind::VersionConflict
    }

    pub fn is_invalid_argument(&self) -> bool {
        self.kind() == ErrorKind::InvalidArgument
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Interrupted { .. })
    }
}

impl From<FaultKind> for ErrorKind {
    fn from(kind: FaultKind) -> Self {
        match kind {
            FaultKind::TransientUnavailable => ErrorKind::TransientUnavailable,
            FaultKind::NotFound => ErrorKind::NotFound,
            FaultKind::AlreadyExists => ErrorKind::AlreadyExists,
            FaultKind::NotEmpty => ErrorKind::NotEmpty,
            FaultKind::BadVersion => ErrorKind::VersionConflict,
            FaultKind::OtherFatal => ErrorKind::OtherFatal,
        }
    }
}

impl From<path::PathError> for Error {
    fn from(err: path::PathError) -> Self {
        Error::Path(err)
    }
}
