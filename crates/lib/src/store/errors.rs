//! Error types for store operations.
//!
//! Every failing store call produces one [`StoreError`] naming the operation,
//! the path(s) it touched and, for transport faults, the classified [`Fault`].

use std::fmt;

use thiserror::Error;

use crate::fault::{Fault, FaultCode, FaultKind};

/// The store operation an error or interruption belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Connect,
    Get,
    Exists,
    Stat,
    ListChildren,
    ListSubtree,
    Create,
    CreateSequential,
    SetData,
    Delete,
    DeleteChildren,
    Move,
    Replace,
    Clone,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Connect => "connect",
            Operation::Get => "get",
            Operation::Exists => "exists",
            Operation::Stat => "stat",
            Operation::ListChildren => "list children",
            Operation::ListSubtree => "list subtree",
            Operation::Create => "create",
            Operation::CreateSequential => "create sequential",
            Operation::SetData => "set data",
            Operation::Delete => "delete",
            Operation::DeleteChildren => "delete children",
            Operation::Move => "move",
            Operation::Replace => "replace",
            Operation::Clone => "clone",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during store operations.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// The transport or server rejected the request.
    #[error("Failed to {operation} {}: {fault}", .paths.join(", "))]
    Fault {
        operation: Operation,
        paths: Vec<String>,
        fault: Fault,
    },

    /// The call was malformed before anything was sent.
    #[error("Invalid argument to {operation}: {reason}")]
    InvalidArgument {
        operation: Operation,
        reason: String,
    },

    /// A payload could not be decoded as the requested type.
    #[error("Cannot decode data of {path} as {expected}")]
    Decode { path: String, expected: &'static str },
}

impl StoreError {
    /// Builds a fault error for a semantic condition detected client-side,
    /// e.g. a node found to exist before a create was attempted.
    pub(crate) fn detected(operation: Operation, path: &str, code: FaultCode) -> Self {
        StoreError::Fault {
            operation,
            paths: vec![path.to_string()],
            fault: Fault::of(code, path),
        }
    }

    pub(crate) fn invalid(operation: Operation, reason: impl Into<String>) -> Self {
        StoreError::InvalidArgument {
            operation,
            reason: reason.into(),
        }
    }

    /// The classified fault, if this error came from one.
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            StoreError::Fault { fault, .. } => Some(fault),
            _ => None,
        }
    }

    /// Kind of the classified fault, if any.
    pub fn fault_kind(&self) -> Option<FaultKind> {
        self.fault().map(|fault| fault.kind)
    }

    /// Whether resubmitting the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        self.fault().is_some_and(|fault| fault.retryable)
    }

    pub fn is_not_found(&self) -> bool {
        self.fault_kind() == Some(FaultKind::NotFound)
    }

    pub fn is_already_exists(&self) -> bool {
        self.fault_kind() == Some(FaultKind::AlreadyExists)
    }

    pub fn is_not_empty(&self) -> bool {
        self.fault_kind() == Some(FaultKind::NotEmpty)
    }

    pub fn is_version_conflict(&self) -> bool {
        self.fault_kind() == Some(FaultKind::BadVersion)
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidArgument { .. } | StoreError::Decode { .. }
        )
    }

    /// The operation that failed, when known.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            StoreError::Fault { operation, .. } | StoreError::InvalidArgument { operation, .. } => {
                Some(*operation)
            }
            StoreError::Decode { .. } => None,
        }
    }

    /// Paths the failing operation touched.
    pub fn paths(&self) -> &[String] {
        match self {
            StoreError::Fault { paths, .. } => paths,
            StoreError::Decode { path, .. } => std::slice::from_ref(path),
            StoreError::InvalidArgument { .. } => &[],
        }
    }
}

impl From<StoreError> for crate::Error {
    fn from(err: StoreError) -> Self {
        crate::Error::Store(err)
    }
}
