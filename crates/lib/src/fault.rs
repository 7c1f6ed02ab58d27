//! Fault classification.
//!
//! Transports report failures as a [`RawFault`] carrying the coordination
//! service's error code. [`classify`] turns that into a [`Fault`] that says what
//! kind of failure happened and whether resubmitting can help.
//!
//! The retryable set is defined once, by [`FaultCode::should_retry`], and is
//! shared by [`classify`] and by [`RetryingTransport`](crate::transport::RetryingTransport)
//! so the two can never disagree.

use std::fmt;

/// Error codes reported by the coordination service or its client transport.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCode {
    /// The connection dropped while the request was in flight.
    ConnectionLoss,
    /// The request did not complete within the transport's deadline.
    OperationTimeout,
    /// The session expired while the request was in flight.
    SessionExpired,
    /// The session moved to another server.
    SessionMoved,
    /// A reconfiguration left the ensemble without quorum.
    NewConfigNoQuorum,
    /// No node exists at the path.
    NoNode,
    /// A node already exists at the path.
    NodeExists,
    /// The node has children.
    NotEmpty,
    /// The expected version did not match the node's version.
    BadVersion,
    /// Ephemeral nodes cannot have children.
    NoChildrenForEphemerals,
    /// The request was malformed.
    BadArguments,
    /// The ACL is invalid.
    InvalidAcl,
    /// Authentication failed.
    AuthFailed,
    /// Not authenticated for the operation.
    NoAuth,
    /// The server does not implement the operation.
    Unimplemented,
    /// Request or response could not be (de)serialized.
    MarshallingError,
    /// Unspecified server-side failure.
    SystemError,
}

impl FaultCode {
    /// Whether the transport's retry policy resubmits a request failing with
    /// this code.
    pub fn should_retry(self) -> bool {
        matches!(
            self,
            FaultCode::ConnectionLoss
                | FaultCode::OperationTimeout
                | FaultCode::SessionExpired
                | FaultCode::SessionMoved
                | FaultCode::NewConfigNoQuorum
        )
    }

    /// Stable lowercase name of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            FaultCode::ConnectionLoss => "connection loss",
            FaultCode::OperationTimeout => "operation timeout",
            FaultCode::SessionExpired => "session expired",
            FaultCode::SessionMoved => "session moved",
            FaultCode::NewConfigNoQuorum => "new config no quorum",
            FaultCode::NoNode => "no node",
            FaultCode::NodeExists => "node exists",
            FaultCode::NotEmpty => "not empty",
            FaultCode::BadVersion => "bad version",
            FaultCode::NoChildrenForEphemerals => "no children for ephemerals",
            FaultCode::BadArguments => "bad arguments",
            FaultCode::InvalidAcl => "invalid acl",
            FaultCode::AuthFailed => "auth failed",
            FaultCode::NoAuth => "no auth",
            FaultCode::Unimplemented => "unimplemented",
            FaultCode::MarshallingError => "marshalling error",
            FaultCode::SystemError => "system error",
        }
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure exactly as the transport reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFault {
    /// Error code reported by the transport or server.
    pub code: FaultCode,
    /// Path of the failing request, when known. For transactions this is the
    /// path of the first failing operation.
    pub path: Option<String>,
}

impl RawFault {
    pub fn new(code: FaultCode) -> Self {
        Self { code, path: None }
    }

    /// Attaches the failing path.
    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl fmt::Display for RawFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{} at {path}", self.code),
            None => write!(f, "{}", self.code),
        }
    }
}

impl std::error::Error for RawFault {}

impl From<FaultCode> for RawFault {
    fn from(code: FaultCode) -> Self {
        RawFault::new(code)
    }
}

/// What a fault means to the caller.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// Connectivity or session instability; resubmitting may succeed.
    TransientUnavailable,
    /// The node does not exist.
    NotFound,
    /// A node already exists at the path.
    AlreadyExists,
    /// The node has children.
    NotEmpty,
    /// The node changed since it was read.
    BadVersion,
    /// Anything else.
    OtherFatal,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultKind::TransientUnavailable => "transient-unavailable",
            FaultKind::NotFound => "not-found",
            FaultKind::AlreadyExists => "already-exists",
            FaultKind::NotEmpty => "not-empty",
            FaultKind::BadVersion => "bad-version",
            FaultKind::OtherFatal => "other-fatal",
        };
        f.write_str(name)
    }
}

/// A classified fault. Built once per failing attempt and consumed by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub kind: FaultKind,
    pub retryable: bool,
    pub cause: RawFault,
}

impl Fault {
    /// Shorthand for classifying a bare code at a path.
    pub fn of(code: FaultCode, path: impl Into<String>) -> Self {
        classify(RawFault::new(code).at(path))
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.cause)
    }
}

/// Classifies a raw transport fault.
pub fn classify(cause: RawFault) -> Fault {
    let (kind, retryable) = if cause.code.should_retry() {
        (FaultKind::TransientUnavailable, true)
    } else {
        let kind = match cause.code {
            FaultCode::NoNode => FaultKind::NotFound,
            FaultCode::NodeExists => FaultKind::AlreadyExists,
            FaultCode::NotEmpty => FaultKind::NotEmpty,
            FaultCode::BadVersion => FaultKind::BadVersion,
            _ => FaultKind::OtherFatal,
        };
        (kind, false)
    };
    Fault {
        kind,
        retryable,
        cause,
    }
}
