//! Error types for the client module.

use std::time::Duration;

use thiserror::Error;

use crate::fault::Fault;

/// Errors that can occur while starting a client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// No connection was established within the configured bound.
    #[error("Timed out after {waited:?} connecting to {addresses}")]
    ConnectTimeout { addresses: String, waited: Duration },

    /// The transport refused to connect.
    #[error("Failed to connect to {addresses}: {fault}")]
    ConnectFailed { addresses: String, fault: Fault },
}

impl ClientError {
    /// Whether trying to start again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::ConnectTimeout { .. } => true,
            ClientError::ConnectFailed { fault, .. } => fault.retryable,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::ConnectTimeout { .. })
    }
}

impl From<ClientError> for crate::Error {
    fn from(err: ClientError) -> Self {
        crate::Error::Client(err)
    }
}
