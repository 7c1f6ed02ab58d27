//! Client lifecycle and connection-state notifications.
//!
//! A [`Client`] connects a transport, wraps it in the configured retry policy
//! and hands out a [`NodeStore`] bound by the configured operation timeout.
//! Connection-state changes reported by the transport are forwarded by a
//! background task to at most one registered [`ConnectionStateListener`].

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::fault::classify;
use crate::store::{NodeStore, Operation};
use crate::transport::{ConnectionState, RetryingTransport, Transport, TransportError};
use crate::{Error, Result};

pub mod errors;

pub use errors::ClientError;

/// Receives connection-state changes.
///
/// Called from the client's forwarding task, never from the caller of a store
/// operation. Implementations should return quickly.
pub trait ConnectionStateListener: Send + Sync {
    fn state_changed(&self, state: ConnectionState);
}

impl<F> ConnectionStateListener for F
where
    F: Fn(ConnectionState) + Send + Sync,
{
    fn state_changed(&self, state: ConnectionState) {
        self(state)
    }
}

type ListenerSlot = Arc<RwLock<Option<Arc<dyn ConnectionStateListener>>>>;

/// A connected client.
pub struct Client {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    store: NodeStore,
    listener: ListenerSlot,
    forwarder: JoinHandle<()>,
}

impl Client {
    /// Connects `transport` according to `config`.
    ///
    /// Requests made through the returned client are retried per
    /// [`ClientConfig::retry_policy`]. Waits at most
    /// `max_block_until_connected_secs` for the connection.
    pub async fn start<T: Transport + 'static>(transport: T, config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let transport: Arc<dyn Transport> =
            Arc::new(RetryingTransport::new(transport, config.retry_policy()));
        let listener: ListenerSlot = Arc::new(RwLock::new(None));
        let forwarder = tokio::spawn(forward_states(
            transport.subscribe_state(),
            listener.clone(),
        ));

        let addresses = config.server_addresses.clone();
        let waited = config.max_block_until_connected();
        let connected = timeout(
            waited,
            transport.connect(&addresses, config.session_timeouts()),
        )
        .await;
        let failure: Option<Error> = match connected {
            Ok(Ok(())) => None,
            Ok(Err(TransportError::Interrupted)) => Some(Error::Interrupted {
                operation: Operation::Connect,
                target: addresses.clone(),
            }),
            Ok(Err(TransportError::Fault(raw))) => Some(
                ClientError::ConnectFailed {
                    addresses: addresses.clone(),
                    fault: classify(raw),
                }
                .into(),
            ),
            Err(_) => Some(
                ClientError::ConnectTimeout {
                    addresses: addresses.clone(),
                    waited,
                }
                .into(),
            ),
        };
        if let Some(err) = failure {
            forwarder.abort();
            return Err(err);
        }

        info!(addresses = %addresses, "Client started");
        let store =
            NodeStore::new(transport.clone()).with_operation_timeout(config.operation_timeout());
        Ok(Self {
            transport,
            config,
            store,
            listener,
            forwarder,
        })
    }

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Registers `listener`, replacing any previous one.
    pub fn set_connection_state_listener(&self, listener: impl ConnectionStateListener + 'static) {
        *self.listener.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(listener));
    }

    pub fn clear_connection_state_listener(&self) {
        *self.listener.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Closes the session and stops forwarding state changes.
    pub async fn close(self) {
        self.transport.disconnect().await;
        self.forwarder.abort();
        info!(addresses = %self.config.server_addresses, "Client closed");
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

async fn forward_states(mut events: broadcast::Receiver<ConnectionState>, listener: ListenerSlot) {
    loop {
        match events.recv().await {
            Ok(state) => {
                info!(state = %state, "Connection state changed");
                let current = listener
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                if let Some(current) = current {
                    current.state_changed(state);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Connection state listener fell behind, notifications dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
