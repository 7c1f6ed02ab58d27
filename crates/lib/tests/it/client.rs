use std::sync::Arc;
use std::time::Duration;

use coordtree::{
    Client, ErrorKind,
    client::ClientError,
    config::ClientConfig,
    fault::FaultCode,
    transport::{ConnectionState, FaultPlan, InMemoryTransport, OpKind},
};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::helpers::*;

/// Waits for `expected`, skipping any other state delivered first.
async fn wait_for(rx: &mut mpsc::UnboundedReceiver<ConnectionState>, expected: ConnectionState) {
    timeout(Duration::from_secs(5), async {
        while let Some(state) = rx.recv().await {
            if state == expected {
                return;
            }
        }
        panic!("listener dropped before {expected}");
    })
    .await
    .unwrap_or_else(|_| panic!("no {expected} notification"));
}

#[tokio::test]
async fn test_start_and_use_store() {
    let (_, client) = test_client().await;
    let store = client.store();

    store.create("/app", b"cfg", false, false).await.unwrap();
    assert_eq!(store.get("/app").await.unwrap(), b"cfg");
    assert_eq!(client.config().server_addresses, "mem:2181");
    assert_eq!(store.operation_timeout(), Duration::from_secs(30));
}

#[tokio::test]
async fn test_client_store_retries_transient_faults() {
    let (transport, client) = test_client().await;
    transport.fail_next(FaultPlan::fail(OpKind::Stat, FaultCode::ConnectionLoss));

    assert!(client.store().exists("/").await.unwrap());
    assert_eq!(transport.pending_faults(), 0);
}

#[tokio::test]
async fn test_listener_sees_state_changes() {
    let (transport, client) = test_client().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    client.set_connection_state_listener(move |state| {
        let _ = tx.send(state);
    });

    transport.suspend();
    wait_for(&mut rx, ConnectionState::Suspended).await;
    transport.resume();
    wait_for(&mut rx, ConnectionState::Reconnected).await;
    transport.expire_session();
    wait_for(&mut rx, ConnectionState::Lost).await;
}

#[tokio::test]
async fn test_listener_is_replaced_and_cleared() {
    let (transport, client) = test_client().await;
    let (first_tx, mut first_rx) = mpsc::unbounded_channel();
    let (second_tx, mut second_rx) = mpsc::unbounded_channel();

    client.set_connection_state_listener(move |state| {
        let _ = first_tx.send(state);
    });
    client.set_connection_state_listener(move |state| {
        let _ = second_tx.send(state);
    });
    transport.suspend();
    wait_for(&mut second_rx, ConnectionState::Suspended).await;

    // The replaced listener never sees the suspension and is dropped with its sender.
    timeout(Duration::from_secs(1), async {
        while let Some(state) = first_rx.recv().await {
            assert_ne!(state, ConnectionState::Suspended);
        }
    })
    .await
    .unwrap();

    client.clear_connection_state_listener();
    transport.resume();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(second_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_close_ends_the_session() {
    let transport = Arc::new(InMemoryTransport::new());
    let client = Client::start(transport.clone(), test_config()).await.unwrap();
    client.store().create("/svc", b"", false, false).await.unwrap();
    client.store().create_ephemeral("/svc/me", b"").await.unwrap();

    client.close().await;
    assert_eq!(transport.session_id(), None);

    let reopened = Client::start(transport, test_config()).await.unwrap();
    assert!(reopened.store().exists("/svc").await.unwrap());
    assert!(!reopened.store().exists("/svc/me").await.unwrap());
}

#[tokio::test]
async fn test_start_rejects_invalid_config() {
    let config = ClientConfig {
        operation_timeout_ms: 0,
        ..test_config()
    };
    let err = Client::start(InMemoryTransport::new(), config).await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(err.module(), "config");
}

#[tokio::test]
async fn test_start_times_out() {
    let stalled = Stalling {
        inner: Arc::new(InMemoryTransport::new()),
        stall: Stall::Connect,
    };
    let err = Client::start(stalled, test_config()).await.err().unwrap();
    assert!(matches!(
        err,
        coordtree::Error::Client(ClientError::ConnectTimeout { .. })
    ));
    assert_eq!(err.kind(), ErrorKind::TransientUnavailable);
    assert!(err.is_retryable());
}
