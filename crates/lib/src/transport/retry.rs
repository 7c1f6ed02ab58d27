//! Retry decorator for transports.
//!
//! [`RetryingTransport`] resubmits requests that fail with a retryable fault
//! (see [`FaultCode::should_retry`](crate::fault::FaultCode::should_retry)) a
//! fixed number of times, sleeping between attempts. This is the only place
//! retries happen; the store layer classifies faults but never resubmits.
//!
//! Retrying a write whose first attempt was applied but reported as lost can
//! surface a semantic fault on the retry (e.g. "node exists" for a create). The
//! store's reconciliation resolves those.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{info, warn};

use super::{
    ConnectionState, NodeData, Op, OpResult, SessionTimeouts, Stat, Transport, TransportError,
};

/// Retry up to `count` extra times with a fixed sleep in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub count: u32,
    pub sleep: Duration,
}

impl RetryPolicy {
    pub fn n_times(count: u32, sleep: Duration) -> Self {
        Self { count, sleep }
    }

    /// No retries at all.
    pub fn never() -> Self {
        Self::n_times(0, Duration::ZERO)
    }

    /// Whether attempt number `attempt` (zero-based) failing with `err` should
    /// be followed by another one.
    pub fn allows_retry(&self, attempt: u32, err: &TransportError) -> bool {
        match err {
            TransportError::Fault(fault) => fault.code.should_retry() && attempt < self.count,
            TransportError::Interrupted => false,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::n_times(
            crate::constants::DEFAULT_RETRY_COUNT,
            Duration::from_millis(crate::constants::DEFAULT_RETRY_SLEEP_MS),
        )
    }
}

/// A [`Transport`] that retries retryable faults of the wrapped transport.
pub struct RetryingTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryingTransport<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn with_retry<R, F, Fut>(
        &self,
        request: &'static str,
        mut attempt: F,
    ) -> Result<R, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, TransportError>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Ok(value) => {
                    if retries > 0 {
                        info!(request, retries, "Request succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(err) if self.policy.allows_retry(retries, &err) => {
                    retries += 1;
                    warn!(
                        request,
                        attempt = retries,
                        max = self.policy.count,
                        error = %err,
                        "Retryable fault, resubmitting in {:?}",
                        self.policy.sleep
                    );
                    sleep(self.policy.sleep).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryingTransport<T> {
    async fn connect(
        &self,
        addresses: &str,
        timeouts: SessionTimeouts,
    ) -> Result<(), TransportError> {
        self.inner.connect(addresses, timeouts).await
    }

    async fn disconnect(&self) {
        self.inner.disconnect().await
    }

    fn subscribe_state(&self) -> broadcast::Receiver<ConnectionState> {
        self.inner.subscribe_state()
    }

    async fn submit(&self, op: Op) -> Result<OpResult, TransportError> {
        self.with_retry("submit", || self.inner.submit(op.clone())).await
    }

    async fn submit_transaction(&self, ops: Vec<Op>) -> Result<Vec<OpResult>, TransportError> {
        self.with_retry("transaction", || self.inner.submit_transaction(ops.clone())).await
    }

    async fn read_node(&self, path: &str) -> Result<NodeData, TransportError> {
        self.with_retry("read", || self.inner.read_node(path)).await
    }

    async fn stat(&self, path: &str) -> Result<Option<Stat>, TransportError> {
        self.with_retry("stat", || self.inner.stat(path)).await
    }

    async fn list_children(&self, path: &str) -> Result<Vec<String>, TransportError> {
        self.with_retry("list_children", || self.inner.list_children(path)).await
    }
}
