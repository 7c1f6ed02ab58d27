//! Multi-operation transactions.
//!
//! A [`PendingTransaction`] collects primitive writes and submits them as one
//! all-or-nothing request. It moves through
//! `Building -> Validated -> Submitted -> Committed | Aborted` and is consumed
//! by [`commit`](PendingTransaction::commit), so it cannot be submitted twice.
//! A live value is only ever `Building` or `Validated`; the later states are
//! reported in the commit logs.

use std::collections::HashSet;

use tracing::{debug, trace};

use super::{NodeStore, Operation, StoreError};
use crate::path;
use crate::transport::{CreateMode, Op, OpResult, Transport};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Building,
    Validated,
    Submitted,
    Committed,
    Aborted,
}

/// An ordered batch of writes submitted atomically.
#[derive(Debug)]
pub struct PendingTransaction {
    operation: Operation,
    ops: Vec<Op>,
    state: TransactionState,
}

impl PendingTransaction {
    /// Starts an empty transaction on behalf of `operation`.
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            ops: Vec::new(),
            state: TransactionState::Building,
        }
    }

    /// Appends a create of `path`.
    pub fn create(
        &mut self,
        path: impl Into<String>,
        data: Vec<u8>,
        mode: CreateMode,
    ) -> &mut Self {
        self.push(Op::Create {
            path: path.into(),
            data,
            mode,
            create_parents: false,
        })
    }

    /// Appends a delete of `path`, conditional on `version` when given.
    pub fn delete(&mut self, path: impl Into<String>, version: Option<i32>) -> &mut Self {
        self.push(Op::Delete {
            path: path.into(),
            recursive: false,
            version,
        })
    }

    /// Appends a payload write to `path`, conditional on `version` when given.
    pub fn set_data(
        &mut self,
        path: impl Into<String>,
        data: Vec<u8>,
        version: Option<i32>,
    ) -> &mut Self {
        self.push(Op::SetData {
            path: path.into(),
            data,
            version,
        })
    }

    fn push(&mut self, op: Op) -> &mut Self {
        // Any change after validation requires validating again.
        self.state = TransactionState::Building;
        self.ops.push(op);
        self
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Paths of all ops in submission order.
    pub fn paths(&self) -> Vec<&str> {
        self.ops.iter().map(Op::path).collect()
    }

    /// Checks the batch before submission: it must be non-empty, every path
    /// must be well formed and no path may be created twice.
    pub fn validate(&mut self) -> Result<()> {
        if self.ops.is_empty() {
            return Err(StoreError::invalid(self.operation, "transaction has no operations").into());
        }
        let mut created = HashSet::new();
        for op in &self.ops {
            path::validate(op.path())?;
            if let Op::Create { path, .. } = op {
                if !created.insert(path.as_str()) {
                    return Err(StoreError::invalid(
                        self.operation,
                        format!("{path} is created twice in one transaction"),
                    )
                    .into());
                }
            }
        }
        self.state = TransactionState::Validated;
        Ok(())
    }

    /// Submits the batch. Either every op is applied or none is.
    ///
    /// A failure names every path in the batch; the classified fault carries
    /// the path of the op that was rejected.
    pub async fn commit(mut self, store: &NodeStore) -> Result<Vec<OpResult>> {
        if self.state != TransactionState::Validated {
            self.validate()?;
        }

        trace!(
            operation = %self.operation,
            state = ?TransactionState::Submitted,
            ops = self.ops.len(),
            "Submitting transaction"
        );

        let paths: Vec<String> = self.ops.iter().map(|op| op.path().to_string()).collect();
        let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
        let outcome = store
            .call(
                self.operation,
                &path_refs,
                store.transport().submit_transaction(self.ops),
            )
            .await;

        match outcome {
            Ok(results) => {
                debug!(
                    operation = %self.operation,
                    state = ?TransactionState::Committed,
                    ops = results.len(),
                    "Transaction committed"
                );
                Ok(results)
            }
            Err(err) => {
                debug!(
                    operation = %self.operation,
                    state = ?TransactionState::Aborted,
                    error = %err,
                    "Transaction not committed"
                );
                Err(err)
            }
        }
    }
}
