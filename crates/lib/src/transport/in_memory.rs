//! In-memory transport implementation
//!
//! A single-process stand-in for the coordination service, suitable for
//! testing and development. It keeps the whole tree behind one lock, models one
//! session at a time, and can be told to fail upcoming requests so callers can
//! exercise their fault handling, including the ambiguous case where a request
//! is applied but reported as failed.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{
    ConnectionState, CreateMode, NodeData, Op, OpKind, OpResult, SessionTimeouts, Stat, Transport,
    TransportError,
};
use crate::constants::{ROOT, SEQUENCE_WIDTH, STATE_CHANNEL_CAPACITY};
use crate::fault::{FaultCode, RawFault};
use crate::path;

/// What an injected fault does to the request it hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Injected {
    /// Fail without touching the tree.
    Fail(FaultCode),
    /// Apply the request, then report the fault anyway.
    ApplyThenFail(FaultCode),
    /// Report interruption without touching the tree.
    Interrupt,
}

/// A one-shot fault aimed at the next request of a given kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultPlan {
    pub target: OpKind,
    pub outcome: Injected,
}

impl FaultPlan {
    pub fn fail(target: OpKind, code: FaultCode) -> Self {
        Self {
            target,
            outcome: Injected::Fail(code),
        }
    }

    pub fn apply_then_fail(target: OpKind, code: FaultCode) -> Self {
        Self {
            target,
            outcome: Injected::ApplyThenFail(code),
        }
    }

    pub fn interrupt(target: OpKind) -> Self {
        Self {
            target,
            outcome: Injected::Interrupt,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Znode {
    data: Vec<u8>,
    version: i32,
    /// Child names in creation order
    children: Vec<String>,
    ephemeral_owner: Option<u64>,
    /// Counter feeding sequential child names
    sequence: u64,
}

impl Znode {
    fn stat(&self) -> Stat {
        Stat {
            version: self.version,
            num_children: self.children.len(),
            data_length: self.data.len(),
            ephemeral_owner: self.ephemeral_owner,
        }
    }
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: HashMap<String, Znode>,
}

impl Tree {
    fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT.to_string(), Znode::default());
        Self { nodes }
    }

    fn node(&self, path: &str) -> Result<&Znode, RawFault> {
        self.nodes
            .get(path)
            .ok_or_else(|| RawFault::new(FaultCode::NoNode).at(path))
    }

    fn node_mut(&mut self, path: &str) -> Result<&mut Znode, RawFault> {
        self.nodes
            .get_mut(path)
            .ok_or_else(|| RawFault::new(FaultCode::NoNode).at(path))
    }

    fn apply(&mut self, op: &Op, session: u64) -> Result<OpResult, RawFault> {
        if path::validate(op.path()).is_err() {
            return Err(RawFault::new(FaultCode::BadArguments).at(op.path()));
        }
        match op {
            Op::Create {
                path,
                data,
                mode,
                create_parents,
            } => self
                .create(path, data, *mode, *create_parents, session)
                .map(|path| OpResult::Created { path }),
            Op::Delete {
                path,
                recursive,
                version,
            } => self
                .delete(path, *recursive, *version)
                .map(|_| OpResult::Deleted),
            Op::SetData {
                path,
                data,
                version,
            } => self
                .set_data(path, data, *version)
                .map(|stat| OpResult::DataSet { stat }),
        }
    }

    fn create(
        &mut self,
        path: &str,
        data: &[u8],
        mode: CreateMode,
        create_parents: bool,
        session: u64,
    ) -> Result<String, RawFault> {
        let Some(parent) = path::parent(path) else {
            return Err(RawFault::new(FaultCode::NodeExists).at(path));
        };

        if !self.nodes.contains_key(parent) {
            if !create_parents {
                return Err(RawFault::new(FaultCode::NoNode).at(path));
            }
            self.create_ancestors(parent)?;
        }

        let parent_node = self.node(parent)?;
        if parent_node.ephemeral_owner.is_some() {
            return Err(RawFault::new(FaultCode::NoChildrenForEphemerals).at(path));
        }

        let actual = if mode.is_sequential() {
            format!("{path}{:0width$}", parent_node.sequence, width = SEQUENCE_WIDTH)
        } else {
            path.to_string()
        };
        if self.nodes.contains_key(&actual) {
            return Err(RawFault::new(FaultCode::NodeExists).at(actual));
        }

        let parent_node = self.node_mut(parent)?;
        parent_node.sequence += 1;
        parent_node.children.push(path::name(&actual).to_string());
        self.nodes.insert(
            actual.clone(),
            Znode {
                data: data.to_vec(),
                ephemeral_owner: mode.is_ephemeral().then_some(session),
                ..Znode::default()
            },
        );
        Ok(actual)
    }

    /// Creates every missing node on the way down to `path`, persistent and empty.
    fn create_ancestors(&mut self, path: &str) -> Result<(), RawFault> {
        let mut current = String::new();
        for segment in path[1..].split('/') {
            let parent = if current.is_empty() {
                ROOT.to_string()
            } else {
                current.clone()
            };
            current.push('/');
            current.push_str(segment);
            if self.nodes.contains_key(&current) {
                continue;
            }
            let parent_node = self.node_mut(&parent)?;
            if parent_node.ephemeral_owner.is_some() {
                return Err(RawFault::new(FaultCode::NoChildrenForEphemerals).at(current));
            }
            parent_node.sequence += 1;
            parent_node.children.push(segment.to_string());
            self.nodes.insert(current.clone(), Znode::default());
        }
        Ok(())
    }

    fn delete(
        &mut self,
        path: &str,
        recursive: bool,
        version: Option<i32>,
    ) -> Result<(), RawFault> {
        let Some(parent) = path::parent(path) else {
            return Err(RawFault::new(FaultCode::BadArguments).at(path));
        };
        let node = self.node(path)?;
        if version.is_some_and(|v| v != node.version) {
            return Err(RawFault::new(FaultCode::BadVersion).at(path));
        }
        if !recursive && !node.children.is_empty() {
            return Err(RawFault::new(FaultCode::NotEmpty).at(path));
        }

        for doomed in self.subtree(path) {
            self.nodes.remove(&doomed);
        }
        let name = path::name(path);
        self.node_mut(parent)?.children.retain(|child| child != name);
        Ok(())
    }

    fn set_data(
        &mut self,
        path: &str,
        data: &[u8],
        version: Option<i32>,
    ) -> Result<Stat, RawFault> {
        let node = self.node_mut(path)?;
        if version.is_some_and(|v| v != node.version) {
            return Err(RawFault::new(FaultCode::BadVersion).at(path));
        }
        node.data = data.to_vec();
        node.version += 1;
        Ok(node.stat())
    }

    /// Breadth-first list of `path` and everything below it.
    fn subtree(&self, path: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut queue = VecDeque::from([path.to_string()]);
        while let Some(current) = queue.pop_front() {
            if let Some(node) = self.nodes.get(&current) {
                for child in &node.children {
                    queue.push_back(join_child(&current, child));
                }
            }
            out.push(current);
        }
        out
    }

    fn drop_ephemerals(&mut self, session: u64) {
        let owned: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.ephemeral_owner == Some(session))
            .map(|(path, _)| path.clone())
            .collect();
        for path in owned {
            // Ephemeral nodes are always leaves.
            let _ = self.delete(&path, false, None);
        }
    }
}

fn join_child(parent: &str, child: &str) -> String {
    if parent == ROOT {
        format!("/{child}")
    } else {
        format!("{parent}/{child}")
    }
}

#[derive(Debug, Default)]
struct Session {
    id: Option<u64>,
    connected: bool,
    expired: bool,
    next_id: u64,
}

/// A [`Transport`] backed by an in-process tree.
#[derive(Debug)]
pub struct InMemoryTransport {
    tree: RwLock<Tree>,
    session: Mutex<Session>,
    injections: Mutex<Vec<FaultPlan>>,
    state_tx: broadcast::Sender<ConnectionState>,
}

impl InMemoryTransport {
    /// Creates a transport holding only the root node, not yet connected.
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        Self {
            tree: RwLock::new(Tree::new()),
            session: Mutex::new(Session {
                next_id: 1,
                ..Session::default()
            }),
            injections: Mutex::new(Vec::new()),
            state_tx,
        }
    }

    /// Queues a one-shot fault for the next request of `plan.target` kind.
    ///
    /// Plans targeting the same kind fire in the order they were queued.
    pub fn fail_next(&self, plan: FaultPlan) {
        self.injections.lock().unwrap().push(plan);
    }

    /// Number of queued fault plans that have not fired yet.
    pub fn pending_faults(&self) -> usize {
        self.injections.lock().unwrap().len()
    }

    /// Id of the live session, if any.
    pub fn session_id(&self) -> Option<u64> {
        self.session.lock().unwrap().id
    }

    /// Drops the connection while keeping the session alive.
    pub fn suspend(&self) {
        self.session.lock().unwrap().connected = false;
        self.emit(ConnectionState::Suspended);
    }

    /// Expires the session: its ephemeral nodes are removed and requests fail
    /// until [`resume`](Self::resume) establishes a new one.
    pub fn expire_session(&self) {
        let expired = {
            let mut session = self.session.lock().unwrap();
            session.connected = false;
            session.expired = true;
            session.id.take()
        };
        if let Some(id) = expired {
            self.tree.write().unwrap().drop_ephemerals(id);
        }
        self.emit(ConnectionState::Lost);
    }

    /// Restores the connection, opening a fresh session if the old one expired.
    pub fn resume(&self) {
        {
            let mut session = self.session.lock().unwrap();
            if session.expired || session.id.is_none() {
                session.id = Some(session.next_id);
                session.next_id += 1;
                session.expired = false;
            }
            session.connected = true;
        }
        self.emit(ConnectionState::Reconnected);
    }

    fn emit(&self, state: ConnectionState) {
        // No subscribers is fine.
        let _ = self.state_tx.send(state);
    }

    fn take_injection(&self, kind: OpKind) -> Option<Injected> {
        let mut injections = self.injections.lock().unwrap();
        let idx = injections.iter().position(|plan| plan.target == kind)?;
        Some(injections.remove(idx).outcome)
    }

    fn live_session(&self) -> Result<u64, TransportError> {
        let session = self.session.lock().unwrap();
        if session.expired {
            return Err(FaultCode::SessionExpired.into());
        }
        match session.id {
            Some(id) if session.connected => Ok(id),
            _ => Err(FaultCode::ConnectionLoss.into()),
        }
    }

    /// Runs one request through fault injection and the session check.
    fn run<T>(
        &self,
        kind: OpKind,
        path: &str,
        request: impl FnOnce(&Self, u64) -> Result<T, RawFault>,
    ) -> Result<T, TransportError> {
        let injected = self.take_injection(kind);
        match injected {
            Some(Injected::Fail(code)) => return Err(RawFault::new(code).at(path).into()),
            Some(Injected::Interrupt) => return Err(TransportError::Interrupted),
            _ => {}
        }

        let session = self.live_session()?;
        let value = request(self, session)?;

        if let Some(Injected::ApplyThenFail(code)) = injected {
            return Err(RawFault::new(code).at(path).into());
        }
        Ok(value)
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn connect(
        &self,
        addresses: &str,
        _timeouts: SessionTimeouts,
    ) -> Result<(), TransportError> {
        if addresses.trim().is_empty() {
            return Err(FaultCode::BadArguments.into());
        }
        {
            let mut session = self.session.lock().unwrap();
            session.id = Some(session.next_id);
            session.next_id += 1;
            session.connected = true;
            session.expired = false;
        }
        self.emit(ConnectionState::Connected);
        Ok(())
    }

    async fn disconnect(&self) {
        let closed = {
            let mut session = self.session.lock().unwrap();
            session.connected = false;
            session.id.take()
        };
        if let Some(id) = closed {
            self.tree.write().unwrap().drop_ephemerals(id);
        }
    }

    fn subscribe_state(&self) -> broadcast::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    async fn submit(&self, op: Op) -> Result<OpResult, TransportError> {
        self.run(op.kind(), op.path(), |this, session| {
            this.tree.write().unwrap().apply(&op, session)
        })
    }

    async fn submit_transaction(&self, ops: Vec<Op>) -> Result<Vec<OpResult>, TransportError> {
        let first = ops.first().map(|op| op.path().to_string()).unwrap_or_default();
        self.run(OpKind::Transaction, &first, |this, session| {
            let mut tree = this.tree.write().unwrap();
            let mut staged = (*tree).clone();
            let results = ops
                .iter()
                .map(|op| staged.apply(op, session))
                .collect::<Result<Vec<_>, _>>()?;
            *tree = staged;
            Ok(results)
        })
    }

    async fn read_node(&self, path: &str) -> Result<NodeData, TransportError> {
        self.run(OpKind::Read, path, |this, _| {
            let tree = this.tree.read().unwrap();
            let node = tree.node(path)?;
            Ok(NodeData {
                data: node.data.clone(),
                stat: node.stat(),
            })
        })
    }

    async fn stat(&self, path: &str) -> Result<Option<Stat>, TransportError> {
        self.run(OpKind::Stat, path, |this, _| {
            Ok(this.tree.read().unwrap().nodes.get(path).map(Znode::stat))
        })
    }

    async fn list_children(&self, path: &str) -> Result<Vec<String>, TransportError> {
        self.run(OpKind::ListChildren, path, |this, _| {
            Ok(this.tree.read().unwrap().node(path)?.children.clone())
        })
    }
}
