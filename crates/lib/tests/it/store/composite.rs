use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use coordtree::{
    ErrorKind, NodeStore,
    store::StoreError,
    transport::{
        ConnectionState, InMemoryTransport, NodeData, Op, OpResult, SessionTimeouts, Stat,
        Transport, TransportError,
    },
};
use tokio::sync::{Barrier, broadcast};

use crate::helpers::*;

#[tokio::test]
async fn test_clone_scenario() {
    let (_, store) = test_store().await;
    seed(&store, &[("/a", "x"), ("/a/b", "y")]).await;

    store.clone_subtree("/a", "/c").await.unwrap();

    assert_eq!(store.get("/c").await.unwrap(), b"x");
    assert_eq!(store.get("/c/b").await.unwrap(), b"y");
    assert_eq!(store.list_children("/c").await.unwrap(), ["b"]);
    // Source untouched
    assert_eq!(store.get("/a/b").await.unwrap(), b"y");
}

#[tokio::test]
async fn test_clone_mirrors_structure() {
    let (_, store) = test_store().await;
    seed(
        &store,
        &[
            ("/src", "root"),
            ("/src/one", "1"),
            ("/src/two", "2"),
            ("/src/one/a", "1a"),
            ("/src/two/b", "2b"),
            ("/src/two/b/c", ""),
            ("/dst", ""),
        ],
    )
    .await;
    store.create_ephemeral("/src/live", b"e").await.unwrap();

    assert_eq!(store.clone_subtree("/src", "/dst/copy").await.unwrap(), 7);

    let source = store.list_subtree_paths("/src").await.unwrap();
    let target = store.list_subtree_paths("/dst/copy").await.unwrap();
    assert_eq!(source.len(), target.len());
    for (from, to) in source.iter().zip(&target) {
        assert_eq!(to.replacen("/dst/copy", "/src", 1), *from);
        assert_eq!(store.get(from).await.unwrap(), store.get(to).await.unwrap());
    }
    // Copies are persistent even when the source node is ephemeral.
    assert!(!store.stat("/dst/copy/live").await.unwrap().is_ephemeral());
}

#[tokio::test]
async fn test_clone_preconditions() {
    let (_, store) = test_store().await;
    seed(&store, &[("/p", ""), ("/p/q", ""), ("/taken", "")]).await;

    let cases = [
        ("/p", "/p", ErrorKind::InvalidArgument),
        ("/p", "/p/q/r", ErrorKind::InvalidArgument),
        ("/p/q", "/p", ErrorKind::InvalidArgument),
        ("/missing", "/x", ErrorKind::NotFound),
        ("/p", "/no-parent/x", ErrorKind::NotFound),
        ("/p", "/taken", ErrorKind::AlreadyExists),
    ];
    for (source, target, kind) in cases {
        let err = store.clone_subtree(source, target).await.unwrap_err();
        assert_eq!(err.kind(), kind, "clone {source} -> {target}");
    }
    assert!(!store.exists("/no-parent").await.unwrap());
}

#[tokio::test]
async fn test_move_failures() {
    let (_, store) = test_store().await;
    seed(&store, &[("/src", "data"), ("/dest", "other")]).await;

    let err = store.move_node("/missing", "/elsewhere").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!store.exists("/elsewhere").await.unwrap());

    let err = store.move_node("/src", "/dest").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert_eq!(store.get("/src").await.unwrap(), b"data");
}

#[tokio::test]
async fn test_move_into_missing_parent_leaves_source() {
    let (_, store) = test_store().await;
    seed(&store, &[("/src", "data")]).await;

    let err = store.move_node("/src", "/nowhere/dest").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(store.get("/src").await.unwrap(), b"data");
}

/// Writes to `target` right after it is read, as a concurrent actor would.
struct WriteAfterRead {
    inner: Arc<InMemoryTransport>,
    target: &'static str,
}

#[async_trait]
impl Transport for WriteAfterRead {
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
        self.inner.submit(op).await
    }

    async fn submit_transaction(&self, ops: Vec<Op>) -> Result<Vec<OpResult>, TransportError> {
        self.inner.submit_transaction(ops).await
    }

    async fn read_node(&self, path: &str) -> Result<NodeData, TransportError> {
        let node = self.inner.read_node(path).await?;
        if path == self.target {
            self.inner
                .submit(Op::SetData {
                    path: path.to_string(),
                    data: b"concurrent".to_vec(),
                    version: None,
                })
                .await?;
        }
        Ok(node)
    }

    async fn stat(&self, path: &str) -> Result<Option<Stat>, TransportError> {
        self.inner.stat(path).await
    }

    async fn list_children(&self, path: &str) -> Result<Vec<String>, TransportError> {
        self.inner.list_children(path).await
    }
}

#[tokio::test]
async fn test_move_aborts_when_source_changes() {
    let inner = connected_transport().await;
    let store = NodeStore::new(Arc::new(WriteAfterRead {
        inner: inner.clone(),
        target: "/src",
    }));
    seed(&store, &[("/src", "original")]).await;

    let err = store.move_node("/src", "/dest").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::VersionConflict);
    assert!(!err.is_retryable());

    let plain = NodeStore::new(inner);
    assert_eq!(plain.get("/src").await.unwrap(), b"concurrent");
    assert!(!plain.exists("/dest").await.unwrap());
}

#[tokio::test]
async fn test_replace_all_or_nothing() {
    let (_, store) = test_store().await;
    seed(&store, &[("/old1", "1"), ("/old2", "2")]).await;

    let err = store
        .replace(&["/old1", "/old2", "/old3"], "/new", b"n", false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    match &err {
        coordtree::Error::Store(store_err) => {
            assert_eq!(store_err.paths(), ["/new", "/old1", "/old2", "/old3"]);
            let cause = &store_err.fault().unwrap().cause;
            assert_eq!(cause.path.as_deref(), Some("/old3"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!store.exists("/new").await.unwrap());
    assert!(store.exists("/old1").await.unwrap());
    assert!(store.exists("/old2").await.unwrap());

    store.replace(&["/old1", "/old2"], "/new", b"n", false).await.unwrap();
    assert_eq!(store.get("/new").await.unwrap(), b"n");
    assert!(!store.exists("/old1").await.unwrap());
    assert!(!store.exists("/old2").await.unwrap());
}

#[tokio::test]
async fn test_replace_onto_existing_changes_nothing() {
    let (_, store) = test_store().await;
    seed(&store, &[("/old", "1"), ("/new", "already")]).await;

    let err = store.replace(&["/old"], "/new", b"n", true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert!(matches!(err, coordtree::Error::Store(StoreError::Fault { .. })));
    assert_eq!(store.get("/new").await.unwrap(), b"already");
    assert!(store.exists("/old").await.unwrap());
}

#[tokio::test]
async fn test_replace_with_ephemeral_node() {
    let (transport, store) = test_store().await;
    seed(&store, &[("/leader-1", "")]).await;

    store
        .replace(&["/leader-1"], "/leader-2", b"me", true)
        .await
        .unwrap();
    assert!(store.stat("/leader-2").await.unwrap().is_ephemeral());

    transport.expire_session();
    transport.resume();
    assert!(!store.exists("/leader-2").await.unwrap());
}

/// When a concurrent actor removes a node, relative to the request that sees it.
#[derive(Debug, Clone, Copy)]
enum Vanish {
    /// Right after the children of this path are listed.
    AfterListing(&'static str),
    /// Right after this path is read.
    AfterReading(&'static str),
}

/// Deletes the subtree at `doomed` at the moment given by `when`.
struct DeleteDuringWalk {
    inner: Arc<InMemoryTransport>,
    when: Vanish,
    doomed: &'static str,
}

impl DeleteDuringWalk {
    async fn remove_doomed(&self) -> Result<(), TransportError> {
        self.inner
            .submit(Op::Delete {
                path: self.doomed.to_string(),
                recursive: true,
                version: None,
            })
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl Transport for DeleteDuringWalk {
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
        self.inner.submit(op).await
    }

    async fn submit_transaction(&self, ops: Vec<Op>) -> Result<Vec<OpResult>, TransportError> {
        self.inner.submit_transaction(ops).await
    }

    async fn read_node(&self, path: &str) -> Result<NodeData, TransportError> {
        let node = self.inner.read_node(path).await?;
        if matches!(self.when, Vanish::AfterReading(target) if target == path) {
            self.remove_doomed().await?;
        }
        Ok(node)
    }

    async fn stat(&self, path: &str) -> Result<Option<Stat>, TransportError> {
        self.inner.stat(path).await
    }

    async fn list_children(&self, path: &str) -> Result<Vec<String>, TransportError> {
        let children = self.inner.list_children(path).await?;
        if matches!(self.when, Vanish::AfterListing(target) if target == path) {
            self.remove_doomed().await?;
        }
        Ok(children)
    }
}

async fn store_with_vanishing(when: Vanish, doomed: &'static str) -> NodeStore {
    let inner = connected_transport().await;
    let plain = NodeStore::new(inner.clone());
    seed(
        &plain,
        &[("/s", "root"), ("/s/a", "a"), ("/s/b", "b"), ("/s/b/c", "c")],
    )
    .await;
    NodeStore::new(Arc::new(DeleteDuringWalk {
        inner,
        when,
        doomed,
    }))
}

#[tokio::test]
async fn test_clone_skips_child_deleted_after_listing() {
    let store = store_with_vanishing(Vanish::AfterListing("/s"), "/s/a").await;

    assert_eq!(store.clone_subtree("/s", "/t").await.unwrap(), 3);
    assert_eq!(
        store.list_subtree_paths("/t").await.unwrap(),
        ["/t", "/t/b", "/t/b/c"]
    );
    assert_eq!(store.get("/t/b/c").await.unwrap(), b"c");
}

#[tokio::test]
async fn test_clone_keeps_node_whose_children_vanish() {
    // "/s/b" is copied from the read, then gone by the time its children are listed.
    let store = store_with_vanishing(Vanish::AfterReading("/s/b"), "/s/b").await;

    assert_eq!(store.clone_subtree("/s", "/t").await.unwrap(), 3);
    assert_eq!(
        store.list_subtree_paths("/t").await.unwrap(),
        ["/t", "/t/a", "/t/b"]
    );
    assert_eq!(store.get("/t/b").await.unwrap(), b"b");
    assert!(!store.exists("/s/b").await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_move_is_atomic_to_concurrent_listings() {
    let (_, store) = test_store().await;
    seed(&store, &[("/m", ""), ("/m/x", "payload")]).await;

    let stop = Arc::new(AtomicBool::new(false));
    let started = Arc::new(Barrier::new(4));
    let observers: Vec<_> = (0..3)
        .map(|_| {
            let store = store.clone();
            let stop = stop.clone();
            let started = started.clone();
            tokio::spawn(async move {
                started.wait().await;
                let mut seen = 0usize;
                let mut torn = 0usize;
                loop {
                    let children = store.list_children("/m").await.unwrap();
                    if !children.iter().any(|c| c == "x" || c == "y") {
                        torn += 1;
                    }
                    seen += 1;
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    tokio::task::yield_now().await;
                }
                (seen, torn)
            })
        })
        .collect();
    started.wait().await;

    for round in 0..500 {
        let (from, to) = if round % 2 == 0 {
            ("/m/x", "/m/y")
        } else {
            ("/m/y", "/m/x")
        };
        store.move_node(from, to).await.unwrap();
    }
    stop.store(true, Ordering::Relaxed);

    for observer in observers {
        let (seen, torn) = observer.await.unwrap();
        assert!(seen > 0);
        assert_eq!(torn, 0, "a listing saw neither name in {seen} reads");
    }
    assert_eq!(store.list_children("/m").await.unwrap(), ["x"]);
    assert_eq!(store.get("/m/x").await.unwrap(), b"payload");
}
