//! In-process Room Store.
//!
//! [`MemoryDatabase`] is the shared tree; each [`MemoryStore`] is one
//! client connection to it with its own disconnect hooks. Every operation
//! yields to the scheduler before touching the tree so concurrent callers
//! interleave the way they would against a remote backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::path::{set_at, value_at, StorePath};
use super::push_id::PushIdGenerator;
use super::query::Query;
use super::server_value::resolve_server_values;
use super::subscription::Subscription;
use super::RoomStore;
use crate::error::StoreError;

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

struct Watcher {
    connection: u64,
    path: StorePath,
    query: Query,
    tx: mpsc::UnboundedSender<Value>,
    token: CancellationToken,
    last: Option<Value>,
}

impl Watcher {
    fn is_live(&self) -> bool {
        !self.token.is_cancelled() && !self.tx.is_closed()
    }

    /// Send the current view unless it equals the last one delivered.
    fn deliver(&mut self, root: &Value) {
        let node = value_at(root, &self.path).cloned().unwrap_or(Value::Null);
        let snapshot = self.query.apply(&node);
        if self.last.as_ref() == Some(&snapshot) {
            return;
        }
        if self.tx.send(snapshot.clone()).is_ok() {
            self.last = Some(snapshot);
        }
    }
}

struct DbState {
    root: Value,
    watchers: Vec<Watcher>,
    hooks: HashMap<u64, Vec<StorePath>>,
    next_connection: u64,
    unavailable: bool,
    push_ids: PushIdGenerator,
}

impl DbState {
    fn write(&mut self, path: &StorePath, mut value: Value, now_ms: i64) {
        resolve_server_values(&mut value, now_ms);
        set_at(&mut self.root, path, value);
        self.notify(path);
    }

    fn notify(&mut self, changed: &StorePath) {
        self.watchers.retain(Watcher::is_live);
        let root = &self.root;
        for watcher in self
            .watchers
            .iter_mut()
            .filter(|w| w.path.contains(changed) || changed.contains(&w.path))
        {
            watcher.deliver(root);
        }
    }
}

/// Shared in-memory tree. Cloning yields another handle to the same data.
#[derive(Clone)]
pub struct MemoryDatabase {
    state: Arc<Mutex<DbState>>,
    clock: Clock,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::with_clock(|| chrono::Utc::now().timestamp_millis())
    }

    /// Use `clock` (epoch millis) for server timestamps and push ids.
    pub fn with_clock<F>(clock: F) -> Self
    where
        F: Fn() -> i64 + Send + Sync + 'static,
    {
        Self {
            state: Arc::new(Mutex::new(DbState {
                root: Value::Null,
                watchers: Vec::new(),
                hooks: HashMap::new(),
                next_connection: 1,
                unavailable: false,
                push_ids: PushIdGenerator::new(),
            })),
            clock: Arc::new(clock),
        }
    }

    /// Open a new client connection.
    pub fn connect(&self) -> MemoryStore {
        let connection = {
            let mut state = self.lock();
            let id = state.next_connection;
            state.next_connection += 1;
            id
        };
        debug!(connection, "Memory store connection opened");
        MemoryStore {
            db: self.clone(),
            connection,
            connected: AtomicBool::new(true),
        }
    }

    /// Make every subsequent operation fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Current value at `path`, bypassing any connection.
    pub fn snapshot(&self, path: &StorePath) -> Option<Value> {
        value_at(&self.lock().root, path).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, DbState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// One client's connection to a [`MemoryDatabase`].
///
/// Disconnecting, explicitly or by dropping the last handle, runs the
/// connection's removal hooks and ends its subscriptions.
pub struct MemoryStore {
    db: MemoryDatabase,
    connection: u64,
    connected: AtomicBool,
}

impl MemoryStore {
    pub fn connection_id(&self) -> u64 {
        self.connection
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Simulate the connection dropping.
    pub fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        let now = self.db.now();
        let mut state = self.db.lock();
        let hooks = state.hooks.remove(&self.connection).unwrap_or_default();
        debug!(
            connection = self.connection,
            hooks = hooks.len(),
            "Memory store connection closed"
        );
        for watcher in state
            .watchers
            .iter()
            .filter(|w| w.connection == self.connection)
        {
            watcher.token.cancel();
        }
        for path in hooks {
            state.write(&path, Value::Null, now);
        }
    }

    async fn begin(&self) -> Result<MutexGuard<'_, DbState>, StoreError> {
        tokio::task::yield_now().await;
        if !self.is_connected() {
            return Err(StoreError::Disconnected);
        }
        let state = self.db.lock();
        if state.unavailable {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        Ok(state)
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn get(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        let state = self.begin().await?;
        Ok(value_at(&state.root, path).cloned())
    }

    async fn set(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        let now = self.db.now();
        let mut state = self.begin().await?;
        state.write(path, value, now);
        Ok(())
    }

    async fn push(&self, path: &StorePath, value: Value) -> Result<String, StoreError> {
        let now = self.db.now();
        let mut state = self.begin().await?;
        let key = state.push_ids.next_id(now);
        state.write(&path.child(&key), value, now);
        Ok(key)
    }

    async fn on_disconnect_remove(&self, path: &StorePath) -> Result<(), StoreError> {
        let mut state = self.begin().await?;
        state
            .hooks
            .entry(self.connection)
            .or_default()
            .push(path.clone());
        Ok(())
    }

    async fn watch(
        &self,
        path: &StorePath,
        query: Query,
    ) -> Result<Subscription<Value>, StoreError> {
        let mut state = self.begin().await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let mut watcher = Watcher {
            connection: self.connection,
            path: path.clone(),
            query,
            tx,
            token: token.clone(),
            last: None,
        };
        watcher.deliver(&state.root);
        state.watchers.push(watcher);
        Ok(Subscription::new(rx, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::server_timestamp;
    use serde_json::json;
    use std::sync::atomic::AtomicI64;

    fn ticking_db() -> MemoryDatabase {
        let clock = Arc::new(AtomicI64::new(1_000));
        MemoryDatabase::with_clock(move || clock.fetch_add(1, Ordering::SeqCst))
    }

    fn path(p: &str) -> StorePath {
        StorePath::parse(p)
    }

    #[tokio::test]
    async fn set_then_get_resolves_timestamps() {
        let db = MemoryDatabase::with_clock(|| 42);
        let store = db.connect();
        store
            .set(&path("rooms/a/metadata"), json!({"name": "a", "createdAt": server_timestamp()}))
            .await
            .unwrap();
        let value = store.get(&path("rooms/a/metadata")).await.unwrap();
        assert_eq!(value, Some(json!({"name": "a", "createdAt": 42})));
        assert_eq!(store.get(&path("rooms/b/metadata")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn push_keys_sort_in_insertion_order() {
        let db = ticking_db();
        let store = db.connect();
        let mut keys = Vec::new();
        for n in 0..5 {
            keys.push(store.push(&path("list"), json!(n)).await.unwrap());
        }
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(db.snapshot(&path("list")).unwrap().as_object().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn watch_delivers_initial_and_changed_snapshots() {
        let db = MemoryDatabase::new();
        let store = db.connect();
        let mut sub = store.watch(&path("rooms/a/presence"), Query::all()).await.unwrap();
        assert_eq!(sub.recv().await, Some(Value::Null));

        store
            .set(&path("rooms/a/presence/u1"), json!({"online": true}))
            .await
            .unwrap();
        assert_eq!(sub.recv().await, Some(json!({"u1": {"online": true}})));

        // Writes elsewhere do not produce a snapshot.
        store.set(&path("rooms/b/presence/u2"), json!(true)).await.unwrap();
        store.remove(&path("rooms/a/presence/u1")).await.unwrap();
        assert_eq!(sub.recv().await, Some(Value::Null));
    }

    #[tokio::test]
    async fn disconnect_runs_hooks_for_that_connection_only() {
        let db = MemoryDatabase::new();
        let alice = db.connect();
        let bob = db.connect();
        for (store, user) in [(&alice, "alice"), (&bob, "bob")] {
            let entry = path("rooms/r/presence").child(user);
            store.set(&entry, json!({"online": true})).await.unwrap();
            store.on_disconnect_remove(&entry).await.unwrap();
        }

        alice.disconnect();
        let presence = db.snapshot(&path("rooms/r/presence")).unwrap();
        assert!(presence.get("alice").is_none());
        assert!(presence.get("bob").is_some());

        assert_eq!(
            alice.get(&path("rooms/r")).await,
            Err(StoreError::Disconnected)
        );
    }

    #[tokio::test]
    async fn dropping_the_store_disconnects() {
        let db = MemoryDatabase::new();
        let store = db.connect();
        let entry = path("rooms/r/presence/u1");
        store.set(&entry, json!({"online": true})).await.unwrap();
        store.on_disconnect_remove(&entry).await.unwrap();
        drop(store);
        assert!(db.snapshot(&entry).is_none());
    }

    #[tokio::test]
    async fn disconnect_ends_own_subscriptions() {
        let db = MemoryDatabase::new();
        let store = db.connect();
        let mut sub = store.watch(&path("x"), Query::all()).await.unwrap();
        assert_eq!(sub.recv().await, Some(Value::Null));
        store.disconnect();
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn unavailable_store_fails_operations() {
        let db = MemoryDatabase::new();
        let store = db.connect();
        db.set_unavailable(true);
        assert!(matches!(
            store.set(&path("a"), json!(1)).await,
            Err(StoreError::Unavailable(_))
        ));
        db.set_unavailable(false);
        store.set(&path("a"), json!(1)).await.unwrap();
    }

    async fn check_then_write(store: &MemoryStore, target: &StorePath, who: &str) -> bool {
        let absent = store.get(target).await.unwrap().is_none();
        if absent {
            store.set(target, json!({"by": who})).await.unwrap();
        }
        absent
    }

    #[tokio::test]
    async fn concurrent_check_then_write_interleaves() {
        let db = MemoryDatabase::new();
        let a = db.connect();
        let b = db.connect();
        let target = path("rooms/x/metadata");

        let (first, second) = tokio::join!(
            check_then_write(&a, &target, "a"),
            check_then_write(&b, &target, "b")
        );
        assert!(first && second);
        assert_eq!(db.snapshot(&target), Some(json!({"by": "b"})));
    }

    #[tokio::test]
    async fn limited_watch_tracks_the_newest_entries() {
        let db = ticking_db();
        let store = db.connect();
        let messages = path("rooms/r/messages");
        let query = Query::all().order_by_child("timestamp").limit_to_last(2);
        let mut sub = store.watch(&messages, query).await.unwrap();
        assert_eq!(sub.recv().await, Some(Value::Null));

        for n in 0..3 {
            store
                .push(&messages, json!({"n": n, "timestamp": server_timestamp()}))
                .await
                .unwrap();
        }
        let mut last = Value::Null;
        for _ in 0..3 {
            last = sub.recv().await.unwrap();
        }
        let ns: Vec<i64> = Query::all()
            .order_by_child("timestamp")
            .ordered_children(&last)
            .into_iter()
            .map(|(_, v)| v["n"].as_i64().unwrap())
            .collect();
        assert_eq!(ns, [1, 2]);
    }
}
