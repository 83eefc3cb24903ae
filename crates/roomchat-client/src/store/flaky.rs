//! A store wrapper that fails chosen calls, for exercising partial
//! failures mid-sequence.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use super::{MemoryStore, Query, RoomStore, StorePath, Subscription};
use crate::error::StoreError;

const NEVER: usize = usize::MAX;

pub struct FlakyStore {
    inner: MemoryStore,
    watch_calls: AtomicUsize,
    failing_watch: AtomicUsize,
    failing_hooks: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            watch_calls: AtomicUsize::new(0),
            failing_watch: AtomicUsize::new(NEVER),
            failing_hooks: AtomicUsize::new(0),
        }
    }

    /// Fail the `n`th `watch` call from now (1-based), once.
    pub fn fail_watch(&self, n: usize) {
        let seen = self.watch_calls.load(Ordering::SeqCst);
        self.failing_watch.store(seen + n, Ordering::SeqCst);
    }

    /// Fail the next `on_disconnect_remove` call.
    pub fn fail_next_hook(&self) {
        self.failing_hooks.fetch_add(1, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn injected() -> StoreError {
        StoreError::Unavailable("injected failure".into())
    }
}

#[async_trait]
impl RoomStore for FlakyStore {
    async fn get(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        self.inner.get(path).await
    }

    async fn set(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        self.inner.set(path, value).await
    }

    async fn push(&self, path: &StorePath, value: Value) -> Result<String, StoreError> {
        self.inner.push(path, value).await
    }

    async fn on_disconnect_remove(&self, path: &StorePath) -> Result<(), StoreError> {
        let armed = self
            .failing_hooks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if armed {
            return Err(Self::injected());
        }
        self.inner.on_disconnect_remove(path).await
    }

    async fn watch(
        &self,
        path: &StorePath,
        query: Query,
    ) -> Result<Subscription<Value>, StoreError> {
        let call = self.watch_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.failing_watch.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.watch(path, query).await
    }
}
