//! Active listens and their locally mirrored data.
//!
//! Each listen keeps the last known value of its own node. Server pushes
//! are rebased onto every listen they overlap: a write below the listen
//! path patches the mirror, a write at or above it replaces the mirror
//! with the matching sub-tree.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::store::{set_at, value_at, Query, StorePath};

pub(crate) struct Listen {
    pub(crate) path: StorePath,
    pub(crate) query: Query,
    sink: mpsc::UnboundedSender<Value>,
    pub(crate) token: CancellationToken,
    mirror: Value,
    last_sent: Option<Value>,
}

impl Listen {
    /// Tagged listens only take pushes carrying their tag.
    fn accepts(&self, tag: Option<u64>, id: u64) -> bool {
        match tag {
            Some(tag) => tag == id,
            None => self.query.is_default(),
        }
    }

    fn apply_put(&mut self, path: &StorePath, data: &Value) -> bool {
        if let Some(rel) = self.path.relative(path) {
            set_at(&mut self.mirror, &rel, data.clone());
            true
        } else if let Some(rel) = path.relative(&self.path) {
            self.mirror = value_at(data, &rel).cloned().unwrap_or(Value::Null);
            true
        } else {
            false
        }
    }

    fn flush(&mut self) {
        let snapshot = self.query.apply(&self.mirror);
        if self.last_sent.as_ref() == Some(&snapshot) {
            return;
        }
        if self.sink.send(snapshot.clone()).is_err() {
            self.token.cancel();
            return;
        }
        self.last_sent = Some(snapshot);
    }
}

#[derive(Default)]
pub(crate) struct ListenRegistry {
    next_id: u64,
    listens: HashMap<u64, Listen>,
}

impl ListenRegistry {
    pub(crate) fn register(
        &mut self,
        path: StorePath,
        query: Query,
        sink: mpsc::UnboundedSender<Value>,
        token: CancellationToken,
    ) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.listens.insert(
            id,
            Listen {
                path,
                query,
                sink,
                token,
                mirror: Value::Null,
                last_sent: None,
            },
        );
        id
    }

    pub(crate) fn remove(&mut self, id: u64) -> Option<Listen> {
        self.listens.remove(&id)
    }

    pub(crate) fn get(&self, id: u64) -> Option<&Listen> {
        self.listens.get(&id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (u64, &Listen)> {
        self.listens.iter().map(|(id, listen)| (*id, listen))
    }

    /// The server acknowledged the listen. A listen whose node is empty
    /// receives no data push, so its first (null) snapshot goes out here.
    pub(crate) fn complete(&mut self, id: u64) {
        if let Some(listen) = self.listens.get_mut(&id) {
            if listen.last_sent.is_none() {
                listen.flush();
            }
        }
    }

    /// Full-node write at `path`.
    pub(crate) fn apply_put(&mut self, path: &StorePath, data: &Value, tag: Option<u64>) {
        for (id, listen) in self.listens.iter_mut() {
            if listen.accepts(tag, *id) && listen.apply_put(path, data) {
                listen.flush();
            }
        }
    }

    /// Child-wise update: each key of `data` is written below `path`.
    pub(crate) fn apply_merge(&mut self, path: &StorePath, data: &Map<String, Value>, tag: Option<u64>) {
        for (id, listen) in self.listens.iter_mut() {
            if !listen.accepts(tag, *id) {
                continue;
            }
            let mut touched = false;
            for (key, value) in data {
                touched |= listen.apply_put(&path.child(key), value);
            }
            if touched {
                listen.flush();
            }
        }
    }

    /// Drop listens whose subscriber went away, returning them so the
    /// caller can tell the server.
    pub(crate) fn take_cancelled(&mut self) -> Vec<(u64, Listen)> {
        let ids: Vec<u64> = self
            .listens
            .iter()
            .filter(|(_, l)| l.token.is_cancelled() || l.sink.is_closed())
            .map(|(id, _)| *id)
            .collect();
        ids.into_iter()
            .filter_map(|id| self.listens.remove(&id).map(|l| (id, l)))
            .inspect(|(id, l)| debug!(id, path = %l.path, "Listen dropped"))
            .collect()
    }

    /// End every subscription.
    pub(crate) fn close_all(&mut self) {
        for (_, listen) in self.listens.drain() {
            listen.token.cancel();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.listens.len()
    }
}
