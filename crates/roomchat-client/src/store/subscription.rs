//! Cancellable change streams.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::query::{ChildAdded, ChildTracker, Query};

/// A live feed of values from the store.
///
/// Dropping the handle or calling [`Subscription::unsubscribe`] tells the
/// producer to stop; the producer also stops on its own when the receiver
/// side is gone.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
    token: CancellationToken,
}

impl<T> Subscription<T> {
    pub fn new(rx: mpsc::UnboundedReceiver<T>, token: CancellationToken) -> Self {
        Self { rx, token }
    }

    /// Next item, or `None` once the subscription has ended.
    pub async fn recv(&mut self) -> Option<T> {
        if self.token.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            item = self.rx.recv() => item,
            _ = self.token.cancelled() => None,
        }
    }

    pub fn unsubscribe(self) {
        self.token.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Token shared with the producer; cancelling it ends the stream.
    pub fn cancellation(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl<T: Send + 'static> Subscription<T> {
    /// Derive a stream that yields zero or more items per upstream item.
    /// Cancelling either end stops both.
    pub fn flat_map<U, F>(self, mut f: F) -> Subscription<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> Vec<U> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = self.token;
        let mut upstream = self.rx;
        let task_token = token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    item = upstream.recv() => {
                        let Some(item) = item else { break };
                        for out in f(item) {
                            if tx.send(out).is_err() {
                                task_token.cancel();
                                return;
                            }
                        }
                    }
                }
            }
        });

        Subscription { rx, token }
    }

    pub fn map<U, F>(self, mut f: F) -> Subscription<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> U + Send + 'static,
    {
        self.flat_map(move |item| vec![f(item)])
    }
}

impl Subscription<serde_json::Value> {
    /// Convert list snapshots into one [`ChildAdded`] per new child, in
    /// query order.
    pub fn child_added(self, query: Query) -> Subscription<ChildAdded> {
        let mut tracker = ChildTracker::new(query);
        self.flat_map(move |snapshot| tracker.added(&snapshot))
    }
}

impl<T> Unpin for Subscription<T> {}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        if self.token.is_cancelled() {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}
