//! A generic publish/subscribe broker used to fan session, message, and
//! agent-lifecycle events out to listeners (e.g. an attached TUI or a web
//! client) without coupling producers to any particular transport.
//!
//! Each subscriber gets its own bounded queue. A subscriber that can't keep
//! up does not slow down or block the publisher: once its queue is full, new
//! events for that subscriber are dropped rather than buffered without
//! bound. This mirrors the session/file-history update streams the original
//! agent core fans out to UI listeners, where losing an intermediate
//! "typing" event is harmless but backpressure on the whole system is not.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::debug;

const DEFAULT_QUEUE_CAPACITY: usize = 64;

struct Inner<T> {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<u64, mpsc::Sender<T>>>,
    capacity: usize,
}

/// A cloneable handle to a broker for some event type `T`.
pub struct Broker<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Broker<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T> Default for Broker<T> {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl<T> Broker<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                next_id: AtomicU64::new(0),
                listeners: RwLock::new(HashMap::new()),
                capacity,
            }),
        }
    }

    /// Register a new listener and return its receiving end. The returned
    /// [`Subscription`] unsubscribes itself on drop.
    pub async fn subscribe(&self) -> Subscription<T> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        self.inner.listeners.write().await.insert(id, tx);
        Subscription { id, rx, broker: self.clone() }
    }

    pub async fn listener_count(&self) -> usize {
        self.inner.listeners.read().await.len()
    }

    async fn unsubscribe(&self, id: u64) {
        self.inner.listeners.write().await.remove(&id);
    }
}

impl<T: Clone + Send + 'static> Broker<T> {
    /// Publish an event to every current listener. Listeners whose queue is
    /// full have the event dropped for them; the publisher never blocks or
    /// errors because a subscriber is slow.
    pub async fn publish(&self, event: T) {
        let listeners = self.inner.listeners.read().await;
        for (id, tx) in listeners.iter() {
            if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(event.clone()) {
                debug!(listener_id = id, "broker queue full, dropping event for slow subscriber");
            }
        }
    }
}

/// A live subscription to a [`Broker`]. Receive events with [`Subscription::recv`];
/// dropping the subscription removes it from the broker's listener table.
pub struct Subscription<T> {
    id: u64,
    rx: mpsc::Receiver<T>,
    broker: Broker<T>,
}

impl<T> Subscription<T> {
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        let broker = self.broker.clone();
        let id = self.id;
        tokio::spawn(async move {
            broker.unsubscribe(id).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let broker: Broker<u32> = Broker::default();
        let mut sub = broker.subscribe().await;
        broker.publish(7).await;
        assert_eq!(sub.recv().await, Some(7));
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive_a_copy() {
        let broker: Broker<u32> = Broker::default();
        let mut a = broker.subscribe().await;
        let mut b = broker.subscribe().await;
        broker.publish(1).await;
        assert_eq!(a.recv().await, Some(1));
        assert_eq!(b.recv().await, Some(1));
    }

    #[tokio::test]
    async fn full_queue_drops_events_instead_of_blocking() {
        let broker: Broker<u32> = Broker::new(1);
        let mut sub = broker.subscribe().await;
        broker.publish(1).await;
        broker.publish(2).await; // queue capacity 1, this one is dropped
        assert_eq!(sub.recv().await, Some(1));
    }

    #[tokio::test]
    async fn dropping_subscription_removes_listener() {
        let broker: Broker<u32> = Broker::default();
        let sub = broker.subscribe().await;
        assert_eq!(broker.listener_count().await, 1);
        drop(sub);
        // unsubscribe happens on a spawned task; give it a tick to run.
        tokio::task::yield_now().await;
        for _ in 0..50 {
            if broker.listener_count().await == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        assert_eq!(broker.listener_count().await, 0);
    }
}
