//! A 30-minute TTL cache over a server's tool list, single-flighted so
//! concurrent callers during a miss share one fetch instead of stampeding
//! the MCP server (spec §4.5).

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Notify, RwLock};

pub const CACHE_TTL: Duration = Duration::from_secs(30 * 60);

struct CachedValue<T> {
    value: Vec<T>,
    fetched_at: Instant,
}

enum Slot<T> {
    Empty,
    /// A fetch is in flight; waiters block on the notify then re-check the slot.
    Pending(Arc<Notify>),
    Ready(CachedValue<T>),
}

pub struct ToolCache<T> {
    slot: RwLock<Slot<T>>,
}

impl<T> Default for ToolCache<T> {
    fn default() -> Self {
        Self { slot: RwLock::new(Slot::Empty) }
    }
}

impl<T: Clone> ToolCache<T> {
    /// Return the cached value if fresh, otherwise run `fetch` exactly once
    /// across all concurrent callers and cache the result.
    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> anyhow::Result<Vec<T>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<Vec<T>>>,
    {
        loop {
            let notify = {
                let mut slot = self.slot.write().await;
                match &*slot {
                    Slot::Ready(cached) if cached.fetched_at.elapsed() < CACHE_TTL => {
                        return Ok(cached.value.clone());
                    }
                    Slot::Pending(notify) => Some(Arc::clone(notify)),
                    Slot::Empty | Slot::Ready(_) => {
                        let notify = Arc::new(Notify::new());
                        *slot = Slot::Pending(Arc::clone(&notify));
                        None
                    }
                }
            };

            match notify {
                Some(notify) => {
                    notify.notified().await;
                    continue;
                }
                None => {
                    let result = fetch().await;
                    let mut slot = self.slot.write().await;
                    let waiters = match std::mem::replace(&mut *slot, Slot::Empty) {
                        Slot::Pending(n) => Some(n),
                        other => {
                            *slot = other;
                            None
                        }
                    };
                    match result {
                        Ok(value) => {
                            *slot = Slot::Ready(CachedValue { value: value.clone(), fetched_at: Instant::now() });
                            drop(slot);
                            if let Some(n) = waiters {
                                n.notify_waiters();
                            }
                            return Ok(value);
                        }
                        Err(err) => {
                            drop(slot);
                            if let Some(n) = waiters {
                                n.notify_waiters();
                            }
                            return Err(err);
                        }
                    }
                }
            }
        }
    }

    pub async fn invalidate(&self) {
        let mut slot = self.slot.write().await;
        if let Slot::Ready(_) = &*slot {
            *slot = Slot::Empty;
        }
    }
}
