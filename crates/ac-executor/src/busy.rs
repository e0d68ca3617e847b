//! Single-flight guard over in-progress turns, keyed by session id (plus a
//! `"<id>-summarize"` key for user-initiated compaction, spec §4.3). A
//! session with an in-flight turn rejects a second concurrent one rather
//! than interleaving two streams into the same history.

use ac_core::CoreError;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct BusyMap {
    keys: Arc<Mutex<HashSet<String>>>,
}

/// Releases its key when dropped, so a panicking turn still frees the
/// session instead of wedging it busy forever.
pub struct BusyGuard {
    keys: Arc<Mutex<HashSet<String>>>,
    key: String,
    released: bool,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.keys.lock().unwrap().remove(&self.key);
        self.released = true;
    }
}

impl BusyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, key: impl Into<String>) -> Result<BusyGuard, CoreError> {
        let key = key.into();
        let mut keys = self.keys.lock().unwrap();
        if !keys.insert(key.clone()) {
            return Err(CoreError::SessionBusy(key));
        }
        Ok(BusyGuard { keys: Arc::clone(&self.keys), key, released: false })
    }

    pub fn is_busy(&self, key: &str) -> bool {
        self.keys.lock().unwrap().contains(key)
    }
}

pub fn summarize_key(session_id: &str) -> String {
    format!("{session_id}-summarize")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_on_same_key_is_rejected() {
        let busy = BusyMap::new();
        let _guard = busy.acquire("s1").unwrap();
        assert!(matches!(busy.acquire("s1"), Err(CoreError::SessionBusy(_))));
    }

    #[test]
    fn dropping_guard_frees_the_key() {
        let busy = BusyMap::new();
        {
            let _guard = busy.acquire("s1").unwrap();
            assert!(busy.is_busy("s1"));
        }
        assert!(!busy.is_busy("s1"));
    }

    #[test]
    fn summarize_key_is_independent_of_the_turn_key() {
        let busy = BusyMap::new();
        let _turn_guard = busy.acquire("s1").unwrap();
        let _summarize_guard = busy.acquire(summarize_key("s1")).unwrap();
    }
}
