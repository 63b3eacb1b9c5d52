//! Correlation of server-initiated requests with the client's replies.
//!
//! The server occasionally acts as a JSON-RPC client (today only for
//! `roots/list`). Each outbound request gets a fresh integer id and a
//! one-shot channel; the reply is delivered at most once, and entries are
//! removed on delivery or cancellation so nothing accumulates.
//!
//! All methods take the lock briefly and never hold it across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use super::protocol::Message;

#[derive(Clone, Default)]
pub struct PendingRequests {
    inner: Arc<Mutex<PendingInner>>,
}

#[derive(Default)]
struct PendingInner {
    /// Last id handed out. Ids start at 1.
    last_id: i64,
    waiters: HashMap<i64, oneshot::Sender<Message>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh request id.
    pub fn next_id(&self) -> i64 {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.last_id += 1;
        inner.last_id
    }

    /// Register a waiter for `id` and return the receiving end.
    pub fn register(&self, id: i64) -> oneshot::Receiver<Message> {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.waiters.insert(id, tx).is_some() {
            tracing::warn!(id, "replaced an existing pending request");
        }
        rx
    }

    /// Deliver `msg` to the waiter for `id`.
    ///
    /// Returns `true` if an entry existed; the entry is removed either way.
    pub fn resolve(&self, id: i64, msg: Message) -> bool {
        let waiter = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.waiters.remove(&id)
        };
        match waiter {
            Some(tx) => {
                // The receiver may already be gone (timed out between our
                // lookup and now); the transaction is still closed.
                let _ = tx.send(msg);
                true
            }
            None => false,
        }
    }

    /// Remove `id` without delivering anything. Returns whether it existed.
    pub fn cancel(&self, id: i64) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.waiters.remove(&id).is_some()
    }

    /// Drop every waiter (shutdown).
    pub fn cancel_all(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.waiters.clear();
    }

    pub fn contains(&self, id: i64) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.waiters.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Guard that cancels `id` when dropped.
    pub fn guard(&self, id: i64) -> PendingGuard {
        PendingGuard {
            registry: self.clone(),
            id,
        }
    }
}

/// Cancels its pending entry on drop, whatever path the waiter exits by.
pub struct PendingGuard {
    registry: PendingRequests,
    id: i64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.registry.cancel(self.id);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq as pa_eq;
    use serde_json::json;

    fn reply(id: i64) -> Message {
        Message::response(json!(id), json!({"roots": []}))
    }

    #[test]
    fn ids_are_monotonic_from_one() {
        let p = PendingRequests::new();
        pa_eq!(p.next_id(), 1);
        pa_eq!(p.next_id(), 2);
        pa_eq!(p.clone().next_id(), 3);
    }

    #[tokio::test]
    async fn resolve_delivers_once() {
        let p = PendingRequests::new();
        let id = p.next_id();
        let rx = p.register(id);
        assert!(p.resolve(id, reply(id)));
        assert!(!p.resolve(id, reply(id)));
        let got = rx.await.unwrap();
        pa_eq!(got.numeric_id(), Some(id));
        assert!(p.is_empty());
    }

    #[test]
    fn resolve_unknown_is_false() {
        let p = PendingRequests::new();
        assert!(!p.resolve(99, reply(99)));
    }

    #[tokio::test]
    async fn cancel_then_resolve_is_false() {
        let p = PendingRequests::new();
        let id = p.next_id();
        let rx = p.register(id);
        assert!(p.cancel(id));
        assert!(!p.cancel(id));
        assert!(!p.resolve(id, reply(id)));
        assert!(rx.await.is_err());
    }

    #[test]
    fn resolve_after_receiver_dropped_still_closes() {
        let p = PendingRequests::new();
        let id = p.next_id();
        drop(p.register(id));
        assert!(p.resolve(id, reply(id)));
        assert!(p.is_empty());
    }

    #[test]
    fn guard_cancels_on_drop() {
        let p = PendingRequests::new();
        let id = p.next_id();
        let _rx = p.register(id);
        {
            let _g = p.guard(id);
            assert!(p.contains(id));
        }
        assert!(!p.contains(id));
    }

    #[test]
    fn cancel_all_empties() {
        let p = PendingRequests::new();
        for _ in 0..3 {
            let id = p.next_id();
            let _ = p.register(id);
        }
        pa_eq!(p.len(), 3);
        p.cancel_all();
        assert!(p.is_empty());
    }
}
