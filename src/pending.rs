//! The concurrent map from request id to in-flight handshake handler.
//!
//! `PendingTable` is the single source of truth for "is this handshake still live?" — removal is
//! the synchronization point that elects one of the racing terminal events ({response, timeout,
//! channel-close, send-failure}) as the winner. No iteration is required, so a `DashMap` (sharded,
//! lock-free on the read path) is a better fit here than a single `Mutex<HashMap<_>>`.

use std::sync::Arc;

use dashmap::DashMap;

use crate::handler::HandshakeResponseHandler;

/// A concurrent map from request id to the response handler awaiting its terminal event.
#[derive(Default)]
pub struct PendingTable {
    inner: DashMap<u64, Arc<HandshakeResponseHandler>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    pub fn insert(&self, request_id: u64, handler: Arc<HandshakeResponseHandler>) {
        self.inner.insert(request_id, handler);
    }

    /// Atomically removes and returns the handler for `request_id`, if it is still pending.
    ///
    /// This is the linearisation point for "who owns completion": whichever caller observes
    /// `Some(_)` here is the one allowed to resolve the handler.
    pub fn remove(&self, request_id: u64) -> Option<Arc<HandshakeResponseHandler>> {
        self.inner.remove(&request_id).map(|(_, handler)| handler)
    }

    pub fn get(&self, request_id: u64) -> Option<Arc<HandshakeResponseHandler>> {
        self.inner.get(&request_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
