//! Per-handshake completion state.
//!
//! `HandshakeResponseHandler` holds the one-shot completion slot for a single in-flight
//! handshake. Its `done` flag transitions `false -> true` exactly once (enforced by a
//! compare-and-set); every terminal signal after the first is silently dropped. Response-frame
//! handling runs on the calling thread — there is no thread hop and no blocking operation here.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use tokio::sync::oneshot;
use tracing::debug;

use crate::{error::HandshakeError, version::Version};

/// The outcome delivered to a handshake's completion sink.
pub type HandshakeResult = Result<Version, HandshakeError>;

/// The one-shot completion handle for a single in-flight handshake.
pub struct HandshakeResponseHandler {
    request_id: u64,
    local_version: Version,
    sink: Mutex<Option<oneshot::Sender<HandshakeResult>>>,
    done: AtomicBool,
}

impl HandshakeResponseHandler {
    pub fn new(
        request_id: u64,
        local_version: Version,
        sink: oneshot::Sender<HandshakeResult>,
    ) -> Self {
        Self {
            request_id,
            local_version,
            sink: Mutex::new(Some(sink)),
            done: AtomicBool::new(false),
        }
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    fn fire(&self, result: HandshakeResult) {
        let sink = self
            .sink
            .lock()
            .expect("handshake completion sink mutex poisoned")
            .take();
        if let Some(sink) = sink {
            // The receiver may already be gone (caller dropped the future); that's the caller's
            // business, not ours.
            let _ = sink.send(result);
        }
    }

    /// Compare-and-sets `done` and, only on the winning call, resolves the completion sink.
    /// Returns whether this call won the race.
    pub(crate) fn complete_if_undone(&self, result: HandshakeResult) -> bool {
        if self
            .done
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(
                request_id = self.request_id,
                "dropping late handshake terminal event"
            );
            return false;
        }
        self.fire(result);
        true
    }

    /// Completes the handler in response to a decoded response frame.
    ///
    /// The caller (normally [`crate::handshaker::Handshaker::handle_response`]) is expected to
    /// have already removed this handler from the `PendingTable`; that removal, not this call, is
    /// what makes a response racing a timeout/close resolve idempotently.
    pub fn on_response(&self, remote_version: Version) -> bool {
        let result = if self.local_version.is_compatible(remote_version) {
            Ok(remote_version)
        } else {
            Err(HandshakeError::UnsupportedVersion {
                local: self.local_version,
                remote: remote_version,
            })
        };
        self.complete_if_undone(result)
    }

    /// Completes the handler because the remote reported a transport-level exception.
    pub fn on_exception(&self, cause: String) -> bool {
        self.complete_if_undone(Err(HandshakeError::HandshakeFailed { cause }))
    }
}
