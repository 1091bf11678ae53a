//! Orchestrator for both sides of the handshake: arms a pending entry and dispatches the request
//! on the client side, and decides + sends the response on the server side.
//!
//! A `Handshaker` holds `(local_version, scheduler, request_sender, pending_table, metrics)` and
//! lives as long as the transport layer that owns it — it is not process-global state.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::{
    error::HandshakeError,
    handler::{HandshakeResponseHandler, HandshakeResult},
    message::{HandshakeRequest, HandshakeResponse},
    metrics::Metrics,
    node_id::NodeId,
    pending::PendingTable,
    traits::{Channel, HandshakeStream, ReplyChannel, RequestSender, Scheduler},
    version::{self, Version},
};

/// The protocol action identifier the outer dispatch layer routes handshake frames by.
pub const HANDSHAKE_ACTION_NAME: &str = "internal:tcp/handshake";

/// Orchestrates client-side `send_handshake` and server-side `handle_handshake`.
pub struct Handshaker {
    local_version: Version,
    max_request_frame_bytes: u32,
    scheduler: Arc<dyn Scheduler>,
    request_sender: Arc<dyn RequestSender>,
    pending: PendingTable,
    metrics: Metrics,
    next_request_id: AtomicU64,
}

impl Handshaker {
    pub fn new(
        local_version: Version,
        max_request_frame_bytes: u32,
        scheduler: Arc<dyn Scheduler>,
        request_sender: Arc<dyn RequestSender>,
        metrics: Metrics,
    ) -> Self {
        Self {
            local_version,
            max_request_frame_bytes,
            scheduler,
            request_sender,
            pending: PendingTable::new(),
            metrics,
            next_request_id: AtomicU64::new(1),
        }
    }

    /// The local protocol version this handshaker advertises and validates against.
    pub fn local_version(&self) -> Version {
        self.local_version
    }

    /// Convenience id allocator. Callers may supply their own fresh ids instead; the contract
    /// only requires uniqueness among in-flight handshakes.
    pub fn next_request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// The live size of the pending table.
    pub fn num_pending_handshakes(&self) -> usize {
        self.pending.len()
    }

    /// The monotonic count of `send_handshake` invocations, regardless of outcome.
    pub fn num_handshakes(&self) -> u64 {
        self.metrics.num_handshakes.get() as u64
    }

    /// Removes and returns the handler for `request_id`, if it is still pending.
    ///
    /// Used by the outer response-dispatch layer to find the handler for an inbound response (or
    /// exception) frame before delivering it; see [`Handshaker::handle_response`] and
    /// [`Handshaker::handle_exception`] for the common case.
    pub fn remove_handler(&self, request_id: u64) -> Option<Arc<HandshakeResponseHandler>> {
        let handler = self.pending.remove(request_id);
        if handler.is_some() {
            self.metrics.num_pending_handshakes.dec();
        }
        handler
    }

    /// Atomically removes `request_id` from the pending table and, only if it was still present,
    /// resolves `handler` with `error`. Returns whether this call won the completion race.
    ///
    /// This two-step gate — table removal, then the `done` CAS inside the handler — is what makes
    /// the racing local-exception sources (timeout, send failure, channel close) idempotent with
    /// each other and with a concurrently-arriving response.
    fn fail_pending(
        &self,
        request_id: u64,
        handler: &HandshakeResponseHandler,
        error: HandshakeError,
    ) -> bool {
        if self.remove_handler(request_id).is_none() {
            warn!(
                request_id,
                "local-exception handler fired after the pending entry was already removed"
            );
            return false;
        }
        handler.complete_if_undone(Err(error))
    }

    /// Delivers a decoded handshake response frame for `request_id`, if still pending. A response
    /// for an unknown or already-completed request is dropped silently — it lost the race.
    pub fn handle_response(&self, request_id: u64, frame: &[u8]) -> Result<(), HandshakeError> {
        match self.remove_handler(request_id) {
            Some(handler) => match HandshakeResponse::decode(frame) {
                Ok((response, _rest)) => {
                    debug!(request_id, version = %response.version, "handshake response received");
                    handler.on_response(response.version);
                    Ok(())
                }
                Err(err) => {
                    // The handler was already taken out of the pending table above, so if we
                    // don't resolve it here ourselves, nothing ever will.
                    handler.complete_if_undone(Err(HandshakeError::Codec(err)));
                    Err(HandshakeError::Codec(err))
                }
            },
            None => {
                debug!(request_id, "dropping response for unknown or completed handshake");
                Ok(())
            }
        }
    }

    /// Delivers a locally-observed transport exception reported against `request_id`.
    pub fn handle_exception(&self, request_id: u64, cause: String) {
        if let Some(handler) = self.remove_handler(request_id) {
            handler.on_exception(cause);
        }
    }

    /// Client path: arms a pending entry, fires off the request dispatch in the background, and
    /// only then arms the timeout. This mirrors the order the wire protocol cares about — the
    /// clock starts once dispatch has actually been attempted, not before — and keeps this
    /// function itself free of any suspension point: `request_sender.send_request` runs on a
    /// spawned task rather than being awaited inline here.
    ///
    /// Every early-exit path removes the pending entry exactly once.
    pub async fn send_handshake(
        self: &Arc<Self>,
        request_id: u64,
        peer: NodeId,
        channel: Arc<dyn Channel>,
        timeout: Duration,
    ) -> oneshot::Receiver<HandshakeResult> {
        self.metrics.num_handshakes.inc();

        let (tx, rx) = oneshot::channel();
        let handler = Arc::new(HandshakeResponseHandler::new(request_id, self.local_version, tx));

        self.pending.insert(request_id, Arc::clone(&handler));
        self.metrics.num_pending_handshakes.inc();

        {
            let this = Arc::clone(self);
            let handler = Arc::clone(&handler);
            channel.add_close_listener(Box::new(move || {
                this.fail_pending(request_id, &handler, HandshakeError::ConnectionReset);
            }));
        }

        let advertised_version = version::advertised_min_compat_version(self.local_version);

        {
            let this = Arc::clone(self);
            let handler = Arc::clone(&handler);
            let channel = Arc::clone(&channel);
            let peer = peer.clone();
            tokio::spawn(async move {
                if let Err(cause) = this
                    .request_sender
                    .send_request(&peer, channel.as_ref(), request_id, advertised_version)
                    .await
                {
                    let won =
                        this.fail_pending(request_id, &handler, HandshakeError::SendFailure { cause });
                    debug_assert!(
                        won || this.pending.get(request_id).is_none(),
                        "pending entry must not be orphaned after a send failure"
                    );
                }
            });
        }

        {
            let this = Arc::clone(self);
            let handler = Arc::clone(&handler);
            self.scheduler.schedule(
                timeout,
                Box::new(move || {
                    this.fail_pending(
                        request_id,
                        &handler,
                        HandshakeError::Timeout { peer, duration: timeout },
                    );
                }),
            );
        }

        rx
    }

    /// Server path: decodes a handshake request, asserts the stream is fully drained, and writes
    /// back the selected response version.
    pub fn handle_handshake(
        &self,
        reply_channel: &dyn ReplyChannel,
        request_id: u64,
        stream: &mut dyn HandshakeStream,
    ) -> Result<(), HandshakeError> {
        let remote_wire_version = stream.wire_version();
        let request_bytes = stream.take_remaining();

        let (request, rest) =
            HandshakeRequest::decode_with_limit(&request_bytes, self.max_request_frame_bytes as usize)?;
        if !rest.is_empty() {
            return Err(HandshakeError::ProtocolError {
                request_id,
                available: rest.len(),
            });
        }

        debug!(
            request_id,
            claimed_version = ?request.version,
            %remote_wire_version,
            "handshake request received"
        );

        let response_version =
            version::select_response_version(self.local_version, remote_wire_version);
        let response = HandshakeResponse::new(response_version);

        reply_channel
            .send_response(response)
            .map_err(|cause| HandshakeError::SendFailure { cause })
    }

    /// The configured cap on a handshake request's inner frame size.
    pub fn max_request_frame_bytes(&self) -> u32 {
        self.max_request_frame_bytes
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use prometheus::Registry;

    use super::*;
    use crate::{
        error::SendFailureCause,
        traits::BufferStream,
        version::{V_1_0_0, V_2_0_0},
    };

    struct FakeChannel {
        close_listener: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    }

    impl FakeChannel {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                close_listener: Mutex::new(None),
            })
        }

        fn close(&self) {
            if let Some(listener) = self.close_listener.lock().unwrap().take() {
                listener();
            }
        }
    }

    impl Channel for FakeChannel {
        fn add_close_listener(&self, listener: Box<dyn FnOnce() + Send>) {
            *self.close_listener.lock().unwrap() = Some(listener);
        }
    }

    struct FakeScheduler {
        armed: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    }

    impl FakeScheduler {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                armed: Mutex::new(None),
            })
        }

        fn fire(&self) {
            if let Some(action) = self.armed.lock().unwrap().take() {
                action();
            }
        }
    }

    impl Scheduler for FakeScheduler {
        fn schedule(&self, _duration: Duration, action: Box<dyn FnOnce() + Send>) {
            *self.armed.lock().unwrap() = Some(action);
        }
    }

    struct OkRequestSender;

    #[async_trait]
    impl RequestSender for OkRequestSender {
        async fn send_request(
            &self,
            _peer: &NodeId,
            _channel: &dyn Channel,
            _request_id: u64,
            _advertised_version: Version,
        ) -> Result<(), SendFailureCause> {
            Ok(())
        }
    }

    struct FailingRequestSender;

    #[async_trait]
    impl RequestSender for FailingRequestSender {
        async fn send_request(
            &self,
            _peer: &NodeId,
            _channel: &dyn Channel,
            _request_id: u64,
            _advertised_version: Version,
        ) -> Result<(), SendFailureCause> {
            Err(SendFailureCause::Other("connection refused".into()))
        }
    }

    struct RecordingReplyChannel {
        sent: Mutex<Option<HandshakeResponse>>,
    }

    impl RecordingReplyChannel {
        fn new() -> Self {
            Self {
                sent: Mutex::new(None),
            }
        }
    }

    impl ReplyChannel for RecordingReplyChannel {
        fn send_response(&self, response: HandshakeResponse) -> Result<(), SendFailureCause> {
            *self.sent.lock().unwrap() = Some(response);
            Ok(())
        }
    }

    fn make_handshaker(sender: Arc<dyn RequestSender>, scheduler: Arc<dyn Scheduler>) -> Arc<Handshaker> {
        let registry = Registry::new();
        let metrics = Metrics::new(&registry).unwrap();
        Arc::new(Handshaker::new(V_2_0_0, 1024, scheduler, sender, metrics))
    }

    #[tokio::test]
    async fn response_resolves_ok_and_empties_pending_table() {
        let scheduler = FakeScheduler::new();
        let handshaker = make_handshaker(Arc::new(OkRequestSender), scheduler);
        let channel = FakeChannel::new();

        let rx = handshaker
            .send_handshake(1, NodeId::new("peer-a"), channel, Duration::from_secs(5))
            .await;
        assert_eq!(handshaker.num_pending_handshakes(), 1);
        assert_eq!(handshaker.num_handshakes(), 1);

        handshaker
            .handle_response(1, &HandshakeResponse::new(V_2_0_0).encode().unwrap())
            .unwrap();

        assert_eq!(handshaker.num_pending_handshakes(), 0);
        assert_matches!(rx.await.unwrap(), Ok(v) if v == V_2_0_0);
    }

    #[tokio::test]
    async fn incompatible_response_resolves_unsupported_version() {
        let scheduler = FakeScheduler::new();
        let handshaker = make_handshaker(Arc::new(OkRequestSender), scheduler);
        let channel = FakeChannel::new();

        let rx = handshaker
            .send_handshake(1, NodeId::new("peer-a"), channel, Duration::from_secs(5))
            .await;

        let remote = Version::new(9, 0, 0, 0);
        handshaker
            .handle_response(1, &HandshakeResponse::new(remote).encode().unwrap())
            .unwrap();

        assert_eq!(handshaker.num_pending_handshakes(), 0);
        assert_matches!(
            rx.await.unwrap(),
            Err(HandshakeError::UnsupportedVersion { .. })
        );
    }

    #[tokio::test]
    async fn timeout_resolves_and_a_later_response_is_dropped() {
        let scheduler = FakeScheduler::new();
        let handshaker = make_handshaker(Arc::new(OkRequestSender), Arc::clone(&scheduler) as Arc<dyn Scheduler>);
        let channel = FakeChannel::new();

        let rx = handshaker
            .send_handshake(1, NodeId::new("peer-a"), channel, Duration::from_millis(50))
            .await;

        scheduler.fire();
        assert_eq!(handshaker.num_pending_handshakes(), 0);
        assert_matches!(rx.await.unwrap(), Err(HandshakeError::Timeout { .. }));

        // The real response arrives microseconds later: dropped silently, no panic, no
        // resurrection of the pending entry.
        handshaker
            .handle_response(1, &HandshakeResponse::new(V_2_0_0).encode().unwrap())
            .unwrap();
        assert_eq!(handshaker.num_handshakes(), 1);
        assert_eq!(handshaker.num_pending_handshakes(), 0);
    }

    #[tokio::test]
    async fn channel_close_resolves_connection_reset() {
        let scheduler = FakeScheduler::new();
        let handshaker = make_handshaker(Arc::new(OkRequestSender), scheduler);
        let channel = FakeChannel::new();
        let channel_for_close = Arc::clone(&channel);

        let rx = handshaker
            .send_handshake(1, NodeId::new("peer-a"), channel, Duration::from_secs(5))
            .await;

        channel_for_close.close();

        assert_matches!(rx.await.unwrap(), Err(HandshakeError::ConnectionReset));
        assert_eq!(handshaker.num_pending_handshakes(), 0);
    }

    #[tokio::test]
    async fn send_failure_resolves_and_does_not_orphan_the_pending_entry() {
        let scheduler = FakeScheduler::new();
        let handshaker = make_handshaker(Arc::new(FailingRequestSender), scheduler);
        let channel = FakeChannel::new();

        let rx = handshaker
            .send_handshake(1, NodeId::new("peer-a"), channel, Duration::from_secs(5))
            .await;

        assert_matches!(rx.await.unwrap(), Err(HandshakeError::SendFailure { .. }));
        assert_eq!(handshaker.num_pending_handshakes(), 0);
    }

    #[test]
    fn server_path_responds_with_legacy_version_for_rolling_upgrade_peer() {
        let registry = Registry::new();
        let metrics = Metrics::new(&registry).unwrap();
        let handshaker = Handshaker::new(
            V_1_0_0,
            1024,
            Arc::new(FakeScheduler { armed: Mutex::new(None) }) as Arc<dyn Scheduler>,
            Arc::new(OkRequestSender) as Arc<dyn RequestSender>,
            metrics,
        );
        let reply = RecordingReplyChannel::new();
        let body = HandshakeRequest::new(None).encode().unwrap();
        let mut stream = BufferStream::new(crate::version::RECV_LEGACY_SIGNAL_5_6, body);

        handshaker.handle_handshake(&reply, 7, &mut stream).unwrap();

        assert_eq!(
            reply.sent.lock().unwrap().unwrap().version,
            crate::version::V_7_10_2
        );
    }

    #[test]
    fn server_path_rejects_trailing_bytes_as_protocol_error() {
        let registry = Registry::new();
        let metrics = Metrics::new(&registry).unwrap();
        let handshaker = Handshaker::new(
            V_2_0_0,
            1024,
            Arc::new(FakeScheduler { armed: Mutex::new(None) }) as Arc<dyn Scheduler>,
            Arc::new(OkRequestSender) as Arc<dyn RequestSender>,
            metrics,
        );
        let reply = RecordingReplyChannel::new();
        let mut body = HandshakeRequest::new(Some(V_2_0_0)).encode().unwrap();
        body.push(0xFF); // exactly one trailing byte
        let mut stream = BufferStream::new(V_2_0_0, body);

        let result = handshaker.handle_handshake(&reply, 7, &mut stream);
        assert_matches!(
            result,
            Err(HandshakeError::ProtocolError { request_id: 7, available: 1 })
        );
    }
}
