//! External collaborator interfaces the core consumes or is driven by.
//!
//! None of these types are part of the handshake core's concern: opening and closing TCP
//! channels, actually writing bytes to a socket, and arming timers are the transport layer's job.
//! The core only needs the narrow interfaces below, which keeps it lock-free, re-entrant, and
//! free of any suspension points of its own.

use std::time::Duration;

use async_trait::async_trait;

use crate::{error::SendFailureCause, message::HandshakeResponse, node_id::NodeId, version::Version};

/// A freshly-opened transport channel, from the handshake core's point of view.
pub trait Channel: Send + Sync {
    /// Registers a listener that fires at most once, when the channel closes for any reason.
    fn add_close_listener(&self, listener: Box<dyn FnOnce() + Send>);
}

/// Dispatches a framed outbound handshake request on a channel.
#[async_trait]
pub trait RequestSender: Send + Sync {
    async fn send_request(
        &self,
        peer: &NodeId,
        channel: &dyn Channel,
        request_id: u64,
        advertised_version: Version,
    ) -> Result<(), SendFailureCause>;
}

/// Arms a one-shot timeout.
pub trait Scheduler: Send + Sync {
    /// Schedules `action` to run once, after `duration` elapses.
    fn schedule(&self, duration: Duration, action: Box<dyn FnOnce() + Send>);
}

/// The server-side handle used to write a handshake response back to the peer.
pub trait ReplyChannel: Send + Sync {
    fn send_response(&self, response: HandshakeResponse) -> Result<(), SendFailureCause>;
}

/// The server-side view of an inbound handshake request stream.
///
/// `wire_version` is the version the remote reported at the transport-framing level — distinct
/// from (and consulted instead of) whatever optional [`crate::message::HandshakeRequest::version`]
/// the payload itself decodes to.
pub trait HandshakeStream {
    fn wire_version(&self) -> Version;
    /// Takes the stream's remaining undecoded bytes, leaving it empty.
    fn take_remaining(&mut self) -> Vec<u8>;
    /// The number of bytes still available on the stream.
    fn available(&self) -> usize;
}

/// A [`HandshakeStream`] backed by an in-memory buffer, used by the production dispatch layer
/// (which has already read the full frame off the wire) and by tests.
pub struct BufferStream {
    wire_version: Version,
    remaining: Vec<u8>,
}

impl BufferStream {
    pub fn new(wire_version: Version, data: Vec<u8>) -> Self {
        Self {
            wire_version,
            remaining: data,
        }
    }
}

impl HandshakeStream for BufferStream {
    fn wire_version(&self) -> Version {
        self.wire_version
    }

    fn take_remaining(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.remaining)
    }

    fn available(&self) -> usize {
        self.remaining.len()
    }
}

/// Default production [`Scheduler`], backed by `tokio::time::sleep` on a spawned task.
///
/// Under `#[tokio::test(start_paused = true)]`, `tokio::time::sleep` honours the paused/advanced
/// virtual clock, so this same implementation doubles as the "inject a manual clock" seam tests
/// need — no separate fake scheduler is required.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, duration: Duration, action: Box<dyn FnOnce() + Send>) {
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            action();
        });
    }
}
