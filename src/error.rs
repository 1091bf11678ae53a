//! Error taxonomy for the handshake protocol.
//!
//! All client-side variants are surfaced exactly once through the caller's completion sink; the
//! core never retries. Server-side errors are the dispatch layer's problem to handle.

use std::time::Duration;

use thiserror::Error;

use crate::{bytesrepr, node_id::NodeId, version::Version};

/// The reason a [`crate::traits::RequestSender`] or [`crate::traits::ReplyChannel`] failed
/// synchronously.
#[derive(Debug, Error)]
pub enum SendFailureCause {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

/// A terminal handshake outcome other than a negotiated [`Version`].
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The channel closed before a response arrived.
    #[error("connection reset before a handshake response arrived")]
    ConnectionReset,

    /// The scheduled deadline fired before a response arrived.
    #[error("handshake with {peer} timed out after {duration:?}")]
    Timeout { peer: NodeId, duration: Duration },

    /// The `RequestSender` (or, server-side, the `ReplyChannel`) threw synchronously.
    #[error("failed to send handshake frame: {cause}")]
    SendFailure {
        #[source]
        cause: SendFailureCause,
    },

    /// The response decoded cleanly but `local.is_compatible(remote)` returned false.
    #[error("unsupported remote version: local={local}, remote={remote}")]
    UnsupportedVersion { local: Version, remote: Version },

    /// The remote reported a transport-level exception instead of a response.
    #[error("remote reported a handshake failure: {cause}")]
    HandshakeFailed { cause: String },

    /// The server-side request decode left bytes on the stream after the handshake body.
    #[error("protocol error on request {request_id}: {available} bytes left on stream")]
    ProtocolError { request_id: u64, available: usize },

    /// A codec-level I/O error decoding or encoding a handshake frame.
    #[error("handshake codec error: {0}")]
    Codec(#[from] bytesrepr::Error),
}
