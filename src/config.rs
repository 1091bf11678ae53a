//! Handshake-layer configuration.
//!
//! This is configuration for the handshake protocol only, not a full node/cluster config file;
//! the transport layer that owns a [`crate::handshaker::Handshaker`] is expected to embed
//! [`HandshakeConfig`] as one section of its own larger config.

use std::time::Duration;

use serde::Deserialize;

/// Configuration consulted by [`crate::handshaker::Handshaker`].
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandshakeConfig {
    /// Timeout applied to a handshake when the caller of `send_handshake` does not override it.
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,

    /// Upper bound on the inner bytes-reference blob read while decoding a handshake request.
    /// Mirrors the defensive `max_length` cap the teacher applies in its own frame reader.
    pub max_request_frame_bytes: u32,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            max_request_frame_bytes: 1024,
        }
    }
}
