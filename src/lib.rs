//! The transport handshake protocol.
//!
//! Negotiates a mutually acceptable wire version between two nodes of a freshly-opened transport
//! channel before any cluster-level traffic is permitted on it. A node of version `V_local`
//! discovers the version `V_remote` of its peer, applies the version-compatibility rules in
//! [`version`], and either returns the negotiated version or fails the connection with a typed
//! [`error::HandshakeError`] — even when the peer is older, newer, or a legacy sibling
//! implementation that shares the same transport but reports a foreign version family.
//!
//! This crate does not open or own TCP channels, authenticate, encrypt, multiplex, or retry; see
//! [`traits`] for the narrow collaborator interfaces it is driven through.

pub mod bytesrepr;
pub mod config;
pub mod error;
pub mod handler;
pub mod handshaker;
pub mod message;
pub mod metrics;
mod node_id;
pub mod pending;
pub mod traits;
pub mod version;

pub use error::HandshakeError;
pub use handshaker::{Handshaker, HANDSHAKE_ACTION_NAME};
pub use message::{HandshakeRequest, HandshakeResponse};
pub use node_id::NodeId;
pub use version::Version;
