//! A minimal peer identity, opaque to the handshake core.
//!
//! The core only needs something `Display`-able to put in error messages and something
//! `Clone + Eq + Hash` to key metrics and logs by; it does not need to know how a node id is
//! actually derived (public key fingerprint, listening address, etc.) — that is the transport
//! layer's concern.

use derive_more::Display;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Display)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}
