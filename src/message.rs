//! Handshake payload value types and their bit-exact wire codec.
//!
//! Encoding is length-tolerant on the request (so old peers that don't know the version field can
//! skip it cleanly) and strict on the response. Neither type encodes the outer transport
//! request/response header; that framing is inherited from the surrounding transport and is out
//! of scope here.

use crate::{
    bytesrepr::{self, read_bytes_ref_with_limit, write_bytes_ref},
    version::{read_version, write_version, Version},
};

/// The payload of a handshake request: a single optional advertised [`Version`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandshakeRequest {
    pub version: Option<Version>,
}

impl HandshakeRequest {
    pub fn new(version: Option<Version>) -> Self {
        Self { version }
    }

    /// Encodes the body as a length-prefixed bytes-reference whose inner blob, if present, is
    /// exactly `write_version(version)`.
    pub fn encode(&self) -> Result<Vec<u8>, bytesrepr::Error> {
        let mut inner = Vec::new();
        if let Some(version) = self.version {
            write_version(version, &mut inner)?;
        }
        let mut out = Vec::new();
        write_bytes_ref(&inner, &mut out)?;
        Ok(out)
    }

    /// Decodes the body from the front of `bytes`.
    ///
    /// If reading the length-prefixed bytes-reference hits end-of-stream entirely (an old peer
    /// that never sent the field), the inner version is `None` and the whole input is treated as
    /// consumed. A present-but-empty inner blob also yields `None`, without error.
    pub fn decode(bytes: &[u8]) -> Result<(Self, &[u8]), bytesrepr::Error> {
        Self::decode_with_limit(bytes, bytesrepr::MAX_BYTES_REF_LEN)
    }

    /// As [`Self::decode`], but rejects an inner blob declared larger than `max_len` (see
    /// [`crate::config::HandshakeConfig::max_request_frame_bytes`]).
    pub fn decode_with_limit(bytes: &[u8], max_len: usize) -> Result<(Self, &[u8]), bytesrepr::Error> {
        match read_bytes_ref_with_limit(bytes, max_len) {
            Ok((inner, rest)) => {
                let version = if inner.is_empty() {
                    None
                } else {
                    let (version, leftover) = read_version(inner)?;
                    debug_assert!(leftover.is_empty(), "inner version blob had trailing bytes");
                    Some(version)
                };
                Ok((HandshakeRequest { version }, rest))
            }
            Err(bytesrepr::Error::EarlyEndOfStream) => {
                Ok((HandshakeRequest { version: None }, &[]))
            }
            Err(other) => Err(other),
        }
    }
}

/// The payload of a handshake response: a single [`Version`], encoded with no length wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeResponse {
    pub version: Version,
}

impl HandshakeResponse {
    pub fn new(version: Version) -> Self {
        Self { version }
    }

    pub fn encode(&self) -> Result<Vec<u8>, bytesrepr::Error> {
        let mut out = Vec::new();
        write_version(self.version, &mut out)?;
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<(Self, &[u8]), bytesrepr::Error> {
        let (version, rest) = read_version(bytes)?;
        Ok((HandshakeResponse { version }, rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::V_2_0_0;

    #[test]
    fn request_round_trips_with_a_version() {
        let req = HandshakeRequest::new(Some(V_2_0_0));
        let encoded = req.encode().unwrap();
        let (decoded, rest) = HandshakeRequest::decode(&encoded).unwrap();
        assert_eq!(decoded, req);
        assert!(rest.is_empty());
    }

    #[test]
    fn request_round_trips_without_a_version() {
        let req = HandshakeRequest::new(None);
        let encoded = req.encode().unwrap();
        let (decoded, rest) = HandshakeRequest::decode(&encoded).unwrap();
        assert_eq!(decoded, req);
        assert!(rest.is_empty());
    }

    #[test]
    fn empty_inner_payload_yields_none_without_error() {
        // Zero-length bytes-reference: present, but empty.
        let mut bytes = Vec::new();
        bytesrepr::write_bytes_ref(&[], &mut bytes).unwrap();
        let (decoded, rest) = HandshakeRequest::decode(&bytes).unwrap();
        assert_eq!(decoded.version, None);
        assert!(rest.is_empty());
    }

    #[test]
    fn missing_bytes_reference_yields_none_without_error() {
        // An old peer that never wrote the field at all: the stream just ends.
        let (decoded, rest) = HandshakeRequest::decode(&[]).unwrap();
        assert_eq!(decoded.version, None);
        assert!(rest.is_empty());
    }

    #[test]
    fn response_round_trips() {
        let resp = HandshakeResponse::new(V_2_0_0);
        let encoded = resp.encode().unwrap();
        let (decoded, rest) = HandshakeResponse::decode(&encoded).unwrap();
        assert_eq!(decoded, resp);
        assert!(rest.is_empty());
    }
}
