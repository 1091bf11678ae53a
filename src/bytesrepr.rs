//! Minimal bit-exact binary encoding, in the tradition of `casper_types::bytesrepr`: no serde,
//! no self-describing tags, just `ToBytes`/`FromBytes` impls that produce and consume an exact
//! byte layout.

use thiserror::Error;

/// An error encountered while encoding or decoding a value.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum Error {
    /// The input ended before a value could be fully read.
    #[error("early end of stream")]
    EarlyEndOfStream,
    /// A length-prefixed blob's declared length ran past its maximum.
    #[error("declared length {0} exceeds maximum")]
    MaximumLengthExceeded(usize),
}

/// Encodes a value into its exact wire representation.
pub trait ToBytes {
    /// Appends this value's wire representation to `writer`.
    fn write_bytes(&self, writer: &mut Vec<u8>) -> Result<(), Error>;

    /// Returns this value's wire representation as a freshly allocated buffer.
    fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        self.write_bytes(&mut out)?;
        Ok(out)
    }
}

/// Decodes a value from its exact wire representation, returning the unconsumed remainder.
pub trait FromBytes: Sized {
    /// Reads one value from the front of `bytes`, returning it along with whatever is left.
    fn from_bytes(bytes: &[u8]) -> Result<(Self, &[u8]), Error>;
}

impl ToBytes for u32 {
    fn write_bytes(&self, writer: &mut Vec<u8>) -> Result<(), Error> {
        writer.extend_from_slice(&self.to_be_bytes());
        Ok(())
    }
}

impl FromBytes for u32 {
    fn from_bytes(bytes: &[u8]) -> Result<(Self, &[u8]), Error> {
        if bytes.len() < 4 {
            return Err(Error::EarlyEndOfStream);
        }
        let (head, rest) = bytes.split_at(4);
        let mut buf = [0u8; 4];
        buf.copy_from_slice(head);
        Ok((u32::from_be_bytes(buf), rest))
    }
}

/// The maximum size of a bytes-reference's inner blob this crate will ever decode.
pub const MAX_BYTES_REF_LEN: usize = 1024 * 1024;

/// Writes a length-prefixed "bytes-reference": a 4-byte big-endian length followed by `data`.
///
/// This indirection lets a peer that does not understand the inner contents skip the blob
/// cleanly, which is the forward-compatibility trick the handshake request relies on for its
/// optional version field.
pub fn write_bytes_ref(data: &[u8], writer: &mut Vec<u8>) -> Result<(), Error> {
    if data.len() > MAX_BYTES_REF_LEN {
        return Err(Error::MaximumLengthExceeded(data.len()));
    }
    (data.len() as u32).write_bytes(writer)?;
    writer.extend_from_slice(data);
    Ok(())
}

/// Reads a length-prefixed "bytes-reference", returning the inner blob and the remainder.
///
/// Returns `Err(EarlyEndOfStream)` if even the length prefix could not be read; callers that
/// want to treat a missing bytes-reference as "absent" rather than an error should match on
/// that variant explicitly (see `HandshakeRequest::decode`).
pub fn read_bytes_ref(bytes: &[u8]) -> Result<(&[u8], &[u8]), Error> {
    read_bytes_ref_with_limit(bytes, MAX_BYTES_REF_LEN)
}

/// As [`read_bytes_ref`], but rejects a declared length greater than `max_len` instead of the
/// crate-wide [`MAX_BYTES_REF_LEN`] ceiling. Lets callers apply a caller-configured cap (e.g.
/// [`crate::config::HandshakeConfig::max_request_frame_bytes`]) without allocating past it.
pub fn read_bytes_ref_with_limit(bytes: &[u8], max_len: usize) -> Result<(&[u8], &[u8]), Error> {
    let (len, rest) = u32::from_bytes(bytes)?;
    let len = len as usize;
    if len > max_len {
        return Err(Error::MaximumLengthExceeded(len));
    }
    if rest.len() < len {
        return Err(Error::EarlyEndOfStream);
    }
    Ok(rest.split_at(len))
}
