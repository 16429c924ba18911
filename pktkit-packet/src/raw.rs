//! Opaque payload bytes
//!
//! The terminal layer of a chain: whatever no registered decoder claims is
//! carried verbatim so a decoded chain always re-serializes byte-identically.

use bytes::{BufMut, BytesMut};
use pktkit_core::{Layer, LayerType, PseudoHeader, Result};
use std::any::Any;
use std::fmt;

/// Opaque payload carrier
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawPayload {
    /// The payload bytes
    pub data: Vec<u8>,
}

impl RawPayload {
    /// Create a raw payload from bytes
    pub fn new(data: Vec<u8>) -> Self {
        RawPayload { data }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Display for RawPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "raw {} bytes", self.data.len())
    }
}

impl Layer for RawPayload {
    fn layer_type(&self) -> LayerType {
        LayerType::Raw
    }

    fn header_len(&self) -> usize {
        self.data.len()
    }

    fn serialize(
        &self,
        _payload: &[u8],
        _ctx: Option<&PseudoHeader>,
        buf: &mut BytesMut,
    ) -> Result<()> {
        buf.put_slice(&self.data);
        Ok(())
    }

    fn deserialize(&mut self, data: &[u8]) -> Result<usize> {
        self.data = data.to_vec();
        Ok(data.len())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumes_everything() {
        let mut raw = RawPayload::default();
        let consumed = raw.deserialize(&[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(consumed, 5);
        assert_eq!(raw.data, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_serialize_verbatim() {
        let raw = RawPayload::new(vec![0xde, 0xad, 0xbe, 0xef]);
        let mut buf = BytesMut::new();
        raw.serialize(&[], None, &mut buf).unwrap();
        assert_eq!(&buf[..], &[0xde, 0xad, 0xbe, 0xef]);
    }
}
