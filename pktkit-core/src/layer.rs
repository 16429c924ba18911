//! The codec capability contract implemented by every protocol header.

use crate::{LayerType, Result};
use bytes::BytesMut;
use std::any::Any;
use std::fmt;
use std::net::Ipv4Addr;

/// Checksum context a network layer hands to its transport payload.
///
/// Source and destination addresses plus the protocol number form the
/// pseudo-header that TCP and UDP checksums cover in addition to the
/// segment bytes themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PseudoHeader {
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub protocol: u8,
}

/// One protocol header within a packet chain.
///
/// Implementations are plain data carriers: `serialize` emits exactly the
/// header bytes and `deserialize` consumes exactly the header bytes, so the
/// chain engine can drive any stack of them without protocol knowledge.
///
/// Serialization runs innermost-first. A layer receives the fully serialized
/// bytes of everything it encapsulates, which is what lets it fill in fields
/// like total length or a checksum covering payload bytes.
pub trait Layer: fmt::Debug + fmt::Display + Send {
    /// Tag of this layer
    fn layer_type(&self) -> LayerType;

    /// Serialized header length in bytes, options included
    fn header_len(&self) -> usize;

    /// Record what this layer encapsulates.
    ///
    /// Called outermost-first before serialization so demux fields (an
    /// Ethernet ethertype, an IPv4 protocol number) reflect the actual
    /// payload. A `Raw` or absent payload must leave the stored field
    /// untouched: a chain decoded from an unknown upper protocol has to
    /// re-serialize byte-identically.
    fn bind(&mut self, _payload: Option<LayerType>) -> Result<()> {
        Ok(())
    }

    /// Checksum context this layer provides to its immediate payload
    fn pseudo_header(&self) -> Option<PseudoHeader> {
        None
    }

    /// Append this layer's header bytes to `buf`.
    ///
    /// `payload` holds the already serialized bytes of every inner layer;
    /// `ctx` is the enclosing layer's pseudo-header, if it provides one.
    fn serialize(
        &self,
        payload: &[u8],
        ctx: Option<&PseudoHeader>,
        buf: &mut BytesMut,
    ) -> Result<()>;

    /// Parse this layer's header from the front of `data`, returning the
    /// number of bytes consumed.
    fn deserialize(&mut self, data: &[u8]) -> Result<usize>;

    /// Payload tag discovered from decoded fields, if this protocol can
    /// name what it carries.
    fn payload_type(&self) -> Option<LayerType> {
        None
    }

    /// Concrete-type access for chains built speculatively
    fn as_any(&self) -> &dyn Any;
}
