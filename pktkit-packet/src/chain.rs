//! The layer chain engine
//!
//! A [`Chain`] is an ordered sequence of protocol layers, outermost first.
//! The engine composes chains into wire bytes ([`pack`]), rebuilds chains
//! from bytes when the caller knows the stack ([`unpack`]), and discovers
//! the stack from the decoded headers themselves when it does not
//! ([`unpack_all`]).
//!
//! Packing runs in two passes because of a genuine data dependency: outer
//! headers carry lengths and checksums over bytes that only exist once the
//! inner layers are serialized. The engine therefore binds demux fields
//! outermost-first, then serializes innermost-first, handing each layer the
//! finished bytes of everything it encapsulates.

use crate::raw::RawPayload;
use crate::registry::Registry;
use bytes::BytesMut;
use pktkit_core::{Error, Layer, LayerType, PseudoHeader, Result};
use std::fmt;
use tracing::trace;

/// An ordered sequence of protocol layers, outermost first.
///
/// A chain exclusively owns its layers; it is finite and acyclic by
/// construction. Chains are short-lived single-owner values: build one per
/// packet, use it, drop it.
#[derive(Default)]
pub struct Chain {
    layers: Vec<Box<dyn Layer>>,
}

impl Chain {
    /// Create a chain from layers ordered outermost first
    pub fn new(layers: Vec<Box<dyn Layer>>) -> Self {
        Chain { layers }
    }

    /// Number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Check if the chain has no layers
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// The layers, outermost first
    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    /// Layer at `index`, outermost being 0
    pub fn get(&self, index: usize) -> Option<&dyn Layer> {
        self.layers.get(index).map(|l| l.as_ref())
    }

    /// Iterate over the layers, outermost first
    pub fn iter(&self) -> impl Iterator<Item = &dyn Layer> {
        self.layers.iter().map(|l| l.as_ref())
    }

    /// Tags of all layers, outermost first
    pub fn types(&self) -> Vec<LayerType> {
        self.layers.iter().map(|l| l.layer_type()).collect()
    }

    /// Append a layer as the new innermost
    pub fn push(&mut self, layer: Box<dyn Layer>) {
        self.layers.push(layer);
    }

    /// Find the first layer with the given tag, walking from the head.
    ///
    /// Returns `None` when no layer matches, including on an empty chain.
    pub fn find(&self, ty: LayerType) -> Option<&dyn Layer> {
        self.iter().find(|l| l.layer_type() == ty)
    }

    /// Serialize the chain to its exact wire-format bytes.
    ///
    /// Any layer failing to serialize aborts the whole operation; no
    /// partial bytes are returned.
    pub fn pack(&mut self) -> Result<Vec<u8>> {
        // Bind pass, outermost first: let every header record what it
        // encapsulates before any bytes exist.
        let types = self.types();
        for (i, layer) in self.layers.iter_mut().enumerate() {
            layer.bind(types.get(i + 1).copied())?;
        }

        // Pseudo-header contexts flow from a layer to its immediate payload.
        let mut contexts: Vec<Option<PseudoHeader>> = Vec::with_capacity(self.layers.len() + 1);
        contexts.push(None);
        for layer in self.layers.iter() {
            contexts.push(layer.pseudo_header());
        }

        // Serialize innermost first so outer headers see real payload bytes.
        let mut payload: Vec<u8> = Vec::new();
        for (i, layer) in self.layers.iter().enumerate().rev() {
            let mut buf = BytesMut::with_capacity(layer.header_len() + payload.len());
            layer.serialize(&payload, contexts[i].as_ref(), &mut buf)?;
            buf.extend_from_slice(&payload);
            payload = buf.to_vec();
        }

        Ok(payload)
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.layers.iter()).finish()
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, layer) in self.layers.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{}", layer)?;
        }
        Ok(())
    }
}

/// Serialize layers, outermost first, to their exact wire-format bytes.
///
/// Convenience wrapper over [`Chain::pack`].
pub fn pack(layers: Vec<Box<dyn Layer>>) -> Result<Vec<u8>> {
    Chain::new(layers).pack()
}

/// Rebuild a chain from raw bytes using caller-supplied empty instances.
///
/// Each instance asserts the expected type at its position. Decoding starts
/// at the first byte and advances by each layer's consumed length; errors
/// name the failing index and tag. Bytes left over after the last supplied
/// layer are retained as a trailing [`RawPayload`], not reported as an
/// error.
pub fn unpack(raw: &[u8], mut expected: Vec<Box<dyn Layer>>) -> Result<Chain> {
    let mut cursor = 0usize;

    for (index, layer) in expected.iter_mut().enumerate() {
        let consumed = layer.deserialize(&raw[cursor..]).map_err(|e| Error::Unpack {
            index,
            layer: layer.layer_type(),
            source: Box::new(e),
        })?;
        cursor += consumed;
    }

    let mut chain = Chain::new(expected);
    if cursor < raw.len() {
        chain.push(Box::new(RawPayload::new(raw[cursor..].to_vec())));
    }
    Ok(chain)
}

/// Rebuild a chain from raw bytes, discovering each layer's type from the
/// one before it.
///
/// Uses the built-in decoder registry; see [`unpack_all_with`].
pub fn unpack_all(raw: &[u8], first: LayerType) -> Result<Chain> {
    unpack_all_with(raw, first, &Registry::with_defaults())
}

/// Rebuild a chain from raw bytes with an explicit decoder registry.
///
/// Only the first layer's type is supplied; every subsequent type comes
/// from the decoded layer's own fields. When a discovered type has no
/// registered decoder, or a layer cannot name its payload, decoding stops
/// and the remaining bytes become a terminal [`RawPayload`] - the chain is
/// still valid. A decoder that consumes zero bytes aborts with
/// [`Error::DecodeStall`] instead of looping.
pub fn unpack_all_with(raw: &[u8], first: LayerType, registry: &Registry) -> Result<Chain> {
    let mut chain = Chain::default();
    let mut cursor = 0usize;
    let mut next = Some(first);
    let mut index = 0usize;

    while cursor < raw.len() {
        let ty = match next {
            Some(ty) => ty,
            None => break,
        };
        let mut layer = match registry.build(ty) {
            Some(layer) => layer,
            None => break,
        };

        let consumed = layer.deserialize(&raw[cursor..]).map_err(|e| Error::Unpack {
            index,
            layer: ty,
            source: Box::new(e),
        })?;
        if consumed == 0 {
            return Err(Error::DecodeStall { index, layer: ty });
        }

        cursor += consumed;
        next = layer.payload_type();
        trace!(layer = %ty, consumed, next = ?next, "decoded layer");

        chain.push(layer);
        index += 1;
    }

    if cursor < raw.len() {
        chain.push(Box::new(RawPayload::new(raw[cursor..].to_vec())));
    }
    Ok(chain)
}
