//! Error types for pktkit

use crate::types::LayerType;
use thiserror::Error;

/// Result type alias for pktkit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pktkit
///
/// Construction is strict, evaluation is lenient: decoding and packing
/// surface every structural problem through this enum, while match-time
/// conditions (a frame too short for a filter instruction) are plain
/// non-matches and never reach it.
#[derive(Error, Debug)]
pub enum Error {
    /// Buffer too short for a layer's declared minimum length
    #[error("short buffer for {layer}: need {needed} bytes, {available} available")]
    ShortBuffer {
        layer: LayerType,
        needed: usize,
        available: usize,
    },

    /// A layer's own structural validation failed
    #[error("malformed {layer} header: {reason}")]
    Malformed { layer: LayerType, reason: String },

    /// A layer's fields are insufficient to serialize
    #[error("cannot pack {layer} layer: {reason}")]
    Pack { layer: LayerType, reason: String },

    /// Decode error at a known chain position
    #[error("layer {index} ({layer}): {source}")]
    Unpack {
        index: usize,
        layer: LayerType,
        #[source]
        source: Box<Error>,
    },

    /// A decoder made no forward progress
    #[error("layer {index} ({layer}) consumed no bytes, aborting decode")]
    DecodeStall { index: usize, layer: LayerType },

    /// Invalid hardware or protocol address text
    #[error("invalid address: {0}")]
    Address(String),

    /// Unparsable classifier expression
    #[error("filter syntax error: {0}")]
    FilterSyntax(String),

    /// Unknown protocol or predicate keyword in a classifier expression
    #[error("unknown filter keyword '{0}'")]
    FilterKeyword(String),

    /// Predicate incompatible with the link type the filter is compiled for
    #[error("predicate '{predicate}' is not supported on link type {link}")]
    FilterLinkType { predicate: String, link: LayerType },

    /// Generated program exceeds the instruction set's jump range
    #[error("filter expression too complex: {0}")]
    FilterTooComplex(String),
}

impl Error {
    /// Create a malformed-header error
    pub fn malformed<S: Into<String>>(layer: LayerType, reason: S) -> Self {
        Error::Malformed {
            layer,
            reason: reason.into(),
        }
    }

    /// Create a packing error
    pub fn pack<S: Into<String>>(layer: LayerType, reason: S) -> Self {
        Error::Pack {
            layer,
            reason: reason.into(),
        }
    }

    /// Create a short-buffer error
    pub fn short(layer: LayerType, needed: usize, available: usize) -> Self {
        Error::ShortBuffer {
            layer,
            needed,
            available,
        }
    }

    /// Create a filter syntax error
    pub fn syntax<S: Into<String>>(reason: S) -> Self {
        Error::FilterSyntax(reason.into())
    }
}
