//! Core types for the pktkit packet analysis toolkit.
//!
//! This crate provides the fundamental pieces shared by the codec and filter
//! crates:
//!
//! - [`LayerType`] - the tag identifying a protocol layer within a chain
//! - [`MacAddr`] - a 6-byte hardware address
//! - [`Layer`] - the capability contract every protocol codec implements
//! - [`Error`] / [`Result`] - the workspace-wide error type

pub mod error;
pub mod layer;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use layer::{Layer, PseudoHeader};
pub use types::{LayerType, MacAddr};
