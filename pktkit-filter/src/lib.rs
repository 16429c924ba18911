//! Packet filter compilation and matching for pktkit
//!
//! Compiles a textual classifier expression into an immutable program over
//! the classic BPF instruction set, bound to the link type it was compiled
//! for, and evaluates it against raw frame bytes exactly as they sit on the
//! wire - no chain is built.
//!
//! The expression grammar supports the protocol literals `arp`, `ip`,
//! `vlan`, `tcp` and `udp`, the predicates `port N` / `src port N` /
//! `dst port N`, and the combinators `not`, `and`, `or` with parenthesised
//! grouping. Keywords are case-insensitive. Every predicate structurally
//! accounts for a single 802.1Q tag, so a tagged frame is matched at the
//! shifted offsets rather than misread.
//!
//! A compiled [`Filter`] has no mutable state: matching is a pure function
//! of the program and the bytes, so one filter may be shared across any
//! number of threads without synchronization. Frames too short for an
//! instruction's load simply fail to match; evaluation never errors.
//!
//! ```rust
//! use pktkit_core::LayerType;
//! use pktkit_filter::Filter;
//!
//! let filter = Filter::compile("udp or tcp", LayerType::Eth).unwrap();
//! assert!(filter.validate());
//! assert!(!filter.matches(b"random data"));
//! ```

mod compile;
mod expr;
pub mod program;

pub use program::{Filter, Instruction};

use pktkit_core::{LayerType, Result};

/// Compile a classifier expression for the given link type.
///
/// Convenience wrapper over [`Filter::compile`].
pub fn compile(expression: &str, link: LayerType) -> Result<Filter> {
    Filter::compile(expression, link)
}
