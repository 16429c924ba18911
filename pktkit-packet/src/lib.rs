//! Packet construction and parsing library for pktkit
//!
//! This crate provides typed codecs for the common link, network and
//! transport headers together with a generic chain engine that composes
//! them into packets and decomposes raw frames back into typed chains.
//!
//! # Building a packet
//!
//! ```rust
//! use pktkit_packet::{pack, EthernetFrame, Ipv4Packet, UdpDatagram};
//! use std::net::Ipv4Addr;
//!
//! let eth = EthernetFrame::new(
//!     "00:21:96:6e:f0:70".parse().unwrap(),
//!     "4c:72:b9:54:e5:3d".parse().unwrap(),
//! );
//! let ip = Ipv4Packet::new(
//!     Ipv4Addr::new(192, 168, 1, 135),
//!     Ipv4Addr::new(193, 27, 208, 37),
//! );
//! let udp = UdpDatagram::new(41562, 8338);
//!
//! let raw = pack(vec![Box::new(eth), Box::new(ip), Box::new(udp)]).unwrap();
//! assert_eq!(raw.len(), 14 + 20 + 8);
//! ```
//!
//! # Parsing a frame without knowing its stack
//!
//! ```rust
//! use pktkit_packet::{pack, unpack_all, EthernetFrame, ArpPacket};
//! use pktkit_core::LayerType;
//! use std::net::Ipv4Addr;
//!
//! let eth = EthernetFrame::new(
//!     "ff:ff:ff:ff:ff:ff".parse().unwrap(),
//!     "4c:72:b9:54:e5:3d".parse().unwrap(),
//! );
//! let arp = ArpPacket::new_request(
//!     "4c:72:b9:54:e5:3d".parse().unwrap(),
//!     Ipv4Addr::new(192, 168, 1, 135),
//!     Ipv4Addr::new(192, 168, 1, 254),
//! );
//! let raw = pack(vec![Box::new(eth), Box::new(arp)]).unwrap();
//!
//! let chain = unpack_all(&raw, LayerType::Eth).unwrap();
//! assert_eq!(chain.types(), vec![LayerType::Eth, LayerType::Arp]);
//! ```

pub mod arp;
pub mod chain;
pub mod checksum;
pub mod ethernet;
pub mod ip;
pub mod raw;
pub mod registry;
pub mod tcp;
pub mod udp;
pub mod vlan;

// Re-export commonly used types for convenience
pub use arp::{ArpOpcode, ArpPacket};
pub use chain::{pack, unpack, unpack_all, unpack_all_with, Chain};
pub use checksum::{internet_checksum, transport_checksum};
pub use ethernet::{EtherType, EthernetFrame};
pub use ip::{IpFlags, IpProtocol, Ipv4Packet};
pub use raw::RawPayload;
pub use registry::Registry;
pub use tcp::{TcpFlags, TcpSegment};
pub use udp::UdpDatagram;
pub use vlan::VlanTag;
