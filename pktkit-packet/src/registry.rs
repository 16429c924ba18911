//! Decoder registry for speculative chain decoding
//!
//! Maps a layer tag to a factory producing an empty codec instance. The
//! chain engine consults it once per discovered layer; a missing entry is a
//! normal terminal condition, not an error, and the remaining bytes become
//! an opaque raw payload.

use crate::{ArpPacket, EthernetFrame, Ipv4Packet, TcpSegment, UdpDatagram, VlanTag};
use pktkit_core::{Layer, LayerType};
use std::collections::HashMap;

/// Factory producing an empty decoder instance
pub type LayerBuilder = fn() -> Box<dyn Layer>;

/// Registry of decodable layer types
#[derive(Clone)]
pub struct Registry {
    builders: HashMap<LayerType, LayerBuilder>,
}

impl Registry {
    /// Create an empty registry
    pub fn empty() -> Self {
        Registry {
            builders: HashMap::new(),
        }
    }

    /// Create a registry with every built-in codec registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(LayerType::Eth, || Box::<EthernetFrame>::default());
        registry.register(LayerType::Vlan, || Box::<VlanTag>::default());
        registry.register(LayerType::Arp, || Box::<ArpPacket>::default());
        registry.register(LayerType::Ipv4, || Box::<Ipv4Packet>::default());
        registry.register(LayerType::Tcp, || Box::<TcpSegment>::default());
        registry.register(LayerType::Udp, || Box::<UdpDatagram>::default());
        registry
    }

    /// Register a decoder factory for a layer tag, replacing any previous one
    pub fn register(&mut self, ty: LayerType, builder: LayerBuilder) {
        self.builders.insert(ty, builder);
    }

    /// Build an empty decoder for a tag, if one is registered
    pub fn build(&self, ty: LayerType) -> Option<Box<dyn Layer>> {
        self.builders.get(&ty).map(|builder| builder())
    }

    /// Check whether a tag has a registered decoder
    pub fn contains(&self, ty: LayerType) -> bool {
        self.builders.contains_key(&ty)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_builtin_codecs() {
        let registry = Registry::with_defaults();
        for ty in [
            LayerType::Eth,
            LayerType::Vlan,
            LayerType::Arp,
            LayerType::Ipv4,
            LayerType::Tcp,
            LayerType::Udp,
        ] {
            assert!(registry.contains(ty), "missing builder for {}", ty);
        }
        assert!(!registry.contains(LayerType::Raw));
    }

    #[test]
    fn test_build_produces_matching_tag() {
        let registry = Registry::with_defaults();
        let layer = registry.build(LayerType::Ipv4).unwrap();
        assert_eq!(layer.layer_type(), LayerType::Ipv4);
    }

    #[test]
    fn test_empty_registry_builds_nothing() {
        let registry = Registry::empty();
        assert!(registry.build(LayerType::Eth).is_none());
    }
}
