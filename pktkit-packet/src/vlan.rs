//! 802.1Q VLAN tag construction and parsing
//!
//! On the wire a tagged frame carries the 0x8100 TPID in the enclosing
//! Ethernet ethertype field; the tag layer itself contributes the 2-byte
//! TCI followed by the ethertype of whatever the tag encapsulates, shifting
//! all subsequent offsets by 4 bytes.

use crate::ethernet::EtherType;
use bytes::{BufMut, BytesMut};
use pktkit_core::{Error, Layer, LayerType, PseudoHeader, Result};
use std::any::Any;
use std::fmt;

/// Minimum valid VLAN ID
pub const MIN_VLAN_ID: u16 = 1;

/// Maximum valid VLAN ID
pub const MAX_VLAN_ID: u16 = 4094;

/// Size of the tag layer in bytes (TCI + encapsulated ethertype)
pub const TAG_SIZE: usize = 4;

const VLAN_ID_MASK: u16 = 0x0FFF;
const DEI_BIT: u16 = 0x1000;

/// 802.1Q VLAN tag
///
/// TCI layout: priority (3 bits), DEI (1 bit), VLAN ID (12 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlanTag {
    /// Priority Code Point (0-7)
    pub priority: u8,
    /// Drop Eligible Indicator
    pub dei: bool,
    /// VLAN Identifier (1-4094)
    pub vlan_id: u16,
    /// EtherType of the encapsulated payload
    pub ethertype: EtherType,
}

impl VlanTag {
    /// Create a tag for the given VLAN with priority 0 and DEI clear
    pub fn new(vlan_id: u16) -> Self {
        VlanTag {
            priority: 0,
            dei: false,
            vlan_id,
            ethertype: EtherType::default(),
        }
    }

    /// Set the priority code point
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Set the drop eligible indicator
    pub fn with_dei(mut self, dei: bool) -> Self {
        self.dei = dei;
        self
    }

    fn tci(&self) -> u16 {
        ((self.priority as u16) << 13)
            | if self.dei { DEI_BIT } else { 0 }
            | (self.vlan_id & VLAN_ID_MASK)
    }
}

impl Default for VlanTag {
    fn default() -> Self {
        VlanTag::new(MIN_VLAN_ID)
    }
}

impl fmt::Display for VlanTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "vlan {} prio {} type {}",
            self.vlan_id, self.priority, self.ethertype
        )
    }
}

impl Layer for VlanTag {
    fn layer_type(&self) -> LayerType {
        LayerType::Vlan
    }

    fn header_len(&self) -> usize {
        TAG_SIZE
    }

    fn bind(&mut self, payload: Option<LayerType>) -> Result<()> {
        if let Some(et) = payload.and_then(EtherType::from_layer) {
            self.ethertype = et;
        }
        Ok(())
    }

    fn serialize(
        &self,
        _payload: &[u8],
        _ctx: Option<&PseudoHeader>,
        buf: &mut BytesMut,
    ) -> Result<()> {
        if !(MIN_VLAN_ID..=MAX_VLAN_ID).contains(&self.vlan_id) {
            return Err(Error::pack(
                LayerType::Vlan,
                format!("VLAN ID {} outside 1-4094", self.vlan_id),
            ));
        }
        if self.priority > 7 {
            return Err(Error::pack(
                LayerType::Vlan,
                format!("priority {} outside 0-7", self.priority),
            ));
        }

        buf.put_u16(self.tci());
        buf.put_u16(self.ethertype.to_u16());
        Ok(())
    }

    fn deserialize(&mut self, data: &[u8]) -> Result<usize> {
        if data.len() < TAG_SIZE {
            return Err(Error::short(LayerType::Vlan, TAG_SIZE, data.len()));
        }

        let tci = u16::from_be_bytes([data[0], data[1]]);
        self.priority = (tci >> 13) as u8;
        self.dei = tci & DEI_BIT != 0;
        self.vlan_id = tci & VLAN_ID_MASK;
        self.ethertype = EtherType::from_u16(u16::from_be_bytes([data[2], data[3]]));

        Ok(TAG_SIZE)
    }

    fn payload_type(&self) -> Option<LayerType> {
        self.ethertype.layer_type()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tci_packing() {
        let tag = VlanTag::new(135);
        assert_eq!(tag.tci(), 0x0087);

        let tag = VlanTag::new(100).with_priority(5).with_dei(true);
        assert_eq!(tag.tci(), (5 << 13) | 0x1000 | 100);
    }

    #[test]
    fn test_serialize_rejects_bad_vlan_id() {
        let tag = VlanTag::new(5000);
        let mut buf = BytesMut::new();
        assert!(matches!(
            tag.serialize(&[], None, &mut buf),
            Err(Error::Pack { .. })
        ));

        let tag = VlanTag::new(0);
        assert!(matches!(
            tag.serialize(&[], None, &mut buf),
            Err(Error::Pack { .. })
        ));
    }

    #[test]
    fn test_roundtrip() {
        let tag = VlanTag::new(135).with_priority(3);
        let mut inner = VlanTag::default();
        let mut tagged = tag;
        tagged.bind(Some(LayerType::Arp)).unwrap();

        let mut buf = BytesMut::new();
        tagged.serialize(&[], None, &mut buf).unwrap();
        let consumed = inner.deserialize(&buf).unwrap();

        assert_eq!(consumed, TAG_SIZE);
        assert_eq!(inner, tagged);
        assert_eq!(inner.payload_type(), Some(LayerType::Arp));
    }
}
