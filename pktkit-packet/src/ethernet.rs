//! Ethernet II frame header construction and parsing

use bytes::{BufMut, BytesMut};
use pktkit_core::types::ethertypes;
use pktkit_core::{Error, Layer, LayerType, MacAddr, PseudoHeader, Result};
use std::any::Any;
use std::fmt;

/// EtherType values understood by the chain engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtherType {
    /// IPv4 (0x0800)
    Ipv4,
    /// ARP (0x0806)
    Arp,
    /// 802.1Q VLAN tag (0x8100)
    Vlan,
    /// IPv6 (0x86DD)
    Ipv6,
    /// Any other EtherType
    Custom(u16),
}

impl EtherType {
    /// Convert EtherType to its wire value
    pub fn to_u16(self) -> u16 {
        match self {
            EtherType::Ipv4 => ethertypes::IPV4,
            EtherType::Arp => ethertypes::ARP,
            EtherType::Vlan => ethertypes::DOT1Q,
            EtherType::Ipv6 => ethertypes::IPV6,
            EtherType::Custom(val) => val,
        }
    }

    /// Create EtherType from a wire value
    pub fn from_u16(value: u16) -> Self {
        match value {
            ethertypes::IPV4 => EtherType::Ipv4,
            ethertypes::ARP => EtherType::Arp,
            ethertypes::DOT1Q => EtherType::Vlan,
            ethertypes::IPV6 => EtherType::Ipv6,
            val => EtherType::Custom(val),
        }
    }

    /// The chain tag this ethertype selects, if a decoder exists for it
    pub fn layer_type(self) -> Option<LayerType> {
        match self {
            EtherType::Ipv4 => Some(LayerType::Ipv4),
            EtherType::Arp => Some(LayerType::Arp),
            EtherType::Vlan => Some(LayerType::Vlan),
            _ => None,
        }
    }

    /// The ethertype announcing a given payload tag, if one exists
    pub fn from_layer(ty: LayerType) -> Option<Self> {
        match ty {
            LayerType::Ipv4 => Some(EtherType::Ipv4),
            LayerType::Arp => Some(EtherType::Arp),
            LayerType::Vlan => Some(EtherType::Vlan),
            _ => None,
        }
    }
}

impl Default for EtherType {
    fn default() -> Self {
        EtherType::Custom(0)
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtherType::Ipv4 => write!(f, "IPv4"),
            EtherType::Arp => write!(f, "ARP"),
            EtherType::Vlan => write!(f, "VLAN"),
            EtherType::Ipv6 => write!(f, "IPv6"),
            EtherType::Custom(val) => write!(f, "0x{:04x}", val),
        }
    }
}

/// Ethernet II frame header
///
/// Carries the header fields only; payload bytes belong to the inner layers
/// of the chain. The frame is not padded to the 60-byte transmission
/// minimum, so short chains serialize to exactly their header bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EthernetFrame {
    /// Destination MAC address
    pub destination: MacAddr,
    /// Source MAC address
    pub source: MacAddr,
    /// EtherType of the payload
    pub ethertype: EtherType,
}

impl EthernetFrame {
    /// Ethernet header size (dst + src + ethertype)
    pub const HEADER_SIZE: usize = 14;

    /// Create a new Ethernet frame header.
    ///
    /// The ethertype is filled in from the payload layer when the chain is
    /// packed; set it explicitly only for ethertypes without a codec.
    pub fn new(destination: MacAddr, source: MacAddr) -> Self {
        EthernetFrame {
            destination,
            source,
            ethertype: EtherType::default(),
        }
    }

    /// Set the ethertype explicitly
    pub fn with_ethertype(mut self, ethertype: EtherType) -> Self {
        self.ethertype = ethertype;
        self
    }
}

impl fmt::Display for EthernetFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "eth {} -> {} type {}",
            self.source, self.destination, self.ethertype
        )
    }
}

impl Layer for EthernetFrame {
    fn layer_type(&self) -> LayerType {
        LayerType::Eth
    }

    fn header_len(&self) -> usize {
        Self::HEADER_SIZE
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
        buf.put_slice(self.destination.as_bytes());
        buf.put_slice(self.source.as_bytes());
        buf.put_u16(self.ethertype.to_u16());
        Ok(())
    }

    fn deserialize(&mut self, data: &[u8]) -> Result<usize> {
        if data.len() < Self::HEADER_SIZE {
            return Err(Error::short(LayerType::Eth, Self::HEADER_SIZE, data.len()));
        }

        self.destination = MacAddr::new([data[0], data[1], data[2], data[3], data[4], data[5]]);
        self.source = MacAddr::new([data[6], data[7], data[8], data[9], data[10], data[11]]);
        self.ethertype = EtherType::from_u16(u16::from_be_bytes([data[12], data[13]]));

        Ok(Self::HEADER_SIZE)
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
    fn test_ethertype_conversion() {
        assert_eq!(EtherType::Ipv4.to_u16(), 0x0800);
        assert_eq!(EtherType::Arp.to_u16(), 0x0806);
        assert_eq!(EtherType::from_u16(0x8100), EtherType::Vlan);
        assert_eq!(EtherType::from_u16(0x1234), EtherType::Custom(0x1234));
    }

    #[test]
    fn test_serialize_header() {
        let frame = EthernetFrame::new(
            MacAddr::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
            MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
        )
        .with_ethertype(EtherType::Ipv4);

        let mut buf = BytesMut::new();
        frame.serialize(&[], None, &mut buf).unwrap();

        assert_eq!(buf.len(), EthernetFrame::HEADER_SIZE);
        assert_eq!(&buf[0..6], &[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert_eq!(&buf[6..12], &[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(u16::from_be_bytes([buf[12], buf[13]]), 0x0800);
    }

    #[test]
    fn test_deserialize_short_buffer() {
        let mut frame = EthernetFrame::default();
        let err = frame.deserialize(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, Error::ShortBuffer { needed: 14, .. }));
    }

    #[test]
    fn test_roundtrip() {
        let frame = EthernetFrame::new(
            MacAddr::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
            MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
        )
        .with_ethertype(EtherType::Arp);

        let mut buf = BytesMut::new();
        frame.serialize(&[], None, &mut buf).unwrap();

        let mut parsed = EthernetFrame::default();
        let consumed = parsed.deserialize(&buf).unwrap();

        assert_eq!(consumed, EthernetFrame::HEADER_SIZE);
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_bind_keeps_unknown_payload() {
        let mut frame = EthernetFrame::default().with_ethertype(EtherType::Custom(0x1234));
        frame.bind(Some(LayerType::Raw)).unwrap();
        assert_eq!(frame.ethertype, EtherType::Custom(0x1234));

        frame.bind(Some(LayerType::Ipv4)).unwrap();
        assert_eq!(frame.ethertype, EtherType::Ipv4);
    }

    #[test]
    fn test_payload_type_discovery() {
        let mut frame = EthernetFrame::default();
        let data = [
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x4c, 0x72, 0xb9, 0x54, 0xe5, 0x3d, 0x08, 0x06,
        ];
        frame.deserialize(&data).unwrap();
        assert_eq!(frame.payload_type(), Some(LayerType::Arp));
    }
}
