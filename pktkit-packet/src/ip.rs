//! IPv4 header construction and parsing

use crate::checksum::internet_checksum;
use bytes::{BufMut, BytesMut};
use pktkit_core::types::ipproto;
use pktkit_core::{Error, Layer, LayerType, PseudoHeader, Result};
use std::any::Any;
use std::fmt;
use std::net::Ipv4Addr;

/// IP protocol numbers understood by the chain engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpProtocol {
    /// ICMP (1)
    Icmp,
    /// TCP (6)
    Tcp,
    /// UDP (17)
    Udp,
    /// Any other protocol number
    Custom(u8),
}

impl IpProtocol {
    pub fn to_u8(self) -> u8 {
        match self {
            IpProtocol::Icmp => ipproto::ICMP,
            IpProtocol::Tcp => ipproto::TCP,
            IpProtocol::Udp => ipproto::UDP,
            IpProtocol::Custom(val) => val,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            ipproto::ICMP => IpProtocol::Icmp,
            ipproto::TCP => IpProtocol::Tcp,
            ipproto::UDP => IpProtocol::Udp,
            val => IpProtocol::Custom(val),
        }
    }

    /// The chain tag this protocol number selects, if a decoder exists
    pub fn layer_type(self) -> Option<LayerType> {
        match self {
            IpProtocol::Tcp => Some(LayerType::Tcp),
            IpProtocol::Udp => Some(LayerType::Udp),
            _ => None,
        }
    }

    /// The protocol number announcing a given payload tag, if one exists
    pub fn from_layer(ty: LayerType) -> Option<Self> {
        match ty {
            LayerType::Tcp => Some(IpProtocol::Tcp),
            LayerType::Udp => Some(IpProtocol::Udp),
            _ => None,
        }
    }
}

impl fmt::Display for IpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpProtocol::Icmp => write!(f, "icmp"),
            IpProtocol::Tcp => write!(f, "tcp"),
            IpProtocol::Udp => write!(f, "udp"),
            IpProtocol::Custom(val) => write!(f, "proto-{}", val),
        }
    }
}

/// IPv4 flags (3-bit field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IpFlags {
    /// Reserved bit (must be 0)
    pub reserved: bool,
    /// Don't Fragment
    pub dont_fragment: bool,
    /// More Fragments
    pub more_fragments: bool,
}

impl IpFlags {
    /// No flags set
    pub const NONE: IpFlags = IpFlags {
        reserved: false,
        dont_fragment: false,
        more_fragments: false,
    };

    /// Don't Fragment set
    pub const DONT_FRAGMENT: IpFlags = IpFlags {
        reserved: false,
        dont_fragment: true,
        more_fragments: false,
    };

    pub fn to_u8(self) -> u8 {
        let mut flags = 0u8;
        if self.reserved {
            flags |= 0b100;
        }
        if self.dont_fragment {
            flags |= 0b010;
        }
        if self.more_fragments {
            flags |= 0b001;
        }
        flags
    }

    pub fn from_u8(value: u8) -> Self {
        IpFlags {
            reserved: (value & 0b100) != 0,
            dont_fragment: (value & 0b010) != 0,
            more_fragments: (value & 0b001) != 0,
        }
    }
}

/// IPv4 header
///
/// `total_length` and `checksum` are recomputed from the actual payload
/// bytes every time the chain is packed; after a parse they hold the values
/// read from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Packet {
    /// Version (always 4)
    pub version: u8,
    /// Header length in 32-bit words (minimum 5)
    pub ihl: u8,
    /// Type of Service / DSCP
    pub tos: u8,
    /// Total length of header plus payload
    pub total_length: u16,
    /// Identification
    pub identification: u16,
    /// Flags
    pub flags: IpFlags,
    /// Fragment offset in 8-byte blocks
    pub fragment_offset: u16,
    /// Time to Live
    pub ttl: u8,
    /// Payload protocol
    pub protocol: IpProtocol,
    /// Header checksum
    pub checksum: u16,
    /// Source address
    pub source: Ipv4Addr,
    /// Destination address
    pub destination: Ipv4Addr,
    /// Options, padded to a 4-byte boundary
    pub options: Vec<u8>,
}

impl Ipv4Packet {
    /// Minimum header size (no options)
    pub const MIN_HEADER_SIZE: usize = 20;

    /// Maximum total packet size
    pub const MAX_PACKET_SIZE: usize = 65535;

    /// Create a new IPv4 header with default field values.
    ///
    /// The protocol is filled in from the payload layer when the chain is
    /// packed; set it explicitly only for protocols without a codec.
    pub fn new(source: Ipv4Addr, destination: Ipv4Addr) -> Self {
        Ipv4Packet {
            version: 4,
            ihl: 5,
            tos: 0,
            total_length: 0,
            identification: 0,
            flags: IpFlags::NONE,
            fragment_offset: 0,
            ttl: 64,
            protocol: IpProtocol::Custom(0),
            checksum: 0,
            source,
            destination,
            options: Vec::new(),
        }
    }

    /// Set the Time to Live
    pub fn with_ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the Type of Service
    pub fn with_tos(mut self, tos: u8) -> Self {
        self.tos = tos;
        self
    }

    /// Set the identification field
    pub fn with_identification(mut self, id: u16) -> Self {
        self.identification = id;
        self
    }

    /// Set the flags
    pub fn with_flags(mut self, flags: IpFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the payload protocol explicitly
    pub fn with_protocol(mut self, protocol: IpProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set IP options, padding them to a 4-byte boundary
    pub fn with_options(mut self, options: Vec<u8>) -> Self {
        let padded_len = (options.len() + 3) & !3;
        let mut padded = options;
        padded.resize(padded_len, 0);

        self.ihl = ((Self::MIN_HEADER_SIZE + padded.len()) / 4) as u8;
        self.options = padded;
        self
    }

    fn write_header(&self, total_length: u16, checksum: u16, buf: &mut BytesMut) {
        buf.put_u8((self.version << 4) | (self.ihl & 0x0F));
        buf.put_u8(self.tos);
        buf.put_u16(total_length);
        buf.put_u16(self.identification);
        buf.put_u16(((self.flags.to_u8() as u16) << 13) | (self.fragment_offset & 0x1FFF));
        buf.put_u8(self.ttl);
        buf.put_u8(self.protocol.to_u8());
        buf.put_u16(checksum);
        buf.put_slice(&self.source.octets());
        buf.put_slice(&self.destination.octets());
        buf.put_slice(&self.options);
    }
}

impl Default for Ipv4Packet {
    fn default() -> Self {
        Self::new(Ipv4Addr::UNSPECIFIED, Ipv4Addr::UNSPECIFIED)
    }
}

impl fmt::Display for Ipv4Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ipv4 {} -> {} {}",
            self.source, self.destination, self.protocol
        )
    }
}

impl Layer for Ipv4Packet {
    fn layer_type(&self) -> LayerType {
        LayerType::Ipv4
    }

    fn header_len(&self) -> usize {
        Self::MIN_HEADER_SIZE + self.options.len()
    }

    fn bind(&mut self, payload: Option<LayerType>) -> Result<()> {
        if let Some(p) = payload.and_then(IpProtocol::from_layer) {
            self.protocol = p;
        }
        Ok(())
    }

    fn pseudo_header(&self) -> Option<PseudoHeader> {
        Some(PseudoHeader {
            source: self.source,
            destination: self.destination,
            protocol: self.protocol.to_u8(),
        })
    }

    fn serialize(
        &self,
        payload: &[u8],
        _ctx: Option<&PseudoHeader>,
        buf: &mut BytesMut,
    ) -> Result<()> {
        let header_len = self.header_len();
        let total = header_len + payload.len();
        if total > Self::MAX_PACKET_SIZE {
            return Err(Error::pack(
                LayerType::Ipv4,
                format!("packet length {} exceeds 65535", total),
            ));
        }
        if self.ihl as usize * 4 != header_len {
            return Err(Error::pack(
                LayerType::Ipv4,
                format!("IHL {} does not cover {} header bytes", self.ihl, header_len),
            ));
        }

        // Checksum covers the header only, with the checksum field zeroed.
        let mut header = BytesMut::with_capacity(header_len);
        self.write_header(total as u16, 0, &mut header);
        let checksum = internet_checksum(&header);

        header[10..12].copy_from_slice(&checksum.to_be_bytes());
        buf.put_slice(&header);
        Ok(())
    }

    fn deserialize(&mut self, data: &[u8]) -> Result<usize> {
        if data.len() < Self::MIN_HEADER_SIZE {
            return Err(Error::short(
                LayerType::Ipv4,
                Self::MIN_HEADER_SIZE,
                data.len(),
            ));
        }

        self.version = data[0] >> 4;
        self.ihl = data[0] & 0x0F;

        if self.version != 4 {
            return Err(Error::malformed(
                LayerType::Ipv4,
                format!("version {} is not 4", self.version),
            ));
        }
        if self.ihl < 5 {
            return Err(Error::malformed(
                LayerType::Ipv4,
                format!("IHL {} below minimum 5", self.ihl),
            ));
        }

        let header_len = self.ihl as usize * 4;
        if data.len() < header_len {
            return Err(Error::short(LayerType::Ipv4, header_len, data.len()));
        }

        self.tos = data[1];
        self.total_length = u16::from_be_bytes([data[2], data[3]]);
        self.identification = u16::from_be_bytes([data[4], data[5]]);

        let flags_and_offset = u16::from_be_bytes([data[6], data[7]]);
        self.flags = IpFlags::from_u8((flags_and_offset >> 13) as u8);
        self.fragment_offset = flags_and_offset & 0x1FFF;

        self.ttl = data[8];
        self.protocol = IpProtocol::from_u8(data[9]);
        self.checksum = u16::from_be_bytes([data[10], data[11]]);
        self.source = Ipv4Addr::new(data[12], data[13], data[14], data[15]);
        self.destination = Ipv4Addr::new(data[16], data[17], data[18], data[19]);
        self.options = data[Self::MIN_HEADER_SIZE..header_len].to_vec();

        Ok(header_len)
    }

    fn payload_type(&self) -> Option<LayerType> {
        self.protocol.layer_type()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Ipv4Packet {
        Ipv4Packet::new(
            Ipv4Addr::new(192, 168, 1, 135),
            Ipv4Addr::new(193, 27, 208, 37),
        )
        .with_identification(1)
        .with_protocol(IpProtocol::Udp)
    }

    #[test]
    fn test_serialize_header_fields() {
        let ip = sample();
        let mut buf = BytesMut::new();
        ip.serialize(&[0u8; 8], None, &mut buf).unwrap();

        assert_eq!(buf.len(), 20);
        assert_eq!(buf[0], 0x45);
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), 28);
        assert_eq!(buf[8], 64);
        assert_eq!(buf[9], 17);
        assert_eq!(&buf[12..16], &[192, 168, 1, 135]);
        assert_eq!(&buf[16..20], &[193, 27, 208, 37]);
    }

    #[test]
    fn test_header_checksum_self_validates() {
        let ip = sample();
        let mut buf = BytesMut::new();
        ip.serialize(&[0u8; 16], None, &mut buf).unwrap();

        assert!(crate::checksum::validate_checksum(&buf));
    }

    #[test]
    fn test_roundtrip_with_options() {
        let ip = sample().with_options(vec![0x94, 0x04, 0x00, 0x00]);
        assert_eq!(ip.ihl, 6);

        let mut buf = BytesMut::new();
        ip.serialize(&[], None, &mut buf).unwrap();
        assert_eq!(buf.len(), 24);

        let mut parsed = Ipv4Packet::default();
        let consumed = parsed.deserialize(&buf).unwrap();

        assert_eq!(consumed, 24);
        assert_eq!(parsed.options, ip.options);
        assert_eq!(parsed.source, ip.source);
        assert_eq!(parsed.ihl, 6);
    }

    #[test]
    fn test_deserialize_rejects_bad_version() {
        let mut data = [0u8; 20];
        data[0] = 0x65;

        let mut ip = Ipv4Packet::default();
        assert!(matches!(ip.deserialize(&data), Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_deserialize_rejects_truncated_options() {
        let mut data = [0u8; 20];
        data[0] = 0x46; // IHL 6 -> 24 byte header, only 20 available

        let mut ip = Ipv4Packet::default();
        assert!(matches!(
            ip.deserialize(&data),
            Err(Error::ShortBuffer { needed: 24, .. })
        ));
    }

    #[test]
    fn test_serialize_rejects_oversize_payload() {
        let ip = sample();
        let payload = vec![0u8; Ipv4Packet::MAX_PACKET_SIZE];
        let mut buf = BytesMut::new();
        assert!(matches!(
            ip.serialize(&payload, None, &mut buf),
            Err(Error::Pack { .. })
        ));
    }

    #[test]
    fn test_pseudo_header() {
        let ip = sample();
        let ph = ip.pseudo_header().unwrap();
        assert_eq!(ph.protocol, 17);
        assert_eq!(ph.source, Ipv4Addr::new(192, 168, 1, 135));
    }
}
