//! ARP packet construction and parsing
//!
//! IPv4-over-Ethernet ARP only: 6-byte hardware addresses, 4-byte protocol
//! addresses, 28 bytes on the wire.

use bytes::{BufMut, BytesMut};
use pktkit_core::{Error, Layer, LayerType, MacAddr, PseudoHeader, Result};
use std::any::Any;
use std::fmt;
use std::net::Ipv4Addr;

/// Hardware type for Ethernet
pub const HTYPE_ETHERNET: u16 = 1;

/// Protocol type for IPv4
pub const PTYPE_IPV4: u16 = 0x0800;

/// ARP packet size for IPv4-over-Ethernet
pub const PACKET_SIZE: usize = 28;

/// ARP operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOpcode {
    /// ARP request
    Request = 1,
    /// ARP reply
    Reply = 2,
    /// RARP request
    RarpRequest = 3,
    /// RARP reply
    RarpReply = 4,
}

impl ArpOpcode {
    pub fn from_u16(val: u16) -> Option<Self> {
        match val {
            1 => Some(Self::Request),
            2 => Some(Self::Reply),
            3 => Some(Self::RarpRequest),
            4 => Some(Self::RarpReply),
            _ => None,
        }
    }

    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for ArpOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArpOpcode::Request => write!(f, "request"),
            ArpOpcode::Reply => write!(f, "reply"),
            ArpOpcode::RarpRequest => write!(f, "rarp-request"),
            ArpOpcode::RarpReply => write!(f, "rarp-reply"),
        }
    }
}

/// ARP packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpPacket {
    /// Hardware type (1 for Ethernet)
    pub htype: u16,
    /// Protocol type (0x0800 for IPv4)
    pub ptype: u16,
    /// Hardware address length (6 for MAC)
    pub hlen: u8,
    /// Protocol address length (4 for IPv4)
    pub plen: u8,
    /// Operation
    pub operation: ArpOpcode,
    /// Sender hardware address
    pub sender_hw_addr: MacAddr,
    /// Sender protocol address
    pub sender_proto_addr: Ipv4Addr,
    /// Target hardware address
    pub target_hw_addr: MacAddr,
    /// Target protocol address
    pub target_proto_addr: Ipv4Addr,
}

impl ArpPacket {
    /// Create a new ARP request
    pub fn new_request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Self {
            htype: HTYPE_ETHERNET,
            ptype: PTYPE_IPV4,
            hlen: 6,
            plen: 4,
            operation: ArpOpcode::Request,
            sender_hw_addr: sender_mac,
            sender_proto_addr: sender_ip,
            target_hw_addr: MacAddr::zero(),
            target_proto_addr: target_ip,
        }
    }

    /// Create a new ARP reply
    pub fn new_reply(
        sender_mac: MacAddr,
        sender_ip: Ipv4Addr,
        target_mac: MacAddr,
        target_ip: Ipv4Addr,
    ) -> Self {
        Self {
            operation: ArpOpcode::Reply,
            sender_hw_addr: sender_mac,
            sender_proto_addr: sender_ip,
            target_hw_addr: target_mac,
            target_proto_addr: target_ip,
            ..Self::default()
        }
    }

    /// Create a gratuitous ARP announcement
    pub fn new_gratuitous(mac: MacAddr, ip: Ipv4Addr) -> Self {
        Self {
            sender_hw_addr: mac,
            sender_proto_addr: ip,
            target_proto_addr: ip,
            ..Self::default()
        }
    }
}

impl Default for ArpPacket {
    fn default() -> Self {
        Self {
            htype: HTYPE_ETHERNET,
            ptype: PTYPE_IPV4,
            hlen: 6,
            plen: 4,
            operation: ArpOpcode::Request,
            sender_hw_addr: MacAddr::zero(),
            sender_proto_addr: Ipv4Addr::UNSPECIFIED,
            target_hw_addr: MacAddr::zero(),
            target_proto_addr: Ipv4Addr::UNSPECIFIED,
        }
    }
}

impl fmt::Display for ArpPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arp {} {} -> {}",
            self.operation, self.sender_proto_addr, self.target_proto_addr
        )
    }
}

impl Layer for ArpPacket {
    fn layer_type(&self) -> LayerType {
        LayerType::Arp
    }

    fn header_len(&self) -> usize {
        PACKET_SIZE
    }

    fn serialize(
        &self,
        _payload: &[u8],
        _ctx: Option<&PseudoHeader>,
        buf: &mut BytesMut,
    ) -> Result<()> {
        if self.htype != HTYPE_ETHERNET || self.hlen != 6 {
            return Err(Error::pack(
                LayerType::Arp,
                "only Ethernet hardware addresses are supported",
            ));
        }
        if self.ptype != PTYPE_IPV4 || self.plen != 4 {
            return Err(Error::pack(
                LayerType::Arp,
                "only IPv4 protocol addresses are supported",
            ));
        }

        buf.put_u16(self.htype);
        buf.put_u16(self.ptype);
        buf.put_u8(self.hlen);
        buf.put_u8(self.plen);
        buf.put_u16(self.operation.to_u16());
        buf.put_slice(self.sender_hw_addr.as_bytes());
        buf.put_slice(&self.sender_proto_addr.octets());
        buf.put_slice(self.target_hw_addr.as_bytes());
        buf.put_slice(&self.target_proto_addr.octets());
        Ok(())
    }

    fn deserialize(&mut self, data: &[u8]) -> Result<usize> {
        if data.len() < PACKET_SIZE {
            return Err(Error::short(LayerType::Arp, PACKET_SIZE, data.len()));
        }

        self.htype = u16::from_be_bytes([data[0], data[1]]);
        self.ptype = u16::from_be_bytes([data[2], data[3]]);
        self.hlen = data[4];
        self.plen = data[5];

        if self.hlen != 6 || self.plen != 4 {
            return Err(Error::malformed(
                LayerType::Arp,
                format!("unsupported address lengths hlen={} plen={}", self.hlen, self.plen),
            ));
        }

        let op = u16::from_be_bytes([data[6], data[7]]);
        self.operation = ArpOpcode::from_u16(op)
            .ok_or_else(|| Error::malformed(LayerType::Arp, format!("unknown opcode {}", op)))?;

        self.sender_hw_addr = MacAddr::new([data[8], data[9], data[10], data[11], data[12], data[13]]);
        self.sender_proto_addr = Ipv4Addr::new(data[14], data[15], data[16], data[17]);
        self.target_hw_addr =
            MacAddr::new([data[18], data[19], data[20], data[21], data[22], data[23]]);
        self.target_proto_addr = Ipv4Addr::new(data[24], data[25], data[26], data[27]);

        Ok(PACKET_SIZE)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
