//! UDP datagram header construction and parsing

use crate::checksum::{internet_checksum, transport_checksum};
use bytes::{BufMut, BytesMut};
use pktkit_core::{Error, Layer, LayerType, PseudoHeader, Result};
use std::any::Any;
use std::fmt;

/// UDP header
///
/// `length` and `checksum` are recomputed from the actual payload bytes and
/// the enclosing network layer's pseudo-header every time the chain is
/// packed; after a parse they hold the values read from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UdpDatagram {
    /// Source port
    pub source_port: u16,
    /// Destination port
    pub destination_port: u16,
    /// Length of header plus payload
    pub length: u16,
    /// Checksum over pseudo-header, header and payload
    pub checksum: u16,
}

impl UdpDatagram {
    /// UDP header size in bytes
    pub const HEADER_SIZE: usize = 8;

    /// Create a new UDP header
    pub fn new(source_port: u16, destination_port: u16) -> Self {
        UdpDatagram {
            source_port,
            destination_port,
            length: 0,
            checksum: 0,
        }
    }
}

impl fmt::Display for UdpDatagram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "udp {} -> {}", self.source_port, self.destination_port)
    }
}

impl Layer for UdpDatagram {
    fn layer_type(&self) -> LayerType {
        LayerType::Udp
    }

    fn header_len(&self) -> usize {
        Self::HEADER_SIZE
    }

    fn serialize(
        &self,
        payload: &[u8],
        ctx: Option<&PseudoHeader>,
        buf: &mut BytesMut,
    ) -> Result<()> {
        let length = Self::HEADER_SIZE + payload.len();
        if length > u16::MAX as usize {
            return Err(Error::pack(
                LayerType::Udp,
                format!("datagram length {} exceeds 65535", length),
            ));
        }
        let length = length as u16;

        let mut datagram = Vec::with_capacity(length as usize);
        datagram.extend_from_slice(&self.source_port.to_be_bytes());
        datagram.extend_from_slice(&self.destination_port.to_be_bytes());
        datagram.extend_from_slice(&length.to_be_bytes());
        datagram.extend_from_slice(&[0, 0]);
        datagram.extend_from_slice(payload);

        let checksum = match ctx {
            Some(ph) => transport_checksum(
                &ph.source.octets(),
                &ph.destination.octets(),
                ph.protocol,
                &datagram,
            ),
            None => internet_checksum(&datagram),
        };
        // A zero checksum means "none"; the computed value 0 is sent as 0xFFFF
        let checksum = if checksum == 0 { 0xFFFF } else { checksum };

        buf.put_u16(self.source_port);
        buf.put_u16(self.destination_port);
        buf.put_u16(length);
        buf.put_u16(checksum);
        Ok(())
    }

    fn deserialize(&mut self, data: &[u8]) -> Result<usize> {
        if data.len() < Self::HEADER_SIZE {
            return Err(Error::short(LayerType::Udp, Self::HEADER_SIZE, data.len()));
        }

        self.source_port = u16::from_be_bytes([data[0], data[1]]);
        self.destination_port = u16::from_be_bytes([data[2], data[3]]);
        self.length = u16::from_be_bytes([data[4], data[5]]);
        self.checksum = u16::from_be_bytes([data[6], data[7]]);

        if (self.length as usize) < Self::HEADER_SIZE {
            return Err(Error::malformed(
                LayerType::Udp,
                format!("length field {} below header size", self.length),
            ));
        }

        Ok(Self::HEADER_SIZE)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn reference_context() -> PseudoHeader {
        PseudoHeader {
            source: Ipv4Addr::new(192, 168, 1, 135),
            destination: Ipv4Addr::new(193, 27, 208, 37),
            protocol: 17,
        }
    }

    #[test]
    fn test_serialize_reference_header() {
        let udp = UdpDatagram::new(41562, 8338);
        let ctx = reference_context();

        let mut buf = BytesMut::new();
        udp.serialize(&[], Some(&ctx), &mut buf).unwrap();

        assert_eq!(
            &buf[..],
            &[0xa2, 0x5a, 0x20, 0x92, 0x00, 0x08, 0xe9, 0x80]
        );
    }

    #[test]
    fn test_length_includes_payload() {
        let udp = UdpDatagram::new(1000, 2000);
        let mut buf = BytesMut::new();
        udp.serialize(&[1, 2, 3, 4], Some(&reference_context()), &mut buf)
            .unwrap();

        assert_eq!(u16::from_be_bytes([buf[4], buf[5]]), 12);
    }

    #[test]
    fn test_roundtrip() {
        let udp = UdpDatagram::new(41562, 8338);
        let mut buf = BytesMut::new();
        udp.serialize(&[], Some(&reference_context()), &mut buf)
            .unwrap();

        let mut parsed = UdpDatagram::default();
        let consumed = parsed.deserialize(&buf).unwrap();

        assert_eq!(consumed, UdpDatagram::HEADER_SIZE);
        assert_eq!(parsed.source_port, 41562);
        assert_eq!(parsed.destination_port, 8338);
        assert_eq!(parsed.length, 8);
        assert_eq!(parsed.checksum, 0xe980);
    }

    #[test]
    fn test_deserialize_short_buffer() {
        let mut udp = UdpDatagram::default();
        assert!(matches!(
            udp.deserialize(&[0u8; 4]),
            Err(Error::ShortBuffer { .. })
        ));
    }

    #[test]
    fn test_deserialize_rejects_undersized_length_field() {
        let data = [0x00, 0x01, 0x00, 0x02, 0x00, 0x04, 0x00, 0x00];
        let mut udp = UdpDatagram::default();
        assert!(matches!(
            udp.deserialize(&data),
            Err(Error::Malformed { .. })
        ));
    }
}
