//! TCP segment header construction and parsing

use crate::checksum::{internet_checksum, transport_checksum};
use bytes::{BufMut, BytesMut};
use pktkit_core::{Error, Layer, LayerType, PseudoHeader, Result};
use std::any::Any;
use std::fmt;

/// TCP flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TcpFlags {
    /// FIN - no more data from sender
    pub fin: bool,
    /// SYN - synchronize sequence numbers
    pub syn: bool,
    /// RST - reset the connection
    pub rst: bool,
    /// PSH - push function
    pub psh: bool,
    /// ACK - acknowledgment field is significant
    pub ack: bool,
    /// URG - urgent pointer field is significant
    pub urg: bool,
    /// ECE - ECN-echo
    pub ece: bool,
    /// CWR - congestion window reduced
    pub cwr: bool,
}

impl TcpFlags {
    /// No flags set
    pub const NONE: TcpFlags = TcpFlags {
        fin: false,
        syn: false,
        rst: false,
        psh: false,
        ack: false,
        urg: false,
        ece: false,
        cwr: false,
    };

    /// SYN flag (connection initiation)
    pub const SYN: TcpFlags = TcpFlags {
        fin: false,
        syn: true,
        rst: false,
        psh: false,
        ack: false,
        urg: false,
        ece: false,
        cwr: false,
    };

    /// ACK flag
    pub const ACK: TcpFlags = TcpFlags {
        fin: false,
        syn: false,
        rst: false,
        psh: false,
        ack: true,
        urg: false,
        ece: false,
        cwr: false,
    };

    /// SYN+ACK flags
    pub const SYN_ACK: TcpFlags = TcpFlags {
        fin: false,
        syn: true,
        rst: false,
        psh: false,
        ack: true,
        urg: false,
        ece: false,
        cwr: false,
    };

    /// RST flag
    pub const RST: TcpFlags = TcpFlags {
        fin: false,
        syn: false,
        rst: true,
        psh: false,
        ack: false,
        urg: false,
        ece: false,
        cwr: false,
    };

    pub fn to_u8(self) -> u8 {
        let mut flags = 0u8;
        if self.fin {
            flags |= 0x01;
        }
        if self.syn {
            flags |= 0x02;
        }
        if self.rst {
            flags |= 0x04;
        }
        if self.psh {
            flags |= 0x08;
        }
        if self.ack {
            flags |= 0x10;
        }
        if self.urg {
            flags |= 0x20;
        }
        if self.ece {
            flags |= 0x40;
        }
        if self.cwr {
            flags |= 0x80;
        }
        flags
    }

    pub fn from_u8(value: u8) -> Self {
        TcpFlags {
            fin: value & 0x01 != 0,
            syn: value & 0x02 != 0,
            rst: value & 0x04 != 0,
            psh: value & 0x08 != 0,
            ack: value & 0x10 != 0,
            urg: value & 0x20 != 0,
            ece: value & 0x40 != 0,
            cwr: value & 0x80 != 0,
        }
    }
}

/// TCP segment header
///
/// The checksum is recomputed over the pseudo-header plus the segment every
/// time the chain is packed; after a parse it holds the wire value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpSegment {
    /// Source port
    pub source_port: u16,
    /// Destination port
    pub destination_port: u16,
    /// Sequence number
    pub sequence: u32,
    /// Acknowledgment number
    pub acknowledgment: u32,
    /// Flags
    pub flags: TcpFlags,
    /// Window size
    pub window: u16,
    /// Checksum
    pub checksum: u16,
    /// Urgent pointer
    pub urgent: u16,
    /// Options, must be padded to a 4-byte boundary
    pub options: Vec<u8>,
}

impl TcpSegment {
    /// Minimum header size (no options)
    pub const MIN_HEADER_SIZE: usize = 20;

    /// Maximum options length (data offset is 4 bits)
    pub const MAX_OPTIONS: usize = 40;

    /// Create a new TCP header
    pub fn new(source_port: u16, destination_port: u16) -> Self {
        TcpSegment {
            source_port,
            destination_port,
            sequence: 0,
            acknowledgment: 0,
            flags: TcpFlags::NONE,
            window: 65535,
            checksum: 0,
            urgent: 0,
            options: Vec::new(),
        }
    }

    /// Set the sequence number
    pub fn with_sequence(mut self, seq: u32) -> Self {
        self.sequence = seq;
        self
    }

    /// Set the acknowledgment number
    pub fn with_acknowledgment(mut self, ack: u32) -> Self {
        self.acknowledgment = ack;
        self
    }

    /// Set the flags
    pub fn with_flags(mut self, flags: TcpFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the window size
    pub fn with_window(mut self, window: u16) -> Self {
        self.window = window;
        self
    }

    /// Set options, padding them to a 4-byte boundary
    pub fn with_options(mut self, options: Vec<u8>) -> Self {
        let padded_len = (options.len() + 3) & !3;
        let mut padded = options;
        padded.resize(padded_len, 0);
        self.options = padded;
        self
    }

    /// Data offset in 32-bit words
    pub fn data_offset(&self) -> u8 {
        ((Self::MIN_HEADER_SIZE + self.options.len()) / 4) as u8
    }
}

impl Default for TcpSegment {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl fmt::Display for TcpSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tcp {} -> {}", self.source_port, self.destination_port)
    }
}

impl Layer for TcpSegment {
    fn layer_type(&self) -> LayerType {
        LayerType::Tcp
    }

    fn header_len(&self) -> usize {
        Self::MIN_HEADER_SIZE + self.options.len()
    }

    fn serialize(
        &self,
        payload: &[u8],
        ctx: Option<&PseudoHeader>,
        buf: &mut BytesMut,
    ) -> Result<()> {
        if self.options.len() > Self::MAX_OPTIONS {
            return Err(Error::pack(
                LayerType::Tcp,
                format!("{} option bytes exceed the 40-byte limit", self.options.len()),
            ));
        }
        if self.options.len() % 4 != 0 {
            return Err(Error::pack(
                LayerType::Tcp,
                "options are not padded to a 4-byte boundary",
            ));
        }

        let header_len = self.header_len();
        let mut segment = Vec::with_capacity(header_len + payload.len());
        segment.extend_from_slice(&self.source_port.to_be_bytes());
        segment.extend_from_slice(&self.destination_port.to_be_bytes());
        segment.extend_from_slice(&self.sequence.to_be_bytes());
        segment.extend_from_slice(&self.acknowledgment.to_be_bytes());
        segment.push(self.data_offset() << 4);
        segment.push(self.flags.to_u8());
        segment.extend_from_slice(&self.window.to_be_bytes());
        segment.extend_from_slice(&[0, 0]);
        segment.extend_from_slice(&self.urgent.to_be_bytes());
        segment.extend_from_slice(&self.options);
        segment.extend_from_slice(payload);

        let checksum = match ctx {
            Some(ph) => transport_checksum(
                &ph.source.octets(),
                &ph.destination.octets(),
                ph.protocol,
                &segment,
            ),
            None => internet_checksum(&segment),
        };
        segment[16..18].copy_from_slice(&checksum.to_be_bytes());

        buf.put_slice(&segment[..header_len]);
        Ok(())
    }

    fn deserialize(&mut self, data: &[u8]) -> Result<usize> {
        if data.len() < Self::MIN_HEADER_SIZE {
            return Err(Error::short(
                LayerType::Tcp,
                Self::MIN_HEADER_SIZE,
                data.len(),
            ));
        }

        let offset = data[12] >> 4;
        if offset < 5 {
            return Err(Error::malformed(
                LayerType::Tcp,
                format!("data offset {} below minimum 5", offset),
            ));
        }

        let header_len = offset as usize * 4;
        if data.len() < header_len {
            return Err(Error::short(LayerType::Tcp, header_len, data.len()));
        }

        self.source_port = u16::from_be_bytes([data[0], data[1]]);
        self.destination_port = u16::from_be_bytes([data[2], data[3]]);
        self.sequence = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        self.acknowledgment = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
        self.flags = TcpFlags::from_u8(data[13]);
        self.window = u16::from_be_bytes([data[14], data[15]]);
        self.checksum = u16::from_be_bytes([data[16], data[17]]);
        self.urgent = u16::from_be_bytes([data[18], data[19]]);
        self.options = data[Self::MIN_HEADER_SIZE..header_len].to_vec();

        Ok(header_len)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
