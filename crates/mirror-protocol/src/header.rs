//! The 8-byte packet header.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ProtocolViolation, HEADER_SIZE, MAX_PAYLOAD_SIZE, PROTOCOL_VERSION};

/// Which side sent a packet, decided by the high bit of its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketDirection {
    /// Types `0x00..=0x7F`.
    ClientToServer,
    /// Types `0x80..=0xFF`.
    ServerToClient,
}

impl PacketDirection {
    pub fn of(packet_type: u8) -> Self {
        if packet_type & 0x80 == 0 {
            Self::ClientToServer
        } else {
            Self::ServerToClient
        }
    }
}

/// Decoded header fields, in host byte order.
///
/// A `PacketHeader` may hold any values; [`is_valid`](Self::is_valid) says
/// whether it would be accepted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PacketHeader {
    pub version: u8,
    pub packet_type: u8,
    pub payload_length: u16,
    pub sequence: u32,
}

impl Default for PacketHeader {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

impl PacketHeader {
    /// A header stamped with [`PROTOCOL_VERSION`].
    pub fn new(packet_type: u8, payload_length: u16, sequence: u32) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            packet_type,
            payload_length,
            sequence,
        }
    }

    /// Version matches and the payload length is within bounds.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Like [`is_valid`](Self::is_valid), but says what is wrong.
    pub fn validate(&self) -> Result<(), ProtocolViolation> {
        if self.version != PROTOCOL_VERSION {
            return Err(ProtocolViolation::VersionMismatch {
                expected: PROTOCOL_VERSION,
                found: self.version,
            });
        }
        if usize::from(self.payload_length) > MAX_PAYLOAD_SIZE {
            return Err(ProtocolViolation::PayloadTooLarge {
                length: usize::from(self.payload_length),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(())
    }

    /// Header plus payload, in bytes.
    pub fn total_size(&self) -> usize {
        HEADER_SIZE + usize::from(self.payload_length)
    }

    pub fn direction(&self) -> PacketDirection {
        PacketDirection::of(self.packet_type)
    }

    /// Network byte order encoding.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0] = self.version;
        out[1] = self.packet_type;
        out[2..4].copy_from_slice(&self.payload_length.to_be_bytes());
        out[4..8].copy_from_slice(&self.sequence.to_be_bytes());
        out
    }

    /// Read a header from the front of `buf`.
    ///
    /// Only the length of `buf` is checked; the returned header may still be
    /// invalid. Bytes past the header are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolViolation> {
        if buf.len() < HEADER_SIZE {
            return Err(ProtocolViolation::Truncated {
                needed: HEADER_SIZE,
                actual: buf.len(),
            });
        }
        let bytes = &buf[..HEADER_SIZE];
        Ok(Self {
            version: bytes[0],
            packet_type: bytes[1],
            payload_length: u16::from_be_bytes([bytes[2], bytes[3]]),
            sequence: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        })
    }
}

impl fmt::Display for PacketHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{:#04x} type={:#04x} len={} seq={}",
            self.version, self.packet_type, self.payload_length, self.sequence
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
