//! Mirror Protocol -- the fixed 8-byte packet header used at the network
//! boundary.
//!
//! ```text
//! offset  size  field
//! 0       1     version         must equal PROTOCOL_VERSION
//! 1       1     packet_type     0x00-0x7F client->server, 0x80-0xFF server->client
//! 2       2     payload_length  big-endian, <= MAX_PAYLOAD_SIZE
//! 4       4     sequence        big-endian, wraps at 2^32
//! ```
//!
//! Everything after the header is an opaque payload; this crate never looks
//! inside it.
//!
//! # Example
//!
//! ```
//! use mirror_protocol::prelude::*;
//!
//! let mut seq = SequenceCounter::new();
//! let bytes = encode_packet(0x80, b"hello", seq.next_sequence()).unwrap();
//! assert_eq!(bytes.len(), HEADER_SIZE + 5);
//!
//! let packet = Packet::parse(&bytes).unwrap();
//! assert_eq!(packet.header.direction(), PacketDirection::ServerToClient);
//! assert_eq!(packet.payload, b"hello");
//! ```

#![deny(unsafe_code)]

pub mod header;
pub mod packet;
pub mod sequence;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// The only version this crate accepts.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Size of the encoded header in bytes.
pub const HEADER_SIZE: usize = 8;

/// MTU-safe ceiling on a whole packet, header included.
pub const MAX_PACKET_SIZE: usize = 1400;

/// Largest payload that fits under [`MAX_PACKET_SIZE`].
pub const MAX_PAYLOAD_SIZE: usize = MAX_PACKET_SIZE - HEADER_SIZE;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why a buffer was rejected.
///
/// All of these are recoverable: the transport drops the packet and carries
/// on. See [`packet::accept_packet`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    /// Fewer bytes than a header.
    #[error("buffer holds {actual} bytes, a header needs {needed}")]
    Truncated { needed: usize, actual: usize },

    #[error("protocol version mismatch: expected {expected:#04x}, found {found:#04x}")]
    VersionMismatch { expected: u8, found: u8 },

    #[error("payload of {length} bytes exceeds the {max}-byte limit")]
    PayloadTooLarge { length: usize, max: usize },

    /// The header is valid but the buffer ends before the declared payload
    /// does.
    #[error("header declares {declared} payload bytes, buffer holds {available}")]
    IncompletePayload { declared: usize, available: usize },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::header::{PacketDirection, PacketHeader};
    pub use crate::packet::{accept_packet, encode_packet, payload, validate_packet, Packet};
    pub use crate::sequence::{sequence_newer, SequenceCounter, SequenceStatus, SequenceTracker};
    pub use crate::{
        ProtocolViolation, HEADER_SIZE, MAX_PACKET_SIZE, MAX_PAYLOAD_SIZE, PROTOCOL_VERSION,
    };
}
