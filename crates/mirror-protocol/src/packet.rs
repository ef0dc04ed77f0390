//! Whole-packet framing: header plus opaque payload.

use tracing::warn;

use crate::header::PacketHeader;
use crate::{ProtocolViolation, HEADER_SIZE, MAX_PAYLOAD_SIZE};

/// A validated packet borrowed from a receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    pub header: PacketHeader,
    /// Exactly `header.payload_length` bytes.
    pub payload: &'a [u8],
}

impl<'a> Packet<'a> {
    /// Decode and validate the header, then slice out its payload.
    ///
    /// Bytes after the declared payload are ignored.
    pub fn parse(buf: &'a [u8]) -> Result<Self, ProtocolViolation> {
        let header = PacketHeader::decode(buf)?;
        header.validate()?;

        let declared = usize::from(header.payload_length);
        let available = buf.len() - HEADER_SIZE;
        if available < declared {
            return Err(ProtocolViolation::IncompletePayload {
                declared,
                available,
            });
        }

        Ok(Self {
            header,
            payload: &buf[HEADER_SIZE..HEADER_SIZE + declared],
        })
    }
}

/// Frame `payload` behind a fresh header.
pub fn encode_packet(
    packet_type: u8,
    payload: &[u8],
    sequence: u32,
) -> Result<Vec<u8>, ProtocolViolation> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolViolation::PayloadTooLarge {
            length: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }
    // MAX_PAYLOAD_SIZE fits in a u16, so this cannot truncate.
    let header = PacketHeader::new(packet_type, payload.len() as u16, sequence);

    let mut out = Vec::with_capacity(header.total_size());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Whether `buf` holds a complete, valid packet.
pub fn validate_packet(buf: &[u8]) -> bool {
    Packet::parse(buf).is_ok()
}

/// The payload of the packet at the front of `buf`.
pub fn payload(buf: &[u8]) -> Result<&[u8], ProtocolViolation> {
    Packet::parse(buf).map(|p| p.payload)
}

/// Receive-side entry point: parse `buf`, or log why it was dropped.
///
/// Violations are expected on an open network and never fatal, so this
/// returns `None` instead of an error.
pub fn accept_packet(buf: &[u8]) -> Option<Packet<'_>> {
    match Packet::parse(buf) {
        Ok(packet) => Some(packet),
        Err(violation) => {
            warn!(%violation, len = buf.len(), "dropping packet");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::PacketDirection;
    use crate::PROTOCOL_VERSION;

    #[test]
    fn encode_then_parse() {
        let bytes = encode_packet(0x03, &[9, 8, 7], 42).unwrap();
        assert_eq!(&bytes[..HEADER_SIZE], &[0x01u8, 0x03, 0x00, 0x03, 0, 0, 0, 42]);

        let packet = Packet::parse(&bytes).unwrap();
        assert_eq!(packet.header.sequence, 42);
        assert_eq!(packet.header.direction(), PacketDirection::ClientToServer);
        assert_eq!(packet.payload, &[9u8, 8, 7]);
    }

    #[test]
    fn empty_payload_is_just_a_header() {
        let bytes = encode_packet(0xFF, &[], 0).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert!(validate_packet(&bytes));
        assert_eq!(payload(&bytes), Ok(&[][..]));
    }

    #[test]
    fn encode_rejects_oversize_payload() {
        let big = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert_eq!(
            encode_packet(0x01, &big, 0),
            Err(ProtocolViolation::PayloadTooLarge {
                length: MAX_PAYLOAD_SIZE + 1,
                max: MAX_PAYLOAD_SIZE
            })
        );
        assert!(encode_packet(0x01, &big[..MAX_PAYLOAD_SIZE], 0).is_ok());
    }

    #[test]
    fn short_buffer_is_truncated() {
        assert!(matches!(
            payload(&[PROTOCOL_VERSION, 0x80]),
            Err(ProtocolViolation::Truncated { .. })
        ));
    }

    #[test]
    fn missing_payload_bytes_are_incomplete() {
        let mut bytes = encode_packet(0x80, b"hello", 1).unwrap();
        bytes.truncate(HEADER_SIZE + 2);
        assert_eq!(
            payload(&bytes),
            Err(ProtocolViolation::IncompletePayload {
                declared: 5,
                available: 2
            })
        );
        assert!(!validate_packet(&bytes));
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut bytes = encode_packet(0x80, b"hi", 1).unwrap();
        bytes.extend_from_slice(b"junk");
        assert_eq!(payload(&bytes), Ok(&b"hi"[..]));
    }

    #[test]
    fn bad_version_fails_validation() {
        let mut bytes = encode_packet(0x80, b"hi", 1).unwrap();
        bytes[0] = 0x09;
        assert!(!validate_packet(&bytes));
        assert!(matches!(
            payload(&bytes),
            Err(ProtocolViolation::VersionMismatch { found: 0x09, .. })
        ));
    }

    #[test]
    fn oversize_declared_length_fails_validation() {
        let header = PacketHeader::new(0x80, 1393, 0);
        let mut bytes = header.encode().to_vec();
        bytes.resize(HEADER_SIZE + 1393, 0);
        assert!(matches!(
            payload(&bytes),
            Err(ProtocolViolation::PayloadTooLarge { length: 1393, .. })
        ));
    }

    #[test]
    fn accept_packet_drops_instead_of_failing() {
        assert!(accept_packet(&[0x01]).is_none());
        assert!(accept_packet(&[0x02, 0, 0, 0, 0, 0, 0, 0]).is_none());

        let bytes = encode_packet(0x81, b"ok", 7).unwrap();
        let packet = accept_packet(&bytes).unwrap();
        assert_eq!(packet.header.sequence, 7);
        assert_eq!(packet.payload, b"ok");
    }
}
