// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire packet codec: fixed 15-byte big-endian header, CRC-16/CCITT-FALSE
//! trailer, DATA/ACK/NAK/HEARTBEAT/HELLO framing.
//!
//! # Wire format
//!
//! ```text
//! +------+------+---------+-------+----------+----------+-------+---------+
//! |magic | magic| version | type  | flags    | sequence | length| crc16   |
//! |0x53  | 0x4B | 0x02    | u8    | u8       | u32 BE   | u32 BE| u16 BE  |
//! +------+------+---------+-------+----------+----------+-------+---------+
//!   0      1       2         3        4         5..9       9..13   13..15
//! ```
//!
//! followed by exactly `length` bytes of payload. The CRC covers bytes
//! `0..13` (everything before the CRC field itself).

pub mod builder;
pub mod crc;

use crate::error::{Result, TransportError};
use crc::crc16_ccitt;

/// Magic bytes identifying this wire protocol.
pub const MAGIC: [u8; 2] = [0x53, 0x4B];
/// Current protocol version.
pub const VERSION: u8 = 0x02;
/// Fixed header length in bytes.
pub const HEADER_LEN: usize = 15;

/// DATA/ACK/NAK/HEARTBEAT/HELLO packet kind (wire byte 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Data = 1,
    Ack = 2,
    Nak = 3,
    Heartbeat = 4,
    Hello = 5,
}

impl PacketType {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Data),
            2 => Some(Self::Ack),
            3 => Some(Self::Nak),
            4 => Some(Self::Heartbeat),
            5 => Some(Self::Hello),
            _ => None,
        }
    }
}

/// Flag bits (wire byte 4).
pub mod flags {
    pub const COMPRESSED: u8 = 0x01;
    pub const ENCRYPTED: u8 = 0x02;
    pub const MESSAGEPACK: u8 = 0x04;
    pub const PATH_DICTIONARY: u8 = 0x08;
}

/// Parsed packet header. Payload is handed back separately as a borrowed
/// slice so parsing never copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub kind: PacketType,
    pub flags: u8,
    pub sequence: u32,
    pub payload_len: u32,
}

impl Header {
    pub fn is_compressed(&self) -> bool {
        self.flags & flags::COMPRESSED != 0
    }
    pub fn is_encrypted(&self) -> bool {
        self.flags & flags::ENCRYPTED != 0
    }
    pub fn is_messagepack(&self) -> bool {
        self.flags & flags::MESSAGEPACK != 0
    }
    pub fn is_path_dictionary(&self) -> bool {
        self.flags & flags::PATH_DICTIONARY != 0
    }
}

/// Fast, side-effect-free check used to filter foreign traffic before full
/// parsing: at least [`HEADER_LEN`] bytes and the first three bytes match
/// magic + version.
#[inline]
#[must_use]
pub fn is_v2_packet(bytes: &[u8]) -> bool {
    bytes.len() >= HEADER_LEN && bytes[0] == MAGIC[0] && bytes[1] == MAGIC[1] && bytes[2] == VERSION
}

/// Build a complete packet: header + CRC + payload. Does not touch any
/// sequence counter; callers that need an auto-advancing sequence use
/// [`builder::PacketBuilder`].
#[must_use]
pub fn build(kind: PacketType, sequence: u32, payload: &[u8], flags: u8) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&MAGIC);
    buf.push(VERSION);
    buf.push(kind as u8);
    buf.push(flags);
    buf.extend_from_slice(&sequence.to_be_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());

    let crc = crc16_ccitt(&buf[0..13]);
    buf.extend_from_slice(&crc.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Parse a packet, returning its header and a borrowed view of the payload.
///
/// # Errors
///
/// Fails with [`TransportError::InvalidHeader`] if the buffer is shorter
/// than [`HEADER_LEN`], the magic/version don't match, the type is
/// unknown, the CRC doesn't verify, or the declared payload length
/// disagrees with the actual tail length.
pub fn parse(bytes: &[u8]) -> Result<(Header, &[u8])> {
    if bytes.len() < HEADER_LEN {
        return Err(TransportError::InvalidHeader("packet shorter than header".into()));
    }
    if bytes[0] != MAGIC[0] || bytes[1] != MAGIC[1] {
        return Err(TransportError::InvalidHeader("bad magic".into()));
    }
    if bytes[2] != VERSION {
        return Err(TransportError::InvalidHeader(format!(
            "unsupported version {}",
            bytes[2]
        )));
    }
    let kind = PacketType::from_byte(bytes[3])
        .ok_or_else(|| TransportError::InvalidHeader(format!("unknown type {}", bytes[3])))?;
    let flags = bytes[4];
    let sequence = u32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);
    let payload_len = u32::from_be_bytes([bytes[9], bytes[10], bytes[11], bytes[12]]);
    let stored_crc = u16::from_be_bytes([bytes[13], bytes[14]]);

    let computed_crc = crc16_ccitt(&bytes[0..13]);
    if computed_crc != stored_crc {
        return Err(TransportError::InvalidHeader("CRC mismatch".into()));
    }

    let payload = &bytes[HEADER_LEN..];
    if payload.len() as u64 != u64::from(payload_len) {
        return Err(TransportError::InvalidHeader(
            "payload length disagrees with tail length".into(),
        ));
    }

    Ok((
        Header {
            kind,
            flags,
            sequence,
            payload_len,
        },
        payload,
    ))
}

/// Decode an ACK payload: a single big-endian `u32` acknowledged sequence.
pub fn decode_ack_payload(payload: &[u8]) -> Result<u32> {
    if payload.len() != 4 {
        return Err(TransportError::InvalidHeader("ACK payload must be 4 bytes".into()));
    }
    Ok(u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]))
}

/// Encode an ACK payload.
#[must_use]
pub fn encode_ack_payload(seq: u32) -> [u8; 4] {
    seq.to_be_bytes()
}

/// Decode a NAK payload: an array of big-endian `u32` missing sequences.
///
/// # Errors
///
/// Fails if the payload length is not a multiple of 4.
pub fn decode_nak_payload(payload: &[u8]) -> Result<Vec<u32>> {
    if payload.len() % 4 != 0 {
        return Err(TransportError::InvalidHeader(
            "NAK payload length must be a multiple of 4".into(),
        ));
    }
    Ok(payload
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Encode a NAK payload from a list of missing sequences.
#[must_use]
pub fn encode_nak_payload(missing: &[u32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(missing.len() * 4);
    for seq in missing {
        buf.extend_from_slice(&seq.to_be_bytes());
    }
    buf
}

/// Bonding health probe: `"HBPROBE"` (7 bytes) + `u32` big-endian sequence
/// + 1 pad byte = 12 bytes. Recognized and echoed verbatim by the peer.
pub const HEALTH_PROBE_MAGIC: &[u8; 7] = b"HBPROBE";

#[must_use]
pub fn is_health_probe(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..7] == HEALTH_PROBE_MAGIC
}

#[must_use]
pub fn build_health_probe(sequence: u32) -> [u8; 12] {
    let mut buf = [0u8; 12];
    buf[0..7].copy_from_slice(HEALTH_PROBE_MAGIC);
    buf[7..11].copy_from_slice(&sequence.to_be_bytes());
    buf[11] = 0;
    buf
}

#[must_use]
pub fn parse_health_probe(bytes: &[u8]) -> Option<u32> {
    if !is_health_probe(bytes) {
        return None;
    }
    Some(u32::from_be_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_then_parse_round_trips_payload() {
        let payload = b"hello telemetry";
        let packet = build(PacketType::Data, 42, payload, flags::COMPRESSED);
        let (header, parsed_payload) = parse(&packet).expect("parse");

        assert_eq!(header.kind, PacketType::Data);
        assert_eq!(header.sequence, 42);
        assert!(header.is_compressed());
        assert!(!header.is_encrypted());
        assert_eq!(parsed_payload, payload);
    }

    #[test]
    fn single_bit_flip_is_rejected() {
        let packet = build(PacketType::Data, 1, b"payload", 0);
        for byte_idx in 0..HEADER_LEN {
            for bit in 0..8u8 {
                let mut corrupted = packet.clone();
                corrupted[byte_idx] ^= 1 << bit;
                assert!(parse(&corrupted).is_err(), "byte {byte_idx} bit {bit} should fail");
            }
        }
    }

    #[test]
    fn rejects_short_buffer() {
        assert!(parse(&[0u8; 10]).is_err());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut packet = build(PacketType::Heartbeat, 0, &[], 0);
        packet[0] = 0;
        assert!(parse(&packet).is_err());
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut packet = build(PacketType::Heartbeat, 0, &[], 0);
        packet[2] = 0x99;
        assert!(parse(&packet).is_err());
    }

    #[test]
    fn rejects_length_mismatch() {
        let mut packet = build(PacketType::Data, 0, b"abcd", 0);
        packet.push(0xFF); // tail now disagrees with declared length
        assert!(parse(&packet).is_err());
    }

    #[test]
    fn is_v2_packet_is_side_effect_free_and_fast() {
        let packet = build(PacketType::Data, 0, b"x", 0);
        assert!(is_v2_packet(&packet));
        assert!(!is_v2_packet(&[0u8; 20]));
        assert!(!is_v2_packet(&packet[..HEADER_LEN - 1]));
    }

    #[test]
    fn ack_payload_round_trips() {
        let payload = encode_ack_payload(1234);
        assert_eq!(decode_ack_payload(&payload).unwrap(), 1234);
    }

    #[test]
    fn nak_payload_round_trips() {
        let missing = vec![2, 7, 9];
        let payload = encode_nak_payload(&missing);
        assert_eq!(decode_nak_payload(&payload).unwrap(), missing);
    }

    #[test]
    fn nak_payload_rejects_non_multiple_of_four() {
        assert!(decode_nak_payload(&[0, 0, 0]).is_err());
    }

    #[test]
    fn health_probe_round_trips() {
        let probe = build_health_probe(7);
        assert!(is_health_probe(&probe));
        assert_eq!(parse_health_probe(&probe), Some(7));
        assert!(!is_health_probe(b"not a probe!"));
    }
}
