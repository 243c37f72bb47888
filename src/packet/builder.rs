// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sender-side sequence counter and packet builder.
//!
//! The sequence counter is owned by the packet builder and never shared
//! outside the client pipeline that owns it (spec: "the sender sequence
//! counter is owned by the packet builder and is not shared").

use std::sync::atomic::{AtomicU32, Ordering};

use super::{build, PacketType};

/// Monotonic (mod 2^32) sequence generator plus DATA packet builder.
#[derive(Debug)]
pub struct PacketBuilder {
    next: AtomicU32,
}

impl PacketBuilder {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(0),
        }
    }

    /// Current sequence that the *next* DATA packet will use, without
    /// advancing it.
    pub fn current(&self) -> u32 {
        self.next.load(Ordering::Relaxed)
    }

    /// Build a DATA packet at the current sequence, then advance the
    /// sequence by one (wrapping mod 2^32). Returns the packet bytes and
    /// the sequence it was sent with.
    pub fn build_data(&self, payload: &[u8], flags: u8) -> (Vec<u8>, u32) {
        let seq = self.next.fetch_add(1, Ordering::Relaxed);
        (build(PacketType::Data, seq, payload, flags), seq)
    }

    /// Build a non-DATA packet (ACK/NAK/HEARTBEAT/HELLO) at an explicit
    /// sequence; these do not consume the DATA sequence space.
    pub fn build_control(&self, kind: PacketType, sequence: u32, payload: &[u8]) -> Vec<u8> {
        build(kind, sequence, payload, 0)
    }
}

impl Default for PacketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::parse;

    #[test]
    fn sequence_advances_only_on_data() {
        let builder = PacketBuilder::new();
        assert_eq!(builder.current(), 0);

        let (packet, seq) = builder.build_data(b"payload", 0);
        assert_eq!(seq, 0);
        assert_eq!(builder.current(), 1);

        let (header, _) = parse(&packet).unwrap();
        assert_eq!(header.sequence, 0);

        let (_, seq2) = builder.build_data(b"payload2", 0);
        assert_eq!(seq2, 1);
    }

    #[test]
    fn sequence_wraps_at_u32_max() {
        let builder = PacketBuilder::new();
        builder.next.store(u32::MAX, Ordering::Relaxed);

        let (_, seq) = builder.build_data(b"x", 0);
        assert_eq!(seq, u32::MAX);
        assert_eq!(builder.current(), 0);
    }
}
