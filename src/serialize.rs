// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Delta serialization: JSON by default, MessagePack ("binary map") when
//! the sender opts into the `MESSAGEPACK` wire flag for tighter framing
//! on constrained links.

use crate::error::{Result, TransportError};
use crate::model::Delta;

/// Serialize a delta to JSON.
pub fn to_json(delta: &Delta) -> Result<Vec<u8>> {
    serde_json::to_vec(delta).map_err(|e| TransportError::General(format!("json encode failed: {e}")))
}

/// Parse a delta from JSON.
pub fn from_json(bytes: &[u8]) -> Result<Delta> {
    serde_json::from_slice(bytes).map_err(|e| TransportError::General(format!("json decode failed: {e}")))
}

/// Serialize a delta to the compact MessagePack ("binary map") encoding.
pub fn to_binary_map(delta: &Delta) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(delta)
        .map_err(|e| TransportError::General(format!("messagepack encode failed: {e}")))
}

/// Parse a delta from the MessagePack encoding.
pub fn from_binary_map(bytes: &[u8]) -> Result<Delta> {
    rmp_serde::from_slice(bytes).map_err(|e| TransportError::General(format!("messagepack decode failed: {e}")))
}

/// Serialize a batch of deltas (the unit one `sendDelta` call frames into
/// a single packet) to JSON. The batch is a JSON array so the receiver's
/// "iterate its enumerable entries in insertion order" step applies
/// uniformly whether one delta or several were batched.
pub fn batch_to_json(deltas: &[Delta]) -> Result<Vec<u8>> {
    serde_json::to_vec(deltas).map_err(|e| TransportError::General(format!("json encode failed: {e}")))
}

/// Parse a batch of deltas from JSON.
pub fn batch_from_json(bytes: &[u8]) -> Result<Vec<Delta>> {
    serde_json::from_slice(bytes).map_err(|e| TransportError::General(format!("json decode failed: {e}")))
}

/// Serialize a batch of deltas to the compact MessagePack encoding.
pub fn batch_to_binary_map(deltas: &[Delta]) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(deltas).map_err(|e| TransportError::General(format!("messagepack encode failed: {e}")))
}

/// Parse a batch of deltas from the MessagePack encoding.
pub fn batch_from_binary_map(bytes: &[u8]) -> Result<Vec<Delta>> {
    rmp_serde::from_slice(bytes).map_err(|e| TransportError::General(format!("messagepack decode failed: {e}")))
}
