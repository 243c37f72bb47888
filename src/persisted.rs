// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decoded shape of the three small JSON documents the host persists
//! under its own config directory: a delta-timer override, a
//! subscription, and a sentence filter. File I/O and the directory
//! layout are the host's concern; this module only models what's inside
//! them once read, the same split the teacher draws between
//! `hdds::config`'s `RuntimeConfig` (in-memory, owned by the core) and
//! the XML QoS profiles a host loads from disk before handing in.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A manual override of the congestion controller's `deltaTimer`,
/// persisted so it survives a restart. Mirrors
/// [`crate::congestion::CongestionController::set_manual_delta_timer`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeltaTimerOverride {
    #[serde(with = "crate::config::duration_millis")]
    pub delta_timer: Duration,
    pub manual: bool,
}

/// A host subscription signal: which paths/contexts the host wants
/// forwarded. Opaque to the core beyond its shape; rejecting a malformed
/// one is a `TransportError::Subscription`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub context: String,
    pub paths: Vec<String>,
}

/// A filter over which NMEA/N2K sentence types are forwarded upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceFilter {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
}

/// Decodes one of the three persisted documents from its host-supplied
/// bytes. The core never opens the file itself; a host reads the bytes
/// and hands them in.
pub trait PersistedState: Sized {
    fn decode(bytes: &[u8]) -> crate::error::Result<Self>;
}

impl PersistedState for DeltaTimerOverride {
    fn decode(bytes: &[u8]) -> crate::error::Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| crate::error::TransportError::General(format!("delta-timer override: {e}")))
    }
}

impl PersistedState for Subscription {
    fn decode(bytes: &[u8]) -> crate::error::Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| crate::error::TransportError::Subscription(format!("subscription: {e}")))
    }
}

impl PersistedState for SentenceFilter {
    fn decode(bytes: &[u8]) -> crate::error::Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| crate::error::TransportError::General(format!("sentence filter: {e}")))
    }
}
