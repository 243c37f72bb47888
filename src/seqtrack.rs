// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Server-side sequence tracker: in-order/duplicate/gap classification and
//! pending-NAK one-shot timers over a modular (mod 2^32) sequence space.
//!
//! Owned exclusively by the server pipeline.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// `((a - b) mod 2^32) in (0, 2^31)`.
#[must_use]
pub fn is_ahead(a: u32, b: u32) -> bool {
    let diff = a.wrapping_sub(b);
    diff != 0 && diff < 0x8000_0000
}

/// Outcome of [`SequenceTracker::process_sequence`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SequenceOutcome {
    pub duplicate: bool,
    pub in_order: bool,
    pub resynced: bool,
    pub missing: Vec<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SequenceTrackerConfig {
    pub recent_seen_cap: usize,
    pub resync_threshold: u32,
    #[serde(with = "crate::config::duration_millis")]
    pub nak_timeout: Duration,
}

impl Default for SequenceTrackerConfig {
    fn default() -> Self {
        Self {
            recent_seen_cap: 256,
            resync_threshold: 1 << 20,
            nak_timeout: Duration::from_millis(250),
        }
    }
}

/// Sequence tracker state. `processSequence` classifies an incoming DATA
/// sequence; [`poll_expired_naks`](Self::poll_expired_naks) is driven by
/// the caller's timer loop to surface NAKs whose timeout has elapsed.
pub struct SequenceTracker {
    config: SequenceTrackerConfig,
    expected: Option<u32>,
    recent_seen: VecDeque<u32>,
    recent_seen_set: HashSet<u32>,
    pending_naks: Vec<(u32, Instant)>,
}

impl SequenceTracker {
    pub fn new(config: SequenceTrackerConfig) -> Self {
        Self {
            config,
            expected: None,
            recent_seen: VecDeque::new(),
            recent_seen_set: HashSet::new(),
            pending_naks: Vec::new(),
        }
    }

    pub fn expected_sequence(&self) -> Option<u32> {
        self.expected
    }

    fn remember_seen(&mut self, seq: u32) {
        if self.recent_seen_set.insert(seq) {
            self.recent_seen.push_back(seq);
            while self.recent_seen.len() > self.config.recent_seen_cap {
                if let Some(oldest) = self.recent_seen.pop_front() {
                    self.recent_seen_set.remove(&oldest);
                }
            }
        }
    }

    fn cancel_pending_nak(&mut self, seq: u32) {
        self.pending_naks.retain(|(s, _)| *s != seq);
    }

    /// Classify an incoming DATA sequence against tracker state.
    pub fn process_sequence(&mut self, s: u32) -> SequenceOutcome {
        let Some(expected) = self.expected else {
            self.expected = Some(s.wrapping_add(1));
            self.recent_seen.clear();
            self.recent_seen_set.clear();
            self.pending_naks.clear();
            self.remember_seen(s);
            return SequenceOutcome {
                resynced: true,
                ..Default::default()
            };
        };

        let ahead_distance = s.wrapping_sub(expected);
        if is_ahead(s, expected) && ahead_distance >= self.config.resync_threshold {
            self.expected = Some(s.wrapping_add(1));
            self.recent_seen.clear();
            self.recent_seen_set.clear();
            self.pending_naks.clear();
            self.remember_seen(s);
            return SequenceOutcome {
                resynced: true,
                ..Default::default()
            };
        }

        if s == expected {
            self.expected = Some(expected.wrapping_add(1));
            self.cancel_pending_nak(s);
            self.remember_seen(s);
            return SequenceOutcome {
                in_order: true,
                ..Default::default()
            };
        }

        if is_ahead(s, expected) {
            let mut missing = Vec::new();
            let mut cursor = expected;
            let now = Instant::now();
            while cursor != s {
                missing.push(cursor);
                self.pending_naks.push((cursor, now + self.config.nak_timeout));
                cursor = cursor.wrapping_add(1);
            }
            self.expected = Some(s.wrapping_add(1));
            self.remember_seen(s);
            return SequenceOutcome {
                missing,
                ..Default::default()
            };
        }

        self.cancel_pending_nak(s);
        self.remember_seen(s);
        SequenceOutcome {
            duplicate: true,
            ..Default::default()
        }
    }

    /// Return sequences whose NAK one-shot has fired without the gap
    /// being filled in the meantime, removing them from the pending set.
    pub fn poll_expired_naks(&mut self) -> Vec<u32> {
        let now = Instant::now();
        let mut expired = Vec::new();
        self.pending_naks.retain(|(seq, deadline)| {
            if *deadline <= now {
                expired.push(*seq);
                false
            } else {
                true
            }
        });
        expired
    }

    pub fn reset(&mut self) {
        self.expected = None;
        self.recent_seen.clear();
        self.recent_seen_set.clear();
        self.pending_naks.clear();
    }
}
