// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client-side retransmit queue: insertion-ordered, bounded by a byte/entry
//! cap, pruned by an age budget derived from measured RTT.
//!
//! Owned exclusively by the client send path and ACK/NAK ingress, per the
//! single-writer rule described for the client pipeline.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::seqtrack::is_ahead;

/// One queued packet awaiting acknowledgement.
#[derive(Debug, Clone)]
pub struct RetransmitEntry {
    pub sequence: u32,
    pub packet: Vec<u8>,
    pub original_sent_at: Instant,
    pub last_sent_at: Instant,
    pub attempts: u32,
}

/// A packet handed back by [`RetransmitQueue::retransmit`] for re-send.
#[derive(Debug, Clone)]
pub struct RetransmitJob {
    pub sequence: u32,
    pub packet: Vec<u8>,
    pub attempt: u32,
}

/// Configuration for queue capacity and pruning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetransmitConfig {
    pub cap: usize,
    pub max_attempts: u32,
    #[serde(with = "crate::config::duration_millis")]
    pub configured_min_age: Duration,
    #[serde(with = "crate::config::duration_millis")]
    pub configured_max_age: Duration,
    pub age_rtt_multiplier: f64,
    #[serde(with = "crate::config::duration_millis")]
    pub idle_threshold: Duration,
    #[serde(with = "crate::config::duration_millis")]
    pub force_drain_threshold: Duration,
}

impl Default for RetransmitConfig {
    fn default() -> Self {
        Self {
            cap: 1024,
            max_attempts: 8,
            configured_min_age: Duration::from_millis(200),
            configured_max_age: Duration::from_secs(5),
            age_rtt_multiplier: 4.0,
            idle_threshold: Duration::from_secs(10),
            force_drain_threshold: Duration::from_secs(30),
        }
    }
}

/// Bounded, insertion-ordered retransmit queue.
pub struct RetransmitQueue {
    config: RetransmitConfig,
    entries: VecDeque<RetransmitEntry>,
}

impl RetransmitQueue {
    pub fn new(config: RetransmitConfig) -> Self {
        Self {
            config,
            entries: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a new entry; evicts the oldest by insertion order if the
    /// queue would exceed its cap.
    pub fn add(&mut self, sequence: u32, packet: Vec<u8>) {
        if self.entries.len() >= self.config.cap {
            self.entries.pop_front();
        }
        let now = Instant::now();
        self.entries.push_back(RetransmitEntry {
            sequence,
            packet,
            original_sent_at: now,
            last_sent_at: now,
            attempts: 0,
        });
    }

    pub fn has(&self, sequence: u32) -> bool {
        self.entries.iter().any(|e| e.sequence == sequence)
    }

    pub fn get(&self, sequence: u32) -> Option<&RetransmitEntry> {
        self.entries.iter().find(|e| e.sequence == sequence)
    }

    /// Remove a single acknowledged sequence.
    pub fn acknowledge(&mut self, sequence: u32) {
        self.entries.retain(|e| e.sequence != sequence);
    }

    /// Remove every entry whose sequence falls in `(prev, seq]` under
    /// modular arithmetic (mod 2^32).
    pub fn acknowledge_range(&mut self, prev: u32, seq: u32) {
        self.entries.retain(|e| !in_modular_range(prev, seq, e.sequence));
    }

    /// Remove every entry whose sequence is `seq` or modularly behind it.
    /// Used for the very first cumulative ACK of a session, before any
    /// `prev` baseline exists for [`acknowledge_range`].
    pub fn acknowledge_upto(&mut self, seq: u32) {
        self.entries.retain(|e| is_ahead(e.sequence, seq));
    }

    /// Produce retransmit jobs for the given missing sequences, skipping
    /// ones no longer present. Bumps attempt count and last-send timestamp
    /// for each; entries exceeding the attempt cap are dropped and omitted
    /// from the output.
    pub fn retransmit(&mut self, missing: &[u32]) -> Vec<RetransmitJob> {
        let now = Instant::now();
        let mut jobs = Vec::new();
        let max_attempts = self.config.max_attempts;

        for &seq in missing {
            let Some(pos) = self.entries.iter().position(|e| e.sequence == seq) else {
                continue;
            };
            let entry = &mut self.entries[pos];
            entry.attempts += 1;
            entry.last_sent_at = now;

            if entry.attempts > max_attempts {
                self.entries.remove(pos);
                continue;
            }

            jobs.push(RetransmitJob {
                sequence: seq,
                packet: self.entries[pos].packet.clone(),
                attempt: self.entries[pos].attempts,
            });
        }

        jobs
    }

    /// Remove entries whose last-send timestamp precedes `now - max_age`.
    /// Returns the number removed.
    pub fn expire_old(&mut self, max_age: Duration) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|e| now.duration_since(e.last_sent_at) < max_age);
        before - self.entries.len()
    }

    /// Effective max age for this prune pass, per the rtt-derived budget:
    /// `min(configuredMax, max(configuredMin, rtt * multiplier))`, further
    /// capped when ACKs have gone idle, with a force-drain above that.
    ///
    /// Returns `None` when the queue should be force-drained outright.
    pub fn prune(&mut self, rtt: Duration, time_since_last_ack: Duration) -> usize {
        if time_since_last_ack >= self.config.force_drain_threshold && !self.entries.is_empty() {
            let dropped = self.entries.len();
            self.entries.clear();
            return dropped;
        }

        let rtt_based = rtt.mul_f64(self.config.age_rtt_multiplier);
        let mut max_age = self
            .config
            .configured_max_age
            .min(self.config.configured_min_age.max(rtt_based));

        if time_since_last_ack >= self.config.idle_threshold {
            max_age = max_age.min(self.config.idle_threshold);
        }

        self.expire_old(max_age)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn in_modular_range(prev: u32, seq: u32, candidate: u32) -> bool {
    let offset_from_prev = candidate.wrapping_sub(prev);
    let span = seq.wrapping_sub(prev);
    offset_from_prev != 0 && offset_from_prev <= span
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(cap: usize, max_attempts: u32) -> RetransmitConfig {
        RetransmitConfig {
            cap,
            max_attempts,
            ..RetransmitConfig::default()
        }
    }

    #[test]
    fn add_evicts_oldest_when_over_cap() {
        let mut queue = RetransmitQueue::new(config(2, 8));
        queue.add(1, vec![1]);
        queue.add(2, vec![2]);
        queue.add(3, vec![3]);

        assert_eq!(queue.len(), 2);
        assert!(!queue.has(1));
        assert!(queue.has(2));
        assert!(queue.has(3));
    }

    #[test]
    fn acknowledge_range_removes_modular_span() {
        let mut queue = RetransmitQueue::new(config(16, 8));
        for seq in 1..=5u32 {
            queue.add(seq, vec![seq as u8]);
        }

        queue.acknowledge_range(1, 3);
        assert!(!queue.has(1));
        assert!(!queue.has(2));
        assert!(!queue.has(3));
        assert!(queue.has(4));
        assert!(queue.has(5));
    }

    #[test]
    fn acknowledge_range_handles_wraparound() {
        let mut queue = RetransmitQueue::new(config(16, 8));
        queue.add(u32::MAX - 1, vec![1]);
        queue.add(u32::MAX, vec![2]);
        queue.add(0, vec![3]);
        queue.add(1, vec![4]);

        queue.acknowledge_range(u32::MAX - 1, 1);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn acknowledge_upto_removes_seq_and_everything_behind_it() {
        let mut queue = RetransmitQueue::new(config(16, 8));
        for seq in 1..=5u32 {
            queue.add(seq, vec![seq as u8]);
        }

        queue.acknowledge_upto(3);
        assert!(!queue.has(1));
        assert!(!queue.has(2));
        assert!(!queue.has(3));
        assert!(queue.has(4));
        assert!(queue.has(5));
    }

    #[test]
    fn retransmit_bumps_attempts_and_drops_past_cap() {
        let mut queue = RetransmitQueue::new(config(16, 2));
        queue.add(7, vec![0xAB]);

        let jobs = queue.retransmit(&[7]);
        assert_eq!(jobs[0].attempt, 1);

        let jobs = queue.retransmit(&[7]);
        assert_eq!(jobs[0].attempt, 2);

        let jobs = queue.retransmit(&[7]);
        assert!(jobs.is_empty());
        assert!(!queue.has(7));
    }

    #[test]
    fn retransmit_skips_unknown_sequences() {
        let mut queue = RetransmitQueue::new(config(16, 8));
        let jobs = queue.retransmit(&[99]);
        assert!(jobs.is_empty());
    }

    #[test]
    fn prune_force_drains_past_force_drain_threshold() {
        let mut queue = RetransmitQueue::new(RetransmitConfig {
            force_drain_threshold: Duration::from_millis(0),
            ..RetransmitConfig::default()
        });
        queue.add(1, vec![1]);
        queue.add(2, vec![2]);

        let removed = queue.prune(Duration::from_millis(50), Duration::from_secs(60));
        assert_eq!(removed, 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn clear_empties_the_queue() {
        let mut queue = RetransmitQueue::new(config(16, 8));
        queue.add(1, vec![1]);
        queue.clear();
        assert_eq!(queue.len(), 0);
    }
}
