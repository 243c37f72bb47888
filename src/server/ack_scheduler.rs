// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cumulative ACK scheduling: when to (re-)send an ACK for the current
//! `expected_sequence - 1`. Kept separate from [`super::ServerPipeline`] so
//! the idle-resend policy can be unit tested against a bare clock instead
//! of a live socket, the same split the teacher draws between its
//! `transport::lowbw::scheduler` and `transport::lowbw::transport` modules.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AckSchedulerConfig {
    #[serde(with = "crate::config::duration_millis")]
    pub ack_interval: Duration,
    /// How long an unchanged cumulative ACK is repeated for, in case the
    /// original was itself lost. Resolves the open question of whether a
    /// stalled sender should see ACKs resent indefinitely: it does, on this
    /// interval, for as long as `ack_tick` keeps being driven.
    #[serde(with = "crate::config::duration_millis")]
    pub ack_resend_interval: Duration,
}

impl Default for AckSchedulerConfig {
    fn default() -> Self {
        Self {
            ack_interval: Duration::from_millis(100),
            ack_resend_interval: Duration::from_secs(1),
        }
    }
}

/// Decides, once per `ack_tick`, whether a cumulative ACK is due.
pub struct AckScheduler {
    config: AckSchedulerConfig,
    last_sent: Option<(u32, Instant)>,
    acks_sent: u64,
    naks_sent: u64,
}

impl AckScheduler {
    pub fn new(config: AckSchedulerConfig) -> Self {
        Self {
            config,
            last_sent: None,
            acks_sent: 0,
            naks_sent: 0,
        }
    }

    /// `expected_seq` is the tracker's next-expected sequence; the ACK
    /// acknowledges everything up to and including `expected_seq - 1`.
    /// Returns `Some` the first time a given cumulative value is seen, and
    /// again every `ack_resend_interval` after that for as long as it
    /// stays unchanged (covers a lost ACK without flooding the link).
    pub fn maybe_ack(&mut self, expected_seq: u32) -> Option<u32> {
        let ack_seq = expected_seq.wrapping_sub(1);
        let now = Instant::now();
        let due = match self.last_sent {
            None => true,
            Some((seq, _)) if seq != ack_seq => true,
            Some((_, at)) => now.saturating_duration_since(at) >= self.config.ack_resend_interval,
        };
        if !due {
            return None;
        }
        self.last_sent = Some((ack_seq, now));
        self.acks_sent += 1;
        Some(ack_seq)
    }

    pub fn record_nak_sent(&mut self) {
        self.naks_sent += 1;
    }

    pub fn acks_sent(&self) -> u64 {
        self.acks_sent
    }

    pub fn naks_sent(&self) -> u64 {
        self.naks_sent
    }

    pub fn ack_interval(&self) -> Duration {
        self.config.ack_interval
    }
}
