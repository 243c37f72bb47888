// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Retransmit-rate tracker: bounded history of cumulative sent/retransmit
//! snapshots, used to derive a period rate and a per-second rate.

use std::collections::VecDeque;
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    at: Instant,
    cumulative_sent: u64,
    cumulative_retransmits: u64,
}

pub struct RetransmitTracker {
    capacity: usize,
    history: VecDeque<Snapshot>,
}

impl RetransmitTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            history: VecDeque::new(),
        }
    }

    pub fn record(&mut self, cumulative_sent: u64, cumulative_retransmits: u64) {
        if self.history.len() >= self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(Snapshot {
            at: Instant::now(),
            cumulative_sent,
            cumulative_retransmits,
        });
    }

    /// `Δretrans / Δsent` between the oldest and newest snapshot in
    /// history.
    pub fn period_rate(&self) -> f64 {
        let (Some(first), Some(last)) = (self.history.front(), self.history.back()) else {
            return 0.0;
        };
        let sent_delta = last.cumulative_sent.saturating_sub(first.cumulative_sent);
        if sent_delta == 0 {
            return 0.0;
        }
        let retrans_delta = last.cumulative_retransmits.saturating_sub(first.cumulative_retransmits);
        retrans_delta as f64 / sent_delta as f64
    }

    /// Retransmits per second, from the same window's wall-clock span.
    pub fn per_second_rate(&self) -> f64 {
        let (Some(first), Some(last)) = (self.history.front(), self.history.back()) else {
            return 0.0;
        };
        let elapsed = last.at.duration_since(first.at).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        let retrans_delta = last.cumulative_retransmits.saturating_sub(first.cumulative_retransmits);
        retrans_delta as f64 / elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn period_rate_is_zero_with_fewer_than_two_snapshots() {
        let mut tracker = RetransmitTracker::new(8);
        tracker.record(100, 1);
        assert_eq!(tracker.period_rate(), 0.0);
    }

    #[test]
    fn period_rate_reflects_delta_across_window() {
        let mut tracker = RetransmitTracker::new(8);
        tracker.record(0, 0);
        tracker.record(100, 10);
        assert_eq!(tracker.period_rate(), 0.1);
    }

    #[test]
    fn history_is_bounded_by_capacity() {
        let mut tracker = RetransmitTracker::new(2);
        tracker.record(1, 0);
        tracker.record(2, 0);
        tracker.record(3, 0);
        assert_eq!(tracker.history.len(), 2);
    }

    #[test]
    fn per_second_rate_uses_wall_clock_span() {
        let mut tracker = RetransmitTracker::new(8);
        tracker.record(0, 0);
        sleep(Duration::from_millis(20));
        tracker.record(100, 4);
        assert!(tracker.per_second_rate() > 0.0);
    }
}
