// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Loss heatmap: a ring of fixed-duration buckets tracking sent vs. lost
//! packet counts, summarized into an overall rate, a worst bucket, and a
//! first-quarter-vs-last-quarter trend.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct Bucket {
    pub started_at: Instant,
    pub total: u64,
    pub lost: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossTrend {
    Worsening,
    Improving,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossSummary {
    pub overall_rate: f64,
    pub max_bucket_rate: f64,
    pub trend: LossTrend,
}

/// Fixed-duration bucketed loss ring, bounded by `capacity`.
pub struct LossHeatmap {
    bucket_duration: Duration,
    capacity: usize,
    buckets: VecDeque<Bucket>,
}

impl LossHeatmap {
    pub fn new(bucket_duration: Duration, capacity: usize) -> Self {
        Self {
            bucket_duration,
            capacity,
            buckets: VecDeque::new(),
        }
    }

    fn current_bucket(&mut self) -> &mut Bucket {
        let now = Instant::now();
        let needs_new = match self.buckets.back() {
            Some(b) => now.duration_since(b.started_at) >= self.bucket_duration,
            None => true,
        };
        if needs_new {
            if self.buckets.len() >= self.capacity {
                self.buckets.pop_front();
            }
            self.buckets.push_back(Bucket {
                started_at: now,
                total: 0,
                lost: 0,
            });
        }
        self.buckets.back_mut().expect("just ensured non-empty")
    }

    pub fn record(&mut self, lost: bool) {
        self.record_batch(1, if lost { 1 } else { 0 });
    }

    pub fn record_batch(&mut self, sent: u64, lost: u64) {
        let bucket = self.current_bucket();
        bucket.total += sent;
        bucket.lost += lost;
    }

    pub fn summary(&self) -> LossSummary {
        if self.buckets.is_empty() {
            return LossSummary {
                overall_rate: 0.0,
                max_bucket_rate: 0.0,
                trend: LossTrend::Stable,
            };
        }

        let total: u64 = self.buckets.iter().map(|b| b.total).sum();
        let lost: u64 = self.buckets.iter().map(|b| b.lost).sum();
        let overall_rate = if total == 0 { 0.0 } else { lost as f64 / total as f64 };

        let max_bucket_rate = self
            .buckets
            .iter()
            .map(|b| if b.total == 0 { 0.0 } else { b.lost as f64 / b.total as f64 })
            .fold(0.0, f64::max);

        let trend = self.trend();

        LossSummary {
            overall_rate,
            max_bucket_rate,
            trend,
        }
    }

    fn trend(&self) -> LossTrend {
        let n = self.buckets.len();
        if n < 4 {
            return LossTrend::Stable;
        }
        let quarter = n / 4;
        let first: Vec<_> = self.buckets.iter().take(quarter).collect();
        let last: Vec<_> = self.buckets.iter().skip(n - quarter).collect();

        let rate = |bs: &[&Bucket]| -> f64 {
            let total: u64 = bs.iter().map(|b| b.total).sum();
            let lost: u64 = bs.iter().map(|b| b.lost).sum();
            if total == 0 { 0.0 } else { lost as f64 / total as f64 }
        };

        let first_rate = rate(&first);
        let last_rate = rate(&last);

        if first_rate == 0.0 {
            return if last_rate == 0.0 { LossTrend::Stable } else { LossTrend::Worsening };
        }

        let ratio = last_rate / first_rate;
        if ratio > 1.5 {
            LossTrend::Worsening
        } else if ratio < 0.5 {
            LossTrend::Improving
        } else {
            LossTrend::Stable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accumulates_into_current_bucket() {
        let mut heatmap = LossHeatmap::new(Duration::from_secs(60), 16);
        heatmap.record(false);
        heatmap.record(true);
        heatmap.record_batch(3, 1);

        let summary = heatmap.summary();
        assert_eq!(summary.overall_rate, 2.0 / 5.0);
    }

    #[test]
    fn bucket_rolls_over_after_duration_elapses() {
        let mut heatmap = LossHeatmap::new(Duration::from_millis(0), 4);
        heatmap.record(false);
        heatmap.record(false);
        assert_eq!(heatmap.buckets.len(), 2);
    }

    #[test]
    fn capacity_evicts_oldest_bucket() {
        let mut heatmap = LossHeatmap::new(Duration::from_millis(0), 2);
        for _ in 0..5 {
            heatmap.record(false);
        }
        assert!(heatmap.buckets.len() <= 2);
    }

    #[test]
    fn empty_heatmap_is_stable() {
        let heatmap = LossHeatmap::new(Duration::from_secs(1), 4);
        assert_eq!(heatmap.summary().trend, LossTrend::Stable);
    }
}
