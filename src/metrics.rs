// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Metrics publisher: bounded moving-average windows for RTT/jitter/loss,
//! a weighted `linkQuality` score, and emit-on-change deduplication so the
//! host message sink isn't flooded with unchanged values.

use std::collections::VecDeque;

const WINDOW_SIZE: usize = 10;

const LOSS_CEILING: f64 = 1.0;
const RTT_CEILING_MS: f64 = 1000.0;
const JITTER_CEILING_MS: f64 = 500.0;
const RETRANSMIT_CEILING: f64 = 0.1;

fn clamp_score(observed: f64, ceiling: f64) -> f64 {
    (1.0 - observed / ceiling).clamp(0.0, 1.0)
}

struct MovingAverage {
    samples: VecDeque<f64>,
}

impl MovingAverage {
    fn new() -> Self {
        Self { samples: VecDeque::new() }
    }

    fn push(&mut self, value: f64) -> f64 {
        self.samples.push_back(value);
        if self.samples.len() > WINDOW_SIZE {
            self.samples.pop_front();
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Sample handed to [`MetricsPublisher::publish`]; any field left `None`
/// is not appended to its window this round.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSample {
    pub rtt_ms: Option<f64>,
    pub jitter_ms: Option<f64>,
    pub loss: Option<f64>,
    pub retransmit_rate: Option<f64>,
}

/// A published metric snapshot, with a flag for whether each field was
/// newly appended this round (vs. just carried forward).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub rtt_ms: Option<f64>,
    pub jitter_ms: Option<f64>,
    pub loss: Option<f64>,
    pub link_quality: u32,
}

/// Aggregate RTT/jitter/loss into a rounded, bounded `linkQuality` score
/// and publish with change-based deduplication.
pub struct MetricsPublisher {
    rtt: MovingAverage,
    jitter: MovingAverage,
    loss: MovingAverage,
    last_emitted: Option<MetricsSnapshot>,
}

impl MetricsPublisher {
    pub fn new() -> Self {
        Self {
            rtt: MovingAverage::new(),
            jitter: MovingAverage::new(),
            loss: MovingAverage::new(),
            last_emitted: None,
        }
    }

    /// Append any provided samples, compute the moving averages and
    /// `linkQuality`, and return `Some(snapshot)` unless every value
    /// equals what was last emitted.
    pub fn publish(&mut self, sample: MetricsSample, retransmit_rate: f64) -> Option<MetricsSnapshot> {
        let rtt_ms = sample.rtt_ms.map(|v| self.rtt.push(v));
        let jitter_ms = sample.jitter_ms.map(|v| self.jitter.push(v));
        let loss = sample.loss.map(|v| self.loss.push(v));

        let loss_score = clamp_score(loss.unwrap_or(0.0), LOSS_CEILING);
        let rtt_score = clamp_score(rtt_ms.unwrap_or(0.0), RTT_CEILING_MS);
        let jitter_score = clamp_score(jitter_ms.unwrap_or(0.0), JITTER_CEILING_MS);
        let retransmit_score = clamp_score(retransmit_rate, RETRANSMIT_CEILING);

        let link_quality =
            (40.0 * loss_score + 30.0 * rtt_score + 20.0 * jitter_score + 10.0 * retransmit_score).round() as u32;

        let snapshot = MetricsSnapshot {
            rtt_ms,
            jitter_ms,
            loss,
            link_quality,
        };

        if self.last_emitted == Some(snapshot) {
            return None;
        }
        self.last_emitted = Some(snapshot);
        Some(snapshot)
    }

    pub fn reset(&mut self) {
        self.rtt.clear();
        self.jitter.clear();
        self.loss.clear();
        self.last_emitted = None;
    }
}

impl Default for MetricsPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-link snapshot published under `…links.<name>.{status,rtt,loss,quality}`
/// without deduplication.
#[derive(Debug, Clone, Copy)]
pub struct PerLinkMetrics {
    pub rtt_ms: f64,
    pub loss: f64,
    pub quality: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publishes_non_dedup_when_values_change() {
        let mut publisher = MetricsPublisher::new();
        let first = publisher.publish(
            MetricsSample {
                rtt_ms: Some(50.0),
                jitter_ms: Some(5.0),
                loss: Some(0.0),
                ..Default::default()
            },
            0.0,
        );
        assert!(first.is_some());

        let second = publisher.publish(
            MetricsSample {
                rtt_ms: Some(50.0),
                jitter_ms: Some(5.0),
                loss: Some(0.0),
                ..Default::default()
            },
            0.0,
        );
        assert!(second.is_none(), "identical sample should be deduplicated");
    }

    #[test]
    fn changed_sample_is_published_again() {
        let mut publisher = MetricsPublisher::new();
        publisher.publish(MetricsSample { rtt_ms: Some(50.0), ..Default::default() }, 0.0);
        let changed = publisher.publish(MetricsSample { rtt_ms: Some(500.0), ..Default::default() }, 0.0);
        assert!(changed.is_some());
    }

    #[test]
    fn perfect_link_scores_near_100() {
        let mut publisher = MetricsPublisher::new();
        let snapshot = publisher
            .publish(
                MetricsSample {
                    rtt_ms: Some(0.0),
                    jitter_ms: Some(0.0),
                    loss: Some(0.0),
                    ..Default::default()
                },
                0.0,
            )
            .unwrap();
        assert_eq!(snapshot.link_quality, 100);
    }

    #[test]
    fn window_is_bounded_at_ten_samples() {
        let mut publisher = MetricsPublisher::new();
        for i in 0..20 {
            publisher.publish(MetricsSample { rtt_ms: Some(i as f64), ..Default::default() }, 0.0);
        }
        assert_eq!(publisher.rtt.samples.len(), WINDOW_SIZE);
    }

    #[test]
    fn reset_clears_windows_and_dedup_state() {
        let mut publisher = MetricsPublisher::new();
        publisher.publish(MetricsSample { rtt_ms: Some(50.0), ..Default::default() }, 0.0);
        publisher.reset();
        assert!(publisher.rtt.samples.is_empty());
        assert!(publisher.last_emitted.is_none());
    }
}
