// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-path byte/update analytics and bandwidth history, shared by the
//! client and server pipelines. Bounded by LRU eviction so a noisy stream
//! of unknown paths can't grow memory unbounded, the same way the
//! teacher's discovery cache (`hdds::core::discovery`) caps its
//! participant table with `lru::LruCache` rather than a plain `HashMap`.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::time::Instant;

use lru::LruCache;

/// Accumulated count/bytes for one telemetry path.
#[derive(Debug, Clone, Copy)]
pub struct PathStats {
    pub count: u64,
    pub bytes: f64,
    pub last_update: Instant,
}

/// Bounded path -> stats table. At capacity, the least-recently-updated
/// path is evicted to make room for a new one.
pub struct PerPathAnalytics {
    cache: LruCache<String, PathStats>,
}

impl PerPathAnalytics {
    pub fn new(cap: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(cap.max(1)).unwrap()),
        }
    }

    /// Record `bytes` attributed to `path`, bumping its count and
    /// `last_update`. Touches the path to most-recently-used regardless
    /// of whether it already existed.
    pub fn record(&mut self, path: &str, bytes: f64) {
        let now = Instant::now();
        if let Some(stats) = self.cache.get_mut(path) {
            stats.count += 1;
            stats.bytes += bytes;
            stats.last_update = now;
        } else {
            self.cache.put(
                path.to_string(),
                PathStats {
                    count: 1,
                    bytes,
                    last_update: now,
                },
            );
        }
    }

    pub fn get(&mut self, path: &str) -> Option<&PathStats> {
        self.cache.get(path)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// One bandwidth-history sample.
#[derive(Debug, Clone, Copy)]
pub struct BandwidthSample {
    pub at: Instant,
    pub rate_out_bps: f64,
    pub rate_in_bps: f64,
    pub compression_ratio: f64,
}

/// Fixed-capacity circular buffer of bandwidth samples.
pub struct BandwidthHistory {
    cap: usize,
    samples: VecDeque<BandwidthSample>,
}

impl BandwidthHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            samples: VecDeque::new(),
        }
    }

    pub fn push(&mut self, sample: BandwidthSample) {
        if self.samples.len() >= self.cap {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn latest(&self) -> Option<&BandwidthSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BandwidthSample> {
        self.samples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_count_and_bytes_per_path() {
        let mut analytics = PerPathAnalytics::new(8);
        analytics.record("navigation.position", 40.0);
        analytics.record("navigation.position", 40.0);

        let stats = analytics.get("navigation.position").unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.bytes, 80.0);
    }

    #[test]
    fn evicts_stalest_path_at_capacity() {
        let mut analytics = PerPathAnalytics::new(2);
        analytics.record("a", 1.0);
        analytics.record("b", 1.0);
        analytics.record("a", 1.0); // touches "a", making "b" the stalest
        analytics.record("c", 1.0); // evicts "b"

        assert!(analytics.get("b").is_none());
        assert!(analytics.get("a").is_some());
        assert!(analytics.get("c").is_some());
    }

    #[test]
    fn bandwidth_history_is_bounded_and_fifo() {
        let mut history = BandwidthHistory::new(3);
        for i in 0..5 {
            history.push(BandwidthSample {
                at: Instant::now(),
                rate_out_bps: i as f64,
                rate_in_bps: 0.0,
                compression_ratio: 1.0,
            });
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.latest().unwrap().rate_out_bps, 4.0);
    }
}
