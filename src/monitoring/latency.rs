// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-path latency tracking: a bounded map of path -> sliding sample
//! window, with evict-stalest-path behavior once the map is at capacity.

use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencyStats {
    pub count: usize,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

struct PathWindow {
    samples: VecDeque<f64>,
    window_cap: usize,
}

/// Bounded map of path name to a sliding latency-sample window. At
/// capacity, inserting a new path evicts the stalest (oldest-inserted)
/// one -- tracked via `insertion_order`.
pub struct PerPathLatency {
    path_cap: usize,
    windows: Vec<(String, PathWindow)>,
    window_size: usize,
}

impl PerPathLatency {
    pub fn new(path_cap: usize, window_size: usize) -> Self {
        Self {
            path_cap,
            windows: Vec::new(),
            window_size,
        }
    }

    fn index_of(&self, path: &str) -> Option<usize> {
        self.windows.iter().position(|(p, _)| p == path)
    }

    pub fn record(&mut self, path: &str, sample: Duration) {
        let ms = sample.as_secs_f64() * 1000.0;

        if let Some(idx) = self.index_of(path) {
            let window = &mut self.windows[idx].1;
            window.samples.push_back(ms);
            if window.samples.len() > window.window_cap {
                window.samples.pop_front();
            }
            return;
        }

        if self.windows.len() >= self.path_cap {
            self.windows.remove(0);
        }
        let mut samples = VecDeque::new();
        samples.push_back(ms);
        self.windows.push((
            path.to_string(),
            PathWindow {
                samples,
                window_cap: self.window_size,
            },
        ));
    }

    pub fn stats(&self, path: &str) -> Option<LatencyStats> {
        let idx = self.index_of(path)?;
        let mut sorted: Vec<f64> = self.windows[idx].1.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let count = sorted.len();
        if count == 0 {
            return Some(LatencyStats::default());
        }

        let avg = sorted.iter().sum::<f64>() / count as f64;
        let percentile = |p: f64| -> f64 {
            let idx = ((p * count as f64).floor() as usize).min(count - 1);
            sorted[idx]
        };

        Some(LatencyStats {
            count,
            avg_ms: avg,
            min_ms: sorted[0],
            max_ms: sorted[count - 1],
            p50_ms: percentile(0.50),
            p95_ms: percentile(0.95),
            p99_ms: percentile(0.99),
        })
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Paths currently tracked, for a host snapshot that wants to list
    /// every path rather than look one up by name.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.windows.iter().map(|(p, _)| p.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_computes_basic_stats() {
        let mut latency = PerPathLatency::new(8, 100);
        for ms in [10.0, 20.0, 30.0, 40.0, 50.0] {
            latency.record("navigation.position", Duration::from_secs_f64(ms / 1000.0));
        }

        let stats = latency.stats("navigation.position").unwrap();
        assert_eq!(stats.count, 5);
        assert_eq!(stats.min_ms, 10.0);
        assert_eq!(stats.max_ms, 50.0);
        assert_eq!(stats.avg_ms, 30.0);
    }

    #[test]
    fn window_is_bounded_per_path() {
        let mut latency = PerPathLatency::new(8, 3);
        for ms in 0..10 {
            latency.record("a.b", Duration::from_millis(ms));
        }
        let stats = latency.stats("a.b").unwrap();
        assert_eq!(stats.count, 3);
    }

    #[test]
    fn capacity_evicts_stalest_path() {
        let mut latency = PerPathLatency::new(2, 10);
        latency.record("a", Duration::from_millis(1));
        latency.record("b", Duration::from_millis(1));
        latency.record("c", Duration::from_millis(1));

        assert!(latency.stats("a").is_none());
        assert!(latency.stats("b").is_some());
        assert!(latency.stats("c").is_some());
    }

    #[test]
    fn unknown_path_has_no_stats() {
        let latency = PerPathLatency::new(8, 10);
        assert!(latency.stats("nope").is_none());
    }
}
