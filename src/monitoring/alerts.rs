// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-metric threshold alerting with level transitions and a cooldown
//! that suppresses repeated alerts at the same level.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Clear,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy)]
pub struct AlertThreshold {
    pub warning: f64,
    pub critical: f64,
}

struct MetricState {
    threshold: AlertThreshold,
    last_level: AlertLevel,
    last_fired_at: Option<Instant>,
}

/// Tracks per-metric alert state and applies a cooldown to repeated
/// same-level alerts; a level transition (e.g. warning -> critical, or
/// critical -> clear) always fires regardless of cooldown.
pub struct AlertManager {
    cooldown: Duration,
    metrics: HashMap<String, MetricState>,
}

impl AlertManager {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            metrics: HashMap::new(),
        }
    }

    pub fn configure(&mut self, metric: &str, threshold: AlertThreshold) {
        self.metrics.insert(
            metric.to_string(),
            MetricState {
                threshold,
                last_level: AlertLevel::Clear,
                last_fired_at: None,
            },
        );
    }

    /// Evaluate `value` against the configured threshold for `metric`.
    /// Returns `Some(level)` when an alert (or an explicit clear) should
    /// be surfaced to the host, `None` when suppressed by cooldown.
    pub fn check(&mut self, metric: &str, value: f64) -> Option<AlertLevel> {
        let state = self.metrics.get_mut(metric)?;

        let level = if value >= state.threshold.critical {
            AlertLevel::Critical
        } else if value >= state.threshold.warning {
            AlertLevel::Warning
        } else {
            AlertLevel::Clear
        };

        let now = Instant::now();
        let transitioned = level != state.last_level;
        let cooled_down = match state.last_fired_at {
            Some(t) => now.duration_since(t) >= self.cooldown,
            None => true,
        };

        if !transitioned && !cooled_down {
            return None;
        }

        state.last_level = level;
        state.last_fired_at = Some(now);
        Some(level)
    }
}
