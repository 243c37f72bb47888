// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! AIMD congestion controller: adjusts the inter-batch `deltaTimer` from
//! RTT/loss EMAs. Grounded on the teacher's congestion rate controller,
//! simplified to the single `deltaTimer` knob this transport exposes to
//! its batching loop instead of a byte-rate budget.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const EMA_ALPHA: f64 = 0.2;

#[derive(Debug, Clone, Copy)]
pub enum Mode {
    Auto,
    Manual,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CongestionConfig {
    #[serde(with = "crate::config::duration_millis")]
    pub min_delta_timer: Duration,
    #[serde(with = "crate::config::duration_millis")]
    pub max_delta_timer: Duration,
    #[serde(with = "crate::config::duration_millis")]
    pub initial_delta_timer: Duration,
    #[serde(with = "crate::config::duration_millis")]
    pub target_rtt: Duration,
    pub loss_threshold: f64,
    pub decrease_factor: f64,
    #[serde(with = "crate::config::duration_millis")]
    pub increase_step: Duration,
}

impl Default for CongestionConfig {
    fn default() -> Self {
        Self {
            min_delta_timer: Duration::from_millis(100),
            max_delta_timer: Duration::from_secs(5),
            initial_delta_timer: Duration::from_millis(500),
            target_rtt: Duration::from_millis(300),
            loss_threshold: 0.05,
            decrease_factor: 1.5,
            increase_step: Duration::from_millis(25),
        }
    }
}

/// Tracks RTT/loss EMAs and the adaptive inter-batch send interval.
pub struct CongestionController {
    config: CongestionConfig,
    mode: Mode,
    delta_timer: Duration,
    manual_delta_timer: Duration,
    rtt_ema: Option<f64>,
    loss_ema: Option<f64>,
}

impl CongestionController {
    pub fn new(config: CongestionConfig) -> Self {
        let delta_timer = config.initial_delta_timer;
        Self {
            manual_delta_timer: delta_timer,
            delta_timer,
            config,
            mode: Mode::Auto,
            rtt_ema: None,
            loss_ema: None,
        }
    }

    pub fn delta_timer(&self) -> Duration {
        self.delta_timer
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Update the RTT/loss exponential moving averages with a fresh sample.
    pub fn update_metrics(&mut self, rtt: Duration, loss: f64) {
        let rtt_secs = rtt.as_secs_f64();
        self.rtt_ema = Some(match self.rtt_ema {
            Some(prev) => prev + EMA_ALPHA * (rtt_secs - prev),
            None => rtt_secs,
        });
        self.loss_ema = Some(match self.loss_ema {
            Some(prev) => prev + EMA_ALPHA * (loss - prev),
            None => loss,
        });
    }

    /// Recompute `deltaTimer`. Called periodically (every second) by the
    /// caller's timer loop. In manual mode this just returns the fixed
    /// value; in auto mode it applies additive-increase/multiplicative-
    /// decrease against the tracked EMAs.
    pub fn adjust(&mut self) -> Duration {
        if matches!(self.mode, Mode::Manual) {
            return self.manual_delta_timer;
        }

        let rtt = self.rtt_ema.unwrap_or(0.0);
        let loss = self.loss_ema.unwrap_or(0.0);
        let target_rtt = self.config.target_rtt.as_secs_f64();

        if loss > self.config.loss_threshold || rtt > target_rtt {
            self.delta_timer = self.delta_timer.mul_f64(self.config.decrease_factor);
        } else if loss < self.config.loss_threshold / 2.0 && rtt < target_rtt / 2.0 {
            self.delta_timer = self.delta_timer.saturating_sub(self.config.increase_step);
        }

        self.delta_timer = self
            .delta_timer
            .clamp(self.config.min_delta_timer, self.config.max_delta_timer);
        self.delta_timer
    }

    pub fn set_manual_delta_timer(&mut self, value: Duration) {
        self.manual_delta_timer = value.clamp(self.config.min_delta_timer, self.config.max_delta_timer);
        self.mode = Mode::Manual;
        self.delta_timer = self.manual_delta_timer;
    }

    pub fn enable_auto_mode(&mut self) {
        self.mode = Mode::Auto;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_loss_decreases_rate_by_slowing_down() {
        let mut controller = CongestionController::new(CongestionConfig::default());
        let before = controller.delta_timer();
        controller.update_metrics(Duration::from_millis(50), 0.5);
        let after = controller.adjust();
        assert!(after > before);
    }

    #[test]
    fn low_loss_and_rtt_speeds_up() {
        let mut controller = CongestionController::new(CongestionConfig::default());
        for _ in 0..10 {
            controller.update_metrics(Duration::from_millis(10), 0.0);
            controller.adjust();
        }
        assert!(controller.delta_timer() < CongestionConfig::default().initial_delta_timer);
    }

    #[test]
    fn clamps_to_configured_bounds() {
        let config = CongestionConfig {
            min_delta_timer: Duration::from_millis(200),
            max_delta_timer: Duration::from_millis(600),
            ..CongestionConfig::default()
        };
        let mut controller = CongestionController::new(config);
        for _ in 0..50 {
            controller.update_metrics(Duration::from_millis(5), 0.0);
            controller.adjust();
        }
        assert!(controller.delta_timer() >= Duration::from_millis(200));

        for _ in 0..50 {
            controller.update_metrics(Duration::from_secs(2), 0.9);
            controller.adjust();
        }
        assert!(controller.delta_timer() <= Duration::from_millis(600));
    }

    #[test]
    fn manual_mode_ignores_metrics() {
        let mut controller = CongestionController::new(CongestionConfig::default());
        controller.set_manual_delta_timer(Duration::from_millis(333));
        controller.update_metrics(Duration::from_secs(2), 0.9);
        assert_eq!(controller.adjust(), Duration::from_millis(333));

        controller.enable_auto_mode();
        controller.update_metrics(Duration::from_millis(5), 0.0);
        assert_ne!(controller.adjust(), Duration::from_millis(333));
    }
}
