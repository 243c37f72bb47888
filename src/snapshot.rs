// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host-facing snapshot structures.
//!
//! Plain, epoch-tagged point-in-time views built on demand from the
//! owning component, the same convention as the teacher's
//! `admin::snapshot` module (`MeshSnapshot`, `MetricsSnapshot`, ...):
//! a host polling an HTTP surface clones one of these rather than being
//! handed a reference into live pipeline state.

use crate::bonding::{BondingManager, LinkHealth, LinkName, LinkStatus};
use crate::congestion::{CongestionController, Mode};
use crate::metrics::MetricsSnapshot as LinkMetricsSnapshot;
use crate::monitoring::{LatencyStats, LossSummary, PerPathLatency, RetransmitTracker};

/// RTT/jitter/loss/quality, as last published by a
/// [`crate::metrics::MetricsPublisher`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkMetricsSnapshot {
    pub epoch: u64,
    pub rtt_ms: Option<f64>,
    pub jitter_ms: Option<f64>,
    pub loss: Option<f64>,
    pub link_quality: u32,
}

impl NetworkMetricsSnapshot {
    #[must_use]
    pub fn capture(epoch: u64, metrics: LinkMetricsSnapshot) -> Self {
        Self {
            epoch,
            rtt_ms: metrics.rtt_ms,
            jitter_ms: metrics.jitter_ms,
            loss: metrics.loss,
            link_quality: metrics.link_quality,
        }
    }
}

/// Congestion controller state: the current `deltaTimer` and whether it
/// is host-pinned (manual) or adaptive (auto).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CongestionSnapshot {
    pub epoch: u64,
    pub delta_timer_ms: u64,
    pub manual: bool,
}

impl CongestionSnapshot {
    #[must_use]
    pub fn capture(epoch: u64, controller: &CongestionController) -> Self {
        Self {
            epoch,
            delta_timer_ms: controller.delta_timer().as_millis() as u64,
            manual: matches!(controller.mode(), Mode::Manual),
        }
    }
}

/// One link's health, as exposed under `…links.<name>`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkView {
    pub status: LinkStatus,
    pub rtt_ms: f64,
    pub loss: f64,
    pub quality: u32,
}

impl From<LinkHealth> for LinkView {
    fn from(health: LinkHealth) -> Self {
        Self {
            status: health.status,
            rtt_ms: health.rtt.as_secs_f64() * 1000.0,
            loss: health.loss,
            quality: health.quality,
        }
    }
}

/// Bonding manager state: which link is active and both links' health.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BondingSnapshot {
    pub epoch: u64,
    pub active: LinkName,
    pub primary: LinkView,
    pub backup: LinkView,
}

impl BondingSnapshot {
    #[must_use]
    pub fn capture(epoch: u64, manager: &BondingManager) -> Self {
        Self {
            epoch,
            active: manager.active_link(),
            primary: manager.health(LinkName::Primary).into(),
            backup: manager.health(LinkName::Backup).into(),
        }
    }
}

/// Per-path latency view, for `MonitoringSnapshot::path_latency`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathLatencyView {
    pub path: String,
    pub stats: LatencyStats,
}

/// Observability-only rollup: loss trend, retransmit rate, per-path
/// latency. None of this feeds back into the data path.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringSnapshot {
    pub epoch: u64,
    pub loss: LossSummary,
    pub retransmit_rate: f64,
    pub path_latency: Vec<PathLatencyView>,
}

impl MonitoringSnapshot {
    #[must_use]
    pub fn capture(epoch: u64, loss: LossSummary, retransmit: &RetransmitTracker, latency: &PerPathLatency) -> Self {
        let path_latency = latency
            .paths()
            .filter_map(|path| latency.stats(path).map(|stats| PathLatencyView { path: path.to_string(), stats }))
            .collect();
        Self {
            epoch,
            loss,
            retransmit_rate: retransmit.period_rate(),
            path_latency,
        }
    }
}
