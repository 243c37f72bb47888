// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Observability-only monitoring: none of these feed back into the data
//! path, they only answer the host's `GET /monitoring/*` surface.

pub mod alerts;
pub mod heatmap;
pub mod latency;
pub mod retransmit_tracker;

pub use alerts::{AlertLevel, AlertManager};
pub use heatmap::{LossHeatmap, LossTrend, LossSummary};
pub use latency::{LatencyStats, PerPathLatency};
pub use retransmit_tracker::RetransmitTracker;
