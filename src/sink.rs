// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The host telemetry sink seam.
//!
//! The server pipeline calls this once per delivered delta; everything
//! downstream of that call (fan-out to the host's subscription model,
//! persistence, the web dashboard) is out of scope for this crate. Kept
//! as a plain trait object rather than a channel so the host can hand in
//! a zero-cost no-op in tests, matching how the teacher injects its own
//! `engine::Router` sink at construction instead of the component reaching
//! back out for one.

use crate::model::Delta;

/// Receives one delta per call, in delivery order.
pub trait DeltaSink: Send {
    fn handle_message(&mut self, context: &str, delta: &Delta);
}

/// A sink that records every delivered delta, for tests and the demo
/// binary.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub received: Vec<Delta>,
}

impl DeltaSink for RecordingSink {
    fn handle_message(&mut self, _context: &str, delta: &Delta) {
        self.received.push(delta.clone());
    }
}

/// A sink that discards everything, for benches and fire-and-forget demos.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DeltaSink for NullSink {
    fn handle_message(&mut self, _context: &str, _delta: &Delta) {}
}
