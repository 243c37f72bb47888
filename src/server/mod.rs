// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Server pipeline: the receive path (classify, validate, decrypt,
//! decompress, deserialize, decode paths, deliver) plus the ACK/NAK
//! scheduler that rides the caller's timer loop.
//!
//! Grounded on the same `transport::lowbw::transport::LowBwTransport`
//! shape the client pipeline mirrors, but facing the opposite direction:
//! one `receive_packet` entry point per datagram, with `ack_tick` and
//! `poll_naks` driven by the host's periodic timers rather than by
//! incoming traffic.

pub mod ack_scheduler;

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analytics::PerPathAnalytics;
use crate::compress;
use crate::crypto::AeadKey;
use crate::error::{ErrorCounters, Result};
use crate::monitoring::LossHeatmap;
use crate::packet::{self, flags, PacketType};
use crate::pathdict;
use crate::seqtrack::{SequenceTracker, SequenceTrackerConfig};
use crate::serialize;
use crate::sink::DeltaSink;
use crate::socket::{send_with_retry_to, ReplySocket, SendRetryPolicy};

use ack_scheduler::{AckScheduler, AckSchedulerConfig};

/// Everything the receive path needs besides the key, socket and sink.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ServerConfig {
    pub path_analytics_cap: usize,
    pub decompression_cap: usize,
    pub send_retry: SendRetryPolicy,
    pub ack: AckSchedulerConfig,
    pub sequence_tracker: SequenceTrackerConfig,
    pub loss_heatmap_bucket: Duration,
    pub loss_heatmap_buckets: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            path_analytics_cap: 256,
            decompression_cap: 4 << 20,
            send_retry: SendRetryPolicy::default(),
            ack: AckSchedulerConfig::default(),
            sequence_tracker: SequenceTrackerConfig::default(),
            loss_heatmap_bucket: Duration::from_secs(10),
            loss_heatmap_buckets: 60,
        }
    }
}

/// Server-side receive path and ACK/NAK scheduling. Generic over the reply
/// socket (a peer address is discovered per-datagram, not fixed at
/// construction) and over the host sink that consumes delivered deltas.
pub struct ServerPipeline<S: ReplySocket, K: DeltaSink> {
    config: ServerConfig,
    key: AeadKey,
    socket: S,
    sink: K,
    seq_tracker: SequenceTracker,
    ack_scheduler: AckScheduler,
    errors: ErrorCounters,
    path_analytics: PerPathAnalytics,
    heatmap: LossHeatmap,

    last_client_addr: Option<SocketAddr>,
    stopped: bool,
    bytes_in: u64,
    data_packets_received: u64,
    duplicate_packets: u64,
    deltas_received: u64,
}

impl<S: ReplySocket, K: DeltaSink> ServerPipeline<S, K> {
    pub fn new(config: ServerConfig, key: AeadKey, socket: S, sink: K) -> Self {
        Self {
            path_analytics: PerPathAnalytics::new(config.path_analytics_cap),
            heatmap: LossHeatmap::new(config.loss_heatmap_bucket, config.loss_heatmap_buckets),
            seq_tracker: SequenceTracker::new(config.sequence_tracker),
            ack_scheduler: AckScheduler::new(config.ack),
            key,
            socket,
            sink,
            config,
            errors: ErrorCounters::new(),
            last_client_addr: None,
            stopped: false,
            bytes_in: 0,
            data_packets_received: 0,
            duplicate_packets: 0,
            deltas_received: 0,
        }
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn errors(&self) -> &ErrorCounters {
        &self.errors
    }

    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    pub fn data_packets_received(&self) -> u64 {
        self.data_packets_received
    }

    pub fn duplicate_packets(&self) -> u64 {
        self.duplicate_packets
    }

    pub fn deltas_received(&self) -> u64 {
        self.deltas_received
    }

    pub fn path_analytics(&self) -> &PerPathAnalytics {
        &self.path_analytics
    }

    pub fn loss_summary(&self) -> crate::monitoring::LossSummary {
        self.heatmap.summary()
    }

    pub fn acks_sent(&self) -> u64 {
        self.ack_scheduler.acks_sent()
    }

    pub fn naks_sent(&self) -> u64 {
        self.ack_scheduler.naks_sent()
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    /// Handle one inbound datagram from `peer`: health probes are echoed
    /// immediately and never reach the data path; anything that doesn't
    /// parse as this transport's wire format is silently ignored (the
    /// socket is shared with whatever else lives on that port).
    pub fn receive_packet(&mut self, bytes: &[u8], peer: SocketAddr) -> Result<()> {
        if self.stopped {
            return Ok(());
        }

        if packet::is_health_probe(bytes) {
            let _ = send_with_retry_to(&mut self.socket, bytes, peer, self.config.send_retry, &mut self.errors);
            return Ok(());
        }

        self.bytes_in += bytes.len() as u64;

        if !packet::is_v2_packet(bytes) {
            return Ok(());
        }
        let (header, payload) = match packet::parse(bytes) {
            Ok(v) => v,
            Err(e) => {
                self.errors.record(&e);
                return Ok(());
            }
        };

        match header.kind {
            PacketType::Heartbeat => return Ok(()),
            PacketType::Hello => {
                log::debug!("received HELLO from {peer}");
                return Ok(());
            }
            PacketType::Ack | PacketType::Nak => {
                // The server never originates DATA, so control frames
                // addressed to a sender aren't meaningful here.
                return Ok(());
            }
            PacketType::Data => {}
        }

        self.last_client_addr = Some(peer);

        let outcome = self.seq_tracker.process_sequence(header.sequence);
        if outcome.duplicate {
            self.duplicate_packets += 1;
            return Ok(());
        }
        if outcome.resynced {
            log::warn!("sequence tracker resynced at {}", header.sequence);
        }
        if !outcome.missing.is_empty() {
            self.heatmap.record_batch((outcome.missing.len() + 1) as u64, outcome.missing.len() as u64);
        } else {
            self.heatmap.record(false);
        }
        self.data_packets_received += 1;

        let decrypted = if header.is_encrypted() {
            match self.key.open(payload) {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.errors.record(&e);
                    return Ok(());
                }
            }
        } else {
            payload.to_vec()
        };

        let decompressed = if header.is_compressed() {
            match compress::decompress(&decrypted, self.config.decompression_cap) {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.errors.record(&e);
                    return Ok(());
                }
            }
        } else {
            decrypted
        };

        let batch = if header.is_messagepack() {
            serialize::batch_from_binary_map(&decompressed)
        } else {
            serialize::batch_from_json(&decompressed)
        };
        let batch = match batch {
            Ok(deltas) => deltas,
            Err(e) => {
                self.errors.record(&e);
                return Ok(());
            }
        };

        let total_updates: usize = batch.iter().map(|d| d.updates.len()).sum();
        let bytes_per_update = if total_updates > 0 {
            decompressed.len() as f64 / total_updates as f64
        } else {
            0.0
        };

        for delta in &batch {
            let decoded = if header.is_path_dictionary() {
                pathdict::decode_delta(delta)
            } else {
                delta.clone()
            };
            for update in &decoded.updates {
                for pv in &update.values {
                    self.path_analytics.record(&pv.path.label(), bytes_per_update);
                }
            }
            self.sink.handle_message(&decoded.context, &decoded);
            self.deltas_received += 1;
        }

        Ok(())
    }

    /// Driven by the caller's ACK timer: sends a cumulative ACK for the
    /// contiguous run received so far, if one is due and a peer is known.
    pub fn ack_tick(&mut self) {
        if self.data_packets_received == 0 {
            return;
        }
        let Some(peer) = self.last_client_addr else {
            return;
        };
        let Some(expected) = self.seq_tracker.expected_sequence() else {
            return;
        };
        if let Some(ack_seq) = self.ack_scheduler.maybe_ack(expected) {
            let packet = packet::build(PacketType::Ack, 0, &packet::encode_ack_payload(ack_seq), 0);
            let _ = send_with_retry_to(&mut self.socket, &packet, peer, self.config.send_retry, &mut self.errors);
        }
    }

    /// Driven by the caller's NAK timer: surfaces sequences whose
    /// gap-fill grace period has elapsed and asks the sender to resend
    /// them.
    pub fn poll_naks(&mut self) {
        let missing = self.seq_tracker.poll_expired_naks();
        if missing.is_empty() {
            return;
        }
        let Some(peer) = self.last_client_addr else {
            return;
        };
        let packet = packet::build(PacketType::Nak, 0, &packet::encode_nak_payload(&missing), 0);
        let _ = send_with_retry_to(&mut self.socket, &packet, peer, self.config.send_retry, &mut self.errors);
        self.ack_scheduler.record_nak_sent();
    }
}
