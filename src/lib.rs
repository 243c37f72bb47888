// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # edge-link-transport
//!
//! A reliable datagram transport for streaming telemetry "delta" messages
//! edge-to-edge over UDP: cumulative-ACK plus selective-NAK reliability,
//! AES-256-GCM encryption, Brotli compression, an optional static path
//! dictionary, dual-link bonding with health-scored failover, and an AIMD
//! congestion controller tuning the sender's batch cadence.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use edge_link_transport::client::{ClientConfig, ClientPipeline};
//! use edge_link_transport::congestion::CongestionConfig;
//! use edge_link_transport::crypto::AeadKey;
//! use edge_link_transport::model::{Delta, PathKey, PathValue, Update};
//! use edge_link_transport::retransmit::RetransmitConfig;
//! use edge_link_transport::socket::UdpLink;
//!
//! fn main() -> std::io::Result<()> {
//!     let link = UdpLink::bind("0.0.0.0:0".parse().unwrap(), "127.0.0.1:4123".parse().unwrap())?;
//!     let mut client = ClientPipeline::new(
//!         ClientConfig::default(),
//!         false,
//!         true,
//!         AeadKey::new([0x42; 32]),
//!         link,
//!         RetransmitConfig::default(),
//!         CongestionConfig::default(),
//!     );
//!
//!     let delta = Delta {
//!         context: "vessels.self".into(),
//!         updates: vec![Update {
//!             source: None,
//!             timestamp: "2026-07-28T00:00:00Z".into(),
//!             label: None,
//!             values: vec![PathValue {
//!                 path: PathKey::Name("navigation.position".into()),
//!                 value: serde_json::json!({"latitude": 60.1699, "longitude": 24.9384}),
//!             }],
//!         }],
//!     };
//!     client.send_delta(&[delta]).ok();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +------------------------------------------------------------------+
//! |                        Host telemetry framework                  |
//! |   sendDelta() calls in  ->  ClientPipeline  ->  DeltaSink out     |
//! +------------------------------------------------------------------+
//! |  packet (codec)  |  pathdict  |  serialize  |  compress  | crypto |
//! +------------------------------------------------------------------+
//! |  retransmit (client)  |  seqtrack (server)  |  congestion         |
//! +------------------------------------------------------------------+
//! |  bonding (dual-link failover)  |  metrics  |  monitoring          |
//! +------------------------------------------------------------------+
//! |           socket (UDP I/O: LinkSocket / ReplySocket)              |
//! +------------------------------------------------------------------+
//! ```

/// Bounded per-path/bandwidth usage analytics (LRU-capped).
pub mod analytics;
/// Dual-link bonding: health probing, failover/failback state machine.
pub mod bonding;
/// Client-side send path and ACK/NAK ingress.
pub mod client;
/// Brotli compression with a decompression-bomb guard.
pub mod compress;
/// Runtime configuration: plain serde-derived structs with `Default` impls.
pub mod config;
/// AIMD congestion control, adjusting the inter-batch `deltaTimer`.
pub mod congestion;
/// AES-256-GCM authenticated encryption for packet payloads.
pub mod crypto;
/// Error kinds and per-kind counters.
pub mod error;
/// RTT/jitter/loss moving averages and the weighted `linkQuality` score.
pub mod metrics;
/// The delta data model (`Delta`/`Update`/`PathValue`/`PathKey`).
pub mod model;
/// Observability-only monitoring: loss heatmap, per-path latency, alerts.
pub mod monitoring;
/// Wire packet codec: fixed header, CRC trailer, DATA/ACK/NAK/HEARTBEAT/HELLO.
pub mod packet;
/// Static path dictionary (dotted name <-> `u16` id) for tighter framing.
pub mod pathdict;
/// Decoded shape of the host's persisted JSON documents.
pub mod persisted;
/// Bounded retransmit queue with RTT-derived age pruning (client-owned).
pub mod retransmit;
/// Server-side sequence tracker: duplicate/in-order/gap classification.
pub mod seqtrack;
/// Delta serialization: JSON and MessagePack ("binary map").
pub mod serialize;
/// Server-side receive pipeline and ACK/NAK scheduling.
pub mod server;
/// The host telemetry sink seam (`DeltaSink`).
pub mod sink;
/// Host-facing epoch-tagged point-in-time snapshots.
pub mod snapshot;
/// UDP link abstraction (`LinkSocket`/`ReplySocket`, retrying send).
pub mod socket;

pub use client::{ClientConfig, ClientPipeline};
pub use config::EdgeLinkConfig;
pub use crypto::AeadKey;
pub use error::{ErrorCounters, Result, TransportError};
pub use model::{Delta, PathKey, PathValue, Update};
pub use server::{ServerConfig, ServerPipeline};
pub use sink::DeltaSink;
