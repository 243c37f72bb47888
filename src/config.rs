// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime configuration. Plain, serde-derived structs with `Default`
//! impls carrying the nominal values, the way the teacher's own
//! top-level `RuntimeConfig` is assembled from simple nested structs
//! rather than a builder.

use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bonding::BondingConfig;
use crate::congestion::CongestionConfig;
use crate::retransmit::RetransmitConfig;
use crate::seqtrack::SequenceTrackerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerType {
    Client,
    Server,
}

/// Top-level configuration for one transport endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeLinkConfig {
    pub secret_key: String,
    pub protocol_version: u8,
    pub server_type: ServerType,
    pub udp_address: IpAddr,
    pub udp_port: u16,
    pub use_msgpack: bool,
    pub use_path_dictionary: bool,
    pub reliability: ReliabilityConfig,
    pub congestion_control: CongestionControlConfig,
    pub bonding: Option<BondingEndpoints>,
    pub alert_thresholds: Vec<(String, AlertThresholdConfig)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    #[serde(with = "duration_millis")]
    pub ack_interval: Duration,
    #[serde(with = "duration_millis")]
    pub ack_resend_interval: Duration,
    #[serde(with = "duration_millis")]
    pub nak_timeout: Duration,
    pub retransmit: RetransmitConfig,
    pub sequence_tracker: SequenceTrackerConfig,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            ack_interval: Duration::from_millis(500),
            ack_resend_interval: Duration::from_millis(1000),
            nak_timeout: Duration::from_millis(250),
            retransmit: RetransmitConfig::default(),
            sequence_tracker: SequenceTrackerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CongestionControlConfig {
    pub enabled: bool,
    pub inner: CongestionConfig,
}

impl Default for CongestionControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            inner: CongestionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondingEndpoint {
    pub address: IpAddr,
    pub port: u16,
    pub interface: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondingEndpoints {
    pub primary: BondingEndpoint,
    pub backup: BondingEndpoint,
    pub failover: BondingConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AlertThresholdConfig {
    pub warning: f64,
    pub critical: f64,
}

impl Default for EdgeLinkConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            protocol_version: 2,
            server_type: ServerType::Client,
            udp_address: IpAddr::from([127, 0, 0, 1]),
            udp_port: 0,
            use_msgpack: false,
            use_path_dictionary: true,
            reliability: ReliabilityConfig::default(),
            congestion_control: CongestionControlConfig::default(),
            bonding: None,
            alert_thresholds: Vec::new(),
        }
    }
}

pub(crate) mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
