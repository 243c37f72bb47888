// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dual-link bonding manager: health probing, failover/failback between a
//! "primary" and "backup" UDP path. Grounded on the teacher's
//! `transport/lowbw/link.rs` link-abstraction/stats pattern, adapted from
//! a byte-counting link trait to health-scored active/standby links.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::model::Delta;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkName {
    Primary,
    Backup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Unknown,
    Active,
    Standby,
    Down,
}

#[derive(Debug, Clone, Copy)]
pub struct LinkHealth {
    pub status: LinkStatus,
    pub rtt: Duration,
    pub loss: f64,
    pub quality: u32,
}

impl Default for LinkHealth {
    fn default() -> Self {
        Self {
            status: LinkStatus::Unknown,
            rtt: Duration::ZERO,
            loss: 0.0,
            quality: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BondingConfig {
    #[serde(with = "crate::config::duration_millis")]
    pub rtt_threshold: Duration,
    pub loss_threshold: f64,
    pub rtt_hysteresis: f64,
    pub loss_hysteresis: f64,
    #[serde(with = "crate::config::duration_millis")]
    pub health_check_interval: Duration,
    #[serde(with = "crate::config::duration_millis")]
    pub heartbeat_timeout: Duration,
    #[serde(with = "crate::config::duration_millis")]
    pub failback_delay: Duration,
    pub rtt_ema_alpha: f64,
}

impl Default for BondingConfig {
    fn default() -> Self {
        Self {
            rtt_threshold: Duration::from_millis(500),
            loss_threshold: 0.1,
            rtt_hysteresis: 0.8,
            loss_hysteresis: 0.5,
            health_check_interval: Duration::from_secs(2),
            heartbeat_timeout: Duration::from_secs(6),
            failback_delay: Duration::from_secs(30),
            rtt_ema_alpha: 0.3,
        }
    }
}

struct PendingHeartbeat {
    sequence: u32,
    sent_at: Instant,
}

struct LinkState {
    health: LinkHealth,
    heartbeats_sent: u64,
    heartbeats_received: u64,
    next_probe_seq: u32,
    pending: Vec<PendingHeartbeat>,
    last_response_at: Option<Instant>,
}

impl LinkState {
    fn new(status: LinkStatus) -> Self {
        Self {
            health: LinkHealth {
                status,
                ..Default::default()
            },
            heartbeats_sent: 0,
            heartbeats_received: 0,
            next_probe_seq: 0,
            pending: Vec::new(),
            last_response_at: None,
        }
    }
}

/// Manages the primary/backup health state machine. Socket I/O is the
/// caller's responsibility: this type decides *when* to probe and *when*
/// to fail over, and returns the bytes/targets for the caller to send.
pub struct BondingManager {
    config: BondingConfig,
    primary: LinkState,
    backup: LinkState,
    active: LinkName,
    last_failover_at: Option<Instant>,
}

/// A host-visible link-switch notification, shaped like the rest of the
/// delta model so it can be handed to the same message sink.
pub fn failover_notification(message: &str) -> Delta {
    use crate::model::{PathKey, PathValue, Update};
    use serde_json::json;

    Delta {
        context: "vessels.self".into(),
        updates: vec![Update {
            source: None,
            timestamp: String::new(),
            label: Some("signalk-edge-link".into()),
            values: vec![PathValue {
                path: PathKey::Name("notifications.signalk-edge-link.linkFailover".into()),
                value: json!({"state": "alert", "message": message}),
            }],
        }],
    }
}

impl BondingManager {
    pub fn new(config: BondingConfig) -> Self {
        Self {
            config,
            primary: LinkState::new(LinkStatus::Active),
            backup: LinkState::new(LinkStatus::Standby),
            active: LinkName::Primary,
            last_failover_at: None,
        }
    }

    pub fn active_link(&self) -> LinkName {
        self.active
    }

    pub fn health(&self, link: LinkName) -> LinkHealth {
        self.state(link).health
    }

    fn state(&self, link: LinkName) -> &LinkState {
        match link {
            LinkName::Primary => &self.primary,
            LinkName::Backup => &self.backup,
        }
    }

    fn state_mut(&mut self, link: LinkName) -> &mut LinkState {
        match link {
            LinkName::Primary => &mut self.primary,
            LinkName::Backup => &mut self.backup,
        }
    }

    /// Build a health probe for every non-DOWN link, recording the send
    /// time against its sequence. Returns `(link, probe_bytes)` pairs for
    /// the caller to transmit.
    pub fn health_tick(&mut self) -> Vec<(LinkName, [u8; 12])> {
        let now = Instant::now();
        let mut out = Vec::new();

        for link in [LinkName::Primary, LinkName::Backup] {
            let timeout = self.config.heartbeat_timeout;
            let state = self.state_mut(link);
            if state.health.status == LinkStatus::Down {
                continue;
            }

            state.pending.retain(|p| now.duration_since(p.sent_at) < timeout);

            let seq = state.next_probe_seq;
            state.next_probe_seq = state.next_probe_seq.wrapping_add(1);
            state.pending.push(PendingHeartbeat { sequence: seq, sent_at: now });
            state.heartbeats_sent += 1;

            let sent = state.heartbeats_sent;
            let received = state.heartbeats_received;
            let last_response_age = state.last_response_at.map(|t| now.duration_since(t));

            state.health.loss = (1.0 - received as f64 / sent.max(1) as f64).clamp(0.0, 1.0);
            let rtt_score = (1.0 - state.health.rtt.as_secs_f64() / 1.0).clamp(0.0, 1.0);
            let loss_score = 1.0 - state.health.loss;
            state.health.quality = (60.0 * loss_score + 40.0 * rtt_score).round() as u32;

            if sent > 3 {
                if let Some(age) = last_response_age {
                    if age >= timeout {
                        state.health.status = LinkStatus::Down;
                    }
                } else {
                    state.health.status = LinkStatus::Down;
                }
            }

            out.push((link, crate::packet::build_health_probe(seq)));
        }

        out
    }

    /// Handle a datagram. If it matches the heartbeat framing and an
    /// outstanding sequence, updates RTT/health and returns `None`.
    /// Otherwise returns the bytes back for the caller to forward via its
    /// control-packet path.
    pub fn on_datagram<'a>(&mut self, link: LinkName, bytes: &'a [u8]) -> Option<&'a [u8]> {
        let Some(seq) = crate::packet::parse_health_probe(bytes) else {
            return Some(bytes);
        };

        let now = Instant::now();
        let alpha = self.config.rtt_ema_alpha;
        let active = self.active;
        let state = self.state_mut(link);

        if let Some(pos) = state.pending.iter().position(|p| p.sequence == seq) {
            let probe = state.pending.remove(pos);
            let rtt = now.duration_since(probe.sent_at);
            state.heartbeats_received += 1;
            state.last_response_at = Some(now);

            state.health.rtt = if state.health.rtt.is_zero() {
                rtt
            } else {
                Duration::from_secs_f64(
                    state.health.rtt.as_secs_f64() + alpha * (rtt.as_secs_f64() - state.health.rtt.as_secs_f64()),
                )
            };

            if state.health.status == LinkStatus::Down {
                state.health.status = if link == active { LinkStatus::Active } else { LinkStatus::Standby };
            }
        }

        None
    }

    fn should_failover(&self) -> bool {
        if self.active != LinkName::Primary {
            return false;
        }
        if self.backup.health.status == LinkStatus::Down {
            return false;
        }
        self.primary.health.status == LinkStatus::Down
            || self.primary.health.rtt > self.config.rtt_threshold
            || self.primary.health.loss > self.config.loss_threshold
    }

    fn should_failback(&self) -> bool {
        if self.active != LinkName::Backup {
            return false;
        }
        let Some(last) = self.last_failover_at else {
            return false;
        };
        if Instant::now().duration_since(last) < self.config.failback_delay {
            return false;
        }
        if self.primary.health.status == LinkStatus::Down {
            return false;
        }
        self.primary.health.rtt.as_secs_f64() < self.config.rtt_threshold.as_secs_f64() * self.config.rtt_hysteresis
            && self.primary.health.loss < self.config.loss_threshold * self.config.loss_hysteresis
    }

    /// Evaluate failover/failback rules against current health and swap
    /// labels if warranted. Returns the notification delta to publish
    /// when a switch occurred.
    pub fn evaluate(&mut self) -> Option<Delta> {
        if self.should_failover() {
            return Some(self.switch_to(LinkName::Backup, "primary to backup"));
        }
        if self.should_failback() {
            return Some(self.switch_to(LinkName::Primary, "backup to primary"));
        }
        None
    }

    /// Force a failover to the named link if it differs from the current
    /// active link (used by the host's `POST /bonding/failover`). No-op,
    /// with no notification, if already on the target link.
    pub fn failover(&mut self, target: LinkName) -> Option<Delta> {
        if self.active == target {
            return None;
        }
        let description = match target {
            LinkName::Backup => "primary to backup",
            LinkName::Primary => "backup to primary",
        };
        Some(self.switch_to(target, description))
    }

    fn switch_to(&mut self, target: LinkName, description: &str) -> Delta {
        let outgoing = self.active;
        let outgoing_was_down = self.state(outgoing).health.status == LinkStatus::Down;

        self.active = target;
        self.state_mut(target).health.status = LinkStatus::Active;
        if !outgoing_was_down {
            self.state_mut(outgoing).health.status = LinkStatus::Standby;
        }

        self.last_failover_at = Some(Instant::now());
        failover_notification(&format!("Link switched: {description}"))
    }

    pub fn stop(&mut self) {
        self.primary.pending.clear();
        self.backup.pending.clear();
        self.primary.health.rtt = Duration::ZERO;
        self.backup.health.rtt = Duration::ZERO;
    }
}
