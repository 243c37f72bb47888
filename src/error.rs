// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error kinds and per-kind counters for the edge-link transport core.
//!
//! Every fallible operation in this crate is total with respect to bad
//! input: a failure on a single delta or packet increments the matching
//! counter in [`ErrorCounters`], records `last_error`/`last_error_time`, and
//! returns without tearing down the pipeline. Transport-retryable errors
//! (`EAGAIN`/`ENOBUFS`) are the only ones retried internally; everything
//! else is counted once and surfaced to the caller.

use std::fmt;
use std::time::{Duration, Instant};

/// Error kinds, one per spec error category. Each has its own counter on
/// [`ErrorCounters`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// (De)compression failure, including the decompression-bomb guard.
    Compression(String),
    /// AEAD authentication/decryption failure, or nonce/length violation.
    Encryption(String),
    /// Invalid host subscription signal.
    Subscription(String),
    /// Datagram send rejected by the OS.
    UdpSend(String),
    /// Packet failed structural validation (header, CRC, length).
    InvalidHeader(String),
    /// Everything else: parse failures, unknown payload shape.
    General(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compression(msg) => write!(f, "compression error: {msg}"),
            Self::Encryption(msg) => write!(f, "encryption error: {msg}"),
            Self::Subscription(msg) => write!(f, "subscription error: {msg}"),
            Self::UdpSend(msg) => write!(f, "udp send error: {msg}"),
            Self::InvalidHeader(msg) => write!(f, "invalid header: {msg}"),
            Self::General(msg) => write!(f, "general error: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Owned error/retry counters, passed by reference into whichever
/// component records a failure. Never reached into from the outside;
/// components only ever call `record()`.
#[derive(Debug, Default)]
pub struct ErrorCounters {
    pub compression_errors: u64,
    pub encryption_errors: u64,
    pub subscription_errors: u64,
    pub udp_send_errors: u64,
    pub udp_retries: u64,
    pub general_errors: u64,
    last_error: Option<String>,
    last_error_at: Option<Instant>,
}

impl ErrorCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure: bump its counter, and remember it as the last error.
    pub fn record(&mut self, err: &TransportError) {
        match err {
            TransportError::Compression(_) => self.compression_errors += 1,
            TransportError::Encryption(_) => self.encryption_errors += 1,
            TransportError::Subscription(_) => self.subscription_errors += 1,
            TransportError::UdpSend(_) => self.udp_send_errors += 1,
            TransportError::InvalidHeader(_) | TransportError::General(_) => {
                self.general_errors += 1;
            }
        }
        self.last_error = Some(err.to_string());
        self.last_error_at = Some(Instant::now());
        log::warn!("{err}");
    }

    /// A recoverable `EAGAIN`/`ENOBUFS` retry: counted separately from
    /// `udp_send_errors`, which only counts exhausted retries.
    pub fn record_udp_retry(&mut self) {
        self.udp_retries += 1;
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn time_ago(&self) -> Option<Duration> {
        self.last_error_at.map(|t| t.elapsed())
    }
}
