// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP link abstraction the client/server pipelines send through.
//!
//! Grounded on the teacher's `transport::lowbw::link::UdpLink` (a thin
//! `UdpSocket` wrapper with send/recv and a swappable implementation for
//! bonded or simulated links). This module adds the linear-backoff retry
//! on `EAGAIN`/`ENOBUFS` that the client send path requires and a bonded
//! variant that asks a [`crate::bonding::BondingManager`] which socket is
//! active at the moment of dispatch, per the "send path reads the active
//! socket/address at the moment of dispatch" ordering guarantee.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bonding::{BondingManager, LinkName};
use crate::error::{ErrorCounters, Result, TransportError};

/// Something the client pipeline can hand a complete frame to.
pub trait LinkSocket: Send {
    fn send_to(&mut self, buf: &[u8]) -> io::Result<usize>;
}

/// Something the server pipeline can reply through, to a peer address
/// discovered per-datagram rather than fixed at construction (a bonded
/// client may legitimately appear from more than one source address).
pub trait ReplySocket: Send {
    fn send_to_addr(&mut self, buf: &[u8], addr: SocketAddr) -> io::Result<usize>;
}

impl ReplySocket for UdpSocket {
    fn send_to_addr(&mut self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        self.send_to(buf, addr)
    }
}

/// A single non-blocking UDP socket bound to one destination.
pub struct UdpLink {
    socket: UdpSocket,
    dest: SocketAddr,
}

impl UdpLink {
    pub fn bind(local: SocketAddr, dest: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(local)?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket, dest })
    }

    /// Wrap an already-bound, already-nonblocking socket (used by the
    /// server pipeline, which receives on the same socket it ACKs/NAKs
    /// through and does not know a fixed destination up front).
    pub fn from_socket(socket: UdpSocket, dest: SocketAddr) -> Self {
        Self { socket, dest }
    }

    pub fn set_destination(&mut self, dest: SocketAddr) {
        self.dest = dest;
    }

    pub fn socket(&self) -> &UdpSocket {
        &self.socket
    }
}

impl LinkSocket for UdpLink {
    fn send_to(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.socket.send_to(buf, self.dest)
    }
}

/// Two independent links switched by a shared [`BondingManager`]. The
/// manager owns no sockets itself (per the cyclic-callback design note:
/// it is injected, not reached into); this type is the seam that wires
/// its failover decisions to real I/O.
pub struct BondedSocket {
    primary: UdpLink,
    backup: UdpLink,
    manager: Arc<Mutex<BondingManager>>,
}

impl BondedSocket {
    pub fn new(primary: UdpLink, backup: UdpLink, manager: Arc<Mutex<BondingManager>>) -> Self {
        Self { primary, backup, manager }
    }

    pub fn manager(&self) -> &Arc<Mutex<BondingManager>> {
        &self.manager
    }
}

impl LinkSocket for BondedSocket {
    fn send_to(&mut self, buf: &[u8]) -> io::Result<usize> {
        let active = self.manager.lock().unwrap().active_link();
        match active {
            LinkName::Primary => self.primary.send_to(buf),
            LinkName::Backup => self.backup.send_to(buf),
        }
    }
}

/// Retry policy for `EAGAIN`/`ENOBUFS` on the send path: up to
/// `max_retries` attempts with linearly increasing delay, counted in
/// `udp_retries`. Any other OS error fails once and is recorded as
/// `udp_send_errors`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SendRetryPolicy {
    pub max_retries: u32,
    #[serde(with = "crate::config::duration_millis")]
    pub base_delay: Duration,
}

impl Default for SendRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(5),
        }
    }
}

fn is_transient(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    #[cfg(unix)]
    {
        matches!(err.raw_os_error(), Some(code) if code == libc::EAGAIN || code == libc::ENOBUFS)
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Send `buf` through `socket`, retrying transient `EAGAIN`/`ENOBUFS`
/// failures per `policy` with linearly increasing delay. Any other error
/// fails immediately. Every retry increments `errors.udp_retries`; a
/// final exhausted-retries or non-transient failure increments
/// `udp_send_errors`.
pub fn send_with_retry(
    socket: &mut dyn LinkSocket,
    buf: &[u8],
    policy: SendRetryPolicy,
    errors: &mut ErrorCounters,
) -> Result<usize> {
    let mut attempt = 0;
    loop {
        match socket.send_to(buf) {
            Ok(n) => return Ok(n),
            Err(e) if is_transient(&e) && attempt < policy.max_retries => {
                errors.record_udp_retry();
                attempt += 1;
                std::thread::sleep(policy.base_delay * attempt);
            }
            Err(e) => {
                let err = TransportError::UdpSend(e.to_string());
                errors.record(&err);
                return Err(err);
            }
        }
    }
}

/// Same retry discipline as [`send_with_retry`], for the server's
/// varying-destination reply path.
pub fn send_with_retry_to(
    socket: &mut dyn ReplySocket,
    buf: &[u8],
    addr: SocketAddr,
    policy: SendRetryPolicy,
    errors: &mut ErrorCounters,
) -> Result<usize> {
    let mut attempt = 0;
    loop {
        match socket.send_to_addr(buf, addr) {
            Ok(n) => return Ok(n),
            Err(e) if is_transient(&e) && attempt < policy.max_retries => {
                errors.record_udp_retry();
                attempt += 1;
                std::thread::sleep(policy.base_delay * attempt);
            }
            Err(e) => {
                let err = TransportError::UdpSend(e.to_string());
                errors.record(&err);
                return Err(err);
            }
        }
    }
}
