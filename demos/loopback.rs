// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Narrated client/server pipeline wiring over real loopback UDP sockets.
//!
//! Not a teacher file copied verbatim (the teacher's own `examples/` are
//! DDS pub/sub demos over its own transport), but the same "one runnable
//! file per subsystem" idiom: bind two real sockets, send a handful of
//! deltas from a `ClientPipeline`, pump both directions until the
//! `ServerPipeline` has delivered everything, and print what arrived.

use std::net::UdpSocket;
use std::time::{Duration, Instant};

use edge_link_transport::client::{ClientConfig, ClientPipeline};
use edge_link_transport::congestion::CongestionConfig;
use edge_link_transport::crypto::AeadKey;
use edge_link_transport::model::{Delta, PathKey, PathValue, Update};
use edge_link_transport::retransmit::RetransmitConfig;
use edge_link_transport::server::{ServerConfig, ServerPipeline};
use edge_link_transport::sink::RecordingSink;
use edge_link_transport::socket::UdpLink;

const KEY: [u8; 32] = [0x42; 32];

fn sample_delta(n: u32) -> Delta {
    Delta {
        context: "vessels.self".into(),
        updates: vec![Update {
            source: None,
            timestamp: "2026-07-28T00:00:00Z".into(),
            label: None,
            values: vec![PathValue {
                path: PathKey::Name("navigation.position".into()),
                value: serde_json::json!({"latitude": 60.1699 + n as f64 * 0.001, "longitude": 24.9384}),
            }],
        }],
    }
}

fn main() -> std::io::Result<()> {
    let server_socket = UdpSocket::bind("127.0.0.1:0")?;
    server_socket.set_nonblocking(true)?;
    let server_addr = server_socket.local_addr()?;
    let server_recv = server_socket.try_clone()?;

    let client_socket = UdpSocket::bind("127.0.0.1:0")?;
    client_socket.set_nonblocking(true)?;
    let client_recv = client_socket.try_clone()?;
    let client_link = UdpLink::from_socket(client_socket, server_addr);

    let mut client = ClientPipeline::new(
        ClientConfig::default(),
        false,
        true,
        AeadKey::new(KEY),
        client_link,
        RetransmitConfig::default(),
        CongestionConfig::default(),
    );

    let mut server = ServerPipeline::new(
        ServerConfig::default(),
        AeadKey::new(KEY),
        server_socket,
        RecordingSink::default(),
    );

    const N: u32 = 5;
    println!("sending {N} deltas client -> server over 127.0.0.1 loopback");
    for n in 0..N {
        client.send_delta(&[sample_delta(n)]).expect("send_delta");
    }

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut client_buf = [0u8; 2048];
    let mut server_buf = [0u8; 2048];
    while server.deltas_received() < N as u64 && Instant::now() < deadline {
        if let Ok((n, peer)) = server_recv.recv_from(&mut server_buf) {
            server.receive_packet(&server_buf[..n], peer).expect("receive_packet");
        }
        server.ack_tick();
        server.poll_naks();

        if let Ok((n, _)) = client_recv.recv_from(&mut client_buf) {
            client.handle_control_datagram(&client_buf[..n]).expect("handle_control_datagram");
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    println!("server delivered {} of {N} deltas", server.deltas_received());
    for delta in &server.sink().received {
        println!("  {delta:?}");
    }
    println!("client retransmit queue drained to {} entries", client.retransmit_queue_len());

    Ok(())
}
