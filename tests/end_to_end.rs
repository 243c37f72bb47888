// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end scenarios driven over real loopback UDP sockets, mirroring
//! the literal-value scenarios this transport is specified against: a
//! minimal round trip, path-dictionary byte savings, loss + NAK recovery,
//! a wrong decryption key, and duplicate suppression.

use std::net::UdpSocket;
use std::time::{Duration, Instant};

use edge_link_transport::client::{ClientConfig, ClientPipeline};
use edge_link_transport::congestion::CongestionConfig;
use edge_link_transport::crypto::AeadKey;
use edge_link_transport::model::{Delta, PathKey, PathValue, Update};
use edge_link_transport::packet::{self, PacketType};
use edge_link_transport::retransmit::RetransmitConfig;
use edge_link_transport::server::{ServerConfig, ServerPipeline};
use edge_link_transport::sink::RecordingSink;
use edge_link_transport::socket::UdpLink;

const KEY: [u8; 32] = *b"12345678901234567890123456789012";

fn position_delta() -> Delta {
    Delta {
        context: "vessels.self".into(),
        updates: vec![Update {
            source: None,
            timestamp: "2026-07-28T00:00:00Z".into(),
            label: None,
            values: vec![PathValue {
                path: PathKey::Name("navigation.position".into()),
                value: serde_json::json!({"latitude": 60.1699, "longitude": 24.9384}),
            }],
        }],
    }
}

fn three_known_path_delta() -> Delta {
    Delta {
        context: "vessels.self".into(),
        updates: vec![Update {
            source: None,
            timestamp: "2026-07-28T00:00:00Z".into(),
            label: None,
            values: vec![
                PathValue {
                    path: PathKey::Name("navigation.position".into()),
                    value: serde_json::json!({"latitude": 60.1699, "longitude": 24.9384}),
                },
                PathValue {
                    path: PathKey::Name("navigation.speedOverGround".into()),
                    value: serde_json::json!(4.2),
                },
                PathValue {
                    path: PathKey::Name("electrical.batteries.1.voltage".into()),
                    value: serde_json::json!(12.8),
                },
            ],
        }],
    }
}

struct Harness {
    client_link: UdpSocket,
    client_recv: UdpSocket,
    server_socket: UdpSocket,
    server_addr: std::net::SocketAddr,
}

fn harness() -> Harness {
    let _ = env_logger::try_init();

    let server_socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    server_socket.set_nonblocking(true).unwrap();
    let server_addr = server_socket.local_addr().unwrap();

    let client_link = UdpSocket::bind("127.0.0.1:0").unwrap();
    client_link.set_nonblocking(true).unwrap();
    let client_recv = client_link.try_clone().unwrap();

    Harness { client_link, client_recv, server_socket, server_addr }
}

fn client_pipeline(h: &Harness, key: [u8; 32], use_path_dictionary: bool) -> ClientPipeline<UdpLink> {
    let link = UdpLink::from_socket(h.client_link.try_clone().unwrap(), h.server_addr);
    ClientPipeline::new(
        ClientConfig::default(),
        false,
        use_path_dictionary,
        AeadKey::new(key),
        link,
        RetransmitConfig::default(),
        CongestionConfig::default(),
    )
}

fn server_pipeline(h: &Harness, key: [u8; 32]) -> ServerPipeline<UdpSocket, RecordingSink> {
    ServerPipeline::new(
        ServerConfig::default(),
        AeadKey::new(key),
        h.server_socket.try_clone().unwrap(),
        RecordingSink::default(),
    )
}

/// Pump both directions until `want` deltas have been delivered or the
/// deadline elapses, retransmitting NAKs and ACKs along the way.
fn pump(
    h: &Harness,
    client: &mut ClientPipeline<UdpLink>,
    server: &mut ServerPipeline<UdpSocket, RecordingSink>,
    want: u64,
    timeout: Duration,
) {
    let deadline = Instant::now() + timeout;
    let mut server_buf = [0u8; 2048];
    let mut client_buf = [0u8; 2048];
    while server.deltas_received() < want && Instant::now() < deadline {
        if let Ok((n, peer)) = h.server_socket.recv_from(&mut server_buf) {
            server.receive_packet(&server_buf[..n], peer).unwrap();
        }
        server.ack_tick();
        server.poll_naks();
        if let Ok((n, _)) = h.client_recv.recv_from(&mut client_buf) {
            client.handle_control_datagram(&client_buf[..n]).unwrap();
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn minimal_round_trip_delivers_one_delta_with_source_normalized() {
    let h = harness();
    let mut client = client_pipeline(&h, KEY, false);
    let mut server = server_pipeline(&h, KEY);

    client.send_delta(&[position_delta()]).unwrap();
    pump(&h, &mut client, &mut server, 1, Duration::from_secs(1));

    assert_eq!(server.deltas_received(), 1);
    let delivered = &server.sink().received[0];
    assert_eq!(delivered.updates[0].source, Some(serde_json::Map::new()));
    assert_eq!(
        delivered.updates[0].values[0].value,
        serde_json::json!({"latitude": 60.1699, "longitude": 24.9384})
    );
}

#[test]
fn path_dictionary_shrinks_the_emitted_frame() {
    let with_dict_harness = harness();
    let mut with_dict = client_pipeline(&with_dict_harness, KEY, true);
    with_dict.send_delta(&[three_known_path_delta()]).unwrap();
    let mut with_buf = [0u8; 2048];
    let (with_len, _) = recv_with_retry(&with_dict_harness.server_socket, &mut with_buf);

    let without_dict_harness = harness();
    let mut without_dict = client_pipeline(&without_dict_harness, KEY, false);
    without_dict.send_delta(&[three_known_path_delta()]).unwrap();
    let mut without_buf = [0u8; 2048];
    let (without_len, _) = recv_with_retry(&without_dict_harness.server_socket, &mut without_buf);

    assert!(with_len <= without_len);
}

fn recv_with_retry(socket: &UdpSocket, buf: &mut [u8]) -> (usize, std::net::SocketAddr) {
    let deadline = Instant::now() + Duration::from_secs(1);
    loop {
        match socket.recv_from(buf) {
            Ok(v) => return v,
            Err(_) if Instant::now() < deadline => std::thread::sleep(Duration::from_millis(1)),
            Err(e) => panic!("datagram never arrived: {e}"),
        }
    }
}

#[test]
fn loss_and_nak_recovery_delivers_all_without_duplicates() {
    let h = harness();
    let mut client = client_pipeline(&h, KEY, false);
    let mut server_config = ServerConfig::default();
    server_config.sequence_tracker.nak_timeout = Duration::from_millis(20);
    let mut server = ServerPipeline::new(
        server_config,
        AeadKey::new(KEY),
        h.server_socket.try_clone().unwrap(),
        RecordingSink::default(),
    );

    // Send 5 DATA packets but drop the wire bytes for sequence 2 by
    // draining it from the socket before the server ever sees it.
    for n in 0..5u32 {
        client.send_delta(&[position_delta()]).unwrap();
        let mut buf = [0u8; 2048];
        let (bytes, peer) = recv_with_retry(&h.server_socket, &mut buf);
        let (header, _) = packet::parse(&buf[..bytes]).unwrap();
        assert_eq!(header.sequence, n);
        if n == 2 {
            continue; // dropped: never fed to server.receive_packet
        }
        server.receive_packet(&buf[..bytes], peer).unwrap();
    }

    pump(&h, &mut client, &mut server, 5, Duration::from_secs(2));

    assert_eq!(server.deltas_received(), 5);
    assert_eq!(server.duplicate_packets(), 0);
}

#[test]
fn wrong_decryption_key_is_rejected_without_delivery() {
    let h = harness();
    let mut client = client_pipeline(&h, KEY, false);
    let wrong_key = [0x99u8; 32];
    let mut server = server_pipeline(&h, wrong_key);

    client.send_delta(&[position_delta()]).unwrap();

    let mut buf = [0u8; 2048];
    let (n, peer) = recv_with_retry(&h.server_socket, &mut buf);
    server.receive_packet(&buf[..n], peer).unwrap();

    assert_eq!(server.deltas_received(), 0);
    assert_eq!(server.errors().encryption_errors, 1);
}

#[test]
fn duplicate_delivery_is_suppressed_on_second_arrival() {
    let h = harness();
    let mut client = client_pipeline(&h, KEY, false);
    let mut server = server_pipeline(&h, KEY);

    client.send_delta(&[position_delta()]).unwrap();

    let mut buf = [0u8; 2048];
    let (n, peer) = recv_with_retry(&h.server_socket, &mut buf);
    let frame = buf[..n].to_vec();

    server.receive_packet(&frame, peer).unwrap();
    server.receive_packet(&frame, peer).unwrap();

    assert_eq!(server.deltas_received(), 1);
    assert_eq!(server.duplicate_packets(), 1);
}
