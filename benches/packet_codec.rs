// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Packet codec throughput: `build`/`parse` round-trip on payload sizes
//! representative of a single-delta and a batched-delta frame.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use edge_link_transport::packet::{build, flags, parse, PacketType};

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_build");
    for size in [64usize, 512, 1400] {
        let payload = vec![0xABu8; size];
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| {
                black_box(build(
                    PacketType::Data,
                    black_box(1),
                    payload,
                    flags::COMPRESSED | flags::ENCRYPTED,
                ))
            });
        });
    }
    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_parse");
    for size in [64usize, 512, 1400] {
        let payload = vec![0xABu8; size];
        let packet = build(PacketType::Data, 1, &payload, flags::COMPRESSED | flags::ENCRYPTED);
        group.bench_with_input(BenchmarkId::from_parameter(size), &packet, |b, packet| {
            b.iter(|| black_box(parse(black_box(packet)).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build, bench_parse);
criterion_main!(benches);
