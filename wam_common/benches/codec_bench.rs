//! Codec hot-path benchmarks.
//!
//! Each control cycle packs one torque frame per group and unpacks one
//! position reply per puck.

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use wam_common::protocol::codec;
use wam_common::protocol::property::{Command, Property};

fn bench_pack_torques(c: &mut Criterion) {
    let currents = [1200, -800, 35, -4096];
    c.bench_function("pack_torques", |b| {
        b.iter(|| codec::pack_torques(black_box(&currents)));
    });
}

fn bench_unpack_position(c: &mut Criterion) {
    let payload = codec::pack_position_reply(-123_456);
    c.bench_function("unpack_position_reply", |b| {
        b.iter(|| codec::unpack_position_reply(black_box(&payload)));
    });
}

fn bench_property_round_trip(c: &mut Criterion) {
    c.bench_function("pack_unpack_property", |b| {
        b.iter(|| {
            let p = codec::pack(Command::Set, Property::VelocityFault.id(), black_box(8000));
            codec::unpack(&p)
        });
    });
}

criterion_group!(
    benches,
    bench_pack_torques,
    bench_unpack_position,
    bench_property_round_trip
);
criterion_main!(benches);
