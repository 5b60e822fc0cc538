//! # Detection Benchmark
//!
//! Per-observation cost of the full detector set.
//!
//! Measures:
//! 1. One walking player, every detector enabled
//! 2. One hovering player (gravity and trajectory windows full)
//! 3. 256 players round-robin (map and lock overhead)

#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use warden_security::{Clock, EngineConfig, Engine, ManualClock, Observation, Outbox, VoxelGrid};
use warden_shared::{PlayerId, Vec3};

fn engine() -> Engine {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
    Engine::new(
        EngineConfig::default(),
        Arc::new(VoxelGrid::flat(64)),
        clock,
        Outbox::disconnected(),
    )
    .expect("default config is valid")
}

/// Deterministic jitter so packet timing sees a realistic stream.
fn jitter(seq: u64) -> u64 {
    let mut x = seq.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    x ^= x >> 29;
    45 + x % 11
}

fn bench_walking(c: &mut Criterion) {
    let engine = engine();
    let id = PlayerId(1);
    engine.on_player_join(id);
    let mut seq = 0u64;
    let mut t = 10_000u64;
    let mut pos = Vec3::new(0.5, 64.0, 0.5);

    c.bench_function("observation_walking", |b| {
        b.iter(|| {
            seq += 1;
            t += jitter(seq);
            let next = Vec3::new(pos.x, 64.0, pos.z + 0.2);
            let obs = Observation::builder(seq, t).moved(pos, next).build();
            pos = next;
            black_box(engine.on_observation(id, obs))
        });
    });
}

fn bench_hovering(c: &mut Criterion) {
    let engine = engine();
    let id = PlayerId(2);
    engine.on_player_join(id);
    let mut seq = 0u64;
    let mut t = 10_000u64;
    let pos = Vec3::new(0.5, 70.0, 0.5);

    c.bench_function("observation_hovering", |b| {
        b.iter(|| {
            seq += 1;
            t += jitter(seq);
            let obs = Observation::builder(seq, t).moved(pos, pos).on_ground(false).build();
            black_box(engine.on_observation(id, obs))
        });
    });
}

fn bench_many_players(c: &mut Criterion) {
    const PLAYERS: u64 = 256;
    let engine = engine();
    for id in 0..PLAYERS {
        engine.on_player_join(PlayerId(id));
    }
    let mut seq = 0u64;
    let mut t = 10_000u64;

    c.bench_function("observation_256_players", |b| {
        b.iter(|| {
            seq += 1;
            t += jitter(seq);
            let pos = Vec3::new(0.5, 64.0, 0.5 + (seq / PLAYERS) as f64 * 0.2);
            let obs = Observation::builder(seq, t).at(pos).build();
            black_box(engine.on_observation(PlayerId(seq % PLAYERS), obs))
        });
    });
}

criterion_group!(benches, bench_walking, bench_hovering, bench_many_players);
criterion_main!(benches);
