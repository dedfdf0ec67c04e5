//! Simulation benchmarks for squad_core.
//!
//! Run with: `cargo bench -p squad_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use squad_core::behavior::{next_state, BehaviorState, Situation};
use squad_core::registry::{Registry, Roster};
use squad_test_utils::fixtures::{line_battle, tick_delta};

/// Ticks of a pitched battle at several sizes.
pub fn tick_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_tick");
    for per_side in [4, 16, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(per_side), &per_side, |b, &n| {
            b.iter_batched(
                || line_battle(n, 40),
                |mut registry| {
                    for _ in 0..20 {
                        black_box(registry.tick(tick_delta(), &Roster::AllLive));
                    }
                    registry
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

/// Full-state hashing and bincode round-trips.
pub fn snapshot_benchmark(c: &mut Criterion) {
    let registry = line_battle(32, 40);

    c.bench_function("state_hash", |b| b.iter(|| black_box(registry.state_hash())));
    c.bench_function("serialize_roundtrip", |b| {
        b.iter(|| {
            let bytes = registry.serialize().expect("serialize");
            black_box(Registry::deserialize(&bytes).expect("deserialize"))
        });
    });
}

/// The pure transition table.
pub fn transition_benchmark(c: &mut Criterion) {
    let situation = Situation {
        enemies_in_range: true,
        ..Situation::default()
    };
    c.bench_function("next_state_all_states", |b| {
        b.iter(|| {
            for state in BehaviorState::ALL {
                black_box(next_state(black_box(state), &situation));
            }
        });
    });
}

criterion_group!(
    benches,
    tick_benchmark,
    snapshot_benchmark,
    transition_benchmark
);
criterion_main!(benches);
