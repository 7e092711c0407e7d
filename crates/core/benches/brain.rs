//! Criterion benchmarks for learning, replying and snapshot round trips.
//!
//! Run with:
//!   cargo bench -p borg
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use borg::prelude::*;
use borg::prng::Prng;

const VOCAB: &[&str] = &[
    "the", "cat", "dog", "sat", "on", "mat", "rug", "ran", "under", "table", "quick", "brown",
    "fox", "jumps", "over", "lazy", "bird", "sang", "at", "dawn", "river", "flows", "to", "sea",
];

/// Deterministic pseudo-sentences drawn from a small vocabulary.
fn corpus(lines: usize, seed: u64) -> Vec<String> {
    let mut rng = Prng::new(seed);
    (0..lines)
        .map(|_| {
            let len = 4 + rng.gen_range_usize(0, 9);
            (0..len)
                .map(|_| VOCAB[rng.gen_range_usize(0, VOCAB.len())])
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn trained_brain(lines: usize) -> Brain {
    let mut brain = Brain::new(BrainConfig::default().with_seed(42));
    for line in corpus(lines, 7) {
        brain.learn(&line);
    }
    brain
}

fn bench_learn(c: &mut Criterion) {
    let mut group = c.benchmark_group("learn");

    for size in [100usize, 1_000, 10_000].iter() {
        let lines = corpus(*size, 7);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("lines", size), &lines, |b, lines| {
            b.iter(|| {
                let mut brain = Brain::new(BrainConfig::default().with_seed(1));
                for line in lines {
                    brain.learn(line);
                }
                black_box(brain.stats())
            });
        });
    }

    group.finish();
}

fn bench_reply(c: &mut Criterion) {
    let mut group = c.benchmark_group("reply");

    for size in [1_000usize, 10_000].iter() {
        let mut brain = trained_brain(*size);
        group.bench_with_input(BenchmarkId::new("brain_lines", size), size, |b, _| {
            b.iter(|| black_box(brain.reply("the lazy fox").ok()));
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let brain = trained_brain(5_000);
    c.bench_function("snapshot_to_json", |b| {
        b.iter(|| black_box(serde_json::to_vec(&brain.to_snapshot()).ok()));
    });
}

criterion_group!(benches, bench_learn, bench_reply, bench_snapshot);
criterion_main!(benches);
