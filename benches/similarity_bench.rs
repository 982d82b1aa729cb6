// SPDX-License-Identifier: MIT OR Apache-2.0
//! Benchmarks for content similarity and pairwise scoring.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rv_similarity::{PairStats, pairwise, similarity, token_estimate};

// ── Sample text builders ────────────────────────────────────────────────

fn sentence(seed: usize, words: usize) -> String {
    const VOCAB: &[&str] = &[
        "the", "proxy", "returned", "a", "brief", "response", "hello", "test", "model", "relay",
        "answer", "short", "friendly", "message",
    ];
    (0..words)
        .map(|i| VOCAB[(i * 7 + seed) % VOCAB.len()])
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Benchmarks ──────────────────────────────────────────────────────────

fn bench_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("similarity");
    for words in [8usize, 64, 256] {
        let a = sentence(0, words);
        let b = sentence(3, words);
        group.bench_with_input(BenchmarkId::new("distinct", words), &words, |bench, _| {
            bench.iter(|| similarity(black_box(&a), black_box(&b)))
        });
        group.bench_with_input(BenchmarkId::new("identical", words), &words, |bench, _| {
            bench.iter(|| similarity(black_box(&a), black_box(&a)))
        });
    }
    group.finish();
}

fn bench_pairwise(c: &mut Criterion) {
    let mut group = c.benchmark_group("pairwise");
    for n in [3usize, 6, 12] {
        let items: Vec<(String, String)> = (0..n)
            .map(|i| (format!("rule-{i}"), sentence(i, 40)))
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &items, |bench, items| {
            bench.iter(|| {
                let pairs = pairwise(black_box(items));
                PairStats::from_pairs(&pairs)
            })
        });
    }
    group.finish();
}

fn bench_token_estimate(c: &mut Criterion) {
    let text = sentence(1, 512);
    c.bench_function("token_estimate_512_words", |b| {
        b.iter(|| token_estimate(black_box(&text)))
    });
}

criterion_group!(benches, bench_similarity, bench_pairwise, bench_token_estimate);
criterion_main!(benches);
