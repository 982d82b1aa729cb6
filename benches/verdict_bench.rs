// SPDX-License-Identifier: MIT OR Apache-2.0
//! Benchmarks for the per-response work of a comparison: normalize,
//! validate and judge.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rv_dialect::{ApiStyle, ShapeDetector};
use rv_normalize::normalize;
use rv_similarity::pairwise;
use rv_validate::ValidationReport;
use rv_verdict::scoring::judge_consistency;
use serde_json::{Value, json};

fn openai_body() -> Value {
    json!({
        "id": "chatcmpl-1", "object": "chat.completion", "created": 1_700_000_000,
        "model": "gpt-4o",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hello! This is a brief test response."},
                     "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 12, "completion_tokens": 9, "total_tokens": 21}
    })
}

fn anthropic_body() -> Value {
    json!({
        "id": "msg_1", "type": "message", "role": "assistant", "model": "claude-sonnet",
        "content": [{"type": "text", "text": "Hello! This is a brief test response."}],
        "stop_reason": "end_turn", "stop_sequence": null,
        "usage": {"input_tokens": 12, "output_tokens": 9}
    })
}

fn bench_normalize(c: &mut Criterion) {
    let oa = openai_body();
    let an = anthropic_body();
    c.bench_function("normalize_openai", |b| {
        b.iter(|| normalize(ApiStyle::OpenAi, black_box(&oa)))
    });
    c.bench_function("normalize_anthropic", |b| {
        b.iter(|| normalize(ApiStyle::Anthropic, black_box(&an)))
    });
}

fn bench_validate(c: &mut Criterion) {
    let oa = openai_body();
    let an = anthropic_body();
    c.bench_function("validate_openai", |b| {
        b.iter(|| ValidationReport::check(ApiStyle::OpenAi, black_box(&oa)))
    });
    c.bench_function("validate_anthropic", |b| {
        b.iter(|| ValidationReport::check(ApiStyle::Anthropic, black_box(&an)))
    });
    let detector = ShapeDetector::new();
    c.bench_function("detect_shape", |b| b.iter(|| detector.detect(black_box(&an))));
}

fn bench_consistency(c: &mut Criterion) {
    let texts: Vec<(String, String)> = [
        ("openai/tingly-gpt", "Hello! This is a brief test response."),
        ("anthropic/tingly-claude", "Hello! This is a short test response."),
        ("gemini/tingly-gemini", "Greetings from a completely different model."),
    ]
    .iter()
    .map(|(l, t)| (l.to_string(), t.to_string()))
    .collect();
    c.bench_function("judge_consistency_three_rules", |b| {
        b.iter(|| judge_consistency(pairwise(black_box(&texts)), 0.5, 0.2))
    });
}

criterion_group!(benches, bench_normalize, bench_validate, bench_consistency);
criterion_main!(benches);
