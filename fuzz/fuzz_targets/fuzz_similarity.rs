// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fuzz the similarity ratio: bounded, symmetric, reflexive.
#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    a: String,
    b: String,
}

fuzz_target!(|input: Input| {
    // LCS is quadratic; keep single runs fast.
    if input.a.len() > 2048 || input.b.len() > 2048 {
        return;
    }
    let ab = rv_similarity::similarity(&input.a, &input.b);
    let ba = rv_similarity::similarity(&input.b, &input.a);
    assert!((0.0..=1.0).contains(&ab));
    assert!((ab - ba).abs() < 1e-12);
    assert_eq!(rv_similarity::similarity(&input.a, &input.a), 1.0);
    assert!(rv_similarity::token_estimate(&input.a) >= 1);
});
