// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # rv-similarity
//!
//! Content similarity and token estimation.
//!
//! [`similarity`] is the matching-characters ratio `2·M / (|a| + |b|)` where
//! `M` is the length of the longest common subsequence of the two texts,
//! computed over Unicode scalar values. It is symmetric, equals `1.0` for
//! identical inputs and shrinks as the texts diverge.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Similarity ratio in `[0.0, 1.0]`.
///
/// Two empty strings are identical (`1.0`); exactly one empty string shares
/// nothing with the other (`0.0`).
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }
    if a == b {
        return 1.0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let matched = lcs_len(&a, &b);
    (2 * matched) as f64 / (a.len() + b.len()) as f64
}

/// Length of the longest common subsequence, two-row DP.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    // Keep the shorter sequence on the inner axis.
    let (outer, inner) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let mut prev = vec![0usize; inner.len() + 1];
    let mut curr = vec![0usize; inner.len() + 1];
    for &x in outer {
        for (j, &y) in inner.iter().enumerate() {
            curr[j + 1] = if x == y {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[inner.len()]
}

/// Rough token count: one token per four characters, never less than one.
#[must_use]
pub fn token_estimate(text: &str) -> usize {
    (text.chars().count() / 4).max(1)
}

// ── Pairwise statistics ─────────────────────────────────────────────────

/// Similarity of one unordered pair of labelled texts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PairSimilarity {
    /// Label of the first text.
    pub left: String,
    /// Label of the second text.
    pub right: String,
    /// Similarity of the pair.
    pub score: f64,
}

/// Score every unordered pair of `items` (`n·(n-1)/2` pairs, in input order).
#[must_use]
pub fn pairwise<L: AsRef<str>, T: AsRef<str>>(items: &[(L, T)]) -> Vec<PairSimilarity> {
    let mut out = Vec::with_capacity(items.len() * items.len().saturating_sub(1) / 2);
    for (i, (la, ta)) in items.iter().enumerate() {
        for (lb, tb) in &items[i + 1..] {
            out.push(PairSimilarity {
                left: la.as_ref().to_string(),
                right: lb.as_ref().to_string(),
                score: similarity(ta.as_ref(), tb.as_ref()),
            });
        }
    }
    out
}

/// Mean and minimum over a set of pair scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PairStats {
    /// Arithmetic mean of all pair scores.
    pub mean: f64,
    /// The lowest-scoring pair.
    pub min_pair: PairSimilarity,
}

impl PairStats {
    /// Statistics over `pairs`; `None` when empty.
    #[must_use]
    pub fn from_pairs(pairs: &[PairSimilarity]) -> Option<Self> {
        let first = pairs.first()?;
        let mut min_pair = first;
        let mut sum = 0.0;
        for p in pairs {
            sum += p.score;
            if p.score < min_pair.score {
                min_pair = p;
            }
        }
        Some(Self {
            mean: sum / pairs.len() as f64,
            min_pair: min_pair.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cases() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("", "x"), 0.0);
        assert_eq!(similarity("x", ""), 0.0);
    }

    #[test]
    fn known_ratios() {
        // LCS("abcd", "bcde") = 3 → 6/8
        assert!((similarity("abcd", "bcde") - 0.75).abs() < 1e-12);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        let s = similarity("hello world", "hello there");
        assert!(s > 0.5 && s < 1.0, "{s}");
    }

    #[test]
    fn unicode_is_scored_by_scalar() {
        assert_eq!(similarity("héllo", "héllo"), 1.0);
        assert!((similarity("日本語", "日本") - 0.8).abs() < 1e-12);
    }

    #[test]
    fn token_estimate_floor() {
        assert_eq!(token_estimate(""), 1);
        assert_eq!(token_estimate("abc"), 1);
        assert_eq!(token_estimate("abcdefgh"), 2);
        assert_eq!(token_estimate(&"x".repeat(401)), 100);
    }

    #[test]
    fn pairwise_and_stats() {
        let items = [("a", "same text"), ("b", "same text"), ("c", "zzz")];
        let pairs = pairwise(&items);
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].score, 1.0);

        let stats = PairStats::from_pairs(&pairs).unwrap();
        assert_eq!(stats.min_pair.score, 0.0);
        assert!((stats.mean - 1.0 / 3.0).abs() < 1e-12);
        assert!(PairStats::from_pairs(&[]).is_none());
    }
}
