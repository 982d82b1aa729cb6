// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scoring and verdict rules.
//!
//! Everything here is pure: the engine executes the paths, normalizes the
//! responses and hands the records over; these functions decide.

use rv_similarity::{PairSimilarity, PairStats, pairwise, similarity};
use rv_validate::ValidationReport;
use serde_json::{Map, Value, json};

use crate::model::{Difference, DifferenceKind, PathRecord, Verdict};

/// Canonical fields every executed path is expected to report. Token
/// counts are left out because the usage block is optional.
pub const REQUIRED_FIELDS: &[&str] = &["model", "role", "finish_reason"];

/// Verdict with the scores and evidence behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Verdict.
    pub verdict: Verdict,
    /// One-line explanation.
    pub message: String,
    /// Headline similarity.
    pub similarity_score: Option<f64>,
    /// Pair scores behind the headline.
    pub pair_scores: Vec<PairSimilarity>,
    /// Evidence.
    pub differences: Vec<Difference>,
}

fn pct(score: f64) -> String {
    format!("{:.2}%", score * 100.0)
}

fn pair(a: &PathRecord, b: &PathRecord) -> PairSimilarity {
    PairSimilarity {
        left: a.label.clone(),
        right: b.label.clone(),
        score: similarity(&a.response.content, &b.response.content),
    }
}

/// A `missing_fields` difference listing, per path, the
/// [`REQUIRED_FIELDS`] that came back null. `None` when nothing is missing.
#[must_use]
pub fn missing_fields(records: &[PathRecord]) -> Option<Difference> {
    let mut detail = Map::new();
    for r in records {
        let missing: Vec<&str> = r
            .response
            .missing_fields()
            .into_iter()
            .filter(|f| REQUIRED_FIELDS.contains(f))
            .collect();
        if !missing.is_empty() {
            detail.insert(r.label.clone(), json!(missing));
        }
    }
    if detail.is_empty() {
        return None;
    }
    let paths: Vec<&str> = detail.keys().map(String::as_str).collect();
    let message = format!("missing canonical fields on {}", paths.join(", "));
    Some(Difference::new(DifferenceKind::MissingFields, message).with_detail(Value::Object(detail)))
}

// ── Pairs ───────────────────────────────────────────────────────────────

/// Judge one pair score: `pass` at or above `threshold`, otherwise
/// `inconclusive` with a `content_similarity` difference.
#[must_use]
pub fn judge_pair(score: PairSimilarity, threshold: f64) -> Outcome {
    let mut differences = Vec::new();
    let verdict = if score.score >= threshold {
        Verdict::Pass
    } else {
        differences.push(
            Difference::new(
                DifferenceKind::ContentSimilarity,
                format!("content similarity is {}", pct(score.score)),
            )
            .with_detail(json!({"value": score.score, "threshold": threshold})),
        );
        Verdict::Inconclusive
    };
    Outcome {
        verdict,
        message: format!(
            "{} vs {}: {} content similarity",
            score.left,
            score.right,
            pct(score.score)
        ),
        similarity_score: Some(score.score),
        pair_scores: vec![score],
        differences,
    }
}

/// Score and judge a baseline against one comparison. Missing canonical
/// fields are attached as evidence without changing the verdict.
#[must_use]
pub fn evaluate_pair(baseline: &PathRecord, comparison: &PathRecord, threshold: f64) -> Outcome {
    let mut outcome = judge_pair(pair(baseline, comparison), threshold);
    if let Some(d) = missing_fields(&[baseline.clone(), comparison.clone()]) {
        outcome.differences.push(d);
    }
    outcome
}

// ── Three paths ─────────────────────────────────────────────────────────

/// Judge a three-path comparison from its two pair scores (direct vs
/// transformed, direct vs roundtrip) and the differences already found.
///
/// `fail` if there are differences; otherwise `pass` when the average
/// reaches `threshold` and `inconclusive` below it.
#[must_use]
pub fn judge_three_path(
    direct_xform: PairSimilarity,
    direct_roundtrip: PairSimilarity,
    differences: Vec<Difference>,
    threshold: f64,
) -> Outcome {
    let avg = (direct_xform.score + direct_roundtrip.score) / 2.0;
    let verdict = if !differences.is_empty() {
        Verdict::Fail
    } else if avg >= threshold {
        Verdict::Pass
    } else {
        Verdict::Inconclusive
    };
    Outcome {
        verdict,
        message: format!(
            "three-path: {} average similarity (xform {}, roundtrip {})",
            pct(avg),
            pct(direct_xform.score),
            pct(direct_roundtrip.score)
        ),
        similarity_score: Some(avg),
        pair_scores: vec![direct_xform, direct_roundtrip],
        differences,
    }
}

/// Score and judge the direct, transformed and roundtrip records. Missing
/// canonical fields count as differences here.
#[must_use]
pub fn evaluate_three_path(
    direct: &PathRecord,
    xform: &PathRecord,
    roundtrip: &PathRecord,
    threshold: f64,
) -> Outcome {
    let differences = missing_fields(&[direct.clone(), xform.clone(), roundtrip.clone()])
        .into_iter()
        .collect();
    judge_three_path(pair(direct, xform), pair(direct, roundtrip), differences, threshold)
}

// ── Consistency ─────────────────────────────────────────────────────────

/// Judge a set of pair scores under "the minority is guilty".
///
/// The lowest pair is the minority; it is flagged when it scores below
/// `mean - margin`. Flagged ⇒ `fail`; otherwise `pass` when the mean
/// reaches `mean_threshold`, else `inconclusive`.
#[must_use]
pub fn judge_consistency(pairs: Vec<PairSimilarity>, mean_threshold: f64, margin: f64) -> Outcome {
    let Some(stats) = PairStats::from_pairs(&pairs) else {
        return Outcome {
            verdict: Verdict::Inconclusive,
            message: "fewer than two responses to compare".into(),
            similarity_score: None,
            pair_scores: pairs,
            differences: Vec::new(),
        };
    };
    let minority = &stats.min_pair;
    let flagged = minority.score < stats.mean - margin;
    let mut differences = Vec::new();
    if flagged {
        differences.push(
            Difference::new(
                DifferenceKind::MinorityPair,
                format!(
                    "low similarity between {} and {}, needs investigation",
                    minority.left, minority.right
                ),
            )
            .with_detail(json!({
                "left": minority.left,
                "right": minority.right,
                "similarity": minority.score,
                "mean": stats.mean,
                "margin": margin,
            })),
        );
    }
    let verdict = if flagged {
        Verdict::Fail
    } else if stats.mean >= mean_threshold {
        Verdict::Pass
    } else {
        Verdict::Inconclusive
    };
    Outcome {
        verdict,
        message: format!("multi-provider consistency: {} average similarity", pct(stats.mean)),
        similarity_score: Some(stats.mean),
        pair_scores: pairs,
        differences,
    }
}

/// Score every unordered pair of `records` and judge them. Missing
/// canonical fields are attached as evidence.
#[must_use]
pub fn evaluate_consistency(records: &[PathRecord], mean_threshold: f64, margin: f64) -> Outcome {
    let items: Vec<(&str, &str)> = records
        .iter()
        .map(|r| (r.label.as_str(), r.response.content.as_str()))
        .collect();
    let mut outcome = judge_consistency(pairwise(&items), mean_threshold, margin);
    if let Some(d) = missing_fields(records) {
        outcome.differences.push(d);
    }
    outcome
}

// ── Structure ───────────────────────────────────────────────────────────

/// `pass` when the report has no error issues, `fail` otherwise.
#[must_use]
pub fn judge_structure(report: &ValidationReport) -> Outcome {
    let errors: Vec<&str> = report.errors().map(|i| i.field_path.as_str()).collect();
    let mut differences = Vec::new();
    let verdict = if errors.is_empty() {
        Verdict::Pass
    } else {
        differences.push(
            Difference::new(
                DifferenceKind::ValidationError,
                format!("{} field error(s): {}", errors.len(), errors.join(", ")),
            )
            .with_detail(json!({"fields": errors})),
        );
        Verdict::Fail
    };
    Outcome {
        verdict,
        message: report.summary(),
        similarity_score: None,
        pair_scores: Vec::new(),
        differences,
    }
}
