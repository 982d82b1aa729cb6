// SPDX-License-Identifier: MIT OR Apache-2.0
//! Result records produced by the engine and aggregated by the suite runner.

use chrono::{DateTime, Utc};
use rv_dialect::ApiStyle;
use rv_error::RvErrorDto;
use rv_normalize::CanonicalResponse;
use rv_similarity::PairSimilarity;
use rv_validate::ValidationIssue;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Outcome of one comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Paths agree.
    Pass,
    /// A path failed or the responses disagree.
    Fail,
    /// Nothing was proven either way.
    Inconclusive,
}

impl Verdict {
    /// Lowercase name used in reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Inconclusive => "inconclusive",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which kind of comparison produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonType {
    /// Direct call against the same call restored through another dialect.
    Roundtrip,
    /// Same request through two front-end dialects.
    TwoPath,
    /// Direct, adaptor-transformed and roundtrip calls.
    ThreePath,
    /// One call per usable rule, compared pairwise.
    CrossProvider,
    /// Field checklist of a single raw body.
    Structure,
}

impl ComparisonType {
    /// Snake-case name used in reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Roundtrip => "roundtrip",
            Self::TwoPath => "two_path",
            Self::ThreePath => "three_path",
            Self::CrossProvider => "cross_provider",
            Self::Structure => "structure",
        }
    }
}

impl fmt::Display for ComparisonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

/// Category of a recorded difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceKind {
    /// Content similarity below the test's threshold.
    ContentSimilarity,
    /// Canonical fields came back null.
    MissingFields,
    /// One pair is markedly less similar than the rest.
    MinorityPair,
    /// A path's proxy call failed.
    PathFailure,
    /// The field validator reported errors.
    ValidationError,
}

impl DifferenceKind {
    /// Snake-case name used in reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContentSimilarity => "content_similarity",
            Self::MissingFields => "missing_fields",
            Self::MinorityPair => "minority_pair",
            Self::PathFailure => "path_failure",
            Self::ValidationError => "validation_error",
        }
    }
}

/// One piece of evidence attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Difference {
    /// Category.
    pub kind: DifferenceKind,
    /// Human-readable description.
    pub message: String,
    /// Structured detail (scores, paths, field names).
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub detail: Value,
}

impl Difference {
    /// Difference without detail.
    pub fn new(kind: DifferenceKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: Value::Null,
        }
    }

    /// Attach structured detail.
    #[must_use]
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = detail;
        self
    }
}

/// One executed path and its normalized response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PathRecord {
    /// Path name within the test (`direct`, `roundtrip`, a scenario, ...).
    pub label: String,
    /// Front-end dialect spoken on this path.
    pub style: ApiStyle,
    /// Dialect the response was round-tripped through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roundtrip_via: Option<ApiStyle>,
    /// Scenario the request was routed under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    /// Requested model.
    pub model: String,
    /// Normalized response.
    pub response: CanonicalResponse,
    /// Token estimate of the response content.
    pub tokens: usize,
    /// Duration of the proxy call.
    pub duration_ms: u64,
}

// ---------------------------------------------------------------------------
// DifferentialResult
// ---------------------------------------------------------------------------

/// Everything known about one comparison. Built once, never re-scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DifferentialResult {
    /// Test name, unique within a suite.
    pub test_name: String,
    /// Kind of comparison.
    pub comparison_type: ComparisonType,
    /// Verdict.
    pub verdict: Verdict,
    /// One-line explanation.
    pub message: String,
    /// Headline similarity (pair score, three-path average or pairwise
    /// mean). `None` when nothing was scored.
    pub similarity_score: Option<f64>,
    /// Individual pair scores behind the headline score.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pair_scores: Vec<PairSimilarity>,
    /// Evidence.
    #[serde(default)]
    pub differences: Vec<Difference>,
    /// Baseline path.
    pub baseline: Option<PathRecord>,
    /// Paths compared against the baseline.
    #[serde(default)]
    pub comparisons: Vec<PathRecord>,
    /// Token estimate of the baseline content.
    pub baseline_tokens: usize,
    /// Token estimates of the compared contents.
    #[serde(default)]
    pub comparison_tokens: Vec<usize>,
    /// Largest absolute token difference against the baseline.
    pub token_difference: usize,
    /// Threshold the headline score was judged against.
    pub threshold: Option<f64>,
    /// Wall-clock duration of the whole comparison.
    pub duration_ms: u64,
    /// When the result was produced.
    pub timestamp: DateTime<Utc>,
    /// Dispatch, execution or internal error that decided the verdict.
    pub error: Option<RvErrorDto>,
    /// Field validator issues, for structure checks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_issues: Vec<ValidationIssue>,
}

impl DifferentialResult {
    /// Empty inconclusive result for `test_name`.
    pub fn new(test_name: impl Into<String>, comparison_type: ComparisonType) -> Self {
        Self {
            test_name: test_name.into(),
            comparison_type,
            verdict: Verdict::Inconclusive,
            message: String::new(),
            similarity_score: None,
            pair_scores: Vec::new(),
            differences: Vec::new(),
            baseline: None,
            comparisons: Vec::new(),
            baseline_tokens: 0,
            comparison_tokens: Vec::new(),
            token_difference: 0,
            threshold: None,
            duration_ms: 0,
            timestamp: Utc::now(),
            error: None,
            validation_issues: Vec::new(),
        }
    }

    /// `true` for [`Verdict::Pass`].
    #[must_use]
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    /// Differences of one kind.
    pub fn differences_of(&self, kind: DifferenceKind) -> impl Iterator<Item = &Difference> {
        self.differences.iter().filter(move |d| d.kind == kind)
    }

    /// Attach normalized paths; the first becomes the baseline. Token
    /// fields are derived from them.
    pub(crate) fn set_records(&mut self, records: Vec<PathRecord>) {
        let mut iter = records.into_iter();
        let Some(baseline) = iter.next() else {
            return;
        };
        self.comparisons = iter.collect();
        self.baseline_tokens = baseline.tokens;
        self.comparison_tokens = self.comparisons.iter().map(|r| r.tokens).collect();
        self.token_difference = self
            .comparison_tokens
            .iter()
            .map(|t| t.abs_diff(baseline.tokens))
            .max()
            .unwrap_or(0);
        self.baseline = Some(baseline);
    }
}

// ---------------------------------------------------------------------------
// SuiteResult
// ---------------------------------------------------------------------------

/// Results of one suite run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SuiteResult {
    /// Run identifier.
    pub run_id: Uuid,
    /// Suite name.
    pub suite_name: String,
    /// Number of results.
    pub total: usize,
    /// Results with [`Verdict::Pass`].
    pub passed: usize,
    /// Results with [`Verdict::Fail`].
    pub failed: usize,
    /// Results with [`Verdict::Inconclusive`].
    pub inconclusive: usize,
    /// Individual results.
    pub results: Vec<DifferentialResult>,
    /// Wall-clock duration of the run.
    pub duration_ms: u64,
    /// Start of the run.
    pub timestamp: DateTime<Utc>,
}

impl SuiteResult {
    /// Suite with no results.
    pub fn empty(suite_name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            suite_name: suite_name.into(),
            total: 0,
            passed: 0,
            failed: 0,
            inconclusive: 0,
            results: Vec::new(),
            duration_ms: 0,
            timestamp: Utc::now(),
        }
    }

    /// Add one result and update the counters.
    pub fn push(&mut self, result: DifferentialResult) {
        self.total += 1;
        match result.verdict {
            Verdict::Pass => self.passed += 1,
            Verdict::Fail => self.failed += 1,
            Verdict::Inconclusive => self.inconclusive += 1,
        }
        self.results.push(result);
    }

    /// Combine two partial results of the same run.
    ///
    /// Counters add, durations take the longer, timestamps the earlier, so
    /// partial results fold to the same totals in any order.
    #[must_use]
    pub fn merge(mut self, other: SuiteResult) -> Self {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
        self.inconclusive += other.inconclusive;
        self.results.extend(other.results);
        self.duration_ms = self.duration_ms.max(other.duration_ms);
        self.timestamp = self.timestamp.min(other.timestamp);
        self
    }

    /// Fold any number of results into one suite.
    pub fn fold(
        suite_name: impl Into<String>,
        results: impl IntoIterator<Item = DifferentialResult>,
    ) -> Self {
        results.into_iter().fold(Self::empty(suite_name), |mut acc, r| {
            acc.push(r);
            acc
        })
    }

    /// `passed / total * 100`; 0 for an empty suite.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64 * 100.0
        }
    }

    /// `true` when any result failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Result by test name.
    #[must_use]
    pub fn get(&self, test_name: &str) -> Option<&DifferentialResult> {
        self.results.iter().find(|r| r.test_name == test_name)
    }
}
