// SPDX-License-Identifier: MIT OR Apache-2.0
//! Suite plans and the suite runner.
//!
//! Each test runs behind a fault boundary: a panic inside one test becomes a
//! `fail` result carrying the panic message and the other tests carry on.

use futures::FutureExt;
use futures::stream::{self, StreamExt};
use rv_client::ProxyTransport;
use rv_dialect::ApiStyle;
use rv_error::{ErrorCode, RvError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::engine::DifferentialEngine;
use crate::model::{ComparisonType, DifferentialResult, SuiteResult, Verdict};
use crate::threshold::ThresholdKey;

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// One planned test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TestCase {
    /// Direct call in `style` against the same call round-tripped through `via`.
    Roundtrip {
        /// Test name.
        name: String,
        /// Front-end dialect.
        style: ApiStyle,
        /// Roundtrip dialect.
        via: ApiStyle,
        /// Scenario; `None` uses the first active rule.
        #[serde(default)]
        scenario: Option<String>,
        /// Threshold entry.
        threshold: ThresholdKey,
    },
    /// Same request through two front-end dialects.
    TwoPath {
        /// Test name.
        name: String,
        /// Scenario; `None` uses the first active rule.
        #[serde(default)]
        scenario: Option<String>,
        /// Baseline dialect.
        left: ApiStyle,
        /// Compared dialect.
        right: ApiStyle,
    },
    /// Direct, transformed and roundtrip calls.
    ThreePath {
        /// Test name.
        name: String,
        /// Scenario; `None` uses the first active rule.
        #[serde(default)]
        scenario: Option<String>,
    },
    /// Pairwise consistency across rules.
    MultiProvider {
        /// Test name.
        name: String,
        /// Scenarios to compare; empty means every usable rule.
        #[serde(default)]
        scenarios: Vec<String>,
    },
    /// Field checklist of one raw body.
    FormatCompliance {
        /// Test name.
        name: String,
        /// Dialect to call and validate.
        style: ApiStyle,
        /// Scenario; `None` uses the first active rule.
        #[serde(default)]
        scenario: Option<String>,
    },
}

impl TestCase {
    /// Test name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Roundtrip { name, .. }
            | Self::TwoPath { name, .. }
            | Self::ThreePath { name, .. }
            | Self::MultiProvider { name, .. }
            | Self::FormatCompliance { name, .. } => name,
        }
    }

    /// Comparison type the test produces.
    #[must_use]
    pub fn comparison_type(&self) -> ComparisonType {
        match self {
            Self::Roundtrip { .. } => ComparisonType::Roundtrip,
            Self::TwoPath { .. } => ComparisonType::TwoPath,
            Self::ThreePath { .. } => ComparisonType::ThreePath,
            Self::MultiProvider { .. } => ComparisonType::CrossProvider,
            Self::FormatCompliance { .. } => ComparisonType::Structure,
        }
    }
}

/// Named list of tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SuitePlan {
    /// Suite name.
    pub name: String,
    /// Tests, in report order.
    pub cases: Vec<TestCase>,
}

/// Names accepted by [`SuitePlan::named`].
pub const SUITE_NAMES: &[&str] = &["differential", "compliance"];

impl SuitePlan {
    /// Roundtrip, two-path, three-path and multi-provider comparisons.
    #[must_use]
    pub fn differential(scenario: Option<&str>) -> Self {
        let scenario = scenario.map(str::to_owned);
        Self {
            name: "differential".into(),
            cases: vec![
                TestCase::Roundtrip {
                    name: "roundtrip_openai_anthropic_openai".into(),
                    style: ApiStyle::OpenAi,
                    via: ApiStyle::Anthropic,
                    scenario: scenario.clone(),
                    threshold: ThresholdKey::StrictRoundtrip,
                },
                TestCase::Roundtrip {
                    name: "anthropic_roundtrip".into(),
                    style: ApiStyle::Anthropic,
                    via: ApiStyle::OpenAi,
                    scenario: scenario.clone(),
                    threshold: ThresholdKey::Roundtrip,
                },
                TestCase::TwoPath {
                    name: "openai_vs_anthropic".into(),
                    scenario: scenario.clone(),
                    left: ApiStyle::OpenAi,
                    right: ApiStyle::Anthropic,
                },
                TestCase::ThreePath {
                    name: "three_path".into(),
                    scenario,
                },
                TestCase::MultiProvider {
                    name: "multi_provider_consistency".into(),
                    scenarios: Vec::new(),
                },
            ],
        }
    }

    /// Field checklist for both front-end dialects.
    #[must_use]
    pub fn compliance(scenario: Option<&str>) -> Self {
        let cases = [ApiStyle::OpenAi, ApiStyle::Anthropic]
            .into_iter()
            .map(|style| TestCase::FormatCompliance {
                name: format!("{}_format_compliance", style.wire_name()),
                style,
                scenario: scenario.map(str::to_owned),
            })
            .collect();
        Self {
            name: "compliance".into(),
            cases,
        }
    }

    /// Built-in suite by name (see [`SUITE_NAMES`]).
    #[must_use]
    pub fn named(name: &str, scenario: Option<&str>) -> Option<Self> {
        match name {
            "differential" => Some(Self::differential(scenario)),
            "compliance" => Some(Self::compliance(scenario)),
            _ => None,
        }
    }

    /// Every built-in suite.
    #[must_use]
    pub fn defaults(scenario: Option<&str>) -> Vec<Self> {
        vec![Self::differential(scenario), Self::compliance(scenario)]
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Shared flag asking a runner to start no further tests.
///
/// Clones share state. Tests already running finish normally.
#[derive(Clone, Default)]
pub struct CancellationFlag {
    inner: Arc<AtomicBool>,
}

impl CancellationFlag {
    /// A flag that is not set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Idempotent.
    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    /// `true` once [`cancel`](Self::cancel) was called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for CancellationFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationFlag")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Default number of tests in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Runs suite plans on a shared engine.
pub struct SuiteRunner<T: ?Sized> {
    engine: Arc<DifferentialEngine<T>>,
    cancel: CancellationFlag,
    concurrency: usize,
}

impl<T: ?Sized> std::fmt::Debug for SuiteRunner<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuiteRunner")
            .field("cancel", &self.cancel)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl<T: ProxyTransport + ?Sized> SuiteRunner<T> {
    /// Runner over `engine`.
    pub fn new(engine: Arc<DifferentialEngine<T>>) -> Self {
        Self {
            engine,
            cancel: CancellationFlag::new(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Observe `flag` before starting each test.
    #[must_use]
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancel = flag;
        self
    }

    /// Limit the number of tests in flight. Zero is treated as one.
    #[must_use]
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// The flag this runner observes.
    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancel
    }

    /// Run every test of `plan` and collect the results in plan order.
    /// Tests not yet started when the flag is set are left out.
    pub async fn run_suite(&self, plan: &SuitePlan) -> SuiteResult {
        let start = Instant::now();
        let mut suite = SuiteResult::empty(&plan.name);
        info!(target: "rv.suite", suite = %plan.name, tests = plan.cases.len(), "suite started");

        let mut finished: Vec<(usize, DifferentialResult)> = stream::iter(plan.cases.iter().enumerate())
            .map(|(idx, case)| async move {
                if self.cancel.is_cancelled() {
                    debug!(target: "rv.suite", test = case.name(), "skipped after cancellation");
                    return None;
                }
                Some((idx, self.run_isolated(case).await))
            })
            .buffer_unordered(self.concurrency)
            .filter_map(futures::future::ready)
            .collect()
            .await;
        finished.sort_by_key(|(idx, _)| *idx);
        for (_, result) in finished {
            suite.push(result);
        }

        suite.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            target: "rv.suite",
            suite = %suite.suite_name,
            total = suite.total,
            passed = suite.passed,
            failed = suite.failed,
            inconclusive = suite.inconclusive,
            "suite finished"
        );
        suite
    }

    /// Run several plans one after another.
    pub async fn run_all(&self, plans: &[SuitePlan]) -> Vec<SuiteResult> {
        let mut out = Vec::with_capacity(plans.len());
        for plan in plans {
            if self.cancel.is_cancelled() {
                break;
            }
            out.push(self.run_suite(plan).await);
        }
        out
    }

    async fn run_isolated(&self, case: &TestCase) -> DifferentialResult {
        let start = Instant::now();
        match AssertUnwindSafe(self.engine.run_case(case)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                warn!(target: "rv.suite", test = case.name(), error = %msg, "test panic recovered");
                let err = RvError::new(ErrorCode::Internal, format!("test panicked: {msg}"))
                    .with_context("test", case.name());
                let mut result = DifferentialResult::new(case.name(), case.comparison_type());
                result.verdict = Verdict::Fail;
                result.message = err.message.clone();
                result.error = Some(err.to_dto());
                result.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_downcast() {
        let s: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(s.as_ref()), "boom");
        let s: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(s.as_ref()), "bang");
        let s: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(s.as_ref()), "unknown panic");
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let a = CancellationFlag::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        a.cancel();
        assert!(b.is_cancelled());
    }

    #[test]
    fn default_plans() {
        let d = SuitePlan::differential(Some("claude_code"));
        assert_eq!(d.cases.len(), 5);
        assert_eq!(d.cases[0].name(), "roundtrip_openai_anthropic_openai");
        assert!(matches!(
            d.cases[0],
            TestCase::Roundtrip {
                threshold: ThresholdKey::StrictRoundtrip,
                ..
            }
        ));
        let c = SuitePlan::compliance(None);
        let names: Vec<&str> = c.cases.iter().map(TestCase::name).collect();
        assert_eq!(names, ["openai_format_compliance", "anthropic_format_compliance"]);
        assert!(SuitePlan::named("nope", None).is_none());
        assert_eq!(SuitePlan::defaults(None).len(), SUITE_NAMES.len());
    }

    #[test]
    fn test_case_serializes_with_kind_tag() {
        let case = TestCase::ThreePath {
            name: "t".into(),
            scenario: None,
        };
        let v = serde_json::to_value(&case).unwrap();
        assert_eq!(v["kind"], "three_path");
        let back: TestCase = serde_json::from_value(serde_json::json!({
            "kind": "multi_provider", "name": "m"
        }))
        .unwrap();
        assert_eq!(back.comparison_type(), ComparisonType::CrossProvider);
    }
}
