// SPDX-License-Identifier: MIT OR Apache-2.0
//! The differential engine: dispatch, execute, normalize, score, judge.

use futures::future::join_all;
use rv_client::{ProxyRequest, ProxyTransport};
use rv_config::{ConfigResolver, ResolvedConfig};
use rv_dialect::{ApiStyle, ShapeDetector};
use rv_error::{ErrorCode, RvError};
use rv_normalize::normalize;
use rv_similarity::token_estimate;
use rv_validate::ValidationReport;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::model::{ComparisonType, DifferentialResult, Difference, DifferenceKind, PathRecord, Verdict};
use crate::scoring::{self, Outcome};
use crate::suite::TestCase;
use crate::threshold::{ThresholdKey, ThresholdTable};

/// `max_tokens` sent with every test request.
pub const DEFAULT_MAX_TOKENS: u64 = 100;

/// `temperature` sent with every test request.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Where a test's requests go, as resolved from the configuration.
#[derive(Debug, Clone)]
struct Target {
    label: String,
    scenario: String,
    model: String,
    backend: ApiStyle,
}

struct PathSpec {
    label: String,
    request: ProxyRequest,
}

impl PathSpec {
    fn roundtrip_via(mut self, via: ApiStyle) -> Self {
        self.request = self.request.roundtrip_via(via);
        self
    }
}

struct Executed {
    record: PathRecord,
    body: Value,
}

/// Front-end dialect that reaches a backend of `style` without transformation.
fn direct_dialect(style: ApiStyle) -> ApiStyle {
    if style.is_front_end() { style } else { ApiStyle::OpenAi }
}

/// The other front-end dialect.
fn counterpart(style: ApiStyle) -> ApiStyle {
    match style {
        ApiStyle::Anthropic => ApiStyle::OpenAi,
        ApiStyle::OpenAi | ApiStyle::Google => ApiStyle::Anthropic,
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Runs comparisons against a proxy reachable through `T`.
///
/// Holds no state between comparisons; one engine can run any number of
/// tests concurrently.
pub struct DifferentialEngine<T: ?Sized> {
    transport: Arc<T>,
    resolver: ConfigResolver,
    thresholds: ThresholdTable,
    prompt: String,
    options: Map<String, Value>,
}

impl<T: ?Sized> std::fmt::Debug for DifferentialEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DifferentialEngine")
            .field("thresholds", &self.thresholds)
            .field("prompt", &self.prompt)
            .finish_non_exhaustive()
    }
}

impl<T: ProxyTransport + ?Sized> DifferentialEngine<T> {
    /// Engine over `transport`, resolving rules from `config`. The test
    /// prompt comes from the configuration's harness settings.
    pub fn new(transport: Arc<T>, config: Arc<ResolvedConfig>) -> Self {
        let prompt = config.settings.test_prompt.clone();
        let mut options = Map::new();
        options.insert("max_tokens".into(), json!(DEFAULT_MAX_TOKENS));
        options.insert("temperature".into(), json!(DEFAULT_TEMPERATURE));
        Self {
            transport,
            resolver: ConfigResolver::new(config),
            thresholds: ThresholdTable::default(),
            prompt,
            options,
        }
    }

    /// Replace the threshold table.
    #[must_use]
    pub fn with_thresholds(mut self, thresholds: ThresholdTable) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Replace the test prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Set or override a body option sent with every request.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Thresholds in use.
    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    /// Resolver over the shared configuration.
    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    /// Run one planned test.
    pub async fn run_case(&self, case: &TestCase) -> DifferentialResult {
        match case {
            TestCase::Roundtrip {
                name,
                style,
                via,
                scenario,
                threshold,
            } => {
                self.roundtrip(name, *style, *via, scenario.as_deref(), *threshold)
                    .await
            }
            TestCase::TwoPath {
                name,
                scenario,
                left,
                right,
            } => self.two_path(name, scenario.as_deref(), *left, *right).await,
            TestCase::ThreePath { name, scenario } => self.three_path(name, scenario.as_deref()).await,
            TestCase::MultiProvider { name, scenarios } => self.multi_provider(name, scenarios).await,
            TestCase::FormatCompliance {
                name,
                style,
                scenario,
            } => self.format_compliance(name, *style, scenario.as_deref()).await,
        }
    }

    // ── Tests ───────────────────────────────────────────────────────────

    /// Compare a direct call in `style` with the same call round-tripped
    /// through `via`, judged against the `key` threshold.
    pub async fn roundtrip(
        &self,
        name: &str,
        style: ApiStyle,
        via: ApiStyle,
        scenario: Option<&str>,
        key: ThresholdKey,
    ) -> DifferentialResult {
        let start = Instant::now();
        let result = DifferentialResult::new(name, ComparisonType::Roundtrip);
        let target = match self.dispatch(scenario) {
            Ok(t) => t,
            Err(e) => return self.inconclusive(result, e, start),
        };
        let paths = vec![
            self.path("direct", style, &target),
            self.path("roundtrip", style, &target).roundtrip_via(via),
        ];
        let threshold = self.thresholds.get(key);
        match self.execute(paths).await {
            Ok(exec) => {
                let outcome = scoring::evaluate_pair(&exec[0].record, &exec[1].record, threshold);
                self.finish(result, outcome, exec, Some(threshold), start)
            }
            Err(failures) => self.path_failure(result, failures, start),
        }
    }

    /// Send the same request through two front-end dialects.
    pub async fn two_path(
        &self,
        name: &str,
        scenario: Option<&str>,
        left: ApiStyle,
        right: ApiStyle,
    ) -> DifferentialResult {
        let start = Instant::now();
        let result = DifferentialResult::new(name, ComparisonType::TwoPath);
        let target = match self.dispatch(scenario) {
            Ok(t) => t,
            Err(e) => return self.inconclusive(result, e, start),
        };
        let paths = vec![
            self.path(left.wire_name(), left, &target),
            self.path(right.wire_name(), right, &target),
        ];
        let threshold = self.thresholds.two_path;
        match self.execute(paths).await {
            Ok(exec) => {
                let outcome = scoring::evaluate_pair(&exec[0].record, &exec[1].record, threshold);
                self.finish(result, outcome, exec, Some(threshold), start)
            }
            Err(failures) => self.path_failure(result, failures, start),
        }
    }

    /// Direct call, adaptor-transformed call and roundtrip call for the
    /// rule serving `scenario`.
    ///
    /// The direct path speaks the backend's own dialect (OpenAI for
    /// backends that are not front-end dialects), the transformed path the
    /// other front-end dialect, and the roundtrip path the direct dialect
    /// restored through the other one.
    pub async fn three_path(&self, name: &str, scenario: Option<&str>) -> DifferentialResult {
        let start = Instant::now();
        let result = DifferentialResult::new(name, ComparisonType::ThreePath);
        let target = match self.dispatch(scenario) {
            Ok(t) => t,
            Err(e) => return self.inconclusive(result, e, start),
        };
        let direct = direct_dialect(target.backend);
        let other = counterpart(direct);
        let paths = vec![
            self.path("direct", direct, &target),
            self.path("xform", other, &target),
            self.path("roundtrip", direct, &target).roundtrip_via(other),
        ];
        let threshold = self.thresholds.three_path;
        match self.execute(paths).await {
            Ok(exec) => {
                let outcome =
                    scoring::evaluate_three_path(&exec[0].record, &exec[1].record, &exec[2].record, threshold);
                self.finish(result, outcome, exec, Some(threshold), start)
            }
            Err(failures) => self.path_failure(result, failures, start),
        }
    }

    /// One call per rule, every pair compared; the lowest pair is suspect.
    ///
    /// With no `scenarios`, every usable rule takes part.
    pub async fn multi_provider(&self, name: &str, scenarios: &[String]) -> DifferentialResult {
        let start = Instant::now();
        let result = DifferentialResult::new(name, ComparisonType::CrossProvider);
        let targets = match self.dispatch_many(scenarios) {
            Ok(t) => t,
            Err(e) => return self.inconclusive(result, e, start),
        };
        let paths = targets
            .iter()
            .map(|t| self.path(&t.label, direct_dialect(t.backend), t))
            .collect();
        let threshold = self.thresholds.consistency_mean;
        match self.execute(paths).await {
            Ok(exec) => {
                let records: Vec<PathRecord> = exec.iter().map(|e| e.record.clone()).collect();
                let outcome =
                    scoring::evaluate_consistency(&records, threshold, self.thresholds.minority_margin);
                self.finish(result, outcome, exec, Some(threshold), start)
            }
            Err(failures) => self.path_failure(result, failures, start),
        }
    }

    /// One call in `style`, raw body checked by the field validator.
    pub async fn format_compliance(
        &self,
        name: &str,
        style: ApiStyle,
        scenario: Option<&str>,
    ) -> DifferentialResult {
        let start = Instant::now();
        let result = DifferentialResult::new(name, ComparisonType::Structure);
        let target = match self.dispatch(scenario) {
            Ok(t) => t,
            Err(e) => return self.inconclusive(result, e, start),
        };
        let paths = vec![self.path(style.wire_name(), style, &target)];
        match self.execute(paths).await {
            Ok(exec) => {
                if !ShapeDetector::new().agrees_with(&exec[0].body, style) {
                    warn!(target: "rv.verdict", test = name, %style, "body resembles another dialect");
                }
                let report = ValidationReport::check(style, &exec[0].body);
                let outcome = scoring::judge_structure(&report);
                let mut result = self.finish(result, outcome, exec, None, start);
                result.validation_issues = report.issues;
                result
            }
            Err(failures) => self.path_failure(result, failures, start),
        }
    }

    // ── Dispatch ────────────────────────────────────────────────────────

    fn dispatch(&self, scenario: Option<&str>) -> Result<Target, RvError> {
        let rule = self.resolver.resolve_rule(scenario).ok_or_else(|| {
            let msg = match scenario {
                Some(s) => format!("no active rule for scenario '{s}'"),
                None => "no active rule configured".to_string(),
            };
            RvError::new(ErrorCode::ConfigRuleUnresolved, msg)
        })?;
        let (provider, service) = self.resolver.resolve_backend(rule)?;
        debug!(
            target: "rv.verdict",
            rule = %rule.label(),
            provider = %provider.name,
            backend_model = %service.model,
            "dispatched"
        );
        Ok(Target {
            label: rule.label(),
            scenario: rule.scenario.clone(),
            model: rule.request_model.clone(),
            backend: provider.api_style,
        })
    }

    fn dispatch_many(&self, scenarios: &[String]) -> Result<Vec<Target>, RvError> {
        let targets = if scenarios.is_empty() {
            self.resolver
                .usable_rules()
                .into_iter()
                .filter_map(|rule| {
                    let (provider, _) = self.resolver.resolve_backend(rule).ok()?;
                    Some(Target {
                        label: rule.label(),
                        scenario: rule.scenario.clone(),
                        model: rule.request_model.clone(),
                        backend: provider.api_style,
                    })
                })
                .collect()
        } else {
            scenarios
                .iter()
                .map(|s| self.dispatch(Some(s)))
                .collect::<Result<Vec<_>, _>>()?
        };
        if targets.len() < 2 {
            return Err(RvError::new(
                ErrorCode::ConfigRuleUnresolved,
                format!("need at least two usable rules, found {}", targets.len()),
            ));
        }
        Ok(targets)
    }

    // ── Execution ───────────────────────────────────────────────────────

    fn path(&self, label: &str, style: ApiStyle, target: &Target) -> PathSpec {
        let mut request = ProxyRequest::new(style, &target.model, &self.prompt).scenario(&target.scenario);
        request.options = self.options.clone();
        PathSpec {
            label: label.to_string(),
            request,
        }
    }

    /// Issue every path concurrently. All records on success; otherwise
    /// the label and error of each failed path.
    async fn execute(&self, paths: Vec<PathSpec>) -> Result<Vec<Executed>, Vec<(String, RvError)>> {
        let envelopes = join_all(paths.iter().map(|p| self.transport.send(&p.request))).await;
        let mut executed = Vec::with_capacity(paths.len());
        let mut failures = Vec::new();
        for (spec, env) in paths.into_iter().zip(envelopes) {
            if let Some(err) = env.to_error() {
                warn!(
                    target: "rv.verdict",
                    path = %spec.label,
                    request = %spec.request.label(),
                    error = %err,
                    "path failed"
                );
                failures.push((spec.label, err));
                continue;
            }
            let body = env.body.unwrap_or_default();
            let response = normalize(spec.request.style, &body);
            let record = PathRecord {
                tokens: token_estimate(&response.content),
                label: spec.label,
                style: spec.request.style,
                roundtrip_via: spec.request.roundtrip_via,
                scenario: spec.request.scenario,
                model: spec.request.model,
                response,
                duration_ms: env.duration_ms,
            };
            executed.push(Executed { record, body });
        }
        if failures.is_empty() { Ok(executed) } else { Err(failures) }
    }

    // ── Result assembly ─────────────────────────────────────────────────

    fn inconclusive(&self, mut result: DifferentialResult, err: RvError, start: Instant) -> DifferentialResult {
        info!(
            target: "rv.verdict",
            test = %result.test_name,
            error = %err,
            "dispatch failed, inconclusive"
        );
        result.verdict = Verdict::Inconclusive;
        result.message = format!("dispatch failed: {}", err.message);
        result.error = Some(err.to_dto());
        result.duration_ms = elapsed_ms(start);
        result
    }

    fn path_failure(
        &self,
        mut result: DifferentialResult,
        failures: Vec<(String, RvError)>,
        start: Instant,
    ) -> DifferentialResult {
        let labels: Vec<&str> = failures.iter().map(|(l, _)| l.as_str()).collect();
        result.message = format!("path(s) failed: {}", labels.join(", "));
        result.verdict = Verdict::Fail;
        result.error = failures.first().map(|(_, e)| e.to_dto());
        result.differences = failures
            .iter()
            .map(|(label, err)| {
                Difference::new(DifferenceKind::PathFailure, format!("{label}: {}", err.message))
                    .with_detail(json!({"path": label, "code": err.code, "context": err.context}))
            })
            .collect();
        result.duration_ms = elapsed_ms(start);
        info!(
            target: "rv.verdict",
            test = %result.test_name,
            verdict = %result.verdict,
            failed_paths = %labels.join(","),
            "comparison finished"
        );
        result
    }

    fn finish(
        &self,
        mut result: DifferentialResult,
        outcome: Outcome,
        executed: Vec<Executed>,
        threshold: Option<f64>,
        start: Instant,
    ) -> DifferentialResult {
        result.verdict = outcome.verdict;
        result.message = outcome.message;
        result.similarity_score = outcome.similarity_score;
        result.pair_scores = outcome.pair_scores;
        result.differences = outcome.differences;
        result.threshold = threshold;
        result.set_records(executed.into_iter().map(|e| e.record).collect());
        result.duration_ms = elapsed_ms(start);
        info!(
            target: "rv.verdict",
            test = %result.test_name,
            verdict = %result.verdict,
            score = ?result.similarity_score,
            differences = result.differences.len(),
            "comparison finished"
        );
        result
    }
}
