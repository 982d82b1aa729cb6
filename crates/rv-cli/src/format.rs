// SPDX-License-Identifier: MIT OR Apache-2.0
//! Output formatting for the `rv` CLI.

use rv_validate::{Severity, ValidationReport};
use rv_verdict::{DifferentialResult, SuiteReport, Verdict};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

/// Supported output formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Compact JSON (single line).
    Json,
    /// Pretty-printed JSON.
    JsonPretty,
    /// Human-readable multi-line text.
    Text,
    /// One aligned row per test.
    Table,
    /// Single-line summary.
    Compact,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Json => "json",
            Self::JsonPretty => "json-pretty",
            Self::Text => "text",
            Self::Table => "table",
            Self::Compact => "compact",
        };
        f.write_str(s)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "json-pretty" | "json_pretty" | "jsonpretty" => Ok(Self::JsonPretty),
            "text" => Ok(Self::Text),
            "table" => Ok(Self::Table),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// Renders reports in one [`OutputFormat`].
#[derive(Debug, Clone)]
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Formatter for `format`.
    #[must_use]
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render a full run report.
    #[must_use]
    pub fn format_report(&self, report: &SuiteReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string(report).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => report_text(report),
            OutputFormat::Table => report_table(report),
            OutputFormat::Compact => report_compact(report),
        }
    }

    /// Render a single result.
    #[must_use]
    pub fn format_result(&self, result: &DifferentialResult) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string(result).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Text => {
                let mut out = String::new();
                result_text(&mut out, result);
                out
            }
            OutputFormat::Table => result_row(result),
            OutputFormat::Compact => result_compact(result),
        }
    }

    /// Render an offline validation report.
    #[must_use]
    pub fn format_validation(&self, report: &ValidationReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string(report).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text | OutputFormat::Table => {
                let mut out = report.summary();
                for issue in &report.issues {
                    let sev = match issue.severity {
                        Severity::Error => "error",
                        Severity::Warning => "warn ",
                    };
                    let _ = write!(out, "\n  {sev} {issue}");
                }
                out
            }
            OutputFormat::Compact => report.summary(),
        }
    }

    /// Render an error message.
    #[must_use]
    pub fn format_error(&self, err: &str) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => {
                serde_json::json!({"error": err}).to_string()
            }
            OutputFormat::Text => format!("Error: {err}"),
            OutputFormat::Table => format!("error  {err}"),
            OutputFormat::Compact => format!("[error] {err}"),
        }
    }
}

// ── Text helpers ──────────────────────────────────────────────────────

fn verdict_tag(v: Verdict) -> &'static str {
    match v {
        Verdict::Pass => "PASS",
        Verdict::Fail => "FAIL",
        Verdict::Inconclusive => "INCONCLUSIVE",
    }
}

fn pct(score: f64) -> String {
    format!("{:.2}%", score * 100.0)
}

fn score_text(r: &DifferentialResult) -> String {
    match (r.similarity_score, r.threshold) {
        (Some(s), Some(t)) => format!("score={} (threshold {})", pct(s), pct(t)),
        (Some(s), None) => format!("score={}", pct(s)),
        (None, _) => "score=-".to_string(),
    }
}

fn result_text(out: &mut String, r: &DifferentialResult) {
    let _ = writeln!(
        out,
        "  [{}] {}  {}  {}  {} ms",
        verdict_tag(r.verdict),
        r.test_name,
        r.comparison_type,
        score_text(r),
        r.duration_ms
    );
    let _ = writeln!(out, "      {}", r.message);
    for d in &r.differences {
        let _ = writeln!(out, "      - {}: {}", d.kind.as_str(), d.message);
    }
    if let Some(err) = &r.error {
        let _ = writeln!(out, "      error: [{}] {}", err.code.as_str(), err.message);
    }
}

fn report_text(report: &SuiteReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "relay-verify run {}", report.run_id);
    let _ = writeln!(out, "server: {}", report.server_url);
    let _ = writeln!(
        out,
        "config: {}",
        report.config_source.as_deref().unwrap_or("<none>")
    );
    for suite in &report.suites {
        let _ = writeln!(
            out,
            "\n== {} ({} tests, {} ms) ==",
            suite.suite_name, suite.total, suite.duration_ms
        );
        for r in &suite.results {
            result_text(&mut out, r);
        }
    }
    let t = &report.totals;
    let _ = write!(
        out,
        "\ntotals: {} total, {} passed, {} failed, {} inconclusive ({:.1}% success)",
        t.total, t.passed, t.failed, t.inconclusive, report.success_rate
    );
    out
}

fn result_row(r: &DifferentialResult) -> String {
    let score = r.similarity_score.map_or_else(|| "-".to_string(), pct);
    format!(
        "{:<40} {:<14} {:<12} {:>8}",
        r.test_name,
        r.comparison_type.as_str(),
        r.verdict.as_str(),
        score
    )
}

fn report_table(report: &SuiteReport) -> String {
    let mut out = format!(
        "{:<14} {:<40} {:<14} {:<12} {:>8}",
        "suite", "test", "type", "verdict", "score"
    );
    for suite in &report.suites {
        for r in &suite.results {
            let _ = write!(out, "\n{:<14} {}", suite.suite_name, result_row(r));
        }
    }
    out
}

fn result_compact(r: &DifferentialResult) -> String {
    format!("[{}] {}: {}", r.verdict, r.test_name, r.message)
}

fn report_compact(report: &SuiteReport) -> String {
    let t = &report.totals;
    format!(
        "[rv] {} tests: {} pass, {} fail, {} inconclusive ({:.1}%)",
        t.total, t.passed, t.failed, t.inconclusive, report.success_rate
    )
}
