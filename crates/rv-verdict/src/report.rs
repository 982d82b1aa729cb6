// SPDX-License-Identifier: MIT OR Apache-2.0
//! Machine-readable report of one invocation.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::model::{DifferentialResult, SuiteResult};

/// Counters summed over every suite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Totals {
    /// Number of results.
    pub total: usize,
    /// Passing results.
    pub passed: usize,
    /// Failing results.
    pub failed: usize,
    /// Inconclusive results.
    pub inconclusive: usize,
}

impl Totals {
    /// Sum the counters of `suites`.
    #[must_use]
    pub fn of(suites: &[SuiteResult]) -> Self {
        suites.iter().fold(Self::default(), |acc, s| Self {
            total: acc.total + s.total,
            passed: acc.passed + s.passed,
            failed: acc.failed + s.failed,
            inconclusive: acc.inconclusive + s.inconclusive,
        })
    }

    /// `passed / total * 100`; 0 when there are no results.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64 * 100.0
        }
    }
}

/// Everything one `rv run` produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SuiteReport {
    /// Report identifier.
    pub run_id: Uuid,
    /// When the report was assembled.
    pub generated_at: DateTime<Utc>,
    /// Version of the tool that produced it.
    pub tool_version: String,
    /// Proxy under test.
    pub server_url: String,
    /// Configuration file the run used, if any.
    pub config_source: Option<String>,
    /// Per-suite results.
    pub suites: Vec<SuiteResult>,
    /// Counters over all suites.
    pub totals: Totals,
    /// Overall success rate in percent.
    pub success_rate: f64,
}

impl SuiteReport {
    /// Report over `suites`.
    #[must_use]
    pub fn new(server_url: impl Into<String>, suites: Vec<SuiteResult>) -> Self {
        let totals = Totals::of(&suites);
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            server_url: server_url.into(),
            config_source: None,
            success_rate: totals.success_rate(),
            suites,
            totals,
        }
    }

    /// Record the configuration file.
    #[must_use]
    pub fn with_config_source(mut self, path: Option<&Path>) -> Self {
        self.config_source = path.map(|p| p.display().to_string());
        self
    }

    /// `true` when any result failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.totals.failed > 0
    }

    /// Every result of every suite.
    pub fn results(&self) -> impl Iterator<Item = &DifferentialResult> {
        self.suites.iter().flat_map(|s| s.results.iter())
    }

    /// JSON Schema of the report.
    #[must_use]
    pub fn schema() -> schemars::Schema {
        schemars::schema_for!(SuiteReport)
    }
}
