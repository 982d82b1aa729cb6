// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command implementations for the `rv` CLI.
//!
//! Kept in the library so they can be tested without spawning the binary.

use anyhow::{Context, Result};
use rv_client::{ClientConfig, ProxyClient};
use rv_config::{ConfigWarning, ResolvedConfig, load_config, validate_config};
use rv_dialect::{ApiStyle, ShapeDetector};
use rv_validate::ValidationReport;
use rv_verdict::{CancellationFlag, DifferentialEngine, SuitePlan, SuiteReport, SuiteRunner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Configuration loaded for a command, with the file it came from.
#[derive(Debug, Clone)]
pub struct Loaded {
    /// Resolved configuration, environment overrides applied.
    pub config: ResolvedConfig,
    /// File the configuration was read from; `None` when running on defaults.
    pub source: Option<PathBuf>,
}

/// Load the configuration at `path`, or the first one found by
/// [`rv_config::find_config`]. Without any file the defaults are used.
pub fn load(path: Option<&Path>) -> Result<Loaded> {
    let config = load_config(path).with_context(|| match path {
        Some(p) => format!("load config '{}'", p.display()),
        None => "load config".to_string(),
    })?;
    if config.source.is_none() {
        warn!(target: "rv.config", "no configuration file found, using defaults");
    }
    let source = config.source.clone();
    Ok(Loaded { config, source })
}

/// What `rv check-config` found.
#[derive(Debug, Clone)]
pub struct ConfigCheck {
    /// File that was checked.
    pub source: Option<PathBuf>,
    /// Number of providers loaded.
    pub providers: usize,
    /// Number of rules loaded.
    pub rules: usize,
    /// Scenarios served by active rules.
    pub scenarios: Vec<String>,
    /// Every warning, loader and validation alike.
    pub warnings: Vec<ConfigWarning>,
}

/// Load and validate a configuration. Hard errors are returned as `Err`.
pub fn check_config(path: Option<&Path>) -> Result<ConfigCheck> {
    let loaded = load(path)?;
    let warnings = validate_config(&loaded.config).context("validate config")?;
    let resolver = rv_config::ConfigResolver::new(Arc::new(loaded.config.clone()));
    Ok(ConfigCheck {
        source: loaded.source,
        providers: loaded.config.providers.len(),
        rules: loaded.config.rules.len(),
        scenarios: resolver.scenarios().into_iter().map(str::to_owned).collect(),
        warnings,
    })
}

/// Validate a saved response body. Without `style` the dialect is
/// detected from the body's shape.
pub fn validate_body(path: &Path, style: Option<ApiStyle>) -> Result<ValidationReport> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("read file '{}'", path.display()))?;
    let body: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("parse JSON from '{}'", path.display()))?;
    let style = match style {
        Some(s) => s,
        None => {
            let detected = ShapeDetector::new().detect(&body).with_context(|| {
                format!(
                    "cannot tell the dialect of '{}'; pass --style",
                    path.display()
                )
            })?;
            info!(
                target: "rv.config",
                style = %detected.style,
                confidence = detected.confidence,
                "detected response dialect"
            );
            detected.style
        }
    };
    Ok(ValidationReport::check(style, &body))
}

/// Options of `rv run`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Configuration file.
    pub config: Option<PathBuf>,
    /// Proxy URL overriding the configuration.
    pub server_url: Option<String>,
    /// Built-in suites to run; empty runs all of them.
    pub suites: Vec<String>,
    /// Scenario the single-rule tests use.
    pub scenario: Option<String>,
    /// JSON suite plan replacing the built-in suites.
    pub plan: Option<PathBuf>,
    /// Prompt overriding the configured one.
    pub prompt: Option<String>,
}

/// Suite plans selected by `opts`.
pub fn select_plans(opts: &RunOptions) -> Result<Vec<SuitePlan>> {
    if let Some(path) = &opts.plan {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read plan '{}'", path.display()))?;
        let plan: SuitePlan = serde_json::from_str(&content)
            .with_context(|| format!("parse plan '{}'", path.display()))?;
        return Ok(vec![plan]);
    }
    let scenario = opts.scenario.as_deref();
    if opts.suites.is_empty() {
        return Ok(SuitePlan::defaults(scenario));
    }
    opts.suites
        .iter()
        .map(|name| {
            SuitePlan::named(name, scenario).with_context(|| {
                format!(
                    "unknown suite '{name}' (expected one of: {})",
                    rv_verdict::SUITE_NAMES.join(", ")
                )
            })
        })
        .collect()
}

/// Run the selected suites against the proxy and assemble the report.
pub async fn run(opts: &RunOptions, cancel: CancellationFlag) -> Result<SuiteReport> {
    let Loaded { mut config, source } = load(opts.config.as_deref())?;
    if let Some(url) = &opts.server_url {
        config.settings.server_url = url.clone();
    }
    if let Some(prompt) = &opts.prompt {
        config.settings.test_prompt = prompt.clone();
    }
    for w in validate_config(&config).context("validate config")? {
        warn!(target: "rv.config", "{w}");
    }
    let plans = select_plans(opts)?;

    let client = ProxyClient::new(ClientConfig::from_settings(&config.settings))?;
    let server_url = client.config().server_url.clone();
    info!(target: "rv.suite", server = %server_url, suites = plans.len(), "starting run");

    let engine = Arc::new(DifferentialEngine::new(Arc::new(client), Arc::new(config)));
    let runner = SuiteRunner::new(engine).with_cancellation(cancel);
    let suites = runner.run_all(&plans).await;

    Ok(SuiteReport::new(server_url, suites).with_config_source(source.as_deref()))
}

/// Write `report` as pretty JSON to `path`, creating parent directories.
pub fn write_report(report: &SuiteReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create report directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("write report to {}", path.display()))
}

/// Model ids the proxy lists for `style`.
pub async fn list_models(
    config: Option<&Path>,
    server_url: Option<&str>,
    style: ApiStyle,
    scenario: Option<&str>,
) -> Result<Vec<String>> {
    let Loaded { mut config, .. } = load(config)?;
    if let Some(url) = server_url {
        config.settings.server_url = url.to_string();
    }
    let client = ProxyClient::new(ClientConfig::from_settings(&config.settings))?;
    let (envelope, ids) = client.list_models(style, scenario).await;
    if let Some(err) = envelope.to_error() {
        return Err(err).context("list models");
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_json(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn unknown_suite_is_rejected() {
        let opts = RunOptions {
            suites: vec!["nightly".into()],
            ..RunOptions::default()
        };
        let err = select_plans(&opts).unwrap_err();
        assert!(err.to_string().contains("unknown suite 'nightly'"), "{err}");
    }

    #[test]
    fn default_selection_runs_every_suite() {
        let plans = select_plans(&RunOptions::default()).unwrap();
        let names: Vec<&str> = plans.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, rv_verdict::SUITE_NAMES);
    }

    #[test]
    fn plan_file_replaces_builtins() {
        let f = temp_json(
            r#"{"name": "custom", "cases": [{"kind": "three_path", "name": "tp", "scenario": "openai"}]}"#,
        );
        let opts = RunOptions {
            plan: Some(f.path().to_path_buf()),
            suites: vec!["differential".into()],
            ..RunOptions::default()
        };
        let plans = select_plans(&opts).unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].name, "custom");
    }

    #[test]
    fn validate_body_detects_dialect() {
        let f = temp_json(
            r#"{"id": "msg_1", "type": "message", "role": "assistant", "model": "m",
                "content": [{"type": "text", "text": "hi"}], "stop_reason": "end_turn"}"#,
        );
        let report = validate_body(f.path(), None).unwrap();
        assert_eq!(report.style, ApiStyle::Anthropic);
        assert!(report.passed());
    }

    #[test]
    fn validate_body_with_explicit_style() {
        let f = temp_json(r#"{"choices": []}"#);
        let report = validate_body(f.path(), Some(ApiStyle::OpenAi)).unwrap();
        assert!(!report.passed());
        assert!(report.missing_fields().contains(&"id"));
    }
}
