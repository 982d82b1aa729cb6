// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation and rule resolution for relay-verify.
//!
//! A proxy configuration document (JSON, or TOML for hand-written harness
//! configs) is read into a [`ResolvedConfig`]: the enabled [`Provider`]s,
//! the routing [`Rule`]s and the [`HarnessSettings`] of the run. Loading is
//! tolerant. A malformed provider or rule entry is skipped with a
//! [`ConfigWarning`] instead of failing the whole load. The
//! [`ConfigResolver`] answers the lookups a verification test needs.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod model;
mod resolver;

pub use model::{AuthType, HarnessSettings, LbTactic, Provider, Rule, Service};
pub use resolver::ConfigResolver;

use model::{RawProvider, RawRule};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The document could not be parsed.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

impl From<&ConfigError> for rv_error::RvError {
    fn from(err: &ConfigError) -> Self {
        use rv_error::{ErrorCode, RvError};
        match err {
            ConfigError::FileNotFound { path } => {
                RvError::new(ErrorCode::ConfigFileNotFound, err.to_string()).with_context("path", path)
            }
            ConfigError::ParseError { .. } | ConfigError::ValidationError { .. } => {
                RvError::new(ErrorCode::ConfigParseFailed, err.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory issues that do not prevent a run but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A provider or rule entry could not be parsed and was skipped.
    SkippedEntry {
        /// Which list the entry came from (`providers_v2`, `providers`, `rules`).
        kind: String,
        /// Position (or map key) of the entry.
        index: String,
        /// Parse failure detail.
        reason: String,
    },
    /// A provider declared an unrecognised `api_style`; OpenAI was assumed.
    UnknownApiStyle {
        /// Provider uuid.
        provider: String,
        /// The declared value.
        value: String,
    },
    /// A top-level setting had the wrong type and its default was kept.
    IgnoredSetting {
        /// Setting name.
        field: String,
        /// Why it was ignored.
        reason: String,
    },
    /// An environment override could not be parsed.
    InvalidEnvValue {
        /// Variable name.
        var: String,
        /// Raw value.
        value: String,
    },
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// A timeout is unusually large.
    LargeTimeout {
        /// What the timeout belongs to.
        subject: String,
        /// Timeout value in seconds.
        secs: u64,
    },
    /// An active rule cannot be used by any test.
    UnusableRule {
        /// Rule label.
        rule: String,
        /// Why it is unusable.
        reason: String,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::SkippedEntry {
                kind,
                index,
                reason,
            } => write!(f, "skipped {kind}[{index}]: {reason}"),
            ConfigWarning::UnknownApiStyle { provider, value } => {
                write!(
                    f,
                    "provider '{provider}' has unknown api_style '{value}', assuming openai"
                )
            }
            ConfigWarning::IgnoredSetting { field, reason } => {
                write!(f, "ignored setting '{field}': {reason}")
            }
            ConfigWarning::InvalidEnvValue { var, value } => {
                write!(f, "ignored {var}={value:?}: not a valid value")
            }
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            ConfigWarning::LargeTimeout { subject, secs } => {
                write!(f, "{subject} has a large timeout ({secs}s)")
            }
            ConfigWarning::UnusableRule { rule, reason } => {
                write!(f, "rule '{rule}' is unusable: {reason}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default proxy address.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:12580";

/// Prefix the proxy expects on client tokens.
pub const TOKEN_PREFIX: &str = "tingly-box-";

/// Default prompt sent by every test.
pub const DEFAULT_TEST_PROMPT: &str = "Hello, this is a test. Please respond briefly.";

/// Default per-request timeout of the harness.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default upstream timeout of a provider.
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 60;

/// Default header naming the roundtrip dialect.
pub const DEFAULT_ROUNDTRIP_HEADER: &str = "X-Roundtrip-Via";

/// Default load-balancing tactic.
pub const DEFAULT_LB_TACTIC: &str = "round_robin";

/// Default statistics window of a service.
pub const DEFAULT_TIME_WINDOW_SECS: u64 = 300;

/// Maximum allowed timeout in seconds (24 hours).
const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Threshold above which a timeout generates a warning.
const LARGE_TIMEOUT_THRESHOLD: u64 = 3_600;

/// Recognised log levels.
const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

// ---------------------------------------------------------------------------
// ResolvedConfig
// ---------------------------------------------------------------------------

/// Everything read from a configuration source, ready for resolution.
///
/// Shared read-only (typically behind an `Arc`) for the duration of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedConfig {
    /// Enabled providers, unique by uuid.
    pub providers: Vec<Provider>,
    /// Routing rules in document order.
    pub rules: Vec<Rule>,
    /// Legacy provider entries, kept verbatim when no versioned list exists.
    pub legacy_providers: Vec<Value>,
    /// Run settings.
    pub settings: HarnessSettings,
    /// Warnings produced while loading.
    pub warnings: Vec<ConfigWarning>,
    /// File the configuration came from, if any.
    pub source: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Locate a configuration file when none was given explicitly.
///
/// Looks at `RV_CONFIG`, then `~/.tingly-box/config.json`, then
/// `./config.json`; the first existing non-empty file wins.
pub fn find_config() -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(p) = std::env::var("RV_CONFIG")
        && !p.is_empty()
    {
        candidates.push(PathBuf::from(p));
    }
    if let Ok(home) = std::env::var("HOME") {
        candidates.push(Path::new(&home).join(".tingly-box").join("config.json"));
    }
    candidates.push(PathBuf::from("config.json"));

    candidates
        .into_iter()
        .find(|p| std::fs::metadata(p).is_ok_and(|m| m.is_file() && m.len() > 0))
}

/// Load a [`ResolvedConfig`] from an optional path.
///
/// * `Some(path)` must exist.
/// * `None` falls back to [`find_config`], and to an empty configuration
///   with default settings if nothing is found.
///
/// Environment overrides are applied in every case.
pub fn load_config(path: Option<&Path>) -> Result<ResolvedConfig, ConfigError> {
    let located = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    let mut config = match located {
        Some(p) => {
            let content = std::fs::read_to_string(&p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            let mut cfg = parse_str(&content, format_of(&p))?;
            cfg.source = Some(p);
            cfg
        }
        None => {
            debug!(target: "rv.config", "no config file found, using defaults");
            ResolvedConfig::default()
        }
    };

    apply_env_overrides(&mut config);
    for w in &config.warnings {
        warn!(target: "rv.config", "{w}");
    }
    debug!(
        target: "rv.config",
        providers = config.providers.len(),
        rules = config.rules.len(),
        "configuration loaded"
    );
    Ok(config)
}

/// Document syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON document.
    Json,
    /// TOML document.
    Toml,
    /// Unknown; JSON is tried first, then TOML.
    Auto,
}

fn format_of(path: &Path) -> ConfigFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => ConfigFormat::Json,
        Some("toml") => ConfigFormat::Toml,
        _ => ConfigFormat::Auto,
    }
}

/// Parse a document in the given format.
pub fn parse_str(content: &str, format: ConfigFormat) -> Result<ResolvedConfig, ConfigError> {
    match format {
        ConfigFormat::Json => parse_json(content),
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Auto => parse_json(content).or_else(|_| parse_toml(content)),
    }
}

/// Parse a JSON document.
pub fn parse_json(content: &str) -> Result<ResolvedConfig, ConfigError> {
    let doc: Value = serde_json::from_str(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })?;
    parse_document(&doc)
}

/// Parse a TOML document.
pub fn parse_toml(content: &str) -> Result<ResolvedConfig, ConfigError> {
    let doc: toml::Value = toml::from_str(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })?;
    let doc = serde_json::to_value(doc).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })?;
    parse_document(&doc)
}

/// Build a [`ResolvedConfig`] from an already-decoded document.
///
/// Only a non-object root is fatal; every other problem becomes a warning.
pub fn parse_document(doc: &Value) -> Result<ResolvedConfig, ConfigError> {
    let Some(obj) = doc.as_object() else {
        return Err(ConfigError::ParseError {
            reason: "config root must be an object".into(),
        });
    };

    let mut warnings = Vec::new();

    let versioned = entries_of(obj, "providers_v2", &mut warnings);
    let legacy = entries_of(obj, "providers", &mut warnings);

    let (source_kind, chosen, legacy_providers) = if !versioned.is_empty() {
        if !legacy.is_empty() {
            debug!(
                target: "rv.config",
                ignored = legacy.len(),
                "versioned providers present, legacy list ignored"
            );
        }
        ("providers_v2", versioned, Vec::new())
    } else {
        let verbatim = legacy.iter().map(|(_, v)| v.clone()).collect();
        ("providers", legacy, verbatim)
    };

    let providers = build_providers(source_kind, chosen, &mut warnings);
    let rules = build_rules(obj, &mut warnings);
    let settings = build_settings(obj, &mut warnings);

    Ok(ResolvedConfig {
        providers,
        rules,
        legacy_providers,
        settings,
        warnings,
        source: None,
    })
}

/// Entries of a list or map valued key, as `(index-or-key, value)` pairs.
fn entries_of(
    obj: &Map<String, Value>,
    key: &str,
    warnings: &mut Vec<ConfigWarning>,
) -> Vec<(String, Value)> {
    match obj.get(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Some(other) => {
            warnings.push(ConfigWarning::SkippedEntry {
                kind: key.into(),
                index: "*".into(),
                reason: format!("expected a list or map, got {}", type_name(other)),
            });
            Vec::new()
        }
    }
}

fn build_providers(
    kind: &str,
    entries: Vec<(String, Value)>,
    warnings: &mut Vec<ConfigWarning>,
) -> Vec<Provider> {
    let keyed = kind == "providers";
    let mut seen = BTreeSet::new();
    let mut providers = Vec::new();

    for (index, entry) in entries {
        let skip = |reason: String| ConfigWarning::SkippedEntry {
            kind: kind.into(),
            index: index.clone(),
            reason,
        };
        let raw: RawProvider = match serde_json::from_value(entry) {
            Ok(r) => r,
            Err(e) => {
                warnings.push(skip(e.to_string()));
                continue;
            }
        };
        if raw.is_disabled() {
            debug!(target: "rv.config", provider = %raw.name, "skipping disabled provider");
            continue;
        }
        let fallback = (keyed && index.parse::<usize>().is_err()).then_some(index.as_str());
        match raw.into_provider(fallback) {
            Ok((provider, unknown_style)) => {
                if let Some(value) = unknown_style {
                    warnings.push(ConfigWarning::UnknownApiStyle {
                        provider: provider.uuid.clone(),
                        value,
                    });
                }
                if !seen.insert(provider.uuid.clone()) {
                    warnings.push(skip(format!("duplicate provider uuid '{}'", provider.uuid)));
                    continue;
                }
                providers.push(provider);
            }
            Err(reason) => warnings.push(skip(reason)),
        }
    }
    providers
}

fn build_rules(obj: &Map<String, Value>, warnings: &mut Vec<ConfigWarning>) -> Vec<Rule> {
    let mut rules = Vec::new();
    for (index, entry) in entries_of(obj, "rules", warnings) {
        let parsed = serde_json::from_value::<RawRule>(entry)
            .map_err(|e| e.to_string())
            .and_then(RawRule::into_rule);
        match parsed {
            Ok(rule) => rules.push(rule),
            Err(reason) => warnings.push(ConfigWarning::SkippedEntry {
                kind: "rules".into(),
                index,
                reason,
            }),
        }
    }
    rules
}

fn build_settings(obj: &Map<String, Value>, warnings: &mut Vec<ConfigWarning>) -> HarnessSettings {
    let mut s = HarnessSettings::default();

    if let Some(url) = string_setting(obj, "server_url", warnings) {
        s.server_url = url;
    } else if let Some(port) = obj.get("ServerPort").or_else(|| obj.get("server_port")) {
        match port {
            Value::Number(n) => s.server_url = format!("http://localhost:{n}"),
            Value::String(p) if !p.is_empty() => s.server_url = format!("http://localhost:{p}"),
            other => warnings.push(ConfigWarning::IgnoredSetting {
                field: "ServerPort".into(),
                reason: format!("expected a port, got {}", type_name(other)),
            }),
        }
    }
    if let Some(token) = string_setting(obj, "model_token", warnings) {
        s.auth_token = with_token_prefix(&token);
    }
    if let Some(model) = string_setting(obj, "test_model", warnings) {
        s.test_model = model;
    }
    if let Some(prompt) = string_setting(obj, "test_prompt", warnings) {
        s.test_prompt = prompt;
    }
    if let Some(header) = string_setting(obj, "roundtrip_header", warnings) {
        s.roundtrip_header = header;
    }
    if let Some(level) = string_setting(obj, "log_level", warnings) {
        s.log_level = Some(level);
    }
    if let Some(dir) = string_setting(obj, "output_dir", warnings) {
        s.output_dir = dir;
    }
    match obj.get("timeout") {
        None | Some(Value::Null) => {}
        Some(v) => match v.as_u64() {
            Some(t) => s.timeout_secs = t,
            None => warnings.push(ConfigWarning::IgnoredSetting {
                field: "timeout".into(),
                reason: format!("expected a non-negative integer, got {v}"),
            }),
        },
    }
    match obj.get("verbose") {
        None | Some(Value::Null) => {}
        Some(Value::Bool(b)) => s.verbose = *b,
        Some(other) => warnings.push(ConfigWarning::IgnoredSetting {
            field: "verbose".into(),
            reason: format!("expected a boolean, got {}", type_name(other)),
        }),
    }
    s
}

fn string_setting(
    obj: &Map<String, Value>,
    key: &str,
    warnings: &mut Vec<ConfigWarning>,
) -> Option<String> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(v)) => Some(v.clone()),
        Some(other) => {
            warnings.push(ConfigWarning::IgnoredSetting {
                field: key.into(),
                reason: format!("expected a string, got {}", type_name(other)),
            });
            None
        }
    }
}

/// Add the proxy token prefix unless it is already there. Empty stays empty.
pub fn with_token_prefix(token: &str) -> String {
    if token.is_empty() || token.starts_with(TOKEN_PREFIX) {
        token.to_string()
    } else {
        format!("{TOKEN_PREFIX}{token}")
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides.
///
/// Recognised variables:
/// - `RV_SERVER_URL`
/// - `RV_AUTH_TOKEN` (prefixed like `model_token`)
/// - `RV_TIMEOUT_SECS`
/// - `RV_LOG_LEVEL`
/// - `RV_TEST_PROMPT`
pub fn apply_env_overrides(config: &mut ResolvedConfig) {
    if let Ok(val) = std::env::var("RV_SERVER_URL") {
        config.settings.server_url = val;
    }
    if let Ok(val) = std::env::var("RV_AUTH_TOKEN") {
        config.settings.auth_token = with_token_prefix(&val);
    }
    if let Ok(val) = std::env::var("RV_TIMEOUT_SECS") {
        match val.trim().parse::<u64>() {
            Ok(t) => config.settings.timeout_secs = t,
            Err(_) => config.warnings.push(ConfigWarning::InvalidEnvValue {
                var: "RV_TIMEOUT_SECS".into(),
                value: val,
            }),
        }
    }
    if let Ok(val) = std::env::var("RV_LOG_LEVEL") {
        config.settings.log_level = Some(val);
    }
    if let Ok(val) = std::env::var("RV_TEST_PROMPT") {
        config.settings.test_prompt = val;
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a loaded configuration, returning advisory warnings.
///
/// Hard errors (bad log level, out-of-range timeout, unusable server URL)
/// come back as [`ConfigError::ValidationError`]. Loader warnings are
/// included in the returned list.
pub fn validate_config(config: &ResolvedConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = config.warnings.clone();
    let settings = &config.settings;

    if let Some(ref level) = settings.log_level
        && !VALID_LOG_LEVELS.contains(&level.as_str())
    {
        errors.push(format!("invalid log_level '{level}'"));
    }

    let url = settings.server_url.trim();
    if url.is_empty() {
        errors.push("server_url must not be empty".into());
    } else if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(format!("server_url '{url}' must start with http:// or https://"));
    }

    let t = settings.timeout_secs;
    if t == 0 || t > MAX_TIMEOUT_SECS {
        errors.push(format!(
            "timeout {t}s out of range (1..{MAX_TIMEOUT_SECS})"
        ));
    } else if t > LARGE_TIMEOUT_THRESHOLD {
        warnings.push(ConfigWarning::LargeTimeout {
            subject: "harness".into(),
            secs: t,
        });
    }

    for p in &config.providers {
        if p.timeout > LARGE_TIMEOUT_THRESHOLD {
            warnings.push(ConfigWarning::LargeTimeout {
                subject: format!("provider '{}'", p.name),
                secs: p.timeout,
            });
        }
    }

    let resolver = ConfigResolver::new(std::sync::Arc::new(config.clone()));
    for rule in config.rules.iter().filter(|r| r.active) {
        if let Err(e) = resolver.resolve_backend(rule) {
            warnings.push(ConfigWarning::UnusableRule {
                rule: rule.label(),
                reason: e.message,
            });
        }
    }

    if settings.auth_token.is_empty() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "model_token".into(),
            hint: "requests will carry an empty bearer token".into(),
        });
    }
    if !config.rules.iter().any(|r| r.active) {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "rules".into(),
            hint: "no active rule, every routed test will be inconclusive".into(),
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rv_dialect::ApiStyle;
    use serde_json::json;
    use std::io::Write;

    // -- 1. Empty document yields defaults -----------------------------------

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = parse_document(&json!({})).unwrap();
        assert!(cfg.providers.is_empty());
        assert!(cfg.rules.is_empty());
        assert_eq!(cfg.settings.server_url, DEFAULT_SERVER_URL);
        assert_eq!(cfg.settings.timeout_secs, 60);
        assert!(cfg.warnings.is_empty());
    }

    // -- 2. Non-object root is a parse error ---------------------------------

    #[test]
    fn non_object_root_is_parse_error() {
        let err = parse_document(&json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    // -- 3. Versioned providers win over legacy ------------------------------

    #[test]
    fn versioned_providers_take_precedence() {
        let cfg = parse_document(&json!({
            "providers_v2": [{"uuid": "v2", "name": "new", "api_base": "https://a"}],
            "providers": [{"uuid": "v1", "name": "old", "api_base": "https://b"}]
        }))
        .unwrap();
        assert_eq!(cfg.providers.len(), 1);
        assert_eq!(cfg.providers[0].uuid, "v2");
        assert!(cfg.legacy_providers.is_empty());
    }

    // -- 4. Legacy list used and retained when no versioned entries ----------

    #[test]
    fn legacy_providers_used_when_no_versioned() {
        let cfg = parse_document(&json!({
            "providers_v2": [],
            "providers": {"acme": {"api_base": "https://acme", "api_style": "anthropic"}}
        }))
        .unwrap();
        assert_eq!(cfg.providers.len(), 1);
        assert_eq!(cfg.providers[0].uuid, "acme");
        assert_eq!(cfg.providers[0].api_style, ApiStyle::Anthropic);
        assert_eq!(cfg.legacy_providers.len(), 1);
    }

    // -- 5. Disabled providers are excluded ----------------------------------

    #[test]
    fn disabled_providers_are_excluded() {
        let cfg = parse_document(&json!({
            "providers_v2": [
                {"uuid": "a", "name": "a", "enabled": false},
                {"uuid": "b", "name": "b", "enabled": true},
                {"uuid": "c", "name": "c"}
            ]
        }))
        .unwrap();
        let ids: Vec<_> = cfg.providers.iter().map(|p| p.uuid.as_str()).collect();
        assert_eq!(ids, ["b", "c"]);
    }

    // -- 6. Malformed entries are skipped with a warning ---------------------

    #[test]
    fn malformed_entries_are_skipped() {
        let cfg = parse_document(&json!({
            "providers_v2": [
                {"uuid": "ok", "name": "ok"},
                {"uuid": "bad", "timeout": "soon"},
                "not-a-provider"
            ],
            "rules": [
                {"uuid": "r1", "scenario": "s", "request_model": "m"},
                {"uuid": "r2", "lb_tactic": 7}
            ]
        }))
        .unwrap();
        assert_eq!(cfg.providers.len(), 1);
        assert_eq!(cfg.rules.len(), 1);
        let skipped = cfg
            .warnings
            .iter()
            .filter(|w| matches!(w, ConfigWarning::SkippedEntry { .. }))
            .count();
        assert_eq!(skipped, 3);
    }

    // -- 7. Duplicate uuids keep the first -----------------------------------

    #[test]
    fn duplicate_uuid_keeps_first() {
        let cfg = parse_document(&json!({
            "providers_v2": [
                {"uuid": "x", "name": "first"},
                {"uuid": "x", "name": "second"}
            ]
        }))
        .unwrap();
        assert_eq!(cfg.providers.len(), 1);
        assert_eq!(cfg.providers[0].name, "first");
        assert_eq!(cfg.warnings.len(), 1);
    }

    // -- 8. Rule defaults ----------------------------------------------------

    #[test]
    fn rule_defaults_apply() {
        let cfg = parse_document(&json!({
            "rules": [{"uuid": "r", "scenario": "openai", "request_model": "gpt",
                        "services": [{"provider": "p", "model": "m"}]}]
        }))
        .unwrap();
        let r = &cfg.rules[0];
        assert!(r.active);
        assert!(!r.smart_enabled);
        assert_eq!(r.lb_tactic.kind, "round_robin");
        assert_eq!(r.services[0].weight, 1);
    }

    // -- 9. Server URL from ServerPort ---------------------------------------

    #[test]
    fn server_url_from_port() {
        let cfg = parse_document(&json!({"ServerPort": 8080})).unwrap();
        assert_eq!(cfg.settings.server_url, "http://localhost:8080");

        let cfg = parse_document(&json!({"ServerPort": 8080, "server_url": "http://h:1"})).unwrap();
        assert_eq!(cfg.settings.server_url, "http://h:1");
    }

    // -- 10. model_token gets the proxy prefix -------------------------------

    #[test]
    fn model_token_is_prefixed() {
        let cfg = parse_document(&json!({"model_token": "abc"})).unwrap();
        assert_eq!(cfg.settings.auth_token, "tingly-box-abc");
        let cfg = parse_document(&json!({"model_token": "tingly-box-abc"})).unwrap();
        assert_eq!(cfg.settings.auth_token, "tingly-box-abc");
        assert_eq!(with_token_prefix(""), "");
    }

    // -- 11. Wrongly typed settings keep defaults ----------------------------

    #[test]
    fn wrongly_typed_settings_keep_defaults() {
        let cfg = parse_document(&json!({"timeout": "long", "test_prompt": 5})).unwrap();
        assert_eq!(cfg.settings.timeout_secs, 60);
        assert_eq!(cfg.settings.test_prompt, DEFAULT_TEST_PROMPT);
        assert_eq!(cfg.warnings.len(), 2);
    }

    // -- 12. TOML documents parse through the same path ----------------------

    #[test]
    fn toml_document_parses() {
        let cfg = parse_toml(
            r#"
            server_url = "http://127.0.0.1:9000"
            timeout = 15

            [[providers_v2]]
            uuid = "p1"
            name = "one"
            api_style = "anthropic"

            [[rules]]
            uuid = "r1"
            scenario = "claude"
            request_model = "sonnet"
            lb_tactic = { type = "weighted" }
            services = [{ provider = "p1", model = "claude-x" }]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.settings.timeout_secs, 15);
        assert_eq!(cfg.providers[0].api_style, ApiStyle::Anthropic);
        assert_eq!(cfg.rules[0].lb_tactic.kind, "weighted");
    }

    // -- 13. Auto format falls back to TOML ----------------------------------

    #[test]
    fn auto_format_falls_back_to_toml() {
        let cfg = parse_str("timeout = 5", ConfigFormat::Auto).unwrap();
        assert_eq!(cfg.settings.timeout_secs, 5);
        assert!(parse_str("{{{", ConfigFormat::Auto).is_err());
    }

    // -- 14. Missing explicit file is FileNotFound ---------------------------

    #[test]
    fn missing_file_is_not_found() {
        let err = load_config(Some(Path::new("/definitely/not/here.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    // -- 15. Loading from a file records the source --------------------------

    #[test]
    fn load_from_file_records_source() {
        let mut f = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(f, r#"{{"test_prompt": "ping"}}"#).unwrap();
        let cfg = load_config(Some(f.path())).unwrap();
        assert_eq!(cfg.source.as_deref(), Some(f.path()));
        assert_eq!(cfg.settings.test_prompt, "ping");
    }

    // -- 16. Validation catches invalid log level and timeout ----------------

    #[test]
    fn validation_catches_hard_errors() {
        let mut cfg = ResolvedConfig::default();
        cfg.settings.log_level = Some("verbose".into());
        cfg.settings.timeout_secs = 0;
        match validate_config(&cfg).unwrap_err() {
            ConfigError::ValidationError { reasons } => assert_eq!(reasons.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    // -- 17. Validation reports unusable rules -------------------------------

    #[test]
    fn validation_reports_unusable_rules() {
        let cfg = parse_document(&json!({
            "model_token": "t",
            "rules": [{"uuid": "r", "scenario": "s", "request_model": "m",
                        "services": [{"provider": "ghost", "model": "x"}]}]
        }))
        .unwrap();
        let warnings = validate_config(&cfg).unwrap();
        assert!(
            warnings
                .iter()
                .any(|w| matches!(w, ConfigWarning::UnusableRule { .. }))
        );
    }

    // -- 18. Warning display ------------------------------------------------

    #[test]
    fn warning_display() {
        let w = ConfigWarning::SkippedEntry {
            kind: "rules".into(),
            index: "2".into(),
            reason: "bad".into(),
        };
        assert_eq!(w.to_string(), "skipped rules[2]: bad");
    }
}
