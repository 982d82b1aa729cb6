// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed provider, rule and harness settings entities.

use rv_dialect::ApiStyle;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::{
    DEFAULT_LB_TACTIC, DEFAULT_PROVIDER_TIMEOUT_SECS, DEFAULT_ROUNDTRIP_HEADER, DEFAULT_SERVER_URL,
    DEFAULT_TEST_PROMPT, DEFAULT_TIME_WINDOW_SECS, DEFAULT_TIMEOUT_SECS,
};

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// How a provider authenticates upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// Static API key.
    #[default]
    ApiKey,
    /// OAuth bearer flow.
    Oauth,
}

/// A configured upstream backend. Identity is [`Provider::uuid`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Provider {
    /// Stable identifier referenced by rule services.
    pub uuid: String,
    /// Display name.
    pub name: String,
    /// Upstream base URL.
    pub api_base: String,
    /// Dialect spoken by the upstream.
    pub api_style: ApiStyle,
    /// Upstream credential.
    #[serde(default)]
    pub token: String,
    /// Upstream authentication scheme.
    #[serde(default)]
    pub auth_type: AuthType,
    /// Optional egress proxy.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub proxy_url: String,
    /// Upstream timeout in seconds.
    pub timeout: u64,
    /// Models the provider is known to serve.
    #[serde(default)]
    pub models: Vec<String>,
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// Load-balancing tactic of a rule.
///
/// Accepted on input as a bare string (`"round_robin"`) or as the versioned
/// object form `{"type": ..., "params": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LbTactic {
    /// Tactic name.
    #[serde(rename = "type")]
    pub kind: String,
    /// Tactic parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Value>,
}

impl Default for LbTactic {
    fn default() -> Self {
        Self {
            kind: DEFAULT_LB_TACTIC.into(),
            params: BTreeMap::new(),
        }
    }
}

impl LbTactic {
    /// Build a tactic from its loosely-typed config value.
    pub fn from_value(value: Option<&Value>) -> Result<Self, String> {
        match value {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(Self::default()),
            Some(Value::String(s)) => Ok(Self {
                kind: s.clone(),
                params: BTreeMap::new(),
            }),
            Some(Value::Object(obj)) => {
                let kind = match obj.get("type") {
                    None | Some(Value::Null) => DEFAULT_LB_TACTIC.to_string(),
                    Some(Value::String(s)) if s.is_empty() => DEFAULT_LB_TACTIC.to_string(),
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => return Err(format!("lb_tactic.type must be a string, got {other}")),
                };
                let params = match obj.get("params") {
                    None | Some(Value::Null) => BTreeMap::new(),
                    Some(Value::Object(p)) => p.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                    Some(other) => {
                        return Err(format!("lb_tactic.params must be an object, got {other}"));
                    }
                };
                Ok(Self { kind, params })
            }
            Some(other) => Err(format!("lb_tactic must be a string or object, got {other}")),
        }
    }
}

/// One weighted backend of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Service {
    /// UUID of the referenced [`Provider`].
    pub provider: String,
    /// Upstream model name.
    pub model: String,
    /// Load-balancing weight.
    pub weight: u32,
    /// Whether the service participates in routing.
    pub active: bool,
    /// Statistics window in seconds.
    pub time_window: u64,
}

/// A routing rule binding a scenario/request model to backend services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Rule {
    /// Stable identifier.
    pub uuid: String,
    /// Endpoint namespace this rule is served under.
    pub scenario: String,
    /// Model name clients send.
    pub request_model: String,
    /// Model name reported back to clients.
    #[serde(default)]
    pub response_model: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Candidate backends.
    pub services: Vec<Service>,
    /// Load-balancing tactic.
    pub lb_tactic: LbTactic,
    /// Whether the rule is routable.
    pub active: bool,
    /// Whether smart routing is enabled.
    #[serde(default)]
    pub smart_enabled: bool,
}

impl Rule {
    /// Active services in declaration order.
    pub fn active_services(&self) -> impl Iterator<Item = &Service> {
        self.services.iter().filter(|s| s.active)
    }

    /// Short label for logs and reports.
    pub fn label(&self) -> String {
        if self.scenario.is_empty() {
            self.request_model.clone()
        } else {
            format!("{}/{}", self.scenario, self.request_model)
        }
    }
}

// ---------------------------------------------------------------------------
// Raw (loosely typed) entries
// ---------------------------------------------------------------------------

/// Provider entry as it appears in the source document.
#[derive(Debug, Deserialize)]
pub(crate) struct RawProvider {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub api_base: String,
    #[serde(default)]
    pub api_style: Option<String>,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub auth_type: Option<String>,
    #[serde(default)]
    pub proxy_url: String,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// Rule entry as it appears in the source document.
#[derive(Debug, Deserialize)]
pub(crate) struct RawRule {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub scenario: String,
    #[serde(default)]
    pub request_model: String,
    #[serde(default)]
    pub response_model: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub services: Vec<RawService>,
    #[serde(default)]
    pub lb_tactic: Option<Value>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub smart_enabled: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawService {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub weight: Option<u32>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub time_window: Option<u64>,
}

impl RawService {
    pub(crate) fn into_service(self) -> Service {
        Service {
            provider: self.provider,
            model: self.model,
            weight: self.weight.unwrap_or(1),
            active: self.active.unwrap_or(true),
            time_window: self.time_window.unwrap_or(DEFAULT_TIME_WINDOW_SECS),
        }
    }
}

impl RawRule {
    pub(crate) fn into_rule(self) -> Result<Rule, String> {
        let lb_tactic = LbTactic::from_value(self.lb_tactic.as_ref())?;
        Ok(Rule {
            uuid: self.uuid,
            scenario: self.scenario,
            request_model: self.request_model,
            response_model: self.response_model,
            description: self.description,
            services: self
                .services
                .into_iter()
                .map(RawService::into_service)
                .collect(),
            lb_tactic,
            active: self.active.unwrap_or(true),
            smart_enabled: self.smart_enabled,
        })
    }
}

impl RawProvider {
    pub(crate) fn is_disabled(&self) -> bool {
        self.enabled == Some(false)
    }

    /// Convert into a typed provider. `fallback_name` is the map key of a
    /// legacy entry. Returns the unknown style string, if any, alongside.
    pub(crate) fn into_provider(
        self,
        fallback_name: Option<&str>,
    ) -> Result<(Provider, Option<String>), String> {
        let name = if self.name.is_empty() {
            fallback_name.unwrap_or_default().to_string()
        } else {
            self.name
        };
        let uuid = if self.uuid.is_empty() {
            name.clone()
        } else {
            self.uuid
        };
        if uuid.is_empty() {
            return Err("provider has neither uuid nor name".into());
        }

        let raw_style = self.api_style.unwrap_or_default();
        let unknown_style = (!raw_style.trim().is_empty() && ApiStyle::parse(&raw_style).is_none())
            .then(|| raw_style.clone());

        let auth_type = match self.auth_type.as_deref().map(str::trim) {
            None | Some("") | Some("api_key") => AuthType::ApiKey,
            Some("oauth") => AuthType::Oauth,
            Some(other) => return Err(format!("unknown auth_type '{other}'")),
        };

        let provider = Provider {
            uuid,
            name,
            api_base: self.api_base,
            api_style: ApiStyle::parse_lenient(&raw_style),
            token: self.token,
            auth_type,
            proxy_url: self.proxy_url,
            timeout: match self.timeout {
                None | Some(0) => DEFAULT_PROVIDER_TIMEOUT_SECS,
                Some(t) => t,
            },
            models: self.models,
        };
        Ok((provider, unknown_style))
    }
}

// ---------------------------------------------------------------------------
// Harness settings
// ---------------------------------------------------------------------------

/// Settings for the verification run itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HarnessSettings {
    /// Base URL of the proxy under test.
    pub server_url: String,
    /// Client token presented to the proxy.
    #[serde(default)]
    pub auth_token: String,
    /// Model used when a test has no rule to take one from.
    #[serde(default)]
    pub test_model: String,
    /// Prompt sent by every test.
    pub test_prompt: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Header naming the dialect a response should round-trip through.
    pub roundtrip_header: String,
    /// Log level (`error`, `warn`, `info`, `debug`, `trace`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    /// Verbose console output.
    #[serde(default)]
    pub verbose: bool,
    /// Where reports are written by default.
    pub output_dir: String,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.into(),
            auth_token: String::new(),
            test_model: String::new(),
            test_prompt: DEFAULT_TEST_PROMPT.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            roundtrip_header: DEFAULT_ROUNDTRIP_HEADER.into(),
            log_level: Some("info".into()),
            verbose: false,
            output_dir: "./test_results".into(),
        }
    }
}
