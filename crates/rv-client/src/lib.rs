// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP client for the chat-completion proxy under verification.
//!
//! [`ProxyClient`] sends one prompt to one front-end endpoint of the proxy
//! and always returns an [`Envelope`]. Transport problems (non-200
//! status, connection failures, timeouts, unreadable bodies) are reported
//! inside the envelope and never escape as errors, so a failed path can be
//! judged alongside the paths that succeeded.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod scripted;

pub use scripted::ScriptedTransport;

use async_trait::async_trait;
use rv_config::{HarnessSettings, TOKEN_PREFIX};
use rv_dialect::ApiStyle;
use rv_error::{ErrorCode, RvError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Maximum number of characters of an error body kept in an envelope.
pub const MAX_ERROR_CHARS: usize = 500;

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Connection settings. Built once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Proxy base URL without trailing slash.
    pub server_url: String,
    /// Client token; empty sends no auth headers.
    pub token: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Header carrying the roundtrip dialect.
    pub roundtrip_header: String,
    /// Token prefix stripped for `X-Api-Key`.
    pub token_prefix: String,
    /// `User-Agent` value.
    pub user_agent: String,
}

impl ClientConfig {
    /// Config with default timeout and headers.
    pub fn new(server_url: impl Into<String>, token: impl Into<String>) -> Self {
        let server_url: String = server_url.into();
        Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            token: token.into(),
            timeout: Duration::from_secs(rv_config::DEFAULT_TIMEOUT_SECS),
            roundtrip_header: rv_config::DEFAULT_ROUNDTRIP_HEADER.into(),
            token_prefix: TOKEN_PREFIX.into(),
            user_agent: concat!("relay-verify/", env!("CARGO_PKG_VERSION")).into(),
        }
    }

    /// Derive from the harness settings of a loaded configuration.
    pub fn from_settings(settings: &HarnessSettings) -> Self {
        Self::new(&settings.server_url, &settings.auth_token)
            .with_timeout(Duration::from_secs(settings.timeout_secs))
            .with_roundtrip_header(&settings.roundtrip_header)
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the roundtrip header name.
    #[must_use]
    pub fn with_roundtrip_header(mut self, header: impl Into<String>) -> Self {
        self.roundtrip_header = header.into();
        self
    }

    /// `X-Api-Key` value: the token without the proxy prefix.
    pub fn api_key(&self) -> &str {
        self.token
            .strip_prefix(self.token_prefix.as_str())
            .unwrap_or(&self.token)
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// One prompt to send through one front-end dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyRequest {
    /// Front-end dialect to speak.
    pub style: ApiStyle,
    /// Scenario namespace; `None` uses the unscoped endpoint.
    pub scenario: Option<String>,
    /// Requested model.
    pub model: String,
    /// User prompt.
    pub prompt: String,
    /// Extra body fields (`max_tokens`, `temperature`, `system`, ...).
    pub options: Map<String, Value>,
    /// Dialect the response should be round-tripped through.
    pub roundtrip_via: Option<ApiStyle>,
}

impl ProxyRequest {
    /// Request without options.
    pub fn new(style: ApiStyle, model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            style,
            scenario: None,
            model: model.into(),
            prompt: prompt.into(),
            options: Map::new(),
            roundtrip_via: None,
        }
    }

    /// Route under `scenario`. Empty means unscoped.
    #[must_use]
    pub fn scenario(mut self, scenario: impl Into<String>) -> Self {
        let s: String = scenario.into();
        self.scenario = (!s.is_empty()).then_some(s);
        self
    }

    /// Add a body option.
    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Ask the proxy to round-trip the response through `style`.
    #[must_use]
    pub fn roundtrip_via(mut self, style: ApiStyle) -> Self {
        self.roundtrip_via = Some(style);
        self
    }

    /// Short label for logs: `style scenario/model`.
    pub fn label(&self) -> String {
        format!(
            "{} {}/{}",
            self.style.wire_name(),
            self.scenario.as_deref().unwrap_or("-"),
            self.model
        )
    }

    /// Endpoint path for this request, if the style has a front end.
    pub fn path(&self) -> Option<String> {
        self.style.endpoint_path(self.scenario.as_deref())
    }

    /// JSON body in the request's dialect.
    ///
    /// A `system` option becomes a top-level field for Anthropic and a
    /// leading system message for OpenAI; it is never sent as a user
    /// message.
    pub fn body(&self) -> Result<Value, RvError> {
        let mut options = self.options.clone();
        let system = options.remove("system");
        let user = json!({"role": "user", "content": self.prompt});

        let mut body = Map::new();
        body.insert("model".into(), Value::String(self.model.clone()));
        match self.style {
            ApiStyle::OpenAi => {
                let mut messages = Vec::new();
                if let Some(sys) = system {
                    messages.push(json!({"role": "system", "content": sys}));
                }
                messages.push(user);
                body.insert("messages".into(), Value::Array(messages));
            }
            ApiStyle::Anthropic => {
                body.insert("messages".into(), Value::Array(vec![user]));
                if let Some(sys) = system {
                    body.insert("system".into(), sys);
                }
            }
            ApiStyle::Google => {
                return Err(RvError::new(
                    ErrorCode::TransportBody,
                    "unsupported front-end dialect",
                )
                .with_context("style", self.style.wire_name()));
            }
        }
        for (k, v) in options {
            body.entry(k).or_insert(v);
        }
        Ok(Value::Object(body))
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Outcome of one proxy call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// `true` only for HTTP 200 with a JSON body.
    pub success: bool,
    /// HTTP status, when a response arrived.
    pub status: Option<u16>,
    /// Parsed body of a successful call.
    pub body: Option<Value>,
    /// Raw response text (truncated on failure).
    pub raw_body: String,
    /// Failure description.
    pub error: Option<String>,
    /// Failure code.
    pub error_code: Option<ErrorCode>,
    /// Wall-clock duration of the call.
    pub duration_ms: u64,
}

impl Envelope {
    /// Successful envelope around `body`.
    pub fn ok(body: Value, duration_ms: u64) -> Self {
        Self {
            success: true,
            status: Some(200),
            raw_body: body.to_string(),
            body: Some(body),
            error: None,
            error_code: None,
            duration_ms,
        }
    }

    /// Failed envelope.
    pub fn failure(code: ErrorCode, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            status: None,
            body: None,
            raw_body: String::new(),
            error: Some(error.into()),
            error_code: Some(code),
            duration_ms,
        }
    }

    /// Attach the HTTP status and raw body text of a failure.
    #[must_use]
    pub fn with_response(mut self, status: u16, raw_body: impl Into<String>) -> Self {
        self.status = Some(status);
        self.raw_body = raw_body.into();
        self
    }

    /// The failure as an [`RvError`]; `None` for successful envelopes.
    pub fn to_error(&self) -> Option<RvError> {
        if self.success {
            return None;
        }
        let code = self.error_code.unwrap_or(ErrorCode::Internal);
        let mut err = RvError::new(code, self.error.clone().unwrap_or_default());
        if let Some(status) = self.status {
            err = err.with_context("status", status);
        }
        Some(err)
    }
}

/// First `max` characters of `text`.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Transport seam
// ---------------------------------------------------------------------------

/// Anything that can carry a [`ProxyRequest`] to the proxy.
#[async_trait]
pub trait ProxyTransport: Send + Sync {
    /// Send the request; never fails outside the envelope.
    async fn send(&self, request: &ProxyRequest) -> Envelope;
}

// ---------------------------------------------------------------------------
// ProxyClient
// ---------------------------------------------------------------------------

/// reqwest-backed [`ProxyTransport`].
#[derive(Debug, Clone)]
pub struct ProxyClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl ProxyClient {
    /// Build a client for `config`.
    pub fn new(config: ClientConfig) -> Result<Self, RvError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                RvError::new(ErrorCode::TransportConnect, "failed to build HTTP client").with_source(e)
            })?;
        Ok(Self { config, http })
    }

    /// The configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn authorize(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if !self.config.token.is_empty() {
            req = req
                .header("Authorization", format!("Bearer {}", self.config.token))
                .header("X-Api-Key", self.config.api_key());
        }
        req
    }

    /// List models exposed under `style` (and `scenario`). On success the
    /// body's `data[].id` values are returned.
    pub async fn list_models(&self, style: ApiStyle, scenario: Option<&str>) -> (Envelope, Vec<String>) {
        let start = Instant::now();
        let Some(path) = style.models_path(scenario) else {
            let env = Envelope::failure(ErrorCode::TransportBody, "unsupported front-end dialect", 0);
            return (env, Vec::new());
        };
        let url = format!("{}{path}", self.config.server_url);
        debug!(target: "rv.client", %url, "listing models");
        let req = self.authorize(self.http.get(&url));
        let env = execute(req, start).await;
        let ids = env
            .body
            .as_ref()
            .and_then(|b| b.get("data"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|m| m.get("id").and_then(Value::as_str))
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        (env, ids)
    }
}

#[async_trait]
impl ProxyTransport for ProxyClient {
    async fn send(&self, request: &ProxyRequest) -> Envelope {
        let start = Instant::now();
        let (path, body) = match (request.path(), request.body()) {
            (Some(path), Ok(body)) => (path, body),
            (_, Err(e)) => return Envelope::failure(e.code, e.message, 0),
            (None, Ok(_)) => {
                return Envelope::failure(ErrorCode::TransportBody, "unsupported front-end dialect", 0);
            }
        };
        let url = format!("{}{path}", self.config.server_url);
        debug!(target: "rv.client", request = %request.label(), %url, "sending");

        let mut req = self
            .authorize(self.http.post(&url))
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(via) = request.roundtrip_via {
            req = req.header(self.config.roundtrip_header.as_str(), via.wire_name());
        }

        let env = execute(req, start).await;
        if !env.success {
            warn!(
                target: "rv.client",
                request = %request.label(),
                status = ?env.status,
                error = env.error.as_deref().unwrap_or_default(),
                "proxy call failed"
            );
        }
        env
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

async fn execute(req: reqwest::RequestBuilder, start: Instant) -> Envelope {
    let response = match req.send().await {
        Ok(r) => r,
        Err(e) => {
            let code = if e.is_timeout() {
                ErrorCode::TransportTimeout
            } else {
                ErrorCode::TransportConnect
            };
            return Envelope::failure(code, e.to_string(), elapsed_ms(start));
        }
    };

    let status = response.status().as_u16();
    let text = match response.text().await {
        Ok(t) => t,
        Err(e) => {
            let code = if e.is_timeout() {
                ErrorCode::TransportTimeout
            } else {
                ErrorCode::TransportBody
            };
            return Envelope::failure(code, e.to_string(), elapsed_ms(start)).with_response(status, "");
        }
    };
    let duration_ms = elapsed_ms(start);

    if status != 200 {
        let snippet = truncate_chars(&text, MAX_ERROR_CHARS);
        return Envelope::failure(
            ErrorCode::TransportStatus,
            format!("HTTP {status}: {snippet}"),
            duration_ms,
        )
        .with_response(status, snippet);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(body) => Envelope {
            success: true,
            status: Some(status),
            body: Some(body),
            raw_body: text,
            error: None,
            error_code: None,
            duration_ms,
        },
        Err(e) => Envelope::failure(
            ErrorCode::TransportBody,
            format!("response is not JSON: {e}"),
            duration_ms,
        )
        .with_response(status, truncate_chars(&text, MAX_ERROR_CHARS)),
    }
}
