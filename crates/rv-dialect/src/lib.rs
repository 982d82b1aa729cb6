// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # rv-dialect
//!
//! API style metadata for relay-verify.
//!
//! Every response handled by the verifier is tagged with the [`ApiStyle`] of
//! the path that produced it. The style is always known from the call site;
//! [`ShapeDetector`] only exists to flag bodies whose shape disagrees with
//! the style they were requested in.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── ApiStyle enum ───────────────────────────────────────────────────────

/// Request/response dialect spoken by a provider or a proxy front end.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ApiStyle {
    /// OpenAI chat-completions style.
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    /// Anthropic messages style.
    Anthropic,
    /// Google generateContent style.
    Google,
}

impl ApiStyle {
    /// Human-readable label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Google => "Google",
        }
    }

    /// Lowercase name used in config files and headers.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
        }
    }

    /// Returns all known styles.
    #[must_use]
    pub fn all() -> &'static [ApiStyle] {
        &[Self::OpenAi, Self::Anthropic, Self::Google]
    }

    /// Parse a wire name, returning `None` for unknown values.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "anthropic" | "claude" => Some(Self::Anthropic),
            "google" | "gemini" => Some(Self::Google),
            _ => None,
        }
    }

    /// Parse a configured style; empty or unrecognized values fall back to
    /// [`ApiStyle::OpenAi`].
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_default()
    }

    /// Whether the proxy exposes a client-facing endpoint in this style.
    #[must_use]
    pub fn is_front_end(self) -> bool {
        matches!(self, Self::OpenAi | Self::Anthropic)
    }

    /// Endpoint suffix under a scenario prefix, for front-end styles.
    #[must_use]
    pub fn endpoint_suffix(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("chat/completions"),
            Self::Anthropic => Some("messages"),
            Self::Google => None,
        }
    }

    /// Full path of the request endpoint, relative to the server URL.
    ///
    /// With a scenario: `/tingly/<scenario>/<suffix>`. Without one the
    /// style's unscoped endpoint is used.
    #[must_use]
    pub fn endpoint_path(self, scenario: Option<&str>) -> Option<String> {
        let suffix = self.endpoint_suffix()?;
        Some(match scenario {
            Some(s) if !s.is_empty() => format!("/tingly/{s}/{suffix}"),
            _ => format!("/{}/v1/{suffix}", self.wire_name()),
        })
    }

    /// Path of the model listing endpoint, when the style has one.
    #[must_use]
    pub fn models_path(self, scenario: Option<&str>) -> Option<String> {
        if !self.is_front_end() {
            return None;
        }
        Some(match scenario {
            Some(s) if !s.is_empty() => format!("/tingly/{s}/models"),
            _ => format!("/{}/v1/models", self.wire_name()),
        })
    }
}

impl std::fmt::Display for ApiStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for ApiStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown api style: {s}"))
    }
}

// ── Shape detection ─────────────────────────────────────────────────────

/// Result of checking which style a response body resembles.
#[derive(Debug, Clone)]
pub struct ShapeMatch {
    /// Most likely style.
    pub style: ApiStyle,
    /// Confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Evidence strings explaining the match.
    pub evidence: Vec<String>,
}

/// Scores a response body against each style's characteristic keys.
#[derive(Debug, Default)]
pub struct ShapeDetector {
    _priv: (),
}

impl ShapeDetector {
    /// Create a new detector.
    #[must_use]
    pub fn new() -> Self {
        Self { _priv: () }
    }

    /// Best matching style, or `None` when the body is not an object or no
    /// heuristic fires.
    #[must_use]
    pub fn detect(&self, body: &Value) -> Option<ShapeMatch> {
        let obj = body.as_object()?;
        let mut best: Option<ShapeMatch> = None;
        for &style in ApiStyle::all() {
            let (score, evidence) = match style {
                ApiStyle::OpenAi => score_openai(obj),
                ApiStyle::Anthropic => score_anthropic(obj),
                ApiStyle::Google => score_google(obj),
            };
            if score > 0.0 && best.as_ref().is_none_or(|b| score > b.confidence) {
                best = Some(ShapeMatch {
                    style,
                    confidence: score,
                    evidence,
                });
            }
        }
        best
    }

    /// `true` unless the body confidently looks like a different style.
    #[must_use]
    pub fn agrees_with(&self, body: &Value, style: ApiStyle) -> bool {
        match self.detect(body) {
            Some(m) => m.style == style || m.confidence < 0.5,
            None => true,
        }
    }
}

type Score = (f64, Vec<String>);

fn score_openai(obj: &serde_json::Map<String, Value>) -> Score {
    let mut pts = 0.0_f64;
    let mut ev = Vec::new();
    if obj.contains_key("choices") {
        pts += 0.5;
        ev.push("has \"choices\" key".into());
    }
    if obj.get("object").and_then(Value::as_str) == Some("chat.completion") {
        pts += 0.3;
        ev.push("has \"object\":\"chat.completion\"".into());
    }
    if obj
        .get("usage")
        .is_some_and(|u| u.get("prompt_tokens").is_some())
    {
        pts += 0.2;
        ev.push("has usage.prompt_tokens".into());
    }
    (pts.min(1.0), ev)
}

fn score_anthropic(obj: &serde_json::Map<String, Value>) -> Score {
    let mut pts = 0.0_f64;
    let mut ev = Vec::new();
    if obj.get("type").and_then(Value::as_str) == Some("message") {
        pts += 0.4;
        ev.push("has \"type\":\"message\"".into());
    }
    if obj.get("content").is_some_and(Value::is_array) {
        pts += 0.3;
        ev.push("has array \"content\"".into());
    }
    if obj.contains_key("stop_reason") {
        pts += 0.2;
        ev.push("has \"stop_reason\"".into());
    }
    if obj
        .get("usage")
        .is_some_and(|u| u.get("input_tokens").is_some())
    {
        pts += 0.1;
        ev.push("has usage.input_tokens".into());
    }
    (pts.min(1.0), ev)
}

fn score_google(obj: &serde_json::Map<String, Value>) -> Score {
    let mut pts = 0.0_f64;
    let mut ev = Vec::new();
    if obj.contains_key("candidates") {
        pts += 0.6;
        ev.push("has \"candidates\" key".into());
    }
    if obj.contains_key("usageMetadata") {
        pts += 0.3;
        ev.push("has \"usageMetadata\"".into());
    }
    if obj.contains_key("modelVersion") {
        pts += 0.1;
        ev.push("has \"modelVersion\"".into());
    }
    (pts.min(1.0), ev)
}
