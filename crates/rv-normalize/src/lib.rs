// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # rv-normalize
//!
//! Turns a dialect-specific response body into a [`CanonicalResponse`] so
//! that responses obtained through different paths can be compared.
//!
//! The caller always states the [`ApiStyle`] of the body. Absent optional
//! substructures (`choices`, `usage`, content blocks) degrade to empty or
//! `None` fields instead of failing, so a half-formed body still yields a
//! record the verdict engine can reason about.

use rv_dialect::ApiStyle;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

// ── Canonical record ────────────────────────────────────────────────────

/// Dialect-independent view of one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CanonicalResponse {
    /// Style the body was read as.
    pub style: ApiStyle,
    /// Reported model.
    pub model: Option<String>,
    /// Role of the generated message.
    pub role: Option<String>,
    /// Why generation stopped.
    pub finish_reason: Option<String>,
    /// Prompt-side token count reported by the backend.
    pub input_tokens: Option<u64>,
    /// Completion-side token count reported by the backend.
    pub output_tokens: Option<u64>,
    /// Concatenated text content; empty when there is none.
    pub content: String,
    /// Hex SHA-256 of `content`.
    pub content_hash: String,
}

impl CanonicalResponse {
    /// Names of canonical fields that came back null or empty.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        let blank = |v: &Option<String>| v.as_deref().is_none_or(str::is_empty);
        if blank(&self.model) {
            out.push("model");
        }
        if blank(&self.role) {
            out.push("role");
        }
        if blank(&self.finish_reason) {
            out.push("finish_reason");
        }
        if self.input_tokens.is_none() {
            out.push("input_tokens");
        }
        if self.output_tokens.is_none() {
            out.push("output_tokens");
        }
        out
    }

    /// First `max` characters of the content, with an ellipsis when cut.
    #[must_use]
    pub fn preview(&self, max: usize) -> String {
        if self.content.chars().count() <= max {
            return self.content.clone();
        }
        let cut: String = self.content.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

/// Hex SHA-256 of a text.
#[must_use]
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ── Normalization ───────────────────────────────────────────────────────

/// Normalize `body` read as `style`.
///
/// Deterministic: the same body always yields an identical record.
#[must_use]
pub fn normalize(style: ApiStyle, body: &Value) -> CanonicalResponse {
    let fields = match style {
        ApiStyle::OpenAi => openai_fields(body),
        ApiStyle::Anthropic => anthropic_fields(body),
        ApiStyle::Google => google_fields(body),
    };
    CanonicalResponse {
        style,
        content_hash: content_hash(&fields.content),
        model: fields.model,
        role: fields.role,
        finish_reason: fields.finish_reason,
        input_tokens: fields.input_tokens,
        output_tokens: fields.output_tokens,
        content: fields.content,
    }
}

#[derive(Default)]
struct Fields {
    model: Option<String>,
    role: Option<String>,
    finish_reason: Option<String>,
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
    content: String,
}

fn str_at(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn u64_at(v: &Value, key: &str) -> Option<u64> {
    v.get(key).and_then(Value::as_u64)
}

fn openai_fields(body: &Value) -> Fields {
    let choice = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|c| c.first());
    let message = choice.and_then(|c| c.get("message"));
    let usage = body.get("usage");

    Fields {
        model: str_at(body, "model"),
        role: message.and_then(|m| str_at(m, "role")),
        finish_reason: choice.and_then(|c| str_at(c, "finish_reason")),
        input_tokens: usage.and_then(|u| u64_at(u, "prompt_tokens")),
        output_tokens: usage.and_then(|u| u64_at(u, "completion_tokens")),
        content: message
            .and_then(|m| m.get("content"))
            .map(text_of_content)
            .unwrap_or_default(),
    }
}

fn anthropic_fields(body: &Value) -> Fields {
    let usage = body.get("usage");
    Fields {
        model: str_at(body, "model"),
        role: str_at(body, "role"),
        finish_reason: str_at(body, "stop_reason"),
        input_tokens: usage.and_then(|u| u64_at(u, "input_tokens")),
        output_tokens: usage.and_then(|u| u64_at(u, "output_tokens")),
        content: body
            .get("content")
            .and_then(Value::as_array)
            .map(|blocks| text_blocks(blocks))
            .unwrap_or_default(),
    }
}

fn google_fields(body: &Value) -> Fields {
    let candidates = body
        .get("candidates")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    // Role, finish reason and tokens describe the first candidate; text spans all of them.
    let candidate = candidates.first();
    let content = candidate.and_then(|c| c.get("content"));
    let usage = body.get("usageMetadata");

    Fields {
        model: str_at(body, "modelVersion").or_else(|| str_at(body, "model")),
        role: content.and_then(|c| str_at(c, "role")),
        finish_reason: candidate.and_then(|c| str_at(c, "finishReason")),
        input_tokens: usage.and_then(|u| u64_at(u, "promptTokenCount")),
        output_tokens: usage.and_then(|u| u64_at(u, "candidatesTokenCount")),
        content: candidates
            .iter()
            .filter_map(|c| c.get("content"))
            .map(parts_text)
            .collect(),
    }
}

/// Text of an OpenAI message `content`, which is a string or a list of parts.
fn text_of_content(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(parts) => text_blocks(parts),
        _ => String::new(),
    }
}

/// Concatenated `text` of every block whose `type` is `"text"`.
fn text_blocks(blocks: &[Value]) -> String {
    blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .collect()
}

/// Concatenated `parts[].text` of a Google content object.
fn parts_text(content: &Value) -> String {
    content
        .get("parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

// ── Generic extraction ──────────────────────────────────────────────────

/// Dialect-agnostic text extraction.
///
/// Collects, in order: every choice's `message.content` or streaming
/// `delta.content`, every Anthropic text block, and every Google
/// candidate's part texts. Used for evidence where the style of a body is
/// not the question being asked.
#[must_use]
pub fn extract_content(body: &Value) -> String {
    let mut out = String::new();

    if let Some(choices) = body.get("choices").and_then(Value::as_array) {
        for choice in choices {
            let content = choice
                .get("message")
                .and_then(|m| m.get("content"))
                .or_else(|| choice.get("delta").and_then(|d| d.get("content")));
            if let Some(c) = content {
                out.push_str(&text_of_content(c));
            }
        }
    }

    if let Some(blocks) = body.get("content").and_then(Value::as_array) {
        out.push_str(&text_blocks(blocks));
    }

    if let Some(candidates) = body.get("candidates").and_then(Value::as_array) {
        for cand in candidates {
            if let Some(content) = cand.get("content") {
                out.push_str(&parts_text(content));
            }
        }
    }

    out
}
