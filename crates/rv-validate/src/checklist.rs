// SPDX-License-Identifier: MIT OR Apache-2.0
//! Field checklists per API style.

use rv_dialect::ApiStyle;

use crate::{ExpectedType, Severity};

/// One field the validator expects to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Key within its parent object.
    pub name: &'static str,
    /// Accepted JSON type.
    pub expected: ExpectedType,
    /// Severity of a missing field.
    pub severity: Severity,
}

const fn req(name: &'static str, expected: ExpectedType) -> FieldSpec {
    FieldSpec {
        name,
        expected,
        severity: Severity::Error,
    }
}

const fn opt(name: &'static str, expected: ExpectedType) -> FieldSpec {
    FieldSpec {
        name,
        expected,
        severity: Severity::Warning,
    }
}

/// Checks applied to the first element of a top-level list, and optionally
/// to one object nested in that element.
#[derive(Debug, Clone, Copy)]
pub struct ItemChecks {
    /// Top-level list key (`choices`, `content`, `candidates`).
    pub list: &'static str,
    /// Fields of the first element.
    pub fields: &'static [FieldSpec],
    /// Nested object key inside the element and its fields.
    pub nested: Option<(&'static str, &'static [FieldSpec])>,
}

/// Complete checklist for one style.
#[derive(Debug, Clone, Copy)]
pub struct Checklist {
    /// Root-level fields.
    pub top_level: &'static [FieldSpec],
    /// First-element checks.
    pub item: ItemChecks,
    /// Optional usage block key and its fields; checked only when present.
    pub usage: (&'static str, &'static [FieldSpec]),
}

use ExpectedType::{Integer, List, Map, String as Str};

const OPENAI_TOP: &[FieldSpec] = &[
    req("id", Str),
    req("object", Str),
    req("created", Integer),
    req("model", Str),
    req("choices", List),
];
const OPENAI_CHOICE: &[FieldSpec] = &[
    req("index", Integer),
    req("message", Map),
    req("finish_reason", Str),
];
const OPENAI_MESSAGE: &[FieldSpec] = &[req("role", Str), req("content", Str)];
const OPENAI_USAGE: &[FieldSpec] = &[
    opt("prompt_tokens", Integer),
    opt("completion_tokens", Integer),
    opt("total_tokens", Integer),
];

const ANTHROPIC_TOP: &[FieldSpec] = &[
    req("id", Str),
    req("type", Str),
    req("role", Str),
    req("content", List),
    req("model", Str),
    req("stop_reason", Str),
];
const ANTHROPIC_BLOCK: &[FieldSpec] = &[req("type", Str), req("text", Str)];
const ANTHROPIC_USAGE: &[FieldSpec] = &[opt("input_tokens", Integer), opt("output_tokens", Integer)];

const GOOGLE_TOP: &[FieldSpec] = &[req("candidates", List)];
const GOOGLE_CANDIDATE: &[FieldSpec] = &[req("content", Map), opt("finishReason", Str)];
const GOOGLE_CONTENT: &[FieldSpec] = &[req("parts", List), opt("role", Str)];
const GOOGLE_USAGE: &[FieldSpec] = &[
    opt("promptTokenCount", Integer),
    opt("candidatesTokenCount", Integer),
    opt("totalTokenCount", Integer),
];

/// The checklist for `style`.
#[must_use]
pub fn checklist(style: ApiStyle) -> Checklist {
    match style {
        ApiStyle::OpenAi => Checklist {
            top_level: OPENAI_TOP,
            item: ItemChecks {
                list: "choices",
                fields: OPENAI_CHOICE,
                nested: Some(("message", OPENAI_MESSAGE)),
            },
            usage: ("usage", OPENAI_USAGE),
        },
        ApiStyle::Anthropic => Checklist {
            top_level: ANTHROPIC_TOP,
            item: ItemChecks {
                list: "content",
                fields: ANTHROPIC_BLOCK,
                nested: None,
            },
            usage: ("usage", ANTHROPIC_USAGE),
        },
        ApiStyle::Google => Checklist {
            top_level: GOOGLE_TOP,
            item: ItemChecks {
                list: "candidates",
                fields: GOOGLE_CANDIDATE,
                nested: Some(("content", GOOGLE_CONTENT)),
            },
            usage: ("usageMetadata", GOOGLE_USAGE),
        },
    }
}
