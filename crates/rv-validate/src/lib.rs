// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # rv-validate
//!
//! Checks a raw response body against the fields a client of the given
//! [`ApiStyle`] relies on. Every problem becomes a [`ValidationIssue`]; the
//! validator never fails on malformed input.
//!
//! Rules applied to each checked field, in order:
//!
//! 1. absent: `missing`, at the field's own severity
//! 2. `null`: `invalid_value` (error), no further checks
//! 3. type mismatch: `wrong_type` (error)
//! 4. empty string, list or map where one of those is expected: `empty`
//!    (warning), whether or not the type matched
//!
//! Fields of `choices[0]` (or `content[0]`, `candidates[0]`) are checked
//! only when that list is present and non-empty. The usage block is
//! optional; when it is absent no usage issues are produced.

mod checklist;

pub use checklist::{Checklist, FieldSpec, ItemChecks, checklist};

use rv_dialect::ApiStyle;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ── Issue model ─────────────────────────────────────────────────────────

/// JSON type a field is expected to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedType {
    /// JSON string.
    String,
    /// JSON integer.
    Integer,
    /// Any JSON number.
    Float,
    /// JSON boolean.
    Boolean,
    /// JSON array.
    List,
    /// JSON object.
    Map,
    /// JSON string or array.
    StringOrList,
}

impl ExpectedType {
    /// Label used in issue text.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::List => "list",
            Self::Map => "map",
            Self::StringOrList => "string|list",
        }
    }

    /// Whether `value` (non-null) satisfies this type.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::List => value.is_array(),
            Self::Map => value.is_object(),
            Self::StringOrList => value.is_string() || value.is_array(),
        }
    }
}

impl fmt::Display for ExpectedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Kind of problem found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    /// Field absent.
    Missing,
    /// Field has the wrong JSON type.
    WrongType,
    /// Field is present but unusable (`null`).
    InvalidValue,
    /// Field is an empty string, list or map.
    Empty,
}

/// How bad an issue is. Only errors fail validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational.
    Warning,
    /// Fails validation.
    Error,
}

/// One problem with one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationIssue {
    /// Dotted path, e.g. `choices[0].message.role`; `$` for the root.
    pub field_path: String,
    /// Kind of problem.
    pub issue_type: IssueType,
    /// What was expected.
    pub expected: String,
    /// What was found.
    pub actual: String,
    /// Severity.
    pub severity: Severity,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.issue_type {
            IssueType::Missing => "missing",
            IssueType::WrongType => "wrong type",
            IssueType::InvalidValue => "invalid value",
            IssueType::Empty => "empty",
        };
        write!(
            f,
            "{}: {kind} (expected {}, got {})",
            self.field_path, self.expected, self.actual
        )
    }
}

// ── Validation ──────────────────────────────────────────────────────────

/// Validate `body` as a response in `style`.
#[must_use]
pub fn validate(style: ApiStyle, body: &Value) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let Some(root) = body.as_object() else {
        issues.push(ValidationIssue {
            field_path: "$".into(),
            issue_type: IssueType::WrongType,
            expected: "map".into(),
            actual: json_type(body).into(),
            severity: Severity::Error,
        });
        return issues;
    };

    let list = checklist(style);
    check_fields(root, "", list.top_level, &mut issues);
    check_item(root, &list.item, &mut issues);

    let (usage_key, usage_fields) = list.usage;
    if let Some(usage) = root.get(usage_key) {
        match usage.as_object() {
            Some(obj) => check_fields(obj, usage_key, usage_fields, &mut issues),
            None if usage.is_null() => {}
            None => issues.push(ValidationIssue {
                field_path: usage_key.into(),
                issue_type: IssueType::WrongType,
                expected: "map".into(),
                actual: json_type(usage).into(),
                severity: Severity::Error,
            }),
        }
    }
    issues
}

fn check_item(root: &Map<String, Value>, item: &ItemChecks, issues: &mut Vec<ValidationIssue>) {
    let Some(first) = root
        .get(item.list)
        .and_then(Value::as_array)
        .and_then(|l| l.first())
    else {
        return;
    };
    let path = format!("{}[0]", item.list);
    let Some(obj) = first.as_object() else {
        issues.push(ValidationIssue {
            field_path: path,
            issue_type: IssueType::WrongType,
            expected: "map".into(),
            actual: json_type(first).into(),
            severity: Severity::Error,
        });
        return;
    };
    check_fields(obj, &path, item.fields, issues);

    if let Some((key, fields)) = item.nested
        && let Some(nested) = obj.get(key).and_then(Value::as_object)
    {
        check_fields(nested, &format!("{path}.{key}"), fields, issues);
    }
}

fn check_fields(
    obj: &Map<String, Value>,
    prefix: &str,
    fields: &[FieldSpec],
    issues: &mut Vec<ValidationIssue>,
) {
    for spec in fields {
        let path = if prefix.is_empty() {
            spec.name.to_string()
        } else {
            format!("{prefix}.{}", spec.name)
        };
        match obj.get(spec.name) {
            None => issues.push(ValidationIssue {
                field_path: path,
                issue_type: IssueType::Missing,
                expected: spec.expected.label().into(),
                actual: "absent".into(),
                severity: spec.severity,
            }),
            Some(value) => check_value(value, spec.expected, path, issues),
        }
    }
}

/// Type-check a present value.
fn check_value(value: &Value, expected: ExpectedType, path: String, issues: &mut Vec<ValidationIssue>) {
    if value.is_null() {
        issues.push(ValidationIssue {
            field_path: path,
            issue_type: IssueType::InvalidValue,
            expected: format!("non-null {expected}"),
            actual: "null".into(),
            severity: Severity::Error,
        });
        return;
    }
    if !expected.accepts(value) {
        issues.push(ValidationIssue {
            field_path: path.clone(),
            issue_type: IssueType::WrongType,
            expected: expected.label().into(),
            actual: json_type(value).into(),
            severity: Severity::Error,
        });
    }
    let checks_empty = matches!(
        expected,
        ExpectedType::String | ExpectedType::List | ExpectedType::Map | ExpectedType::StringOrList
    );
    let empty = match value {
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    };
    if checks_empty && empty {
        let kind = json_type(value);
        issues.push(ValidationIssue {
            field_path: path,
            issue_type: IssueType::Empty,
            expected: format!("non-empty {kind}"),
            actual: format!("empty {kind}"),
            severity: Severity::Warning,
        });
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

// ── Report ──────────────────────────────────────────────────────────────

/// Issues found in one body, with the pass criterion applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationReport {
    /// Style the body was validated as.
    pub style: ApiStyle,
    /// All issues, in check order.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Validate `body` and wrap the result.
    #[must_use]
    pub fn check(style: ApiStyle, body: &Value) -> Self {
        Self {
            style,
            issues: validate(style, body),
        }
    }

    /// `true` when no issue has severity [`Severity::Error`].
    #[must_use]
    pub fn passed(&self) -> bool {
        self.errors().next().is_none()
    }

    /// Error-severity issues.
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    /// Warning-severity issues.
    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    /// Paths of missing fields.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&str> {
        self.paths_of(IssueType::Missing)
    }

    /// Paths of wrongly typed fields, with the expected type.
    #[must_use]
    pub fn invalid_fields(&self) -> Vec<(&str, &str)> {
        self.issues
            .iter()
            .filter(|i| i.issue_type == IssueType::WrongType)
            .map(|i| (i.field_path.as_str(), i.expected.as_str()))
            .collect()
    }

    fn paths_of(&self, kind: IssueType) -> Vec<&str> {
        self.issues
            .iter()
            .filter(|i| i.issue_type == kind)
            .map(|i| i.field_path.as_str())
            .collect()
    }

    /// One-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let errors = self.errors().count();
        let warnings = self.warnings().count();
        if errors == 0 && warnings == 0 {
            format!("{} response is well-formed", self.style)
        } else {
            format!(
                "{} response: {errors} error(s), {warnings} warning(s)",
                self.style
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn errors(issues: &[ValidationIssue]) -> Vec<&ValidationIssue> {
        issues.iter().filter(|i| i.severity == Severity::Error).collect()
    }

    #[test]
    fn openai_scenario_body_has_no_errors() {
        let body = json!({
            "id": "x", "object": "chat.completion", "created": 1, "model": "m",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "hi"},
                         "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
        });
        assert!(validate(ApiStyle::OpenAi, &body).is_empty());
    }

    #[test]
    fn anthropic_scenario_body_has_no_errors() {
        let body = json!({
            "id": "x", "type": "message", "role": "assistant", "model": "m",
            "stop_reason": "end_turn",
            "content": [{"type": "text", "text": "hi"}],
            "usage": {"input_tokens": 1, "output_tokens": 1}
        });
        assert!(validate(ApiStyle::Anthropic, &body).is_empty());
    }

    #[test]
    fn missing_usage_is_not_an_issue() {
        let body = json!({
            "id": "x", "object": "chat.completion", "created": 1, "model": "m",
            "choices": [{"index": 0, "message": {"role": "assistant"}, "finish_reason": "stop"}]
        });
        let issues = validate(ApiStyle::OpenAi, &body);
        assert!(issues.iter().all(|i| !i.field_path.starts_with("usage")));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field_path, "choices[0].message.content");
        assert_eq!(issues[0].issue_type, IssueType::Missing);
    }

    #[test]
    fn missing_usage_subfield_is_a_warning() {
        let body = json!({"content": [], "usage": {"input_tokens": 3}});
        let issues = validate(ApiStyle::Anthropic, &body);
        let usage: Vec<_> = issues
            .iter()
            .filter(|i| i.field_path.starts_with("usage"))
            .collect();
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].field_path, "usage.output_tokens");
        assert_eq!(usage[0].severity, Severity::Warning);
    }

    #[test]
    fn null_is_invalid_value_before_type_check() {
        let body = json!({"id": null});
        let issues = validate(ApiStyle::OpenAi, &body);
        let id = issues.iter().find(|i| i.field_path == "id").unwrap();
        assert_eq!(id.issue_type, IssueType::InvalidValue);
        assert_eq!(id.expected, "non-null string");
        assert_eq!(issues.iter().filter(|i| i.field_path == "id").count(), 1);
    }

    #[test]
    fn wrong_type_is_error() {
        let body = json!({"id": "x", "object": "o", "created": "yesterday", "model": "m", "choices": {}});
        let issues = validate(ApiStyle::OpenAi, &body);
        let errs = errors(&issues);
        assert_eq!(errs.len(), 2);
        assert!(errs.iter().all(|i| i.issue_type == IssueType::WrongType));
        assert_eq!(errs[0].actual, "string");
        assert_eq!(errs[1].actual, "map");

        let choices: Vec<_> = issues
            .iter()
            .filter(|i| i.field_path == "choices")
            .map(|i| (i.issue_type, i.severity))
            .collect();
        assert_eq!(
            choices,
            [
                (IssueType::WrongType, Severity::Error),
                (IssueType::Empty, Severity::Warning)
            ]
        );
    }

    #[test]
    fn empty_value_of_unrelated_type_is_only_wrong_type() {
        let body = json!({"id": "x", "object": "o", "created": "", "model": "m", "choices": [{}]});
        let issues = validate(ApiStyle::OpenAi, &body);
        let created: Vec<_> = issues
            .iter()
            .filter(|i| i.field_path == "created")
            .map(|i| i.issue_type)
            .collect();
        assert_eq!(created, [IssueType::WrongType]);
    }

    #[test]
    fn non_map_usage_is_error() {
        let body = json!({"id": "x", "object": "o", "created": 1, "model": "m", "choices": [], "usage": 12});
        let issues = validate(ApiStyle::OpenAi, &body);
        let usage = issues.iter().find(|i| i.field_path == "usage").unwrap();
        assert_eq!(usage.issue_type, IssueType::WrongType);
        assert_eq!(usage.severity, Severity::Error);
        assert!(!ValidationReport::check(ApiStyle::OpenAi, &body).passed());
    }

    #[test]
    fn empty_values_warn_in_addition() {
        let body = json!({"id": "", "object": "o", "created": 1, "model": "m", "choices": []});
        let issues = validate(ApiStyle::OpenAi, &body);
        assert!(errors(&issues).is_empty());
        let kinds: Vec<_> = issues.iter().map(|i| (i.field_path.as_str(), i.issue_type)).collect();
        assert_eq!(kinds, [("id", IssueType::Empty), ("choices", IssueType::Empty)]);
    }

    #[test]
    fn non_object_root_is_single_error() {
        let issues = validate(ApiStyle::Anthropic, &json!([1]));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field_path, "$");
        assert_eq!(issues[0].actual, "list");
    }

    #[test]
    fn non_object_first_item_is_reported() {
        let body = json!({"content": ["plain"]});
        let issues = validate(ApiStyle::Anthropic, &body);
        assert!(issues
            .iter()
            .any(|i| i.field_path == "content[0]" && i.issue_type == IssueType::WrongType));
    }

    #[test]
    fn integer_rejects_floats_and_bools() {
        assert!(!ExpectedType::Integer.accepts(&json!(1.5)));
        assert!(!ExpectedType::Integer.accepts(&json!(true)));
        assert!(ExpectedType::Float.accepts(&json!(1)));
        assert!(ExpectedType::StringOrList.accepts(&json!([])));
    }

    #[test]
    fn report_helpers() {
        let report = ValidationReport::check(ApiStyle::OpenAi, &json!({"created": "x"}));
        assert!(!report.passed());
        assert!(report.missing_fields().contains(&"id"));
        assert_eq!(report.invalid_fields(), [("created", "integer")]);
        assert!(report.summary().contains("error(s)"));
    }
}
