// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error taxonomy with stable error codes for relay-verify.
//!
//! Every error raised while verifying a proxy carries an [`ErrorCode`], a
//! human-readable message, an optional cause and structured key-value
//! context. The [`ErrorCategory`] of a code decides how a failure degrades
//! into a verdict: configuration problems make a test inconclusive,
//! transport problems fail it, schema problems become validation issues.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Unresolvable rule or provider, unreadable config.
    Configuration,
    /// Non-success status, network error or timeout.
    Transport,
    /// Response body that cannot be read as the expected dialect.
    Schema,
    /// Unexpected failure inside a single test.
    Logic,
}

impl ErrorCategory {
    /// Stable lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Transport => "transport",
            Self::Schema => "schema",
            Self::Logic => "logic",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Serialises to `SCREAMING_SNAKE_CASE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Configuration --
    /// Config file does not exist.
    ConfigFileNotFound,
    /// Config file could not be parsed.
    ConfigParseFailed,
    /// No rule matches the requested scenario or model.
    ConfigRuleUnresolved,
    /// A rule has no active service backed by a known provider.
    ConfigProviderUnresolved,

    // -- Transport --
    /// Proxy answered with a non-success status.
    TransportStatus,
    /// Request exceeded the configured timeout.
    TransportTimeout,
    /// Connection could not be established.
    TransportConnect,
    /// Body could not be read or is not JSON.
    TransportBody,

    // -- Schema --
    /// Body is not a JSON object.
    SchemaInvalidBody,
    /// Body is an object but does not look like the expected dialect.
    SchemaUnexpectedShape,

    // -- Logic --
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl ErrorCode {
    /// Returns the [`ErrorCategory`] this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigFileNotFound
            | Self::ConfigParseFailed
            | Self::ConfigRuleUnresolved
            | Self::ConfigProviderUnresolved => ErrorCategory::Configuration,

            Self::TransportStatus
            | Self::TransportTimeout
            | Self::TransportConnect
            | Self::TransportBody => ErrorCategory::Transport,

            Self::SchemaInvalidBody | Self::SchemaUnexpectedShape => ErrorCategory::Schema,

            Self::Internal => ErrorCategory::Logic,
        }
    }

    /// Stable `&'static str` form (e.g. `"TRANSPORT_TIMEOUT"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigFileNotFound => "CONFIG_FILE_NOT_FOUND",
            Self::ConfigParseFailed => "CONFIG_PARSE_FAILED",
            Self::ConfigRuleUnresolved => "CONFIG_RULE_UNRESOLVED",
            Self::ConfigProviderUnresolved => "CONFIG_PROVIDER_UNRESOLVED",
            Self::TransportStatus => "TRANSPORT_STATUS",
            Self::TransportTimeout => "TRANSPORT_TIMEOUT",
            Self::TransportConnect => "TRANSPORT_CONNECT",
            Self::TransportBody => "TRANSPORT_BODY",
            Self::SchemaInvalidBody => "SCHEMA_INVALID_BODY",
            Self::SchemaUnexpectedShape => "SCHEMA_UNEXPECTED_SHAPE",
            Self::Internal => "INTERNAL",
        }
    }

    /// Every code, in declaration order.
    pub fn all() -> &'static [ErrorCode] {
        &[
            Self::ConfigFileNotFound,
            Self::ConfigParseFailed,
            Self::ConfigRuleUnresolved,
            Self::ConfigProviderUnresolved,
            Self::TransportStatus,
            Self::TransportTimeout,
            Self::TransportConnect,
            Self::TransportBody,
            Self::SchemaInvalidBody,
            Self::SchemaUnexpectedShape,
            Self::Internal,
        ]
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RvError
// ---------------------------------------------------------------------------

/// Unified relay-verify error.
///
/// ```
/// use rv_error::{ErrorCode, RvError};
///
/// let err = RvError::new(ErrorCode::TransportTimeout, "no answer within 60 s")
///     .with_context("path", "roundtrip")
///     .with_context("timeout_secs", 60);
/// assert!(err.to_string().starts_with("[TRANSPORT_TIMEOUT]"));
/// ```
pub struct RvError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Structured diagnostic context.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl RvError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// Values that fail to serialise are skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Serialisable snapshot of this error.
    pub fn to_dto(&self) -> RvErrorDto {
        RvErrorDto::from(self)
    }
}

impl fmt::Debug for RvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("RvError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for RvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for RvError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serialisable snapshot of an [`RvError`] (the opaque source is flattened
/// into a string).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct RvErrorDto {
    /// Error code.
    pub code: ErrorCode,
    /// Category derived from the code.
    pub category: ErrorCategory,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,
    /// String form of the source error, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&RvError> for RvErrorDto {
    fn from(err: &RvError) -> Self {
        Self {
            code: err.code,
            category: err.category(),
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<RvErrorDto> for RvError {
    fn from(dto: RvErrorDto) -> Self {
        Self {
            code: dto.code,
            message: dto.message,
            source: None,
            context: dto.context,
        }
    }
}
