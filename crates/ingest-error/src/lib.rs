//! Unified error taxonomy with stable error codes for the ingestion pipeline.
//!
//! Every error raised by this crate's siblings carries an [`ErrorCode`] (a
//! machine-readable, stable string tag), a human-readable message, an
//! optional cause chain, and arbitrary key-value context. Use the builder
//! returned by [`IngestError::new`] to construct errors fluently.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Declarative job/app configuration errors.
    Config,
    /// Data source / HTTP fetch errors.
    Source,
    /// Raw or preprocessed cache errors.
    Cache,
    /// Frontend/optimizer/backend transform errors.
    Transform,
    /// Registry registration/lookup errors.
    Registry,
    /// Plugin loader errors.
    Plugin,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Source => "source",
            Self::Cache => "cache",
            Self::Transform => "transform",
            Self::Registry => "registry",
            Self::Plugin => "plugin",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serializes to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Config --
    /// A required configuration field is missing.
    ConfigMissingField,
    /// A configuration field has the wrong type or shape.
    ConfigInvalidValue,
    /// A job references a source/frontend/optimizer/backend name with no
    /// registered implementation.
    ConfigUnknownImplementation,

    // -- Source --
    /// All configured retries (and, where applicable, all mirror endpoints)
    /// were exhausted without a successful response.
    SourceTransportExhausted,
    /// A provider response could not be parsed into the expected shape.
    SourceMalformedResponse,
    /// A zip entry attempted to escape its extraction root.
    SourceZipSlip,
    /// An extracted file exceeded the configured size limit.
    SourceOversizePayload,

    // -- Cache --
    /// No cache entry exists for the given key.
    CacheMiss,
    /// A cache entry exists but failed an integrity check.
    CacheCorrupted,
    /// A concurrent writer already committed (or is committing) this key.
    CacheConcurrentWrite,

    // -- Transform --
    /// A frontend could not parse its raw input.
    TransformParseError,
    /// A stage was given an IR/encoding shape it does not support.
    TransformUnsupportedInput,
    /// A stage config or IR module failed a shape check.
    TransformSchemaMismatch,
    /// An internal invariant of the transform pipeline was violated.
    TransformInvariantViolation,

    // -- Registry --
    /// A different implementation is already registered under this name.
    RegistryDuplicate,
    /// No implementation is registered under this name.
    RegistryNotFound,
    /// The value offered for registration does not satisfy the registry's
    /// constraints (empty name, wrong interface, etc).
    RegistryInvalidRegistration,

    // -- Plugin --
    /// A plugin name in the configuration has no compiled-in initializer.
    PluginUnknown,

    // -- Internal --
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigMissingField | Self::ConfigInvalidValue | Self::ConfigUnknownImplementation => {
                ErrorCategory::Config
            }

            Self::SourceTransportExhausted
            | Self::SourceMalformedResponse
            | Self::SourceZipSlip
            | Self::SourceOversizePayload => ErrorCategory::Source,

            Self::CacheMiss | Self::CacheCorrupted | Self::CacheConcurrentWrite => ErrorCategory::Cache,

            Self::TransformParseError
            | Self::TransformUnsupportedInput
            | Self::TransformSchemaMismatch
            | Self::TransformInvariantViolation => ErrorCategory::Transform,

            Self::RegistryDuplicate | Self::RegistryNotFound | Self::RegistryInvalidRegistration => {
                ErrorCategory::Registry
            }

            Self::PluginUnknown => ErrorCategory::Plugin,

            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Stable `&'static str` representation of the code (e.g.
    /// `"CACHE_CORRUPTED"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigMissingField => "CONFIG_MISSING_FIELD",
            Self::ConfigInvalidValue => "CONFIG_INVALID_VALUE",
            Self::ConfigUnknownImplementation => "CONFIG_UNKNOWN_IMPLEMENTATION",
            Self::SourceTransportExhausted => "SOURCE_TRANSPORT_EXHAUSTED",
            Self::SourceMalformedResponse => "SOURCE_MALFORMED_RESPONSE",
            Self::SourceZipSlip => "SOURCE_ZIP_SLIP",
            Self::SourceOversizePayload => "SOURCE_OVERSIZE_PAYLOAD",
            Self::CacheMiss => "CACHE_MISS",
            Self::CacheCorrupted => "CACHE_CORRUPTED",
            Self::CacheConcurrentWrite => "CACHE_CONCURRENT_WRITE",
            Self::TransformParseError => "TRANSFORM_PARSE_ERROR",
            Self::TransformUnsupportedInput => "TRANSFORM_UNSUPPORTED_INPUT",
            Self::TransformSchemaMismatch => "TRANSFORM_SCHEMA_MISMATCH",
            Self::TransformInvariantViolation => "TRANSFORM_INVARIANT_VIOLATION",
            Self::RegistryDuplicate => "REGISTRY_DUPLICATE",
            Self::RegistryNotFound => "REGISTRY_NOT_FOUND",
            Self::RegistryInvalidRegistration => "REGISTRY_INVALID_REGISTRATION",
            Self::PluginUnknown => "PLUGIN_UNKNOWN",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// IngestError
// ---------------------------------------------------------------------------

/// Unified pipeline error.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
///
/// # Builder usage
///
/// ```
/// use ingest_error::{IngestError, ErrorCode};
///
/// let err = IngestError::new(ErrorCode::CacheCorrupted, "checksum mismatch")
///     .with_context("expected_sha256", "ab12")
///     .with_context("actual_sha256", "cd34");
/// ```
pub struct IngestError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl IngestError {
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
    /// The value is converted via [`serde_json::to_value`]; if serialization
    /// fails, the entry is silently skipped.
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
}

impl fmt::Debug for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("IngestError");
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

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serializable snapshot of an [`IngestError`] (without the opaque source).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestErrorDto {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&IngestError> for IngestErrorDto {
    fn from(err: &IngestError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<IngestErrorDto> for IngestError {
    fn from(dto: IngestErrorDto) -> Self {
        Self {
            code: dto.code,
            message: dto.message,
            source: None,
            context: dto.context,
        }
    }
}
