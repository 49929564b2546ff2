// SPDX-License-Identifier: MIT OR Apache-2.0
//! Record and metadata types shared by the raw and preprocessed caches.

use crate::CacheKey;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel [`RawCacheMeta::encoding`] value for payloads that are not text.
pub const BINARY_ENCODING: &str = "binary";

/// Provenance metadata attached to a raw fetched payload.
///
/// Invariant: every value in `meta` must already be string-coercible; the
/// source is responsible for stringifying retry counts, HTTP status codes,
/// and similar before inserting them.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RawCacheMeta {
    /// Name of the source that produced this record.
    pub source_name: String,
    /// ISO-8601 timestamp of when the record was fetched.
    pub fetched_at_iso: String,
    /// MIME content type reported by the source, if any.
    pub content_type: Option<String>,
    /// Text codec name (e.g. `"utf-8"`), or [`BINARY_ENCODING`].
    pub encoding: String,
    /// Opaque provenance pointer (e.g. masked discovery URL); may be empty.
    pub cache_path: String,
    /// Flat provenance bag: URL, HTTP status, retry count, dataset name, etc.
    pub meta: BTreeMap<String, String>,
}

impl RawCacheMeta {
    /// True if this record's encoding is the binary sentinel.
    pub fn is_binary(&self) -> bool {
        self.encoding == BINARY_ENCODING
    }
}

/// A fetched payload together with its provenance.
///
/// Owned exclusively by the source iterator until handed to
/// `RawCache::save`, at which point ownership transfers to the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCacheRecord {
    /// Raw bytes as returned by the source, undecoded.
    pub payload: Vec<u8>,
    /// Provenance metadata.
    pub meta: RawCacheMeta,
}

/// Metadata describing one preprocessed (transformed) artifact set.
///
/// Invariant: `built_at_iso` is non-empty; if the owning key supplies a
/// `fetched_at_iso`, it must equal `built_at_iso`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessedCacheMeta {
    /// UTC timestamp (seconds resolution) the artifacts were built at.
    pub built_at_iso: String,
    /// Schema version of the `extra` provenance blob.
    pub schema_version: u32,
    /// Transform provenance: stage name@version, ir_version, diagnostics, etc.
    pub extra: serde_json::Value,
}

/// Checksum record for a single artifact file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ArtifactChecksum {
    /// Hash algorithm; always `"sha256"` today.
    pub algo: String,
    /// Lowercase hex digest.
    pub hex: String,
    /// Size of the artifact in bytes.
    pub size_bytes: u64,
}

/// Manifest of the files produced by one preprocessed run.
///
/// Each entry in `files` is a relative path with no parent-traversal
/// segments and no leading slash; subdirectories are permitted.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct ArtifactManifest {
    /// Ordered list of artifact relative paths.
    pub files: Vec<String>,
    /// Checksum per artifact name.
    pub checksums: BTreeMap<String, ArtifactChecksum>,
}

impl ArtifactManifest {
    /// Validate every artifact name: non-empty, not absolute, no `..`
    /// segment, no empty path component.
    pub fn validate_names(&self) -> Result<(), String> {
        for name in &self.files {
            validate_artifact_name(name)?;
        }
        Ok(())
    }
}

/// Validate a single artifact name against the path-safety rules used by
/// both the manifest and the preprocessed cache's artifact writer.
pub fn validate_artifact_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("artifact name must not be empty".to_string());
    }
    if name.starts_with('/') || name.starts_with('\\') {
        return Err(format!("artifact name must not be absolute: {name}"));
    }
    for segment in name.split('/') {
        if segment.is_empty() {
            return Err(format!("artifact name has an empty path segment: {name}"));
        }
        if segment == ".." {
            return Err(format!("artifact name must not traverse parents: {name}"));
        }
    }
    Ok(())
}

/// A cache entry bundling its identity with either raw or preprocessed
/// payloads is intentionally not modeled as a single type: the raw and
/// preprocessed caches own independent lifecycles keyed by the same
/// [`CacheKey`] shape.
pub type KeyedMeta<T> = (CacheKey, T);
