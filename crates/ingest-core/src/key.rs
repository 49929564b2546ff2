// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cache key identity and derivation.

use serde::{Deserialize, Serialize};

/// Identity of one cached run: a config name, a content hash, and an
/// optional fetch timestamp.
///
/// Equality covers all three fields. When `fetched_at_iso` is absent, the
/// key is resolved by the cache implementation scanning for a directory
/// whose name ends with `-<config_name>-<content_hash>`; more than one match
/// is an ambiguous [`crate::CACHE_KEY_AMBIGUOUS`]-class miss.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Name of the job/source configuration this run belongs to.
    pub config_name: String,
    /// Lowercase hex SHA-256 digest produced by [`crate::make_cache_key`].
    pub content_hash: String,
    /// ISO-8601 fetch timestamp, if known at construction time.
    pub fetched_at_iso: Option<String>,
}

impl CacheKey {
    /// Construct a key with an explicit fetch timestamp.
    pub fn new(
        config_name: impl Into<String>,
        content_hash: impl Into<String>,
        fetched_at_iso: impl Into<String>,
    ) -> Self {
        Self {
            config_name: config_name.into(),
            content_hash: content_hash.into(),
            fetched_at_iso: Some(fetched_at_iso.into()),
        }
    }

    /// Construct a key without a fetch timestamp, to be resolved by scanning.
    pub fn without_timestamp(config_name: impl Into<String>, content_hash: impl Into<String>) -> Self {
        Self {
            config_name: config_name.into(),
            content_hash: content_hash.into(),
            fetched_at_iso: None,
        }
    }

    /// The `<config_name>-<content_hash>` suffix used to resolve a directory
    /// when `fetched_at_iso` isn't known up front.
    pub fn directory_suffix(&self) -> String {
        format!("-{}-{}", self.config_name, self.content_hash)
    }

    /// Filesystem-safe form of `fetched_at_iso` with `:` and `.` stripped,
    /// if the timestamp is known.
    pub fn safe_timestamp(&self) -> Option<String> {
        self.fetched_at_iso
            .as_deref()
            .map(|ts| ts.chars().filter(|c| *c != ':' && *c != '.').collect())
    }

    /// The full directory name, if `fetched_at_iso` is known.
    pub fn directory_name(&self) -> Option<String> {
        self.safe_timestamp()
            .map(|ts| format!("{ts}-{}-{}", self.config_name, self.content_hash))
    }

    /// Derive a new key carrying `built_at_iso` as its timestamp, used by
    /// the transform driver when the caller's key lacked one.
    pub fn with_timestamp(&self, built_at_iso: impl Into<String>) -> Self {
        Self {
            config_name: self.config_name.clone(),
            content_hash: self.content_hash.clone(),
            fetched_at_iso: Some(built_at_iso.into()),
        }
    }
}
