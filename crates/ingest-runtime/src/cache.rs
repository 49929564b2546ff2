// SPDX-License-Identifier: MIT OR Apache-2.0
//! Constructor type aliases for the raw and preprocessed cache registries.
//!
//! Each job's `cache_configs.raw`/`cache_configs.preprocessed` names one
//! constructor, which is handed the cache's declarative config (typically
//! just a base directory) and returns a ready-to-use cache handle.

use ingest_cache::{PreprocessedCache, RawCache};
use ingest_error::{ErrorCode, IngestError};
use serde_json::Value;

/// Constructs a [`RawCache`] from its declarative config.
pub type RawCacheCtor = fn(&Value) -> Result<RawCache, IngestError>;

/// Constructs a [`PreprocessedCache`] from its declarative config.
pub type PreprocessedCacheCtor = fn(&Value) -> Result<PreprocessedCache, IngestError>;

fn require_base_dir(config: &Value) -> Result<&str, IngestError> {
    config
        .get("base_dir")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            IngestError::new(ErrorCode::ConfigMissingField, "cache config missing 'base_dir'")
                .with_context("config", config.clone())
        })
}

/// The only raw cache implementation this crate ships: a content-addressed
/// on-disk store rooted at `config.base_dir`.
pub fn local_raw_cache(config: &Value) -> Result<RawCache, IngestError> {
    Ok(RawCache::new(require_base_dir(config)?))
}

/// The only preprocessed cache implementation this crate ships: a
/// content-addressed on-disk store rooted at `config.base_dir`.
pub fn local_preprocessed_cache(config: &Value) -> Result<PreprocessedCache, IngestError> {
    Ok(PreprocessedCache::new(require_base_dir(config)?))
}
