// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared data model for the ingestion pipeline.
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Defines the identity, record, and configuration types passed between the
//! cache, source, and transform layers, plus the cache-key derivation
//! function (C5) that ties a fetched payload to its on-disk identity.

/// Raw and preprocessed cache record/metadata types.
pub mod cache_model;
/// In-flight intermediate representation passed between transform stages.
pub mod ir;
/// Declarative job and transformer configuration types.
pub mod job;
/// Cache key identity and derivation.
pub mod key;

pub use cache_model::{
    ArtifactChecksum, ArtifactManifest, PreprocessedCacheMeta, RawCacheMeta, RawCacheRecord,
    BINARY_ENCODING,
};
pub use ir::IrModule;
pub use job::{
    JobConfig, ModuleFormat, NamedConfig, TargetLayout, TransformChoice, TransformTarget,
    TransformerSpec,
};
pub use key::CacheKey;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Canonicalize a JSON value into a deterministic byte string: object keys
/// sorted, no insignificant whitespace. Relies on `serde_json`'s `Value`
/// already comparing maps as [`std::collections::BTreeMap`]-equivalent when
/// serialized through [`serde_json::to_vec`] — Rust's `Map` preserves
/// insertion order by default, so values are first round-tripped through a
/// `BTreeMap` to force key ordering.
fn canonical_json_bytes(value: &Value) -> Vec<u8> {
    fn sort(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: std::collections::BTreeMap<String, Value> =
                    map.iter().map(|(k, v)| (k.clone(), sort(v))).collect();
                serde_json::to_value(sorted).unwrap_or(Value::Null)
            }
            Value::Array(items) => Value::Array(items.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    serde_json::to_vec(&sort(value)).unwrap_or_default()
}

/// Derive the [`CacheKey`] for a freshly fetched record (C5).
///
/// Feeds, in order: the UTF-8 bytes of `config_name`, the SHA-256 digest of
/// the payload bytes, the canonical JSON of `record.meta.meta` (if
/// non-empty), and the canonical JSON of `extra_identity` (if provided).
/// Critically, `fetched_at_iso` is never fed into the hash — including it
/// would defeat cache replayability, since otherwise two fetches of
/// identical content at different times would never collide.
pub fn make_cache_key(
    config_name: &str,
    record: &RawCacheRecord,
    extra_identity: Option<&impl Serialize>,
) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(config_name.as_bytes());
    hasher.update(Sha256::digest(&record.payload));

    if !record.meta.meta.is_empty() {
        let meta_value = serde_json::to_value(&record.meta.meta).unwrap_or(Value::Null);
        hasher.update(canonical_json_bytes(&meta_value));
    }

    if let Some(extra) = extra_identity {
        if let Ok(extra_value) = serde_json::to_value(extra) {
            hasher.update(canonical_json_bytes(&extra_value));
        }
    }

    let content_hash = format!("{:x}", hasher.finalize());
    CacheKey::new(config_name, content_hash, record.meta.fetched_at_iso.clone())
}
