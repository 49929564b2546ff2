// SPDX-License-Identifier: MIT OR Apache-2.0
//! Raw cache (C3): content-addressed storage of freshly fetched payloads.

use std::path::{Path, PathBuf};

use ingest_core::{ArtifactChecksum, CacheKey, RawCacheMeta, RawCacheRecord};
use ingest_error::{ErrorCode, IngestError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::atomic::{self, KeyFile};

const PAYLOAD_FILE: &str = "payload.bin";
const META_FILE: &str = "meta.json";
const META_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct RawMetaFile {
    version: u32,
    checksum: ArtifactChecksum,
    payload_file: String,
    raw: RawCacheMeta,
    key: KeyFile,
}

/// Content-addressed store of raw fetched payloads.
///
/// See [`crate`] module docs for the on-disk layout shared with
/// [`crate::PreprocessedCache`].
pub struct RawCache {
    base: PathBuf,
}

impl RawCache {
    /// Open (without creating) a raw cache rooted at `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// The base directory this cache is rooted at.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// True iff the resolved directory contains both `meta.json` and
    /// `payload.bin`.
    pub fn has(&self, key: &CacheKey) -> Result<bool, IngestError> {
        match atomic::resolve_entry(&self.base, key)? {
            Some(dir) => Ok(dir.join(META_FILE).is_file() && dir.join(PAYLOAD_FILE).is_file()),
            None => Ok(false),
        }
    }

    /// Write a record under `key`. Fails with [`ErrorCode::CacheConcurrentWrite`]
    /// if the final directory already exists.
    pub fn save(&self, key: &CacheKey, record: &RawCacheRecord) -> Result<(), IngestError> {
        let dir_name = key.directory_name().ok_or_else(|| {
            IngestError::new(
                ErrorCode::CacheMiss,
                "cannot save a raw record without a fetched_at_iso timestamp on its key",
            )
        })?;
        let final_dir = self.base.join(&dir_name);
        if final_dir.exists() {
            return Err(IngestError::new(
                ErrorCode::CacheConcurrentWrite,
                format!("raw cache entry already exists: {dir_name}"),
            )
            .with_context("config_name", key.config_name.clone())
            .with_context("content_hash", key.content_hash.clone()));
        }

        let mut hasher = Sha256::new();
        hasher.update(&record.payload);
        let checksum = ArtifactChecksum {
            algo: "sha256".to_string(),
            hex: format!("{:x}", hasher.finalize()),
            size_bytes: record.payload.len() as u64,
        };

        let meta_file = RawMetaFile {
            version: META_VERSION,
            checksum,
            payload_file: PAYLOAD_FILE.to_string(),
            raw: record.meta.clone(),
            key: KeyFile::from(key),
        };

        atomic::write_staged_dir(&self.base, &dir_name, |tmp| {
            std::fs::write(tmp.join(PAYLOAD_FILE), &record.payload).map_err(|e| {
                IngestError::new(ErrorCode::Internal, "failed to write payload.bin").with_source(e)
            })?;
            atomic::write_json_atomic(&tmp.join(META_FILE), &meta_file)?;
            Ok(())
        })
    }

    /// Load a previously saved record, verifying payload integrity.
    pub fn load(&self, key: &CacheKey) -> Result<RawCacheRecord, IngestError> {
        let dir = atomic::require_entry(&self.base, key)?;
        let meta: RawMetaFile = atomic::read_json(&dir.join(META_FILE), ErrorCode::CacheCorrupted)?;
        if meta.raw.fetched_at_iso != meta.key.fetched_at_iso.clone().unwrap_or_default() {
            return Err(IngestError::new(
                ErrorCode::CacheCorrupted,
                "meta.key.fetched_at_iso does not match meta.raw.fetched_at_iso",
            ));
        }

        let payload = std::fs::read(dir.join(&meta.payload_file)).map_err(|e| {
            IngestError::new(ErrorCode::CacheCorrupted, "failed to read payload.bin").with_source(e)
        })?;

        let mut hasher = Sha256::new();
        hasher.update(&payload);
        let actual = format!("{:x}", hasher.finalize());
        if actual != meta.checksum.hex {
            return Err(IngestError::new(
                ErrorCode::CacheCorrupted,
                "raw payload checksum mismatch",
            )
            .with_context("expected_sha256", meta.checksum.hex.clone())
            .with_context("actual_sha256", actual));
        }

        Ok(RawCacheRecord {
            payload,
            meta: meta.raw,
        })
    }

    /// Enumerate keys stored in this cache, optionally filtered to a single
    /// `config_name`. Directories whose `meta.json` cannot be read are
    /// skipped (not fatal).
    pub fn iter_keys(&self, config_name: Option<&str>) -> Vec<CacheKey> {
        atomic::iter_entry_keys(&self.base, META_FILE, config_name, |path| {
            let meta: RawMetaFile = atomic::read_json(path, ErrorCode::CacheCorrupted).ok()?;
            Some(CacheKey::from(meta.key))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn record(payload: &[u8], fetched_at: &str) -> RawCacheRecord {
        RawCacheRecord {
            payload: payload.to_vec(),
            meta: RawCacheMeta {
                source_name: "demo".into(),
                fetched_at_iso: fetched_at.into(),
                content_type: Some("application/json".into()),
                encoding: "utf-8".into(),
                cache_path: String::new(),
                meta: BTreeMap::new(),
            },
        }
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempdir().unwrap();
        let cache = RawCache::new(dir.path());
        let key = CacheKey::new("demo", "abc123", "2026-01-01T00:00:00Z");
        let rec = record(b"hello world", "2026-01-01T00:00:00Z");
        cache.save(&key, &rec).unwrap();
        assert!(cache.has(&key).unwrap());
        let loaded = cache.load(&key).unwrap();
        assert_eq!(loaded.payload, rec.payload);
    }

    #[test]
    fn save_twice_is_concurrent_write() {
        let dir = tempdir().unwrap();
        let cache = RawCache::new(dir.path());
        let key = CacheKey::new("demo", "abc123", "2026-01-01T00:00:00Z");
        let rec = record(b"hello", "2026-01-01T00:00:00Z");
        cache.save(&key, &rec).unwrap();
        let err = cache.save(&key, &rec).unwrap_err();
        assert_eq!(err.code, ErrorCode::CacheConcurrentWrite);
    }

    #[test]
    fn load_missing_is_cache_miss() {
        let dir = tempdir().unwrap();
        let cache = RawCache::new(dir.path());
        let key = CacheKey::new("demo", "nope", "2026-01-01T00:00:00Z");
        let err = cache.load(&key).unwrap_err();
        assert_eq!(err.code, ErrorCode::CacheMiss);
    }

    #[test]
    fn tampered_payload_is_corrupted_cache() {
        let dir = tempdir().unwrap();
        let cache = RawCache::new(dir.path());
        let key = CacheKey::new("demo", "abc123", "2026-01-01T00:00:00Z");
        let rec = record(b"hello", "2026-01-01T00:00:00Z");
        cache.save(&key, &rec).unwrap();

        let entry_dir = dir.path().join(key.directory_name().unwrap());
        std::fs::write(entry_dir.join(PAYLOAD_FILE), b"tampered").unwrap();

        let err = cache.load(&key).unwrap_err();
        assert_eq!(err.code, ErrorCode::CacheCorrupted);
        assert!(err.context.contains_key("expected_sha256"));
    }

    #[test]
    fn resolve_without_timestamp_by_scanning() {
        let dir = tempdir().unwrap();
        let cache = RawCache::new(dir.path());
        let stamped = CacheKey::new("demo", "abc123", "2026-01-01T00:00:00Z");
        let rec = record(b"hello", "2026-01-01T00:00:00Z");
        cache.save(&stamped, &rec).unwrap();

        let unstamped = CacheKey::without_timestamp("demo", "abc123");
        assert!(cache.has(&unstamped).unwrap());
        let loaded = cache.load(&unstamped).unwrap();
        assert_eq!(loaded.payload, rec.payload);
    }

    #[test]
    fn ambiguous_scan_is_cache_miss() {
        let dir = tempdir().unwrap();
        let cache = RawCache::new(dir.path());
        let rec = record(b"hello", "2026-01-01T00:00:00Z");
        cache
            .save(&CacheKey::new("demo", "abc123", "2026-01-01T00:00:00Z"), &rec)
            .unwrap();
        cache
            .save(&CacheKey::new("demo", "abc123", "2026-02-01T00:00:00Z"), &rec)
            .unwrap();

        let unstamped = CacheKey::without_timestamp("demo", "abc123");
        let err = cache.load(&unstamped).unwrap_err();
        assert_eq!(err.code, ErrorCode::CacheMiss);
    }

    #[test]
    fn iter_keys_filters_by_config_name() {
        let dir = tempdir().unwrap();
        let cache = RawCache::new(dir.path());
        let rec = record(b"hello", "2026-01-01T00:00:00Z");
        cache
            .save(&CacheKey::new("job-a", "h1", "2026-01-01T00:00:00Z"), &rec)
            .unwrap();
        cache
            .save(&CacheKey::new("job-b", "h2", "2026-01-01T00:00:00Z"), &rec)
            .unwrap();

        let job_a_keys = cache.iter_keys(Some("job-a"));
        assert_eq!(job_a_keys.len(), 1);
        assert_eq!(job_a_keys[0].config_name, "job-a");

        assert_eq!(cache.iter_keys(None).len(), 2);
    }

    #[test]
    fn iter_keys_skips_unreadable_directory() {
        let dir = tempdir().unwrap();
        let cache = RawCache::new(dir.path());
        let rec = record(b"hello", "2026-01-01T00:00:00Z");
        cache
            .save(&CacheKey::new("job-a", "h1", "2026-01-01T00:00:00Z"), &rec)
            .unwrap();

        std::fs::create_dir_all(dir.path().join("garbage-dir")).unwrap();

        let keys = cache.iter_keys(None);
        assert_eq!(keys.len(), 1);
    }
}
