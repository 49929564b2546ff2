// SPDX-License-Identifier: MIT OR Apache-2.0
//! Preprocessed cache (C4): transform-stage output, keyed the same way as
//! [`crate::RawCache`] but storing a directory tree of named artifacts plus
//! a manifest instead of a single opaque payload.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ingest_core::{ArtifactChecksum, ArtifactManifest, CacheKey, PreprocessedCacheMeta};
use ingest_error::{ErrorCode, IngestError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::atomic::{self, KeyFile};

const META_FILE: &str = "meta.json";
const MANIFEST_FILE: &str = "manifest.json";
const ARTIFACTS_DIR: &str = "artifacts";
const META_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ManifestFile {
    #[serde(flatten)]
    manifest: ArtifactManifest,
    key: KeyFile,
}

#[derive(Debug, Serialize, Deserialize)]
struct PreprocessedMetaFile {
    version: u32,
    built_at_iso: String,
    schema_version: u32,
    extra: serde_json::Value,
    key: KeyFile,
}

/// Store of transform-stage output: a manifest plus a directory tree of
/// named artifact files, keyed identically to the raw cache.
pub struct PreprocessedCache {
    base: PathBuf,
}

impl PreprocessedCache {
    /// Open (without creating) a preprocessed cache rooted at `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// The base directory this cache is rooted at.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Write `artifacts` (name → bytes) plus `meta` under `key`.
    ///
    /// Every artifact name is validated via
    /// [`ingest_core::cache_model::validate_artifact_name`] before any file
    /// is written. Fails with [`ErrorCode::CacheConcurrentWrite`] if the
    /// final directory already exists.
    pub fn save(
        &self,
        key: &CacheKey,
        artifacts: &BTreeMap<String, Vec<u8>>,
        meta: &PreprocessedCacheMeta,
    ) -> Result<(), IngestError> {
        let dir_name = key.directory_name().ok_or_else(|| {
            IngestError::new(
                ErrorCode::CacheMiss,
                "cannot save a preprocessed record without a fetched_at_iso timestamp on its key",
            )
        })?;

        if let Some(ts) = &key.fetched_at_iso {
            if *ts != meta.built_at_iso {
                return Err(IngestError::new(
                    ErrorCode::CacheCorrupted,
                    "key.fetched_at_iso does not match meta.built_at_iso",
                )
                .with_context("key_fetched_at_iso", ts.clone())
                .with_context("meta_built_at_iso", meta.built_at_iso.clone()));
            }
        }

        let final_dir = self.base.join(&dir_name);
        if final_dir.exists() {
            return Err(IngestError::new(
                ErrorCode::CacheConcurrentWrite,
                format!("preprocessed cache entry already exists: {dir_name}"),
            ));
        }

        for name in artifacts.keys() {
            ingest_core::cache_model::validate_artifact_name(name)
                .map_err(|reason| IngestError::new(ErrorCode::CacheCorrupted, reason))?;
        }

        let mut checksums = BTreeMap::new();
        for (name, bytes) in artifacts {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            checksums.insert(
                name.clone(),
                ArtifactChecksum {
                    algo: "sha256".to_string(),
                    hex: format!("{:x}", hasher.finalize()),
                    size_bytes: bytes.len() as u64,
                },
            );
        }
        let manifest_file = ManifestFile {
            manifest: ArtifactManifest {
                files: artifacts.keys().cloned().collect(),
                checksums,
            },
            key: KeyFile::from(key),
        };
        let meta_file = PreprocessedMetaFile {
            version: META_VERSION,
            built_at_iso: meta.built_at_iso.clone(),
            schema_version: meta.schema_version,
            extra: meta.extra.clone(),
            key: KeyFile::from(key),
        };

        atomic::write_staged_dir(&self.base, &dir_name, |tmp| {
            let artifacts_root = tmp.join(ARTIFACTS_DIR);
            for (name, bytes) in artifacts {
                let path = artifacts_root.join(name);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        IngestError::new(ErrorCode::Internal, "failed to create artifact directory")
                            .with_source(e)
                    })?;
                }
                std::fs::write(&path, bytes).map_err(|e| {
                    IngestError::new(ErrorCode::Internal, format!("failed to write artifact {name}"))
                        .with_source(e)
                })?;
            }
            atomic::write_json_atomic(&tmp.join(MANIFEST_FILE), &manifest_file)?;
            atomic::write_json_atomic(&tmp.join(META_FILE), &meta_file)?;
            Ok(())
        })
    }

    /// Load and validate the manifest for `key`.
    pub fn load_manifest(&self, key: &CacheKey) -> Result<ArtifactManifest, IngestError> {
        let dir = atomic::require_entry(&self.base, key)?;
        let file: ManifestFile = atomic::read_json(&dir.join(MANIFEST_FILE), ErrorCode::CacheCorrupted)?;
        file.manifest
            .validate_names()
            .map_err(|reason| IngestError::new(ErrorCode::CacheCorrupted, reason))?;
        Ok(file.manifest)
    }

    /// Load a single artifact's bytes, verifying its checksum against the
    /// manifest.
    pub fn load_artifact(&self, key: &CacheKey, name: &str) -> Result<Vec<u8>, IngestError> {
        ingest_core::cache_model::validate_artifact_name(name)
            .map_err(|reason| IngestError::new(ErrorCode::CacheCorrupted, reason))?;

        let dir = atomic::require_entry(&self.base, key)?;
        let file: ManifestFile = atomic::read_json(&dir.join(MANIFEST_FILE), ErrorCode::CacheCorrupted)?;
        let checksum = file.manifest.checksums.get(name).ok_or_else(|| {
            IngestError::new(ErrorCode::CacheMiss, format!("no such artifact in manifest: {name}"))
        })?;

        let bytes = std::fs::read(dir.join(ARTIFACTS_DIR).join(name)).map_err(|e| {
            IngestError::new(ErrorCode::CacheCorrupted, format!("failed to read artifact {name}"))
                .with_source(e)
        })?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let actual = format!("{:x}", hasher.finalize());
        if actual != checksum.hex {
            return Err(IngestError::new(
                ErrorCode::CacheCorrupted,
                format!("artifact '{name}' checksum mismatch"),
            )
            .with_context("expected_sha256", checksum.hex.clone())
            .with_context("actual_sha256", actual));
        }
        Ok(bytes)
    }

    /// Read and validate the metadata for `key`.
    pub fn read_meta(&self, key: &CacheKey) -> Result<PreprocessedCacheMeta, IngestError> {
        let dir = atomic::require_entry(&self.base, key)?;
        let file: PreprocessedMetaFile = atomic::read_json(&dir.join(META_FILE), ErrorCode::CacheCorrupted)?;
        if file.built_at_iso.is_empty() {
            return Err(IngestError::new(
                ErrorCode::CacheCorrupted,
                "preprocessed meta has an empty built_at_iso",
            ));
        }
        if !file.extra.is_object() && !file.extra.is_null() {
            return Err(IngestError::new(
                ErrorCode::CacheCorrupted,
                "preprocessed meta.extra must be a JSON object (or absent)",
            ));
        }
        Ok(PreprocessedCacheMeta {
            built_at_iso: file.built_at_iso,
            schema_version: file.schema_version,
            extra: file.extra,
        })
    }

    /// Enumerate keys stored in this cache, optionally filtered to a single
    /// `config_name`.
    pub fn iter_keys(&self, config_name: Option<&str>) -> Vec<CacheKey> {
        atomic::iter_entry_keys(&self.base, META_FILE, config_name, |path| {
            let meta: PreprocessedMetaFile = atomic::read_json(path, ErrorCode::CacheCorrupted).ok()?;
            Some(CacheKey::from(meta.key))
        })
    }
}
