// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared write-temp-then-rename and directory-resolution helpers used by
//! both the raw and preprocessed caches.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use ingest_core::CacheKey;
use ingest_error::{ErrorCode, IngestError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// On-disk mirror of a [`CacheKey`], embedded in every `meta.json` /
/// `manifest.json` so a cache entry's identity survives independent of its
/// directory name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct KeyFile {
    pub config_name: String,
    pub content_hash: String,
    pub fetched_at_iso: Option<String>,
}

impl From<&CacheKey> for KeyFile {
    fn from(key: &CacheKey) -> Self {
        Self {
            config_name: key.config_name.clone(),
            content_hash: key.content_hash.clone(),
            fetched_at_iso: key.fetched_at_iso.clone(),
        }
    }
}

impl From<KeyFile> for CacheKey {
    fn from(file: KeyFile) -> Self {
        CacheKey {
            config_name: file.config_name,
            content_hash: file.content_hash,
            fetched_at_iso: file.fetched_at_iso,
        }
    }
}

/// Resolve the on-disk directory for `key` under `base`.
///
/// If `key.fetched_at_iso` is known, the directory name is deterministic.
/// Otherwise every entry under `base` is scanned for one whose name ends
/// with `key.directory_suffix()`; more than one match is reported as an
/// ambiguous [`ErrorCode::CacheMiss`] (the caller needs a timestamp to
/// disambiguate), exactly one match resolves, and zero matches is a plain
/// "not found" (`Ok(None)`).
pub(crate) fn resolve_entry(base: &Path, key: &CacheKey) -> Result<Option<PathBuf>, IngestError> {
    if let Some(name) = key.directory_name() {
        let path = base.join(name);
        return Ok(path.is_dir().then_some(path));
    }

    let suffix = key.directory_suffix();
    let mut matches = Vec::new();
    if let Ok(entries) = std::fs::read_dir(base) {
        for entry in entries.flatten() {
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(&suffix) {
                    matches.push(entry.path());
                }
            }
        }
    }

    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches.remove(0))),
        _ => Err(IngestError::new(
            ErrorCode::CacheMiss,
            format!(
                "ambiguous cache entry for suffix '{suffix}': {} candidates match, a fetched_at_iso is required to disambiguate",
                matches.len()
            ),
        )),
    }
}

/// [`resolve_entry`], turning a missing entry into a [`ErrorCode::CacheMiss`].
pub(crate) fn require_entry(base: &Path, key: &CacheKey) -> Result<PathBuf, IngestError> {
    resolve_entry(base, key)?.ok_or_else(|| {
        IngestError::new(
            ErrorCode::CacheMiss,
            format!(
                "no cache entry for config '{}' hash '{}'",
                key.config_name, key.content_hash
            ),
        )
    })
}

/// Stage writes into a sibling temp directory, invoke `write`, then rename
/// the temp directory into place as `<base>/<final_name>`. On any failure
/// the temp directory is removed before the error propagates.
pub(crate) fn write_staged_dir(
    base: &Path,
    final_name: &str,
    write: impl FnOnce(&Path) -> Result<(), IngestError>,
) -> Result<(), IngestError> {
    std::fs::create_dir_all(base).map_err(|e| {
        IngestError::new(ErrorCode::Internal, "failed to create cache base directory").with_source(e)
    })?;

    let nonce = format!(
        "{}-{}",
        std::process::id(),
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default()
    );
    let tmp_dir = base.join(format!(".tmp-{nonce}"));
    std::fs::create_dir_all(&tmp_dir).map_err(|e| {
        IngestError::new(ErrorCode::Internal, "failed to create staging directory").with_source(e)
    })?;

    let result = write(&tmp_dir);
    if let Err(err) = result {
        let _ = std::fs::remove_dir_all(&tmp_dir);
        return Err(err);
    }

    let final_dir = base.join(final_name);
    if let Err(e) = std::fs::rename(&tmp_dir, &final_dir) {
        let _ = std::fs::remove_dir_all(&tmp_dir);
        if final_dir.exists() {
            return Err(IngestError::new(
                ErrorCode::CacheConcurrentWrite,
                format!("cache entry '{final_name}' was created concurrently"),
            ));
        }
        return Err(
            IngestError::new(ErrorCode::Internal, "failed to commit staged cache entry").with_source(e),
        );
    }
    Ok(())
}

/// Write a value as JSON to `path` via write-temp-then-rename.
pub(crate) fn write_json_atomic(path: &Path, value: &impl Serialize) -> Result<(), IngestError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| {
        IngestError::new(ErrorCode::Internal, "failed to serialize cache metadata").with_source(e)
    })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &bytes).map_err(|e| {
        IngestError::new(ErrorCode::Internal, "failed to write staged metadata file").with_source(e)
    })?;
    std::fs::rename(&tmp, path).map_err(|e| {
        IngestError::new(ErrorCode::Internal, "failed to commit metadata file").with_source(e)
    })
}

/// Read and parse a JSON file, mapping I/O and parse failures onto the
/// given [`ErrorCode`] (normally [`ErrorCode::CacheCorrupted`]; a missing
/// file is always reported as [`ErrorCode::CacheMiss`] regardless).
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path, parse_error: ErrorCode) -> Result<T, IngestError> {
    let bytes = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            IngestError::new(ErrorCode::CacheMiss, format!("missing file: {}", path.display()))
        } else {
            IngestError::new(parse_error, format!("failed to read {}", path.display())).with_source(e)
        }
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        IngestError::new(parse_error, format!("malformed JSON in {}", path.display())).with_source(e)
    })
}

/// Scan `base` for direct child directories containing `meta_filename`,
/// apply `extract` to pull a [`CacheKey`] out of each, and filter by
/// `config_name` if given. Directories whose metadata can't be extracted
/// are silently skipped (not fatal — matches the source's "skip unreadable
/// entries" behavior for `iter_keys`).
pub(crate) fn iter_entry_keys(
    base: &Path,
    meta_filename: &str,
    config_name: Option<&str>,
    extract: impl Fn(&Path) -> Option<CacheKey>,
) -> Vec<CacheKey> {
    let mut keys = Vec::new();
    let Ok(entries) = std::fs::read_dir(base) else {
        return keys;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let meta_path = path.join(meta_filename);
        if !meta_path.is_file() {
            continue;
        }
        let Some(key) = extract(&meta_path) else {
            continue;
        };
        if let Some(filter) = config_name {
            if key.config_name != filter {
                continue;
            }
        }
        keys.push(key);
    }
    keys
}
