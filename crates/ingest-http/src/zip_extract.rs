// SPDX-License-Identifier: MIT OR Apache-2.0
//! Zip-slip-safe archive extraction for the two-stage link-file pattern.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use ingest_error::{ErrorCode, IngestError};

/// Magic bytes that identify a zip archive.
const ZIP_SIGNATURE: &[u8; 4] = b"PK\x03\x04";

/// True if `bytes` begins with the local-file-header zip signature.
pub fn is_zip(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && &bytes[..4] == ZIP_SIGNATURE
}

/// First check: reject entry names that are absolute or contain a `..`
/// path segment, without touching the filesystem.
fn reject_traversal_segments(name: &str) -> Result<(), IngestError> {
    let normalized = name.replace('\\', "/");
    if normalized.starts_with('/') {
        return Err(zip_slip_error(name, "entry name is absolute"));
    }
    if normalized.split('/').any(|segment| segment == "..") {
        return Err(zip_slip_error(name, "entry name contains a parent-traversal segment"));
    }
    Ok(())
}

/// Second check: lexically join `name` onto a fixed virtual extraction
/// root and confirm the normalized result still lives under that root.
/// Purely lexical (no syscalls) since extracted entries are never written
/// to disk by this source — they are handed to the caller as in-memory
/// records — but it mirrors the resolved-path re-check a disk-based
/// extractor would perform, as defense in depth against the first check
/// missing an encoding quirk.
fn confirm_resolved_within_root(name: &str) -> Result<(), IngestError> {
    let root = Path::new("/extract-root");
    let mut resolved = PathBuf::from(root);
    for segment in name.replace('\\', "/").split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                if !resolved.pop() || !resolved.starts_with(root) {
                    return Err(zip_slip_error(name, "entry name resolves outside the extraction root"));
                }
            }
            other => resolved.push(other),
        }
    }
    if !resolved.starts_with(root) {
        return Err(zip_slip_error(name, "entry name resolves outside the extraction root"));
    }
    Ok(())
}

fn zip_slip_error(name: &str, reason: &str) -> IngestError {
    IngestError::new(ErrorCode::SourceZipSlip, format!("zip slip detected: {reason}"))
        .with_context("entry_name", name.to_string())
}

/// One extracted entry: its (validated) name and uncompressed bytes.
pub struct ExtractedEntry {
    /// Entry name inside the archive (forward-slash separated).
    pub name: String,
    /// Uncompressed file contents.
    pub bytes: Vec<u8>,
}

/// Extract every file entry from a zip archive held in memory, rejecting
/// any entry that would escape the (virtual) extraction root and any entry
/// whose uncompressed size exceeds `max_bytes` (when non-zero).
pub fn safe_unzip(zip_bytes: &[u8], max_bytes: u64) -> Result<Vec<ExtractedEntry>, IngestError> {
    let reader = Cursor::new(zip_bytes);
    let mut archive = zip::ZipArchive::new(reader).map_err(|e| {
        IngestError::new(ErrorCode::SourceMalformedResponse, format!("invalid zip archive: {e}"))
            .with_source(e)
    })?;

    let mut out = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| {
            IngestError::new(ErrorCode::SourceMalformedResponse, format!("unreadable zip entry at index {index}: {e}"))
                .with_source(e)
        })?;
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        reject_traversal_segments(&name)?;
        confirm_resolved_within_root(&name)?;

        let mut bytes = Vec::new();
        let limit = if max_bytes == 0 { u64::MAX } else { max_bytes + 1 };
        entry.by_ref().take(limit).read_to_end(&mut bytes).map_err(|e| {
            IngestError::new(ErrorCode::SourceMalformedResponse, format!("failed reading zip entry '{name}': {e}"))
                .with_source(e)
        })?;
        if max_bytes != 0 && bytes.len() as u64 > max_bytes {
            return Err(IngestError::new(
                ErrorCode::SourceOversizePayload,
                format!("extracted file too large: {name} exceeds {max_bytes} bytes"),
            )
            .with_context("entry_name", name.clone())
            .with_context("max_bytes", max_bytes));
        }

        out.push(ExtractedEntry { name, bytes });
    }
    Ok(out)
}
