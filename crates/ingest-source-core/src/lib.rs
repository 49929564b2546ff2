// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Shared data source trait and encoding-policy helpers.

use std::collections::BTreeMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use ingest_core::RawCacheRecord;
use ingest_error::{ErrorCode, IngestError};

/// A stream of fetched records, yielded lazily as a source pages through its
/// upstream. An item may itself be an error (e.g. an unrecoverable transport
/// failure after retries are exhausted); the stream ends there.
pub type RecordStream<'a> = Pin<Box<dyn Stream<Item = Result<RawCacheRecord, IngestError>> + Send + 'a>>;

/// A pluggable data source.
///
/// Construction takes an opaque JSON option map (via the registry's
/// constructor); no config is threaded through `validate()` or `fetch()` —
/// an instance is fully configured the moment it is built.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Stable registry identifier for this source implementation.
    fn name(&self) -> &str;

    /// Static key/value description of this source instance, suitable for
    /// `list`/`doctor` output.
    fn describe(&self) -> BTreeMap<String, String>;

    /// Self-check the instance's configuration. Must fail fast, before any
    /// I/O, on anything that would make `fetch()` doomed to fail.
    async fn validate(&self) -> Result<(), IngestError>;

    /// Fetch records. Every yielded record carries a non-empty `meta` and a
    /// `payload` (possibly empty, but always present).
    fn fetch(&self) -> RecordStream<'_>;
}

/// Sentinel used in [`ingest_core::RawCacheMeta::encoding`] for payloads
/// that are not text under any codec.
pub const BINARY_ENCODING: &str = ingest_core::BINARY_ENCODING;

/// Reject a binary-encoded record for a frontend that can only consume
/// text. Per the ingestion runtime's encoding policy: a frontend that
/// requires text input must reject a `"binary"`-encoded record with a typed
/// error rather than guess a fallback decoding.
pub fn require_text(record: &RawCacheRecord) -> Result<(), IngestError> {
    if record.meta.is_binary() {
        return Err(IngestError::new(
            ErrorCode::TransformUnsupportedInput,
            format!(
                "source '{}' yielded a binary-encoded record but this frontend requires text input",
                record.meta.source_name
            ),
        )
        .with_context("source_name", record.meta.source_name.clone())
        .with_context("content_type", record.meta.content_type.clone().unwrap_or_default()));
    }
    Ok(())
}
