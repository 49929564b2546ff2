// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! HTTP data source runtime: a single, mode-parameterized [`DataSource`]
//! covering OData-style pagination, two-stage link-file download with
//! zip-slip-safe extraction, and single-shot scenario fetches. Retry and
//! backoff are delegated to `ingest-retry`; this crate supplies the
//! transport, endpoint rotation, and response-shape handling around it.

mod client;
mod config;
mod mask;
mod source;
mod throttle;
mod zip_extract;

pub use config::{HttpSourceConfig, SourceMode};
pub use source::HttpDataSource;

use ingest_error::IngestError;
use ingest_source_core::DataSource;

/// Build a boxed [`DataSource`] from a job's raw `source.config` value.
///
/// Matches the registry's `SourceCtor` signature so it can be registered
/// directly via `Wiring::register_source`.
pub fn construct_http_source(config: &serde_json::Value) -> Result<Box<dyn DataSource>, IngestError> {
    let parsed = HttpSourceConfig::from_value(config)?;
    let source = HttpDataSource::new(parsed)?;
    Ok(Box::new(source))
}
