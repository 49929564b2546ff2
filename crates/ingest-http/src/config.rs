// SPDX-License-Identifier: MIT OR Apache-2.0
//! Declarative configuration for one [`crate::source::HttpDataSource`]
//! instance, deserialized from a job's `source.config` value.

use std::collections::BTreeMap;
use std::time::Duration;

use ingest_error::{ErrorCode, IngestError};
use ingest_retry::RetryPolicy;
use serde::Deserialize;

/// How this source instance reaches upstream.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SourceMode {
    /// OData-style `$skip` pagination: issue pages until a short page, a
    /// parse failure, or `max_pages`/`max_rows` is reached.
    Paginated {
        /// Query parameter name carrying the row offset (e.g. `"$skip"`).
        #[serde(default = "default_skip_param")]
        skip_param: String,
        /// Query parameter name carrying the page size (e.g. `"$top"`).
        #[serde(default = "default_top_param")]
        top_param: String,
        /// Number of rows requested per page.
        page_size: u64,
        /// JSON field (at the response's top level) holding the row array.
        /// When absent, the whole response body is expected to be a JSON
        /// array.
        #[serde(default)]
        rows_field: Option<String>,
        /// Stop after this many pages, regardless of the last page's size.
        #[serde(default)]
        max_pages: Option<u64>,
        /// Stop once this many total rows have been seen.
        #[serde(default)]
        max_rows: Option<u64>,
    },
    /// Two-stage discovery: GET a JSON `{"Link": "..."}` document, then GET
    /// the link, optionally unzipping the result.
    LinkFile {
        /// Maximum bytes per emitted file (whole download or zip entry); 0
        /// disables the limit.
        #[serde(default)]
        max_bytes: u64,
    },
    /// Single GET, one record, no pagination.
    Scenario,
}

fn default_skip_param() -> String {
    "$skip".to_string()
}

fn default_top_param() -> String {
    "$top".to_string()
}

/// Declarative config for one [`crate::source::HttpDataSource`] instance,
/// as it appears in a job's `source.config`.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpSourceConfig {
    /// Stable dataset identifier, carried into provenance meta.
    pub dataset: String,
    /// Request path (and, for `Paginated`/`Scenario`, any fixed query
    /// string) appended to each endpoint in turn. For `LinkFile` this is
    /// the stage-1 discovery path.
    pub path: String,
    /// Candidate base URLs tried in order (mirror rotation); must be
    /// non-empty.
    pub endpoints: Vec<String>,
    /// Extra static query parameters merged into every request.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Extra static headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Per-attempt request timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: f64,
    /// Retries after the initial attempt, per endpoint.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff delay.
    #[serde(default = "default_base_backoff_seconds")]
    pub base_backoff_seconds: f64,
    /// Backoff ceiling.
    #[serde(default = "default_max_backoff_seconds")]
    pub max_backoff_seconds: f64,
    /// Multiplicative backoff growth per attempt.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Whether to apply jitter to the computed backoff.
    #[serde(default = "default_jitter")]
    pub jitter: bool,
    /// Minimum interval between consecutive requests from this instance.
    #[serde(default = "default_min_interval_seconds")]
    pub min_interval_seconds: f64,
    /// Fetch mode.
    pub mode: SourceMode,
}

fn default_timeout_seconds() -> f64 {
    60.0
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_backoff_seconds() -> f64 {
    0.5
}

fn default_max_backoff_seconds() -> f64 {
    30.0
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

fn default_min_interval_seconds() -> f64 {
    0.1
}

impl HttpSourceConfig {
    /// Parse from a job's raw `source.config` JSON value.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, IngestError> {
        let config: Self = serde_json::from_value(value.clone()).map_err(|e| {
            IngestError::new(ErrorCode::ConfigInvalidValue, format!("invalid http source config: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), IngestError> {
        if self.dataset.trim().is_empty() {
            return Err(IngestError::new(ErrorCode::ConfigMissingField, "dataset must not be empty"));
        }
        if self.endpoints.is_empty() {
            return Err(IngestError::new(
                ErrorCode::ConfigMissingField,
                "endpoints must contain at least one base URL",
            ));
        }
        if let SourceMode::Paginated { page_size, .. } = &self.mode {
            if *page_size == 0 {
                return Err(IngestError::new(ErrorCode::ConfigInvalidValue, "page_size must be positive"));
            }
        }
        Ok(())
    }

    /// The retry policy derived from this config's backoff fields.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_backoff: Duration::from_secs_f64(self.base_backoff_seconds.max(0.0)),
            max_backoff: Duration::from_secs_f64(self.max_backoff_seconds.max(0.0)),
            backoff_factor: self.backoff_factor,
            jitter: self.jitter,
        }
    }

    /// Per-attempt request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds.max(0.0))
    }

    /// Minimum inter-request interval as a [`Duration`].
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs_f64(self.min_interval_seconds.max(0.0))
    }
}
