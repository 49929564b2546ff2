// SPDX-License-Identifier: MIT OR Apache-2.0
//! The concrete HTTP data source: one [`DataSource`] implementation whose
//! fetch behavior is selected at construction time by [`SourceMode`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use ingest_core::{RawCacheMeta, RawCacheRecord};
use ingest_error::{ErrorCode, IngestError};
use ingest_source_core::{DataSource, RecordStream, BINARY_ENCODING};
use tracing::info;

use crate::client::Requester;
use crate::config::{HttpSourceConfig, SourceMode};
use crate::mask::mask_url_default;
use crate::zip_extract::{is_zip, safe_unzip};

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn run_id() -> String {
    let now = chrono::Utc::now();
    format!("{}-{:06}", now.format("%Y%m%dT%H%M%SZ"), now.timestamp_subsec_micros())
}

/// Text codec name for a content type, or [`BINARY_ENCODING`] if the type is
/// not known to be text.
fn encoding_for_content_type(content_type: Option<&str>) -> String {
    match content_type {
        Some(ct) => {
            let lower = ct.to_ascii_lowercase();
            if lower.starts_with("text/")
                || lower.contains("json")
                || lower.contains("xml")
                || lower.contains("csv")
                || lower.contains("geo+json")
            {
                "utf-8".to_string()
            } else {
                BINARY_ENCODING.to_string()
            }
        }
        None => BINARY_ENCODING.to_string(),
    }
}

/// Content type guessed from a file name, used for link-file entries whose
/// own headers don't describe the inner file.
fn guess_content_type(name: &str) -> &'static str {
    let low = name.to_ascii_lowercase();
    if low.ends_with(".csv") {
        "text/csv"
    } else if low.ends_with(".geojson") {
        "application/geo+json"
    } else if low.ends_with(".json") {
        "application/json"
    } else {
        "application/octet-stream"
    }
}

/// A single HTTP-backed data source instance.
///
/// Domain-agnostic by design: a business dataset is just a `path` and a set
/// of `endpoints` supplied through job config, not a compiled-in lookup
/// table. One type covers all three fetch shapes this runtime supports.
pub struct HttpDataSource {
    config: HttpSourceConfig,
    requester: Requester,
    /// Per-instance id, distinguishing two jobs that instantiate the same
    /// source type in logs (they never share throttling state either).
    instance_id: String,
}

impl HttpDataSource {
    /// Build an instance from a parsed [`HttpSourceConfig`].
    pub fn new(config: HttpSourceConfig) -> Result<Self, IngestError> {
        let requester = Requester::new(config.retry_policy(), config.timeout(), config.min_interval())?;
        let instance_id = uuid::Uuid::new_v4().to_string();
        Ok(Self { config, requester, instance_id })
    }

    fn base_meta(&self, content_type: Option<String>, encoding: String) -> RawCacheMeta {
        RawCacheMeta {
            source_name: self.name().to_string(),
            fetched_at_iso: now_iso(),
            content_type,
            encoding,
            cache_path: String::new(),
            meta: BTreeMap::new(),
        }
    }

    fn fetch_scenario(&self) -> RecordStream<'_> {
        Box::pin(stream::once(async move {
            let resp = self
                .requester
                .get(&self.config.endpoints, &self.config.path, &self.config.headers, &[])
                .await?;
            let encoding = encoding_for_content_type(resp.content_type.as_deref());
            let mut meta = self.base_meta(resp.content_type.clone(), encoding);
            meta.meta.insert("dataset".to_string(), self.config.dataset.clone());
            meta.meta.insert("status".to_string(), resp.status.to_string());
            meta.meta.insert("retries".to_string(), resp.retries.to_string());
            info!(
                target: "ingest.http",
                instance = %self.instance_id,
                dataset = %self.config.dataset,
                bytes = resp.body.len(),
                "scenario fetch complete"
            );
            Ok(RawCacheRecord { payload: resp.body, meta })
        }))
    }

    fn fetch_paginated<'a>(
        &'a self,
        skip_param: &'a str,
        top_param: &'a str,
        page_size: u64,
        rows_field: Option<&'a str>,
        max_pages: Option<u64>,
        max_rows: Option<u64>,
    ) -> RecordStream<'a> {
        struct State {
            skip: u64,
            rows_seen: u64,
            page: u64,
            done: bool,
        }
        let initial = State { skip: 0, rows_seen: 0, page: 0, done: false };

        let stream = stream::unfold(initial, move |mut state| async move {
            if state.done {
                return None;
            }
            if let Some(max_pages) = max_pages {
                if state.page >= max_pages {
                    return None;
                }
            }

            let query = vec![
                (skip_param.to_string(), state.skip.to_string()),
                (top_param.to_string(), page_size.to_string()),
            ];
            let mut full_query: Vec<(String, String)> =
                self.config.params.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            full_query.extend(query);

            let resp = match self
                .requester
                .get(&self.config.endpoints, &self.config.path, &self.config.headers, &full_query)
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
            };

            let parsed: serde_json::Value = match serde_json::from_slice(&resp.body) {
                Ok(v) => v,
                Err(e) => {
                    state.done = true;
                    return Some((
                        Err(IngestError::new(
                            ErrorCode::SourceMalformedResponse,
                            format!("page {} is not valid json: {e}", state.page),
                        )
                        .with_context("dataset", self.config.dataset.clone())),
                        state,
                    ));
                }
            };

            let rows = match rows_field {
                Some(field) => parsed.get(field).and_then(|v| v.as_array()).cloned(),
                None => parsed.as_array().cloned(),
            };
            let rows = match rows {
                Some(rows) => rows,
                None => {
                    state.done = true;
                    return Some((
                        Err(IngestError::new(
                            ErrorCode::SourceMalformedResponse,
                            "page response did not contain the expected row array",
                        )
                        .with_context("dataset", self.config.dataset.clone())),
                        state,
                    ));
                }
            };

            let row_count = rows.len() as u64;
            let mut meta = self.base_meta(resp.content_type.clone(), "utf-8".to_string());
            meta.meta.insert("dataset".to_string(), self.config.dataset.clone());
            meta.meta.insert("page".to_string(), state.page.to_string());
            meta.meta.insert("skip".to_string(), state.skip.to_string());
            meta.meta.insert("row_count".to_string(), row_count.to_string());
            meta.meta.insert("retries".to_string(), resp.retries.to_string());
            let record = RawCacheRecord { payload: resp.body, meta };

            state.rows_seen += row_count;
            state.page += 1;
            state.skip += page_size;

            if row_count < page_size {
                state.done = true;
            }
            if let Some(max_rows) = max_rows {
                if state.rows_seen >= max_rows {
                    state.done = true;
                }
            }

            info!(
                target: "ingest.http",
                instance = %self.instance_id,
                dataset = %self.config.dataset,
                page = state.page,
                rows = row_count,
                "fetched page"
            );

            Some((Ok(record), state))
        });

        Box::pin(stream)
    }

    fn fetch_link_file(&self, max_bytes: u64) -> RecordStream<'_> {
        Box::pin(
            stream::once(async move { self.link_file_records(max_bytes).await }).flat_map(|result| match result {
                Ok(records) => stream::iter(records.into_iter().map(Ok)).boxed(),
                Err(e) => stream::iter(vec![Err(e)]).boxed(),
            }),
        )
    }

    async fn link_file_records(&self, max_bytes: u64) -> Result<Vec<RawCacheRecord>, IngestError> {
        let stage1 = self
            .requester
            .get(&self.config.endpoints, &self.config.path, &self.config.headers, &[])
            .await?;

        let stage1_text = String::from_utf8_lossy(&stage1.body).to_string();
        let stage1_json: serde_json::Value = serde_json::from_str(&stage1_text).map_err(|e| {
            IngestError::new(ErrorCode::SourceMalformedResponse, format!("stage1 response is not valid json: {e}"))
                .with_context("dataset", self.config.dataset.clone())
        })?;
        let link = stage1_json
            .get("Link")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                IngestError::new(ErrorCode::SourceMalformedResponse, "stage1 response does not contain a 'Link' field")
                    .with_context("dataset", self.config.dataset.clone())
            })?
            .trim()
            .to_string();

        let stage2 = self.requester.get_url(&link, &self.config.headers).await?;
        let run_id = run_id();
        let masked_link = mask_url_default(&link);

        let mut provenance = BTreeMap::new();
        provenance.insert("dataset".to_string(), self.config.dataset.clone());
        provenance.insert("run_id".to_string(), run_id);
        provenance.insert("download_link_masked".to_string(), masked_link);
        provenance.insert(
            "stage1_content_type".to_string(),
            stage1.content_type.clone().unwrap_or_default(),
        );
        provenance.insert("stage1_retries".to_string(), stage1.retries.to_string());
        provenance.insert("stage2_retries".to_string(), stage2.retries.to_string());

        if !is_zip(&stage2.body) {
            if max_bytes != 0 && stage2.body.len() as u64 > max_bytes {
                return Err(IngestError::new(
                    ErrorCode::SourceOversizePayload,
                    format!("downloaded file exceeds {max_bytes} bytes"),
                )
                .with_context("dataset", self.config.dataset.clone()));
            }
            let inner_name = format!("{}.bin", self.config.dataset);
            let content_type = guess_content_type(&inner_name);
            let mut meta = self.base_meta(Some(content_type.to_string()), "utf-8".to_string());
            meta.meta = provenance;
            meta.meta.insert("inner_file".to_string(), inner_name);
            meta.meta.insert("is_zip".to_string(), "0".to_string());
            return Ok(vec![RawCacheRecord { payload: stage2.body, meta }]);
        }

        let entries = safe_unzip(&stage2.body, max_bytes)?;
        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            let content_type = guess_content_type(&entry.name);
            let mut meta = self.base_meta(Some(content_type.to_string()), "utf-8".to_string());
            meta.meta = provenance.clone();
            meta.meta.insert("inner_file".to_string(), entry.name);
            meta.meta.insert("is_zip".to_string(), "1".to_string());
            records.push(RawCacheRecord { payload: entry.bytes, meta });
        }
        info!(
            target: "ingest.http",
            instance = %self.instance_id,
            dataset = %self.config.dataset,
            entries = records.len(),
            "link-file fetch complete"
        );
        Ok(records)
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    fn name(&self) -> &str {
        "http"
    }

    fn describe(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        out.insert("source".to_string(), "http".to_string());
        out.insert("dataset".to_string(), self.config.dataset.clone());
        out.insert("endpoints".to_string(), self.config.endpoints.join(","));
        let mode = match &self.config.mode {
            SourceMode::Paginated { .. } => "paginated",
            SourceMode::LinkFile { .. } => "link_file",
            SourceMode::Scenario => "scenario",
        };
        out.insert("mode".to_string(), mode.to_string());
        out
    }

    async fn validate(&self) -> Result<(), IngestError> {
        if self.config.dataset.trim().is_empty() {
            return Err(IngestError::new(ErrorCode::ConfigMissingField, "dataset must not be empty"));
        }
        if self.config.endpoints.is_empty() {
            return Err(IngestError::new(ErrorCode::ConfigMissingField, "endpoints must be non-empty"));
        }
        Ok(())
    }

    fn fetch(&self) -> RecordStream<'_> {
        match &self.config.mode {
            SourceMode::Scenario => self.fetch_scenario(),
            SourceMode::LinkFile { max_bytes } => self.fetch_link_file(*max_bytes),
            SourceMode::Paginated {
                skip_param,
                top_param,
                page_size,
                rows_field,
                max_pages,
                max_rows,
            } => self.fetch_paginated(
                skip_param,
                top_param,
                *page_size,
                rows_field.as_deref(),
                *max_pages,
                *max_rows,
            ),
        }
    }
}
