// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transform driver (C7): runs one cached raw record through the
//! frontend → optimizer → backend pipeline and saves the result.

use std::sync::Arc;

use chrono::Utc;
use ingest_cache::{PreprocessedCache, RawCache};
use ingest_core::job::validate_stage_config;
use ingest_core::{CacheKey, PreprocessedCacheMeta, TransformerSpec};
use ingest_error::IngestError;
use serde_json::json;

use crate::stage::{Backend, Frontend, Optimizer};

/// Provenance blob schema version recorded alongside every preprocessed run.
const PROVENANCE_SCHEMA_VERSION: u32 = 1;

/// Binds one job's resolved stage implementations and caches together.
pub struct TransformDriver {
    frontend: Arc<dyn Frontend>,
    optimizer: Arc<dyn Optimizer>,
    backend: Arc<dyn Backend>,
    raw_cache: RawCache,
    preprocessed_cache: PreprocessedCache,
    spec: TransformerSpec,
}

impl TransformDriver {
    /// Bind a driver to its resolved stage implementations, caches, and
    /// spec. Stages are instantiated with no arguments by the caller
    /// (typically [`crate::wiring::Wiring::resolve_frontend`] and friends);
    /// this constructor just assembles the already-resolved parts.
    pub fn new(
        frontend: Arc<dyn Frontend>,
        optimizer: Arc<dyn Optimizer>,
        backend: Arc<dyn Backend>,
        raw_cache: RawCache,
        preprocessed_cache: PreprocessedCache,
        spec: TransformerSpec,
    ) -> Self {
        Self {
            frontend,
            optimizer,
            backend,
            raw_cache,
            preprocessed_cache,
            spec,
        }
    }

    /// Run `key`'s raw record through the pipeline and save the artifacts.
    /// Returns the sorted list of artifact relative paths written.
    ///
    /// If `key` has no `fetched_at_iso`, a `built_at_iso` is computed as
    /// "now" (UTC, seconds resolution) and a new key carrying it is used for
    /// the preprocessed save; otherwise `built_at_iso` is set to the key's
    /// own timestamp, so re-running the driver against the same raw record
    /// always reproduces the same preprocessed entry.
    pub fn run(&self, key: &CacheKey) -> Result<Vec<String>, IngestError> {
        validate_stage_config(&self.spec.frontend_config).map_err(schema_mismatch)?;
        validate_stage_config(&self.spec.optimizer_config).map_err(schema_mismatch)?;
        validate_stage_config(&self.spec.backend_config).map_err(schema_mismatch)?;

        let record = self.raw_cache.load(key)?;

        let ir = self.frontend.compile(&record, &self.spec.frontend_config)?;
        let ir = self.optimizer.optimize(ir, &self.spec.optimizer_config)?;
        let artifacts = self.backend.emit(&ir, &self.spec.target, &self.spec.backend_config)?;

        let built_at_iso = match &key.fetched_at_iso {
            Some(ts) => ts.clone(),
            None => Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        };
        let effective_key = if key.fetched_at_iso.is_some() {
            key.clone()
        } else {
            key.with_timestamp(built_at_iso.clone())
        };

        let mut artifact_names: Vec<&String> = artifacts.keys().collect();
        artifact_names.sort();

        let provenance = json!({
            "frontend": format!("{}@{}", self.frontend.name(), self.frontend.version()),
            "optimizer": format!("{}@{}", self.optimizer.name(), self.optimizer.version()),
            "backend": format!("{}@{}", self.backend.name(), self.backend.version()),
            "ir_version": self.spec.ir_version,
            "js_abi_version": self.spec.target.js_abi_version,
            "content_hash": key.content_hash,
            "raw_fetched_at_iso": record.meta.fetched_at_iso,
            "diagnostics": {
                "artifact_count": artifacts.len(),
                "artifact_names": artifact_names,
            },
        });

        let meta = PreprocessedCacheMeta {
            built_at_iso,
            schema_version: PROVENANCE_SCHEMA_VERSION,
            extra: provenance,
        };

        self.preprocessed_cache.save(&effective_key, &artifacts, &meta)?;

        Ok(artifacts.keys().cloned().collect())
    }
}

fn schema_mismatch(reason: String) -> IngestError {
    IngestError::new(ingest_error::ErrorCode::TransformSchemaMismatch, reason)
}
