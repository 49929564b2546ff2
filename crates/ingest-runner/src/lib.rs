// SPDX-License-Identifier: MIT OR Apache-2.0
//! Job lifecycle runner (C8).
//!
//! A [`JobRunner`] progresses through `created → prepared → running →
//! finished|failed → closed`. `prepare()` resolves and instantiates the raw
//! and preprocessed caches plus the transform driver from the job's
//! declared names; `run()` resolves and instantiates the source, validates
//! it, then drives every fetched record through cache-then-transform.
//!
//! Batch orchestration (running many jobs serially or across a thread pool,
//! honoring `fail_fast`) is not this crate's concern — it lives in the CLI's
//! `run` subcommand, which owns one [`JobRunner`] per configured job.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use futures::StreamExt;

use ingest_core::{make_cache_key, JobConfig, NamedConfig, TransformTarget, TransformerSpec};
use ingest_error::{ErrorCode, IngestError};
use ingest_runtime::{TransformDriver, Wiring};

/// State a [`JobRunner`] occupies at any moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Constructed, nothing resolved yet.
    Created,
    /// Caches and transform driver resolved and instantiated.
    Prepared,
    /// `run()` is in progress.
    Running,
    /// `run()` completed; every fetched record was cached and transformed.
    Finished,
    /// `run()` aborted on the first stage or cache failure.
    Failed,
    /// Terminal; resources released. Reachable from any other state.
    Closed,
}

/// A record of why a job failed, kept serializable for CLI/log output.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobFailure {
    /// The stable error code of the failure.
    pub code: String,
    /// Human-readable failure message.
    pub message: String,
}

impl From<&IngestError> for JobFailure {
    fn from(err: &IngestError) -> Self {
        Self {
            code: err.code.as_str().to_string(),
            message: err.message.clone(),
        }
    }
}

/// Drives one job's source through the cache-then-transform pipeline.
pub struct JobRunner {
    job: JobConfig,
    raw_cache_config: NamedConfig,
    preprocessed_cache_config: NamedConfig,
    ir_version: u32,
    target: TransformTarget,
    state: JobState,
    driver: Option<TransformDriver>,
    raw_cache: Option<ingest_cache::RawCache>,
    artifacts: Vec<String>,
    failure: Option<JobFailure>,
}

impl JobRunner {
    /// Build a runner for `job`, not yet prepared.
    pub fn new(
        job: JobConfig,
        raw_cache_config: NamedConfig,
        preprocessed_cache_config: NamedConfig,
        ir_version: u32,
        target: TransformTarget,
    ) -> Self {
        Self {
            job,
            raw_cache_config,
            preprocessed_cache_config,
            ir_version,
            target,
            state: JobState::Created,
            driver: None,
            raw_cache: None,
            artifacts: Vec::new(),
            failure: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Artifact paths written so far (populated once `run()` finishes).
    pub fn artifacts(&self) -> &[String] {
        &self.artifacts
    }

    /// Failure recorded by a failed `run()`, if any.
    pub fn failure(&self) -> Option<&JobFailure> {
        self.failure.as_ref()
    }

    /// Resolve and instantiate the raw cache, preprocessed cache, and the
    /// three transform stages, building the bound [`TransformDriver`].
    pub fn prepare(&mut self, wiring: &Wiring) -> Result<(), IngestError> {
        if self.state != JobState::Created {
            return Err(IngestError::new(
                ErrorCode::Internal,
                format!("prepare() called from state {:?}, expected Created", self.state),
            ));
        }

        let raw_ctor = wiring.resolve_raw_cache(&self.raw_cache_config.name)?;
        let raw_cache = raw_ctor(&self.raw_cache_config.config)?;
        let preprocessed_ctor = wiring.resolve_preprocessed_cache(&self.preprocessed_cache_config.name)?;
        let preprocessed_cache = preprocessed_ctor(&self.preprocessed_cache_config.config)?;

        let spec = TransformerSpec::from_choice(&self.job.transform, self.ir_version, self.target.clone());
        let frontend = wiring.resolve_frontend(&spec.frontend_name)?;
        let optimizer = wiring.resolve_optimizer(&spec.optimizer_name)?;
        let backend = wiring.resolve_backend(&spec.backend_name)?;

        // `raw_cache` is needed again in `run()` to save each fetched record,
        // while the driver only needs it to *load* a record back for
        // transforming — both must point at the same on-disk base, so keep
        // our own handle alongside the one folded into the driver.
        let raw_cache_for_save = ingest_cache::RawCache::new(raw_cache.base());
        self.driver = Some(TransformDriver::new(frontend, optimizer, backend, raw_cache, preprocessed_cache, spec));
        self.raw_cache = Some(raw_cache_for_save);
        self.state = JobState::Prepared;
        Ok(())
    }

    /// Resolve and instantiate the job's source, validate it, then fetch,
    /// cache, and transform every yielded record.
    pub async fn run(&mut self, wiring: &Wiring) -> Result<(), IngestError> {
        if self.state != JobState::Prepared {
            return Err(IngestError::new(
                ErrorCode::Internal,
                format!("run() called from state {:?}, expected Prepared", self.state),
            ));
        }
        self.state = JobState::Running;

        match self.run_inner(wiring).await {
            Ok(()) => {
                self.state = JobState::Finished;
                Ok(())
            }
            Err(err) => {
                self.failure = Some(JobFailure::from(&err));
                self.state = JobState::Failed;
                Err(err)
            }
        }
    }

    async fn run_inner(&mut self, wiring: &Wiring) -> Result<(), IngestError> {
        let source_ctor = wiring.resolve_source(&self.job.source.name)?;
        let source = source_ctor(&self.job.source.config)?;
        source.validate().await?;

        let raw_cache = self.raw_cache.as_ref().expect("prepare() sets raw_cache");
        let driver = self.driver.as_ref().expect("prepare() sets driver");

        let mut stream = source.fetch();
        while let Some(record) = stream.next().await {
            let record = record?;
            let key = make_cache_key(&self.job.name, &record, None::<&()>);
            raw_cache.save(&key, &record)?;
            let paths = driver.run(&key)?;
            tracing::debug!(target: "ingest.runner", job = %self.job.name, artifacts = paths.len(), "record transformed");
            self.artifacts.extend(paths);
        }

        Ok(())
    }

    /// Release held resources. Idempotent; safe to call from any state.
    pub fn close(&mut self) {
        self.driver = None;
        self.raw_cache = None;
        self.state = JobState::Closed;
    }
}
