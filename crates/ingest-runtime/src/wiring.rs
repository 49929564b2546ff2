// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry wiring (C2): declares the six extension points the ingestion
//! system exposes and owns one [`Registry`] per point.
//!
//! This module imports no concrete implementation. Sources live in
//! `ingest-http`, the worked-example transform stages live in
//! [`crate::stage`]; both register themselves only via a
//! [`crate::plugin::PluginLoader`] initializer, never by this module
//! importing them directly.

use std::sync::Arc;

use ingest_error::{ErrorCode, IngestError};
use ingest_source_core::DataSource;
use serde_json::Value;

use crate::cache::{PreprocessedCacheCtor, RawCacheCtor};
use crate::registry::Registry;
use crate::stage::{Backend, Frontend, Optimizer};

/// Constructs a boxed [`DataSource`] from its declarative config.
pub type SourceCtor = fn(&Value) -> Result<Box<dyn DataSource>, IngestError>;

/// The six named registries the ingestion system wires extension points
/// through.
pub struct Wiring {
    /// Data source implementations, keyed by registry name.
    pub sources: Registry<SourceCtor>,
    /// Raw cache implementations, keyed by registry name.
    pub raw_caches: Registry<RawCacheCtor>,
    /// Preprocessed cache implementations, keyed by registry name.
    pub preprocessed_caches: Registry<PreprocessedCacheCtor>,
    /// Frontend (compiler) implementations, keyed by registry name.
    pub frontends: Registry<dyn Frontend>,
    /// Optimizer implementations, keyed by registry name.
    pub optimizers: Registry<dyn Optimizer>,
    /// Backend (emitter) implementations, keyed by registry name.
    pub backends: Registry<dyn Backend>,
}

impl Default for Wiring {
    fn default() -> Self {
        Self::new()
    }
}

impl Wiring {
    /// Declare empty registries for every extension point.
    pub fn new() -> Self {
        Self {
            sources: Registry::new("sources"),
            raw_caches: Registry::new("raw_caches"),
            preprocessed_caches: Registry::new("preprocessed_caches"),
            frontends: Registry::new("frontends"),
            optimizers: Registry::new("optimizers"),
            backends: Registry::new("backends"),
        }
    }

    /// Register a data source constructor under `name`.
    pub fn register_source(&mut self, name: &str, ctor: SourceCtor) -> Result<(), IngestError> {
        self.sources.register(name, Arc::new(ctor))
    }

    /// Register a raw cache constructor under `name`.
    pub fn register_raw_cache(&mut self, name: &str, ctor: RawCacheCtor) -> Result<(), IngestError> {
        self.raw_caches.register(name, Arc::new(ctor))
    }

    /// Register a preprocessed cache constructor under `name`.
    pub fn register_preprocessed_cache(
        &mut self,
        name: &str,
        ctor: PreprocessedCacheCtor,
    ) -> Result<(), IngestError> {
        self.preprocessed_caches.register(name, Arc::new(ctor))
    }

    /// Register a frontend implementation under `name`.
    pub fn register_frontend(&mut self, name: &str, frontend: Arc<dyn Frontend>) -> Result<(), IngestError> {
        self.frontends.register(name, frontend)
    }

    /// Register an optimizer implementation under `name`.
    pub fn register_optimizer(&mut self, name: &str, optimizer: Arc<dyn Optimizer>) -> Result<(), IngestError> {
        self.optimizers.register(name, optimizer)
    }

    /// Register a backend implementation under `name`.
    pub fn register_backend(&mut self, name: &str, backend: Arc<dyn Backend>) -> Result<(), IngestError> {
        self.backends.register(name, backend)
    }

    /// Resolve a job-declared implementation name, translating a missing
    /// registration into [`ErrorCode::ConfigUnknownImplementation`] — from a
    /// job's perspective, a name with nothing registered behind it is a
    /// configuration error, not a registry-internals error.
    fn resolve<T: ?Sized>(
        registry: &Registry<T>,
        slot: &str,
        name: &str,
    ) -> Result<Arc<T>, IngestError> {
        registry.require(name).map_err(|cause| {
            IngestError::new(
                ErrorCode::ConfigUnknownImplementation,
                format!("no {slot} implementation registered under '{name}'"),
            )
            .with_context("slot", slot.to_string())
            .with_context("name", name.to_string())
            .with_source(cause)
        })
    }

    /// Resolve a job's declared source name.
    pub fn resolve_source(&self, name: &str) -> Result<SourceCtor, IngestError> {
        Self::resolve(&self.sources, "source", name).map(|ctor| *ctor)
    }

    /// Resolve a job's declared raw cache name.
    pub fn resolve_raw_cache(&self, name: &str) -> Result<RawCacheCtor, IngestError> {
        Self::resolve(&self.raw_caches, "raw_cache", name).map(|ctor| *ctor)
    }

    /// Resolve a job's declared preprocessed cache name.
    pub fn resolve_preprocessed_cache(&self, name: &str) -> Result<PreprocessedCacheCtor, IngestError> {
        Self::resolve(&self.preprocessed_caches, "preprocessed_cache", name).map(|ctor| *ctor)
    }

    /// Resolve a job's declared frontend name.
    pub fn resolve_frontend(&self, name: &str) -> Result<Arc<dyn Frontend>, IngestError> {
        Self::resolve(&self.frontends, "frontend", name)
    }

    /// Resolve a job's declared optimizer name.
    pub fn resolve_optimizer(&self, name: &str) -> Result<Arc<dyn Optimizer>, IngestError> {
        Self::resolve(&self.optimizers, "optimizer", name)
    }

    /// Resolve a job's declared backend name.
    pub fn resolve_backend(&self, name: &str) -> Result<Arc<dyn Backend>, IngestError> {
        Self::resolve(&self.backends, "backend", name)
    }
}
