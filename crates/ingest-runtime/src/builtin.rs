// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compiled-in initializers for the implementations this crate ships
//! itself: the worked-example transform stages and the local on-disk
//! caches. Each is registered into [`crate::plugin::initializer_table`]
//! under a stable string key.

use std::sync::Arc;

use ingest_error::IngestError;

use crate::cache::{local_preprocessed_cache, local_raw_cache};
use crate::stage::{JsonArtifactBackend, JsonPassthroughFrontend, PlainOptimizer};
use crate::wiring::Wiring;

/// Registers the `json-passthrough` frontend.
pub fn init_json_passthrough_frontend(wiring: &mut Wiring) -> Result<(), IngestError> {
    wiring.register_frontend("json-passthrough", Arc::new(JsonPassthroughFrontend))
}

/// Registers the `plain` optimizer.
pub fn init_plain_optimizer(wiring: &mut Wiring) -> Result<(), IngestError> {
    wiring.register_optimizer("plain", Arc::new(PlainOptimizer))
}

/// Registers the `json-artifact` backend.
pub fn init_json_artifact_backend(wiring: &mut Wiring) -> Result<(), IngestError> {
    wiring.register_backend("json-artifact", Arc::new(JsonArtifactBackend))
}

/// Registers the `local` raw and preprocessed cache implementations.
pub fn init_local_caches(wiring: &mut Wiring) -> Result<(), IngestError> {
    wiring.register_raw_cache("local", local_raw_cache)?;
    wiring.register_preprocessed_cache("local", local_preprocessed_cache)
}

/// Registers the `http` data source (pagination, link-file, and scenario
/// fetch modes).
pub fn init_http_source(wiring: &mut Wiring) -> Result<(), IngestError> {
    wiring.register_source("http", ingest_http::construct_http_source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_builtin_initializers_register_without_error() {
        let mut wiring = Wiring::new();
        init_json_passthrough_frontend(&mut wiring).unwrap();
        init_plain_optimizer(&mut wiring).unwrap();
        init_json_artifact_backend(&mut wiring).unwrap();
        init_local_caches(&mut wiring).unwrap();
        init_http_source(&mut wiring).unwrap();

        assert!(wiring.frontends.contains("json-passthrough"));
        assert!(wiring.optimizers.contains("plain"));
        assert!(wiring.backends.contains("json-artifact"));
        assert!(wiring.raw_caches.contains("local"));
        assert!(wiring.preprocessed_caches.contains("local"));
        assert!(wiring.sources.contains("http"));
    }

    #[test]
    fn running_an_initializer_twice_is_idempotent() {
        let mut wiring = Wiring::new();
        init_plain_optimizer(&mut wiring).unwrap();
        init_plain_optimizer(&mut wiring).unwrap();
        assert_eq!(wiring.optimizers.len(), 1);
    }
}
