// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry, wiring, transform driver, and plugin loader for the ingestion
//! pipeline: the machinery that lets a source and a three-stage transform
//! pipeline be selected by name at runtime instead of wired at compile time.
//!
//! Everything in this crate is synchronous: registry lookups, stage
//! compute, and cache reads/writes never cross an `.await` point. The job
//! runner (in `ingest-runner`) is the layer that drives an async
//! [`ingest_source_core::DataSource`] and calls into this crate's
//! synchronous [`driver::TransformDriver`] for each fetched record.
#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Compiled-in initializers for the stages and caches this crate ships.
pub mod builtin;
/// Constructor type aliases for the raw and preprocessed cache registries.
pub mod cache;
/// Transform driver (C7).
pub mod driver;
/// Plugin loader (C9).
pub mod plugin;
/// Name-to-implementation registry (C1).
pub mod registry;
/// Frontend/optimizer/backend stage interfaces and worked examples.
pub mod stage;
/// Registry wiring (C2).
pub mod wiring;

pub use cache::{PreprocessedCacheCtor, RawCacheCtor};
pub use driver::TransformDriver;
pub use plugin::{Initializer, PluginLoader};
pub use registry::Registry;
pub use stage::{Backend, Frontend, Optimizer};
pub use wiring::{SourceCtor, Wiring};
