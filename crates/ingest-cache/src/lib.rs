// SPDX-License-Identifier: MIT OR Apache-2.0
//! Content-addressed, two-tier on-disk cache for the ingestion pipeline.
//!
//! Both tiers share one on-disk shape under a configured base directory:
//!
//! ```text
//! <base>/<safe_ts>-<config_name>-<content_hash>/
//!     meta.json
//!     payload.bin        # raw cache only
//!     manifest.json      # preprocessed cache only
//!     artifacts/<name>   # preprocessed cache only
//! ```
//!
//! `safe_ts` is `fetched_at_iso`/`built_at_iso` with the filesystem-hostile
//! characters `:` and `.` stripped (see [`ingest_core::CacheKey::safe_timestamp`]).
//! Writes are staged into a sibling temp directory and committed with a
//! single rename, so a reader never observes a partially written entry.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod atomic;
mod preprocessed;
mod raw;

pub use preprocessed::PreprocessedCache;
pub use raw::RawCache;
