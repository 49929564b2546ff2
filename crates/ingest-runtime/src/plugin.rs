// SPDX-License-Identifier: MIT OR Apache-2.0
//! Plugin loader (C9).
//!
//! In a statically-linked binary there is no dynamic module import:
//! "importing a plugin" is replaced by calling a known, compiled-in
//! initializer function named by a stable string key from a closed table
//! built at compile time. The loader's contract survives the translation:
//! each configured name triggers its initializer's registration side
//! effects exactly once per process, in configuration order, and an
//! unknown name is rejected before any initializer runs.

use std::collections::BTreeSet;

use ingest_error::{ErrorCode, IngestError};

use crate::builtin;
use crate::wiring::Wiring;

/// A compiled-in plugin initializer: populates one or more of `wiring`'s
/// registries.
pub type Initializer = fn(&mut Wiring) -> Result<(), IngestError>;

/// The closed table of plugin names this binary knows how to initialize.
pub fn initializer_table() -> &'static [(&'static str, Initializer)] {
    &[
        ("transform::json_passthrough", builtin::init_json_passthrough_frontend),
        ("transform::plain", builtin::init_plain_optimizer),
        ("transform::json_artifact", builtin::init_json_artifact_backend),
        ("caches::local", builtin::init_local_caches),
        ("sources::http", builtin::init_http_source),
    ]
}

fn lookup(name: &str) -> Option<Initializer> {
    initializer_table()
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, init)| *init)
}

/// Runs each configured plugin's initializer exactly once per process.
#[derive(Default)]
pub struct PluginLoader {
    loaded: BTreeSet<String>,
}

impl PluginLoader {
    /// Construct a loader with nothing yet loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate every name in `plugins` resolves to a known initializer,
    /// then run each one not already loaded, in order.
    ///
    /// Validation happens up front — before any initializer runs — so an
    /// unknown plugin name is a configuration error raised before any of
    /// this call's registration side effects take place.
    pub fn load(&mut self, wiring: &mut Wiring, plugins: &[String]) -> Result<(), IngestError> {
        for name in plugins {
            if lookup(name).is_none() {
                return Err(IngestError::new(
                    ErrorCode::PluginUnknown,
                    format!("no compiled-in initializer for plugin '{name}'"),
                )
                .with_context("name", name.clone()));
            }
        }

        for name in plugins {
            if self.loaded.contains(name) {
                continue;
            }
            let init = lookup(name).expect("validated above");
            init(wiring)?;
            self.loaded.insert(name.clone());
        }

        Ok(())
    }

    /// Names successfully loaded so far.
    pub fn loaded(&self) -> Vec<String> {
        self.loaded.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_known_plugins_in_order() {
        let mut wiring = Wiring::new();
        let mut loader = PluginLoader::new();
        loader
            .load(
                &mut wiring,
                &["transform::json_passthrough".to_string(), "transform::plain".to_string()],
            )
            .unwrap();

        assert!(wiring.frontends.contains("json-passthrough"));
        assert!(wiring.optimizers.contains("plain"));
    }

    #[test]
    fn unknown_plugin_name_is_rejected_before_any_registration() {
        let mut wiring = Wiring::new();
        let mut loader = PluginLoader::new();
        let err = loader
            .load(
                &mut wiring,
                &["transform::json_passthrough".to_string(), "transform::nonexistent".to_string()],
            )
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::PluginUnknown);
        assert!(wiring.frontends.is_empty(), "no initializer should have run");
    }

    #[test]
    fn loading_the_same_name_twice_runs_its_initializer_once() {
        let mut wiring = Wiring::new();
        let mut loader = PluginLoader::new();
        loader
            .load(&mut wiring, &["transform::plain".to_string(), "transform::plain".to_string()])
            .unwrap();
        assert_eq!(wiring.optimizers.len(), 1);
        assert_eq!(loader.loaded(), vec!["transform::plain".to_string()]);
    }

    #[test]
    fn loads_the_http_source_plugin() {
        let mut wiring = Wiring::new();
        let mut loader = PluginLoader::new();
        loader.load(&mut wiring, &["sources::http".to_string()]).unwrap();
        assert!(wiring.sources.contains("http"));
    }

    #[test]
    fn loader_state_persists_across_calls() {
        let mut wiring = Wiring::new();
        let mut loader = PluginLoader::new();
        loader.load(&mut wiring, &["transform::plain".to_string()]).unwrap();
        loader.load(&mut wiring, &["transform::plain".to_string()]).unwrap();
        assert_eq!(wiring.optimizers.len(), 1);
    }
}
