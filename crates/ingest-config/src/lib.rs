// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for the ingestion pipeline.
//!
//! This crate provides [`AppConfig`] — the fully-parsed on-disk job
//! configuration — together with helpers for loading from TOML files,
//! applying environment overrides, and producing advisory [`ConfigWarning`]s.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use ingest_core::{JobConfig, NamedConfig, TransformTarget};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A job names a transform stage implementation not yet registered by
    /// any plugin in the `plugins` list. Can only be fully resolved once
    /// the plugin loader has actually run (see `doctor`), so this is
    /// advisory, not a load-time hard error.
    UnresolvedStageName {
        /// Job name.
        job: String,
        /// Stage slot (`"source"`, `"frontend"`, `"optimizer"`, `"backend"`).
        slot: String,
        /// The implementation name that wasn't found among known plugins.
        name: String,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::UnresolvedStageName { job, slot, name } => {
                write!(
                    f,
                    "job '{job}': {slot} '{name}' is not registered by any configured plugin"
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Filesystem roots used by the pipeline.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Paths {
    /// Directory job configuration files are loaded from.
    pub configs_root: String,
    /// Root of all data (raw + preprocessed) on disk.
    pub data_root: String,
    /// Raw cache base directory.
    pub raw_root: String,
    /// Preprocessed cache base directory.
    pub preprocessed_root: String,
}

/// Batch-orchestration execution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// Run jobs one after another on the current task.
    Serial,
    /// Run jobs concurrently via a bounded thread pool.
    Threads,
    /// Accepted for on-disk compatibility; implemented identically to
    /// [`ExecutionStrategy::Threads`] in this crate.
    Processes,
}

/// Batch orchestration policy.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Execution {
    /// Number of jobs that may run concurrently under `threads`/`processes`.
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
    /// Which orchestration strategy to use.
    #[serde(default = "default_strategy")]
    pub strategy: ExecutionStrategy,
    /// Stop dispatching further jobs on the first failure.
    #[serde(default = "default_fail_fast")]
    pub fail_fast: bool,
}

fn default_parallelism() -> u32 {
    1
}

fn default_strategy() -> ExecutionStrategy {
    ExecutionStrategy::Serial
}

fn default_fail_fast() -> bool {
    true
}

impl Default for Execution {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            strategy: default_strategy(),
            fail_fast: default_fail_fast(),
        }
    }
}

/// Which raw/preprocessed cache implementation each job uses.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct CacheConfigs {
    /// Raw cache implementation and config.
    pub raw: NamedConfigSchema,
    /// Preprocessed cache implementation and config.
    pub preprocessed: NamedConfigSchema,
}

/// Global transform defaults shared by every job unless overridden.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct TransformConfigs {
    /// IR schema version every job is pinned to.
    pub ir_version: u32,
    /// Backend emission target.
    pub target: TransformTargetSchema,
}

/// JSON-Schema-derivable mirror of [`ingest_core::NamedConfig`].
///
/// `NamedConfig` lives in `ingest-core` without a `JsonSchema` derive (it
/// carries a free-form `serde_json::Value`, which `schemars` cannot derive a
/// meaningful schema for); this crate's own schema-derived wrapper is used
/// only where `AppConfig` itself needs to be schema-checked, and is
/// converted to/from the plain `NamedConfig` at the boundary.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct NamedConfigSchema {
    /// Registry name of the implementation to use.
    pub name: String,
    /// Implementation-specific configuration as a JSON string (kept opaque
    /// to schema validation; parsed by the implementation itself).
    #[serde(default)]
    pub config: serde_json::Value,
}

impl From<NamedConfigSchema> for NamedConfig {
    fn from(value: NamedConfigSchema) -> Self {
        NamedConfig {
            name: value.name,
            config: value.config,
        }
    }
}

/// JSON-Schema-derivable mirror of [`ingest_core::TransformTarget`].
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct TransformTargetSchema {
    /// ABI version the emitted JS artifacts must conform to.
    pub js_abi_version: u32,
    /// Module format to emit (`"esm"` or `"cjs"`).
    pub module_format: String,
    /// Output artifact layout (`"single"` or `"sharded"`).
    pub layout: String,
    /// Path prefix every emitted artifact name is placed under.
    pub path_prefix: String,
    /// Backend-specific free-form options.
    #[serde(default)]
    pub options: serde_json::Value,
}

impl TryFrom<TransformTargetSchema> for TransformTarget {
    type Error = String;

    fn try_from(value: TransformTargetSchema) -> Result<Self, Self::Error> {
        use ingest_core::{ModuleFormat, TargetLayout};
        let module_format = match value.module_format.as_str() {
            "esm" => ModuleFormat::Esm,
            "cjs" => ModuleFormat::Cjs,
            other => return Err(format!("unknown module_format '{other}'")),
        };
        let layout = match value.layout.as_str() {
            "single" => TargetLayout::Single,
            "sharded" => TargetLayout::Sharded,
            other => return Err(format!("unknown layout '{other}'")),
        };
        Ok(TransformTarget {
            js_abi_version: value.js_abi_version,
            module_format,
            layout,
            path_prefix: value.path_prefix,
            options: value.options,
        })
    }
}

/// The fully-parsed on-disk job configuration: paths, execution policy,
/// cache/transform defaults, the plugin list, and every job definition.
///
/// Distinct from [`ingest_core::JobConfig`] in that `AppConfig` is the whole
/// file; `JobConfig` is one entry of its `jobs` array.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Config schema version.
    pub version: u32,
    /// Deployment/environment profile name (e.g. `"dev"`, `"prod"`).
    pub profile: String,
    /// Log level; defaults to `"info"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Filesystem roots.
    pub paths: Paths,
    /// Batch orchestration policy.
    #[serde(default)]
    pub execution: Execution,
    /// Cache implementation choices.
    pub cache_configs: CacheConfigs,
    /// Transform defaults.
    pub transform_configs: TransformConfigs,
    /// Plugin names to initialize before running any job, in order.
    pub plugins: Vec<String>,
    /// Job definitions.
    pub jobs: Vec<JobConfig>,
}

fn default_log_level() -> String {
    "info".to_string()
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load an [`AppConfig`] from a TOML file path, applying environment
/// overrides on top before returning.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.display().to_string(),
    })?;
    let mut config = parse_toml(&content)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into an [`AppConfig`]. Unknown top-level keys are
/// rejected by `#[serde(deny_unknown_fields)]` on [`AppConfig`].
pub fn parse_toml(content: &str) -> Result<AppConfig, ConfigError> {
    toml::from_str::<AppConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides, read after file parse and before
/// validation; overlay always wins over the file value.
///
/// Recognised variables:
/// - `INGEST_LOG_LEVEL`
/// - `INGEST_RAW_ROOT`
/// - `INGEST_PREPROCESSED_ROOT`
/// - `INGEST_PROFILE`
pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(val) = std::env::var("INGEST_LOG_LEVEL") {
        config.log_level = val;
    }
    if let Ok(val) = std::env::var("INGEST_RAW_ROOT") {
        config.paths.raw_root = val;
    }
    if let Ok(val) = std::env::var("INGEST_PREPROCESSED_ROOT") {
        config.paths.preprocessed_root = val;
    }
    if let Ok(val) = std::env::var("INGEST_PROFILE") {
        config.profile = val;
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (unknown plugin name, empty `jobs`, duplicate job name,
/// non-positive `parallelism`, duplicate plugin entry) are returned as a
/// [`ConfigError::ValidationError`]; a job whose transform stage names
/// aren't covered by any listed plugin comes back as a soft
/// [`ConfigWarning::UnresolvedStageName`], since full resolution requires
/// the plugin loader to have actually run (re-checked by `doctor`).
///
/// `known_plugins` is the caller's compiled-in plugin table (owned by
/// `ingest-runtime`); passing an empty slice disables the "is this plugin
/// name real" check and only the structural rules below are enforced.
pub fn validate_config(
    config: &AppConfig,
    known_plugins: &[&str],
) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if config.execution.parallelism == 0 {
        errors.push("execution.parallelism must be positive".to_string());
    }

    if config.jobs.is_empty() {
        errors.push("jobs must not be empty".to_string());
    }

    let mut seen_jobs: HashSet<&str> = HashSet::new();
    for job in &config.jobs {
        if !seen_jobs.insert(job.name.as_str()) {
            errors.push(format!("duplicate job name '{}'", job.name));
        }
    }

    if config.plugins.is_empty() {
        errors.push("plugins must not be empty".to_string());
    }
    let mut seen_plugins: HashSet<&str> = HashSet::new();
    for plugin in &config.plugins {
        if !seen_plugins.insert(plugin.as_str()) {
            errors.push(format!("duplicate plugin entry '{plugin}'"));
        }
    }
    if !known_plugins.is_empty() {
        for plugin in &config.plugins {
            if !known_plugins.contains(&plugin.as_str()) {
                errors.push(format!("unknown plugin '{plugin}'"));
            }
        }
    }

    if !known_plugins.is_empty() {
        for job in &config.jobs {
            for (slot, name) in [
                ("source", &job.source.name),
                ("frontend", &job.transform.frontend.name),
                ("optimizer", &job.transform.optimizer.name),
                ("backend", &job.transform.backend.name),
            ] {
                if !known_plugins.iter().any(|p| p == name) {
                    warnings.push(ConfigWarning::UnresolvedStageName {
                        job: job.name.clone(),
                        slot: slot.to_string(),
                        name: name.clone(),
                    });
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TOML: &str = r#"
        version = 1
        profile = "dev"

        [paths]
        configs_root = "configs"
        data_root = "data"
        raw_root = "data/raw"
        preprocessed_root = "data/preprocessed"

        [cache_configs.raw]
        name = "fs-raw"

        [cache_configs.preprocessed]
        name = "fs-preprocessed"

        [transform_configs]
        ir_version = 1

        [transform_configs.target]
        js_abi_version = 1
        module_format = "esm"
        layout = "single"
        path_prefix = "out"

        plugins = ["sources::demo"]

        [[jobs]]
        name = "demo-job"

        [jobs.source]
        name = "demo-source"

        [jobs.transform.frontend]
        name = "json-passthrough"

        [jobs.transform.optimizer]
        name = "plain"

        [jobs.transform.backend]
        name = "json-artifact"
    "#;

    #[test]
    fn parses_minimal_config() {
        let cfg = parse_toml(MINIMAL_TOML).unwrap();
        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.execution.strategy, ExecutionStrategy::Serial);
        assert_eq!(cfg.execution.parallelism, 1);
        assert!(cfg.execution.fail_fast);
        assert_eq!(cfg.jobs.len(), 1);
        assert_eq!(cfg.jobs[0].name, "demo-job");
    }

    #[test]
    fn rejects_unknown_top_level_key() {
        let bad = format!("{MINIMAL_TOML}\nbogus_field = true\n");
        let err = parse_toml(&bad).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn parse_invalid_toml_gives_parse_error() {
        let err = parse_toml("this is [not valid toml =").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn validate_rejects_empty_jobs() {
        let mut cfg = parse_toml(MINIMAL_TOML).unwrap();
        cfg.jobs.clear();
        let err = validate_config(&cfg, &[]).unwrap_err();
        match err {
            ConfigError::ValidationError { reasons } => {
                assert!(reasons.iter().any(|r| r.contains("jobs must not be empty")));
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_duplicate_job_name() {
        let mut cfg = parse_toml(MINIMAL_TOML).unwrap();
        let dup = cfg.jobs[0].clone();
        cfg.jobs.push(dup);
        let err = validate_config(&cfg, &[]).unwrap_err();
        match err {
            ConfigError::ValidationError { reasons } => {
                assert!(reasons.iter().any(|r| r.contains("duplicate job name")));
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_non_positive_parallelism() {
        let mut cfg = parse_toml(MINIMAL_TOML).unwrap();
        cfg.execution.parallelism = 0;
        let err = validate_config(&cfg, &[]).unwrap_err();
        match err {
            ConfigError::ValidationError { reasons } => {
                assert!(reasons.iter().any(|r| r.contains("parallelism")));
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_unknown_plugin_when_table_given() {
        let cfg = parse_toml(MINIMAL_TOML).unwrap();
        let err = validate_config(&cfg, &["sources::other"]).unwrap_err();
        match err {
            ConfigError::ValidationError { reasons } => {
                assert!(reasons.iter().any(|r| r.contains("unknown plugin")));
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn validate_accepts_known_plugin() {
        let cfg = parse_toml(MINIMAL_TOML).unwrap();
        validate_config(&cfg, &["sources::demo"]).expect("should validate");
    }

    #[test]
    fn validate_warns_on_unresolved_stage_name() {
        let cfg = parse_toml(MINIMAL_TOML).unwrap();
        let warnings = validate_config(&cfg, &["sources::demo"]).unwrap();
        // frontend/optimizer/backend names aren't in known_plugins (they're
        // registered by the transform plugin, not a "sources::" plugin), so
        // each slot name not matching the known table produces a warning.
        assert!(
            warnings
                .iter()
                .any(|w| matches!(w, ConfigWarning::UnresolvedStageName { slot, .. } if slot == "frontend"))
        );
    }

    #[test]
    fn validate_rejects_duplicate_plugin_entry() {
        let mut cfg = parse_toml(MINIMAL_TOML).unwrap();
        cfg.plugins.push(cfg.plugins[0].clone());
        let err = validate_config(&cfg, &[]).unwrap_err();
        match err {
            ConfigError::ValidationError { reasons } => {
                assert!(reasons.iter().any(|r| r.contains("duplicate plugin entry")));
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn env_overrides_applied_after_parse() {
        let mut cfg = parse_toml(MINIMAL_TOML).unwrap();
        // SAFETY-equivalent: tests run single-threaded per-crate by default
        // under cargo test's process-per-binary model for env var access
        // here is test-local and reset at the end of this test.
        std::env::set_var("INGEST_LOG_LEVEL", "debug");
        std::env::set_var("INGEST_PROFILE", "staging");
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.profile, "staging");
        std::env::remove_var("INGEST_LOG_LEVEL");
        std::env::remove_var("INGEST_PROFILE");
    }

    #[test]
    fn load_missing_file_gives_file_not_found() {
        let err = load_config(Path::new("/nonexistent/ingest.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ingest.toml");
        std::fs::write(&path, MINIMAL_TOML).unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.version, 1);
    }

    #[test]
    fn target_schema_converts_to_core_type() {
        let schema = TransformTargetSchema {
            js_abi_version: 1,
            module_format: "esm".to_string(),
            layout: "single".to_string(),
            path_prefix: "out".to_string(),
            options: serde_json::json!({}),
        };
        let target: TransformTarget = schema.try_into().unwrap();
        assert_eq!(target.js_abi_version, 1);
    }

    #[test]
    fn target_schema_rejects_unknown_module_format() {
        let schema = TransformTargetSchema {
            js_abi_version: 1,
            module_format: "umd".to_string(),
            layout: "single".to_string(),
            path_prefix: "out".to_string(),
            options: serde_json::json!({}),
        };
        let result: Result<TransformTarget, _> = schema.try_into();
        assert!(result.is_err());
    }

    #[test]
    fn config_warning_display() {
        let w = ConfigWarning::UnresolvedStageName {
            job: "j".into(),
            slot: "frontend".into(),
            name: "unknown".into(),
        };
        let s = w.to_string();
        assert!(s.contains('j'));
        assert!(s.contains("frontend"));
        assert!(s.contains("unknown"));
    }
}
