// SPDX-License-Identifier: MIT OR Apache-2.0
//! Declarative job and transformer configuration types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named implementation choice plus its declarative config, as it appears
/// in a job's `source`, `frontend`, `optimizer`, or `backend` slot.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct NamedConfig {
    /// Registry name of the implementation to use.
    pub name: String,
    /// Implementation-specific configuration, passed through unopened.
    pub config: Value,
}

/// The `transform` block of one job: frontend, optimizer, and backend
/// choices.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct TransformChoice {
    /// Frontend implementation and config.
    pub frontend: NamedConfig,
    /// Optimizer implementation and config.
    pub optimizer: NamedConfig,
    /// Backend implementation and config.
    pub backend: NamedConfig,
}

/// One entry of `AppConfig.jobs`: a declarative, immutable description of a
/// single ingestion run, consumed by the job runner.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct JobConfig {
    /// Unique job name within the owning `AppConfig`.
    pub name: String,
    /// Data source implementation and config.
    pub source: NamedConfig,
    /// Transform stage choices.
    pub transform: TransformChoice,
}

/// Module format a backend may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    /// ECMAScript modules.
    Esm,
    /// CommonJS modules.
    Cjs,
}

/// Artifact layout a backend may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetLayout {
    /// All output in a single artifact.
    Single,
    /// Output split across multiple sharded artifacts.
    Sharded,
}

/// Backend emission target, shared by every job unless a job's transform
/// config overrides a field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformTarget {
    /// ABI version the emitted JS artifacts must conform to.
    pub js_abi_version: u32,
    /// Module format to emit.
    pub module_format: ModuleFormat,
    /// Output artifact layout.
    pub layout: TargetLayout,
    /// Path prefix every emitted artifact name is placed under.
    pub path_prefix: String,
    /// Backend-specific free-form options.
    pub options: Value,
}

/// Fully resolved, immutable specification passed into the transform driver.
///
/// Built by the job runner from a job's [`TransformChoice`] plus the global
/// transform defaults (`ir_version`, `target`) declared in `AppConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformerSpec {
    /// Registry name of the frontend to instantiate.
    pub frontend_name: String,
    /// Registry name of the optimizer to instantiate.
    pub optimizer_name: String,
    /// Registry name of the backend to instantiate.
    pub backend_name: String,
    /// IR schema version this run is pinned to.
    pub ir_version: u32,
    /// Backend emission target.
    pub target: TransformTarget,
    /// Per-stage configuration, in frontend/optimizer/backend order.
    pub frontend_config: Value,
    /// See [`Self::frontend_config`].
    pub optimizer_config: Value,
    /// See [`Self::frontend_config`].
    pub backend_config: Value,
}

impl TransformerSpec {
    /// Build a spec from a job's transform choice and the shared defaults.
    pub fn from_choice(
        choice: &TransformChoice,
        ir_version: u32,
        target: TransformTarget,
    ) -> Self {
        Self {
            frontend_name: choice.frontend.name.clone(),
            optimizer_name: choice.optimizer.name.clone(),
            backend_name: choice.backend.name.clone(),
            ir_version,
            target,
            frontend_config: choice.frontend.config.clone(),
            optimizer_config: choice.optimizer.config.clone(),
            backend_config: choice.backend.config.clone(),
        }
    }
}

/// Validate that a stage config is "shallowly typed JSON": an object whose
/// top-level keys are strings (guaranteed by `serde_json::Value::Object`)
/// and whose values are themselves JSON-compatible (always true for a
/// parsed `Value`). The one real check is that the config is an object, not
/// a scalar or array, so stages can rely on `.get(key)` access.
pub fn validate_stage_config(config: &Value) -> Result<(), String> {
    match config {
        Value::Object(_) => Ok(()),
        Value::Null => Ok(()),
        other => Err(format!(
            "stage config must be a JSON object (or absent), got {other}"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn choice() -> TransformChoice {
        TransformChoice {
            frontend: NamedConfig {
                name: "json-passthrough".into(),
                config: json!({}),
            },
            optimizer: NamedConfig {
                name: "plain".into(),
                config: json!({}),
            },
            backend: NamedConfig {
                name: "json-artifact".into(),
                config: json!({"file_name": "output.json"}),
            },
        }
    }

    fn target() -> TransformTarget {
        TransformTarget {
            js_abi_version: 1,
            module_format: ModuleFormat::Esm,
            layout: TargetLayout::Single,
            path_prefix: "out".into(),
            options: json!({}),
        }
    }

    #[test]
    fn spec_from_choice_carries_names() {
        let spec = TransformerSpec::from_choice(&choice(), 1, target());
        assert_eq!(spec.frontend_name, "json-passthrough");
        assert_eq!(spec.optimizer_name, "plain");
        assert_eq!(spec.backend_name, "json-artifact");
        assert_eq!(spec.ir_version, 1);
    }

    #[test]
    fn validate_stage_config_accepts_object_and_null() {
        assert!(validate_stage_config(&json!({"a": 1})).is_ok());
        assert!(validate_stage_config(&Value::Null).is_ok());
    }

    #[test]
    fn validate_stage_config_rejects_scalar() {
        assert!(validate_stage_config(&json!(42)).is_err());
        assert!(validate_stage_config(&json!([1, 2])).is_err());
    }
}
