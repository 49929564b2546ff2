// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frontend/optimizer/backend stage interfaces and the worked-example
//! implementations (`json-passthrough`, `plain`, `json-artifact`) that
//! exercise the transform driver end to end.

use std::collections::BTreeMap;

use ingest_core::{IrModule, RawCacheRecord, TransformTarget};
use ingest_error::{ErrorCode, IngestError};
use ingest_source_core::require_text;
use serde_json::Value;

/// Compiles a raw fetched payload into an [`IrModule`].
pub trait Frontend: Send + Sync {
    /// Registry name of this frontend.
    fn name(&self) -> &str;
    /// Semantic version recorded in preprocessed-cache provenance.
    fn version(&self) -> &str;
    /// Parse `record` into an IR module, honoring `config`.
    fn compile(&self, record: &RawCacheRecord, config: &Value) -> Result<IrModule, IngestError>;
}

/// Rewrites an [`IrModule`], optionally no-op.
pub trait Optimizer: Send + Sync {
    /// Registry name of this optimizer.
    fn name(&self) -> &str;
    /// Semantic version recorded in preprocessed-cache provenance.
    fn version(&self) -> &str;
    /// Transform `module` into an equivalent or improved module.
    fn optimize(&self, module: IrModule, config: &Value) -> Result<IrModule, IngestError>;
}

/// Emits an [`IrModule`] as one or more named artifacts.
pub trait Backend: Send + Sync {
    /// Registry name of this backend.
    fn name(&self) -> &str;
    /// Semantic version recorded in preprocessed-cache provenance.
    fn version(&self) -> &str;
    /// Render `module` against `target`, honoring `config`. Returns a map of
    /// artifact relative path → bytes.
    fn emit(
        &self,
        module: &IrModule,
        target: &TransformTarget,
        config: &Value,
    ) -> Result<BTreeMap<String, Vec<u8>>, IngestError>;
}

/// Generic JSON frontend: parses the raw payload as JSON and optionally
/// extracts a single top-level key (`config.extract_key`), mirroring the
/// `DataMall { "value": [...] }` unwrap pattern from the original pipeline.
pub struct JsonPassthroughFrontend;

impl Frontend for JsonPassthroughFrontend {
    fn name(&self) -> &str {
        "json-passthrough"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn compile(&self, record: &RawCacheRecord, config: &Value) -> Result<IrModule, IngestError> {
        require_text(record)?;

        let text = std::str::from_utf8(&record.payload).map_err(|e| {
            IngestError::new(ErrorCode::TransformParseError, "payload is not valid UTF-8")
                .with_source(e)
        })?;
        let parsed: Value = serde_json::from_str(text.trim_start_matches('\u{feff}')).map_err(|e| {
            IngestError::new(ErrorCode::TransformParseError, "failed to parse JSON payload")
                .with_source(e)
        })?;

        let extract_key = config.get("extract_key").and_then(Value::as_str);
        let data = match (extract_key, &parsed) {
            (Some(key), Value::Object(map)) if map.contains_key(key) => map[key].clone(),
            _ => parsed,
        };

        Ok(IrModule::new("json_payload")
            .with_field("source_name", Value::String(record.meta.source_name.clone()))
            .with_field("fetched_at_iso", Value::String(record.meta.fetched_at_iso.clone()))
            .with_field("value", data))
    }
}

/// No-op optimizer: returns the module unchanged. Exercises the contract's
/// explicitly allowed "optimizer that does nothing" edge case.
pub struct PlainOptimizer;

impl Optimizer for PlainOptimizer {
    fn name(&self) -> &str {
        "plain"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn optimize(&self, module: IrModule, _config: &Value) -> Result<IrModule, IngestError> {
        Ok(module)
    }
}

fn join_prefix(prefix: &str, filename: &str) -> String {
    let trimmed = prefix.trim_start_matches('/');
    if trimmed.is_empty() {
        filename.to_string()
    } else {
        format!("{}/{}", trimmed.trim_end_matches('/'), filename)
    }
}

/// Serializes an IR module's `value` field back out as one named JSON
/// artifact under `target.path_prefix`.
pub struct JsonArtifactBackend;

impl Backend for JsonArtifactBackend {
    fn name(&self) -> &str {
        "json-artifact"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn emit(
        &self,
        module: &IrModule,
        target: &TransformTarget,
        config: &Value,
    ) -> Result<BTreeMap<String, Vec<u8>>, IngestError> {
        let value = module.get("value").cloned().unwrap_or(Value::Null);
        let file_name = config
            .get("file_name")
            .and_then(Value::as_str)
            .unwrap_or("output.json");

        let bytes = serde_json::to_vec_pretty(&value).map_err(|e| {
            IngestError::new(ErrorCode::TransformInvariantViolation, "failed to serialize artifact")
                .with_source(e)
        })?;

        let mut out = BTreeMap::new();
        out.insert(join_prefix(&target.path_prefix, file_name), bytes);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_core::{ModuleFormat, RawCacheMeta, TargetLayout};
    use serde_json::json;
    use std::collections::BTreeMap as Map;

    fn record(payload: &[u8], encoding: &str) -> RawCacheRecord {
        RawCacheRecord {
            payload: payload.to_vec(),
            meta: RawCacheMeta {
                source_name: "demo".into(),
                fetched_at_iso: "2026-07-28T00:00:00Z".into(),
                content_type: Some("application/json".into()),
                encoding: encoding.into(),
                cache_path: String::new(),
                meta: Map::new(),
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
    fn frontend_parses_plain_json() {
        let ir = JsonPassthroughFrontend
            .compile(&record(br#"{"a":1}"#, "utf-8"), &json!({}))
            .unwrap();
        assert_eq!(ir.get("value"), Some(&json!({"a": 1})));
    }

    #[test]
    fn frontend_extracts_configured_key() {
        let ir = JsonPassthroughFrontend
            .compile(&record(br#"{"value":[1,2,3],"other":true}"#, "utf-8"), &json!({"extract_key": "value"}))
            .unwrap();
        assert_eq!(ir.get("value"), Some(&json!([1, 2, 3])));
    }

    #[test]
    fn frontend_rejects_binary_encoding() {
        let err = JsonPassthroughFrontend
            .compile(&record(b"\x00\x01", "binary"), &json!({}))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TransformUnsupportedInput);
    }

    #[test]
    fn frontend_rejects_malformed_json() {
        let err = JsonPassthroughFrontend
            .compile(&record(b"not json", "utf-8"), &json!({}))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TransformParseError);
    }

    #[test]
    fn optimizer_is_identity() {
        let ir = IrModule::new("json_payload").with_field("value", json!(1));
        let out = PlainOptimizer.optimize(ir.clone(), &json!({})).unwrap();
        assert_eq!(ir, out);
    }

    #[test]
    fn backend_emits_single_artifact_under_prefix() {
        let ir = IrModule::new("json_payload").with_field("value", json!({"x": 1}));
        let out = JsonArtifactBackend.emit(&ir, &target(), &json!({})).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out.contains_key("out/output.json"));
    }

    #[test]
    fn backend_honors_custom_file_name() {
        let ir = IrModule::new("json_payload").with_field("value", json!(null));
        let out = JsonArtifactBackend
            .emit(&ir, &target(), &json!({"file_name": "data.json"}))
            .unwrap();
        assert!(out.contains_key("out/data.json"));
    }

    #[test]
    fn backend_handles_empty_prefix() {
        let mut bare_target = target();
        bare_target.path_prefix = String::new();
        let ir = IrModule::new("json_payload").with_field("value", json!(1));
        let out = JsonArtifactBackend.emit(&ir, &bare_target, &json!({})).unwrap();
        assert!(out.contains_key("output.json"));
    }
}
