// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-flight intermediate representation passed between transform stages.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Conventional key under which every [`IrModule`] carries its discriminator.
pub const IR_KIND_FIELD: &str = "ir_kind";

/// An opaque JSON-compatible module passed from frontend to optimizer to
/// backend.
///
/// Frontends produce it, optimizers rewrite it, backends consume it; it is
/// never persisted directly — only the artifacts a backend derives from it
/// are. The conventional top-level `ir_kind` field lets stages recognize a
/// shape they don't support and fail with a typed error instead of panicking
/// on a missing field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IrModule {
    fields: BTreeMap<String, Value>,
}

impl IrModule {
    /// Build a new module with the given `ir_kind` discriminator.
    pub fn new(ir_kind: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(IR_KIND_FIELD.to_string(), Value::String(ir_kind.into()));
        Self { fields }
    }

    /// The `ir_kind` discriminator, if present and a string.
    pub fn ir_kind(&self) -> Option<&str> {
        self.fields.get(IR_KIND_FIELD).and_then(Value::as_str)
    }

    /// Set a field on the module.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Read a field by name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// All fields as a map.
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }
}
