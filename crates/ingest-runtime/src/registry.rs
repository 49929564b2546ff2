// SPDX-License-Identifier: MIT OR Apache-2.0
//! Name-to-implementation registry shared by every extension point.

use std::collections::BTreeMap;
use std::sync::Arc;

use ingest_error::{ErrorCode, IngestError};

fn normalize_name(name: &str) -> Result<String, IngestError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(IngestError::new(
            ErrorCode::RegistryInvalidRegistration,
            "registry name must be non-empty after trimming",
        ));
    }
    Ok(trimmed.to_lowercase())
}

/// A namespace of name → implementation bindings.
///
/// Names are normalized (trimmed, lowercased) before lookup or insertion.
/// Re-registering the exact same `Arc` under a name already bound to it is
/// idempotent; binding a *different* value to an already-taken name is a
/// [`ErrorCode::RegistryDuplicate`] error. `T: ?Sized` so this same type
/// backs both function-pointer registries (`Registry<SourceCtor>`) and
/// trait-object registries (`Registry<dyn Frontend>`).
pub struct Registry<T: ?Sized> {
    namespace: String,
    items: BTreeMap<String, Arc<T>>,
}

impl<T: ?Sized> Registry<T> {
    /// Create an empty registry. `namespace` is used only for error messages.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            items: BTreeMap::new(),
        }
    }

    /// The namespace this registry was created with.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Bind `value` to `name`. Idempotent if the exact same `Arc` is already
    /// bound to this name; a different value under the same name is a
    /// duplicate-registration error.
    pub fn register(&mut self, name: &str, value: Arc<T>) -> Result<(), IngestError> {
        let key = normalize_name(name)?;
        if let Some(existing) = self.items.get(&key) {
            if Arc::ptr_eq(existing, &value) {
                return Ok(());
            }
            return Err(IngestError::new(
                ErrorCode::RegistryDuplicate,
                format!("[{}] name '{key}' is already registered", self.namespace),
            )
            .with_context("namespace", self.namespace.clone())
            .with_context("name", key));
        }
        self.items.insert(key, value);
        Ok(())
    }

    /// Look up `name`, returning `None` if nothing is registered under it.
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        let key = normalize_name(name).ok()?;
        self.items.get(&key).cloned()
    }

    /// Look up `name`, failing with [`ErrorCode::RegistryNotFound`] if
    /// nothing is registered under it.
    pub fn require(&self, name: &str) -> Result<Arc<T>, IngestError> {
        let key = normalize_name(name)?;
        self.items.get(&key).cloned().ok_or_else(|| {
            IngestError::new(
                ErrorCode::RegistryNotFound,
                format!("[{}] name '{key}' is not registered", self.namespace),
            )
            .with_context("namespace", self.namespace.clone())
            .with_context("name", key)
            .with_context("available", self.keys().join(", "))
        })
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        normalize_name(name)
            .map(|key| self.items.contains_key(&key))
            .unwrap_or(false)
    }

    /// All registered names, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }

    /// Number of registered implementations.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the registry has no registered implementations.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
