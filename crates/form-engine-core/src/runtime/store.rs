// crates/form-engine-core/src/runtime/store.rs
// ============================================================================
// Module: In-Memory Form Persistence
// Description: Simple in-memory form configuration store for tests and demos.
// Purpose: Provide a deterministic persistence implementation without I/O.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! This module provides an in-memory implementation of [`FormPersistence`]
//! for tests and local demos. It is not intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use serde_json::Value;

use crate::core::identifiers::FormId;
use crate::core::merge::ConfigMap;
use crate::interfaces::FormPersistence;
use crate::interfaces::FormSummary;
use crate::interfaces::PersistenceError;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory form configuration store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryFormPersistence {
    /// Raw configurations protected by a mutex.
    forms: Arc<Mutex<BTreeMap<FormId, ConfigMap>>>,
}

impl InMemoryFormPersistence {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            forms: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }
}

impl FormPersistence for InMemoryFormPersistence {
    fn list(&self) -> Result<Vec<FormSummary>, PersistenceError> {
        let guard = self
            .forms
            .lock()
            .map_err(|_| PersistenceError::Backend("form store mutex poisoned".to_string()))?;
        Ok(guard
            .iter()
            .map(|(identifier, configuration)| FormSummary {
                identifier: identifier.clone(),
                name: configuration
                    .get("label")
                    .and_then(Value::as_str)
                    .unwrap_or(identifier.as_str())
                    .to_string(),
            })
            .collect())
    }

    fn load(&self, identifier: &FormId) -> Result<ConfigMap, PersistenceError> {
        let guard = self
            .forms
            .lock()
            .map_err(|_| PersistenceError::Backend("form store mutex poisoned".to_string()))?;
        guard.get(identifier).cloned().ok_or_else(|| PersistenceError::NotFound(identifier.to_string()))
    }

    fn save(&self, identifier: &FormId, configuration: &ConfigMap) -> Result<(), PersistenceError> {
        self.forms
            .lock()
            .map_err(|_| PersistenceError::Backend("form store mutex poisoned".to_string()))?
            .insert(identifier.clone(), configuration.clone());
        Ok(())
    }

    fn exists(&self, identifier: &FormId) -> Result<bool, PersistenceError> {
        let guard = self
            .forms
            .lock()
            .map_err(|_| PersistenceError::Backend("form store mutex poisoned".to_string()))?;
        Ok(guard.contains_key(identifier))
    }
}
