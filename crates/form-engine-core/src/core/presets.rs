// crates/form-engine-core/src/core/presets.rs
// ============================================================================
// Module: Preset Resolution
// Description: Single-parent inheritance for form-building presets.
// Purpose: Produce the effective configuration of a named preset.
// Dependencies: crate::core::{merge, resolve}
// ============================================================================

//! ## Overview
//! A preset names at most one `parentPreset`. Resolution walks the chain up to
//! its root, then merges each child over its resolved parent with the
//! `parentPreset` key removed from the child first.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::core::merge::ConfigMap;
use crate::core::merge::merge_into;
use crate::core::resolve::ResolveError;
use crate::core::resolve::definition_map;
use crate::core::resolve::format_chain;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Key naming the parent of a preset.
pub const PARENT_PRESET_KEY: &str = "parentPreset";

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Resolves presets against a fixed preset registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresetResolver {
    /// Preset name to raw preset configuration.
    presets: ConfigMap,
}

impl PresetResolver {
    /// Creates a resolver over `presets`.
    #[must_use]
    pub const fn new(presets: ConfigMap) -> Self {
        Self {
            presets,
        }
    }

    /// Returns true when `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.presets.contains_key(name)
    }

    /// Returns the raw preset registry.
    #[must_use]
    pub const fn presets(&self) -> &ConfigMap {
        &self.presets
    }

    /// Resolves the preset called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::PresetNotFound`] when `name` or a parent is
    /// unknown and [`ResolveError::CyclicReference`] when the chain loops.
    pub fn resolve(&self, name: &str) -> Result<ConfigMap, ResolveError> {
        resolve_preset(name, &self.presets)
    }
}

/// Resolves `name` against `presets`.
///
/// # Errors
///
/// See [`PresetResolver::resolve`].
pub fn resolve_preset(name: &str, presets: &ConfigMap) -> Result<ConfigMap, ResolveError> {
    let mut chain: Vec<String> = Vec::new();
    let mut layers: Vec<ConfigMap> = Vec::new();
    let mut current = Some(name.to_string());

    while let Some(preset_name) = current {
        if chain.contains(&preset_name) {
            return Err(ResolveError::CyclicReference(format_chain(&chain, &preset_name)));
        }
        let mut layer =
            definition_map(presets, &preset_name, ResolveError::PresetNotFound)?.clone();
        current = match layer.remove(PARENT_PRESET_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::String(parent)) => Some(parent),
            Some(_) => {
                return Err(ResolveError::InvalidDefinition {
                    name: preset_name,
                    reason: "parentPreset must be a string".to_string(),
                });
            }
        };
        chain.push(preset_name);
        layers.push(layer);
    }

    let mut merged = ConfigMap::new();
    for layer in layers.iter().rev() {
        merge_into(&mut merged, layer);
    }
    Ok(merged)
}
