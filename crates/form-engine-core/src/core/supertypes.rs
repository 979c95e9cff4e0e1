// crates/form-engine-core/src/core/supertypes.rs
// ============================================================================
// Module: Supertype Resolution
// Description: Multiple-inheritance resolution of type definitions.
// Purpose: Produce the effective configuration of a page or element type.
// Dependencies: crate::core::{merge, resolve}, serde_json
// ============================================================================

//! ## Overview
//! A type definition may list supertypes. Resolution is depth-first and left
//! to right: resolved supertypes are folded in listed order (later supertypes
//! override earlier ones) and the type's own keys are merged last. The
//! `supertypes` key never appears in a result.
//!
//! Supertypes may also be given as a `name -> bool` map. Configuration maps
//! keep their keys sorted, so enabled entries fold in alphabetical order and
//! the alphabetically last supertype wins a conflict. Use the list form when
//! precedence matters.
//!
//! Hidden keys are removed after merging, so they still participate in
//! inheritance but are filtered from introspection output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;

use crate::core::merge::ConfigMap;
use crate::core::merge::merge_into;
use crate::core::resolve::ResolveError;
use crate::core::resolve::definition_map;
use crate::core::resolve::format_chain;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Key listing the supertypes of a type definition.
pub const SUPERTYPES_KEY: &str = "supertypes";

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Resolves type definitions against a fixed registry, caching results by name.
///
/// # Invariants
/// - The registry is never mutated; cached entries are pure functions of it.
/// - Cached entries include hidden keys; filtering happens on the way out.
#[derive(Debug, Clone, Default)]
pub struct SupertypeResolver {
    /// Type name to raw definition.
    registry: ConfigMap,
    /// Keys removed from results unless hidden keys are requested.
    hidden_keys: Vec<String>,
    /// Fully merged definitions by type name.
    cache: BTreeMap<String, ConfigMap>,
}

impl SupertypeResolver {
    /// Creates a resolver over `registry`.
    #[must_use]
    pub fn new(registry: ConfigMap, hidden_keys: Vec<String>) -> Self {
        Self {
            registry,
            hidden_keys,
            cache: BTreeMap::new(),
        }
    }

    /// Returns true when `type_name` is registered.
    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.registry.contains_key(type_name)
    }

    /// Returns registered type names in registry order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.registry.keys().map(String::as_str)
    }

    /// Resolves `type_name`, stripping hidden keys unless `show_hidden`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::TypeNotFound`] for unknown names (including
    /// supertypes), [`ResolveError::CyclicReference`] for cycles, and
    /// [`ResolveError::InvalidDefinition`] for malformed definitions.
    pub fn resolve(&mut self, type_name: &str, show_hidden: bool) -> Result<ConfigMap, ResolveError> {
        let mut stack = Vec::new();
        let mut resolved = self.resolve_inner(type_name, &mut stack)?;
        if !show_hidden {
            strip_keys(&mut resolved, &self.hidden_keys);
        }
        Ok(resolved)
    }

    /// Resolves every registered type.
    ///
    /// # Errors
    ///
    /// Returns the first [`ResolveError`] encountered.
    pub fn resolve_all(
        &mut self,
        show_hidden: bool,
    ) -> Result<BTreeMap<String, ConfigMap>, ResolveError> {
        let names: Vec<String> = self.registry.keys().cloned().collect();
        let mut out = BTreeMap::new();
        for name in names {
            let resolved = self.resolve(&name, show_hidden)?;
            out.insert(name, resolved);
        }
        Ok(out)
    }

    /// Resolves a type with the current call chain on `stack`.
    fn resolve_inner(
        &mut self,
        type_name: &str,
        stack: &mut Vec<String>,
    ) -> Result<ConfigMap, ResolveError> {
        if let Some(cached) = self.cache.get(type_name) {
            return Ok(cached.clone());
        }
        if stack.iter().any(|entry| entry == type_name) {
            return Err(ResolveError::CyclicReference(format_chain(stack, type_name)));
        }
        let definition =
            definition_map(&self.registry, type_name, ResolveError::TypeNotFound)?.clone();
        let supertypes = declared_supertypes(type_name, &definition)?;

        stack.push(type_name.to_string());
        let mut merged = ConfigMap::new();
        for supertype in &supertypes {
            let resolved = self.resolve_inner(supertype, stack)?;
            merge_into(&mut merged, &resolved);
        }
        stack.pop();

        let mut own = definition;
        own.remove(SUPERTYPES_KEY);
        merge_into(&mut merged, &own);
        self.cache.insert(type_name.to_string(), merged.clone());
        Ok(merged)
    }
}

/// Resolves a single type without keeping a cache.
///
/// # Errors
///
/// See [`SupertypeResolver::resolve`].
pub fn resolve_type(
    type_name: &str,
    registry: &ConfigMap,
    hidden_keys: &[String],
    show_hidden: bool,
) -> Result<ConfigMap, ResolveError> {
    SupertypeResolver::new(registry.clone(), hidden_keys.to_vec()).resolve(type_name, show_hidden)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads the supertype list; accepts a list of names or a `name -> bool` map.
///
/// Map entries come back in key order, which is alphabetical.
fn declared_supertypes(type_name: &str, definition: &ConfigMap) -> Result<Vec<String>, ResolveError> {
    let invalid = |reason: &str| ResolveError::InvalidDefinition {
        name: type_name.to_string(),
        reason: reason.to_string(),
    };
    match definition.get(SUPERTYPES_KEY) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(entries)) => entries
            .iter()
            .map(|entry| {
                entry.as_str().map(str::to_string).ok_or_else(|| invalid("supertype names must be strings"))
            })
            .collect(),
        Some(Value::Object(entries)) => entries
            .iter()
            .filter_map(|(name, enabled)| match enabled {
                Value::Bool(true) => Some(Ok(name.clone())),
                Value::Bool(false) | Value::Null => None,
                _ => Some(Err(invalid("supertype map values must be booleans"))),
            })
            .collect(),
        Some(_) => Err(invalid("supertypes must be a list or a map")),
    }
}

/// Removes the given top-level keys.
fn strip_keys(config: &mut ConfigMap, keys: &[String]) {
    for key in keys {
        config.remove(key);
    }
}
