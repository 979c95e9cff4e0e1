// crates/form-engine-core/src/core/resolve.rs
// ============================================================================
// Module: Resolution Errors
// Description: Errors shared by supertype and preset resolution.
// Purpose: Fail closed on unknown, cyclic, or malformed configuration references.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! Both resolvers walk a name graph over a static registry. Missing names and
//! cycles are fatal configuration errors surfaced to the form-building caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::core::merge::ConfigMap;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration resolution errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Type name is not present in the type registry.
    #[error("type definition not found: {0}")]
    TypeNotFound(String),
    /// Preset name is not present in the preset registry.
    #[error("preset not found: {0}")]
    PresetNotFound(String),
    /// A supertype or parent-preset chain loops back on itself.
    #[error("cyclic reference: {0}")]
    CyclicReference(String),
    /// A definition exists but is not shaped as expected.
    #[error("invalid definition {name}: {reason}")]
    InvalidDefinition {
        /// Name of the offending type or preset.
        name: String,
        /// Description of the problem.
        reason: String,
    },
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Looks up `name` in `registry` and requires it to be an object.
pub(crate) fn definition_map<'a>(
    registry: &'a ConfigMap,
    name: &str,
    missing: fn(String) -> ResolveError,
) -> Result<&'a ConfigMap, ResolveError> {
    match registry.get(name) {
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(ResolveError::InvalidDefinition {
            name: name.to_string(),
            reason: "definition must be a map".to_string(),
        }),
        None => Err(missing(name.to_string())),
    }
}

/// Renders a resolution chain for error messages.
pub(crate) fn format_chain(stack: &[String], repeated: &str) -> String {
    let mut chain = stack.join(" -> ");
    if !chain.is_empty() {
        chain.push_str(" -> ");
    }
    chain.push_str(repeated);
    chain
}
