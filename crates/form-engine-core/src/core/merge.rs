// crates/form-engine-core/src/core/merge.rs
// ============================================================================
// Module: Configuration Merge
// Description: Recursive override-merge of associative configuration.
// Purpose: Shared merge algorithm for supertype and preset resolution.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Configuration is a JSON object. Merging an overlay onto a base follows one
//! rule set everywhere:
//! - overlapping objects merge recursively,
//! - any other overlapping value (scalars, lists, `null`) is replaced by the overlay,
//! - keys present on only one side are kept.
//!
//! Lists are never merged element-wise.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Associative configuration map.
pub type ConfigMap = Map<String, Value>;

// ============================================================================
// SECTION: Merge
// ============================================================================

/// Returns `overlay` merged onto a copy of `base`.
#[must_use]
pub fn merge(base: &ConfigMap, overlay: &ConfigMap) -> ConfigMap {
    let mut merged = base.clone();
    merge_into(&mut merged, overlay);
    merged
}

/// Merges `overlay` onto `target` in place.
pub fn merge_into(target: &mut ConfigMap, overlay: &ConfigMap) {
    for (key, incoming) in overlay {
        if let (Some(Value::Object(existing)), Value::Object(nested)) =
            (target.get_mut(key), incoming)
        {
            merge_into(existing, nested);
        } else {
            target.insert(key.clone(), incoming.clone());
        }
    }
}

/// Folds layers left to right; later layers override earlier ones.
#[must_use]
pub fn merge_all<'a, I>(layers: I) -> ConfigMap
where
    I: IntoIterator<Item = &'a ConfigMap>,
{
    let mut merged = ConfigMap::new();
    for layer in layers {
        merge_into(&mut merged, layer);
    }
    merged
}
