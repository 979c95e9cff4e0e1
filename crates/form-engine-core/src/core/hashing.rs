// crates/form-engine-core/src/core/hashing.rs
// ============================================================================
// Module: Form Engine Canonical JSON
// Description: RFC 8785 encoding, value normalization, and definition digests.
// Purpose: Give signed state and definition fingerprints one stable byte form.
// Dependencies: serde, serde_jcs, serde_json, sha2
// ============================================================================

//! ## Overview
//! Form state snapshots are signed over their canonical JSON encoding (JCS) so
//! the same logical state always produces the same bytes. Definition digests
//! are SHA-256 over the same encoding.
//!
//! JCS writes every number as the shortest IEEE-754 form, so `5.0` leaves as
//! `5` and comes back as an integer. [`canonical_value`] applies that rewrite
//! up front; values stored through it are unchanged by an encode and decode.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Number;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Digest
// ============================================================================

/// Lowercase hex SHA-256 digest of canonical bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashDigest(String);

impl HashDigest {
    /// Returns the hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HashDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while canonicalizing values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    /// JSON canonicalization failed, e.g. on a non-finite float.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Canonical JSON
// ============================================================================

/// Returns RFC 8785 canonical JSON bytes for a serializable value.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Rewrites floating-point numbers into the form a canonical decode yields.
///
/// Integral floats become integers; other floats keep their exact value.
/// Strings, booleans, and integers pass through untouched.
#[must_use]
pub fn canonical_value(value: Value) -> Value {
    match value {
        Value::Number(number) if number.is_f64() => Value::Number(canonical_number(number)),
        Value::Array(items) => Value::Array(items.into_iter().map(canonical_value).collect()),
        Value::Object(entries) => Value::Object(
            entries.into_iter().map(|(key, entry)| (key, canonical_value(entry))).collect(),
        ),
        other => other,
    }
}

/// Reparses the canonical text of a float.
fn canonical_number(number: Number) -> Number {
    serde_jcs::to_string(&number)
        .ok()
        .and_then(|text| text.parse::<Number>().ok())
        .unwrap_or(number)
}

// ============================================================================
// SECTION: Digests
// ============================================================================

/// Digests raw bytes.
#[must_use]
pub fn digest_bytes(bytes: &[u8]) -> HashDigest {
    HashDigest(format!("{:x}", Sha256::digest(bytes)))
}

/// Digests the canonical JSON form of a value.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn digest_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<HashDigest, HashError> {
    Ok(digest_bytes(&canonical_json_bytes(value)?))
}
