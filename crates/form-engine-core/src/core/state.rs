// crates/form-engine-core/src/core/state.rs
// ============================================================================
// Module: Form State
// Description: Per-session snapshot of an in-progress submission.
// Purpose: Carry page position, values, and messages across stateless requests.
// Dependencies: crate::core::{hashing, identifiers, messages}, serde, serde_json
// ============================================================================

//! ## Overview
//! [`FormState`] is the only entity that crosses requests. It travels inside a
//! versioned [`StateEnvelope`] whose canonical JSON bytes are what gets
//! signed. The envelope names the form and the definition digest so a
//! snapshot can only be restored into the definition that produced it.
//!
//! Security posture: inbound snapshots are untrusted until the signature,
//! version, form identifier, and digest all check out.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::hashing::canonical_json_bytes;
use crate::core::hashing::canonical_value;
use crate::core::identifiers::FormId;
use crate::core::identifiers::RenderableId;
use crate::core::messages::ProcessingMessage;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Current snapshot format version.
pub const STATE_FORMAT_VERSION: u32 = 1;

// ============================================================================
// SECTION: Form State
// ============================================================================

/// Serializable snapshot of one submission in progress.
///
/// # Invariants
/// - `values` never stores `null`; absence means "use the element default".
/// - `values` are held in canonical form, so a snapshot decodes back equal.
/// - `messages` never stores empty lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormState {
    /// Index of the page displayed last; `None` before the first render.
    pub last_displayed_page_index: Option<usize>,
    /// Last known value per element identifier.
    values: BTreeMap<RenderableId, Value>,
    /// Messages from the most recent processing pass per element identifier.
    messages: BTreeMap<RenderableId, Vec<ProcessingMessage>>,
}

impl FormState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when no page has been displayed yet.
    #[must_use]
    pub const fn is_first_request(&self) -> bool {
        self.last_displayed_page_index.is_none()
    }

    /// Returns the stored value for `identifier`.
    #[must_use]
    pub fn value(&self, identifier: &str) -> Option<&Value> {
        self.values.get(identifier)
    }

    /// Returns every stored value.
    #[must_use]
    pub const fn values(&self) -> &BTreeMap<RenderableId, Value> {
        &self.values
    }

    /// Stores `value` in canonical form; `null` removes the entry instead.
    pub fn set_value(&mut self, identifier: RenderableId, value: Value) {
        if value.is_null() {
            self.values.remove(&identifier);
        } else {
            self.values.insert(identifier, canonical_value(value));
        }
    }

    /// Returns the messages recorded for `identifier`.
    #[must_use]
    pub fn messages_for(&self, identifier: &str) -> &[ProcessingMessage] {
        self.messages.get(identifier).map_or(&[], Vec::as_slice)
    }

    /// Replaces the messages for `identifier`; an empty list clears them.
    pub fn set_messages(&mut self, identifier: RenderableId, messages: Vec<ProcessingMessage>) {
        if messages.is_empty() {
            self.messages.remove(&identifier);
        } else {
            self.messages.insert(identifier, messages);
        }
    }

    /// Returns true when any element carries an error message.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.messages.values().flatten().any(ProcessingMessage::is_error)
    }
}

// ============================================================================
// SECTION: State Envelope
// ============================================================================

/// Versioned wire form of a [`FormState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateEnvelope {
    /// Snapshot format version.
    pub format_version: u32,
    /// Form the snapshot belongs to.
    pub form_id: FormId,
    /// Digest of the definition the snapshot was produced with.
    pub definition_digest: HashDigest,
    /// Snapshot payload.
    pub state: FormState,
}

impl StateEnvelope {
    /// Wraps `state` for the current format version.
    #[must_use]
    pub const fn new(form_id: FormId, definition_digest: HashDigest, state: FormState) -> Self {
        Self {
            format_version: STATE_FORMAT_VERSION,
            form_id,
            definition_digest,
            state,
        }
    }

    /// Returns canonical JSON bytes for signing.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn encode(&self) -> Result<Vec<u8>, HashError> {
        canonical_json_bytes(self)
    }

    /// Decodes verified bytes and checks they belong to the expected definition.
    ///
    /// # Errors
    ///
    /// Returns [`StateIntegrityError`] when the bytes are malformed, use an
    /// unsupported version, or name another form or definition digest.
    pub fn decode(
        bytes: &[u8],
        form_id: &FormId,
        definition_digest: &HashDigest,
    ) -> Result<Self, StateIntegrityError> {
        let envelope: Self = serde_json::from_slice(bytes)
            .map_err(|err| StateIntegrityError::Malformed(err.to_string()))?;
        if envelope.format_version != STATE_FORMAT_VERSION {
            return Err(StateIntegrityError::UnsupportedVersion(envelope.format_version));
        }
        if &envelope.form_id != form_id {
            return Err(StateIntegrityError::FormMismatch {
                expected: form_id.to_string(),
                found: envelope.form_id.to_string(),
            });
        }
        if &envelope.definition_digest != definition_digest {
            return Err(StateIntegrityError::DefinitionMismatch);
        }
        Ok(envelope)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Inbound snapshot integrity failures. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateIntegrityError {
    /// Signature verification failed.
    #[error("state signature rejected: {0}")]
    Signature(String),
    /// Snapshot bytes could not be decoded.
    #[error("malformed state snapshot: {0}")]
    Malformed(String),
    /// Snapshot uses an unknown format version.
    #[error("unsupported state format version: {0}")]
    UnsupportedVersion(u32),
    /// Snapshot belongs to another form.
    #[error("state snapshot belongs to form {found}, expected {expected}")]
    FormMismatch {
        /// Identifier of the running form.
        expected: String,
        /// Identifier recorded in the snapshot.
        found: String,
    },
    /// Snapshot was produced by a different build of the definition.
    #[error("state snapshot does not match the form definition")]
    DefinitionMismatch,
    /// Snapshot exceeds the configured size limit.
    #[error("state snapshot exceeds {limit} bytes")]
    TooLarge {
        /// Configured limit in bytes.
        limit: usize,
    },
}
