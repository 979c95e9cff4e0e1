// crates/form-engine-core/src/interfaces/mod.rs
// ============================================================================
// Module: Form Engine Interfaces
// Description: Collaborator contracts for signing, transport, rendering, and persistence.
// Purpose: Keep the runtime free of I/O and host-specific details.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! The runtime consumes narrow interfaces for everything outside its
//! deterministic core. Implementations must fail closed: a signer that cannot
//! verify a blob reports an error, it never returns empty bytes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::definition::Renderable;
use crate::core::identifiers::FormId;
use crate::core::merge::ConfigMap;
use crate::core::messages::ProcessingMessage;
use crate::core::request::FormRequest;
use crate::core::request::FormResponse;

// ============================================================================
// SECTION: Signer
// ============================================================================

/// Opaque signed state blob exchanged with clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedState(String);

impl SignedState {
    /// Wraps an encoded blob.
    #[must_use]
    pub fn new(blob: impl Into<String>) -> Self {
        Self(blob.into())
    }

    /// Returns the encoded blob.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the encoded length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for an empty blob.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Signing and verification errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SigningError {
    /// Blob is not in the expected encoding.
    #[error("invalid signed state encoding: {0}")]
    Encoding(String),
    /// Signature does not match the payload.
    #[error("signature verification failed")]
    InvalidSignature,
    /// Key material is unusable.
    #[error("signing key error: {0}")]
    Key(String),
}

/// Integrity capability for state snapshots.
pub trait StateSigner {
    /// Signs `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] when signing fails.
    fn sign(&self, payload: &[u8]) -> Result<SignedState, SigningError>;

    /// Verifies `signed` and returns the payload.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] when the blob is malformed or forged.
    fn verify(&self, signed: &SignedState) -> Result<Vec<u8>, SigningError>;
}

// ============================================================================
// SECTION: Session Transport
// ============================================================================

/// Carries the signed state between requests.
pub trait StateTransport {
    /// Extracts the inbound signed state, if the client sent one.
    fn read_inbound_state(&self, request: &FormRequest) -> Option<SignedState>;

    /// Embeds the outbound signed state in the response.
    fn write_outbound_state(&self, response: &mut FormResponse, state: SignedState);
}

// ============================================================================
// SECTION: Renderer
// ============================================================================

/// One element prepared for rendering.
#[derive(Debug, Clone)]
pub struct RenderedElement<'a> {
    /// Element view.
    pub element: Renderable<'a>,
    /// Effective value (state value or default).
    pub value: Option<&'a Value>,
    /// Messages from the most recent processing pass.
    pub messages: &'a [ProcessingMessage],
}

/// Everything a renderer needs to display the current page.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    /// Form identifier.
    pub form_id: &'a FormId,
    /// Index of the page to display.
    pub page_index: usize,
    /// Page view.
    pub page: Renderable<'a>,
    /// Page elements in pre-order.
    pub elements: Vec<RenderedElement<'a>>,
    /// Form rendering options.
    pub rendering_options: &'a ConfigMap,
    /// True when a previous page exists.
    pub has_previous_page: bool,
    /// True when a next page exists.
    pub has_next_page: bool,
}

/// Renderer errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// Renderer failed.
    #[error("render error: {0}")]
    Failed(String),
}

/// Turns a render context into host output (markup, JSON, ...).
pub trait FormRenderer {
    /// Rendered output type.
    type Output;

    /// Renders the current page.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] when rendering fails.
    fn render(&self, context: &RenderContext<'_>) -> Result<Self::Output, RenderError>;
}

// ============================================================================
// SECTION: Persistence
// ============================================================================

/// Listing entry for a persisted form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSummary {
    /// Form identifier.
    pub identifier: FormId,
    /// Display name.
    pub name: String,
}

/// Persistence errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    /// Form is not stored.
    #[error("form not found: {0}")]
    NotFound(String),
    /// Stored configuration is unusable.
    #[error("invalid form configuration: {0}")]
    Invalid(String),
    /// Backend failure.
    #[error("persistence error: {0}")]
    Backend(String),
}

/// Storage of raw form configuration; used only by the factory layer.
pub trait FormPersistence {
    /// Lists stored forms.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the backend fails.
    fn list(&self) -> Result<Vec<FormSummary>, PersistenceError>;

    /// Loads the raw configuration of `identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NotFound`] for unknown forms.
    fn load(&self, identifier: &FormId) -> Result<ConfigMap, PersistenceError>;

    /// Stores the raw configuration of `identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the backend fails.
    fn save(&self, identifier: &FormId, configuration: &ConfigMap) -> Result<(), PersistenceError>;

    /// Returns true when `identifier` is stored.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the backend fails.
    fn exists(&self, identifier: &FormId) -> Result<bool, PersistenceError>;
}
