// crates/form-engine-core/src/runtime/transport.rs
// ============================================================================
// Module: Hidden Field Transport
// Description: Carries signed state in a named hidden form field.
// Purpose: Default session transport for HTML-style round trips.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The signed snapshot is written to a hidden field on the response and read
//! back from the same field on the next request. An empty field counts as
//! no snapshot.

use crate::core::request::FormRequest;
use crate::core::request::FormResponse;
use crate::interfaces::SignedState;
use crate::interfaces::StateTransport;

/// Default hidden field name for the signed state.
pub const DEFAULT_STATE_FIELD: &str = "__state";

/// Transport storing the signed state in a hidden field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiddenFieldTransport {
    /// Hidden field name.
    field_name: String,
}

impl Default for HiddenFieldTransport {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_FIELD)
    }
}

impl HiddenFieldTransport {
    /// Creates a transport using `field_name`.
    #[must_use]
    pub fn new(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
        }
    }

    /// Returns the hidden field name.
    #[must_use]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }
}

impl StateTransport for HiddenFieldTransport {
    fn read_inbound_state(&self, request: &FormRequest) -> Option<SignedState> {
        request
            .hidden_fields
            .get(&self.field_name)
            .filter(|blob| !blob.is_empty())
            .map(|blob| SignedState::new(blob.clone()))
    }

    fn write_outbound_state(&self, response: &mut FormResponse, state: SignedState) {
        response.hidden_fields.insert(self.field_name.clone(), state.as_str().to_string());
    }
}
