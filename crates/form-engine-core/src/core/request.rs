// crates/form-engine-core/src/core/request.rs
// ============================================================================
// Module: Requests and Responses
// Description: Transport-neutral inbound request and outbound response.
// Purpose: Decouple the runtime from any HTTP or templating layer.
// Dependencies: crate::core::merge, serde
// ============================================================================

//! ## Overview
//! A [`FormRequest`] carries submitted element values, hidden fields (where
//! the signed state usually travels), and optional navigation markers.
//! `navigate_to` moves back freely but forward by at most one page. A
//! [`FormResponse`] collects what the runtime and finishers want the host to
//! send back.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::merge::ConfigMap;

// ============================================================================
// SECTION: Request
// ============================================================================

/// Inbound request for one form session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormRequest {
    /// Submitted values keyed by element identifier.
    pub values: ConfigMap,
    /// Hidden fields echoed back by the client.
    pub hidden_fields: BTreeMap<String, String>,
    /// Index of the page the client claims to submit.
    pub submitted_page: Option<usize>,
    /// Explicit page jump requested by the client.
    pub navigate_to: Option<usize>,
}

impl FormRequest {
    /// Creates an empty request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a submitted value.
    #[must_use]
    pub fn with_value(mut self, identifier: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(identifier.into(), value.into());
        self
    }

    /// Adds a hidden field.
    #[must_use]
    pub fn with_hidden_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.hidden_fields.insert(name.into(), value.into());
        self
    }

    /// Marks the request as a submission of `page_index`.
    #[must_use]
    pub const fn submitting(mut self, page_index: usize) -> Self {
        self.submitted_page = Some(page_index);
        self
    }

    /// Requests a jump to `page_index`.
    #[must_use]
    pub const fn navigating_to(mut self, page_index: usize) -> Self {
        self.navigate_to = Some(page_index);
        self
    }

    /// Returns the submitted value for `identifier`.
    #[must_use]
    pub fn value(&self, identifier: &str) -> Option<&Value> {
        self.values.get(identifier)
    }
}

// ============================================================================
// SECTION: Response
// ============================================================================

/// Redirect requested by a finisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    /// Target URI.
    pub uri: String,
    /// HTTP status code to use.
    pub status: u16,
}

/// Outbound response for one form session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormResponse {
    /// Hidden fields to embed in the next rendering.
    pub hidden_fields: BTreeMap<String, String>,
    /// Redirect requested by a finisher.
    pub redirect: Option<Redirect>,
    /// Confirmation message set by a finisher.
    pub confirmation: Option<String>,
}

impl FormResponse {
    /// Creates an empty response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
