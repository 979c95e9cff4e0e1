// crates/form-engine-core/src/core/messages.rs
// ============================================================================
// Module: Processing Messages
// Description: Validation and property-mapping results attached to elements.
// Purpose: Carry user-facing processing outcomes across requests.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Messages are expected outcomes, not faults. They are keyed by element
//! identifier in form state and shown when the page is displayed again.

use serde::Deserialize;
use serde::Serialize;

/// Message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks page advancement.
    Error,
    /// Informational, does not block.
    Warning,
    /// Informational, does not block.
    Notice,
}

/// Message produced while processing a submitted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingMessage {
    /// Severity of the message.
    pub severity: Severity,
    /// Stable machine-readable code (for example `not_empty`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl ProcessingMessage {
    /// Creates an error message.
    #[must_use]
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates a warning message.
    #[must_use]
    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns true for error severity.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}
