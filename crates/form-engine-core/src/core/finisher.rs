// crates/form-engine-core/src/core/finisher.rs
// ============================================================================
// Module: Finishers
// Description: Completion actions run after the last page is submitted.
// Purpose: Provide the finisher capability, its context, and built-ins.
// Dependencies: crate::core::{definition, merge, request, state}, thiserror
// ============================================================================

//! ## Overview
//! Finishers run in declared order once a form is complete. Each receives a
//! [`FinisherContext`]; calling [`FinisherContext::cancel`] prevents every
//! finisher not yet invoked from running. The runtime only guarantees
//! ordering and cancellation, never what a finisher does.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::core::definition::FormDefinition;
use crate::core::identifiers::RenderableId;
use crate::core::merge::ConfigMap;
use crate::core::request::FormResponse;
use crate::core::request::Redirect;
use crate::core::state::FormState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Status code used by redirects without an explicit status.
pub const DEFAULT_REDIRECT_STATUS: u16 = 303;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Finisher execution failure; aborts the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FinisherError {
    /// Finisher could not complete.
    #[error("{0}")]
    Failed(String),
}

// ============================================================================
// SECTION: Context
// ============================================================================

/// View of the finished submission handed to each finisher.
#[derive(Debug)]
pub struct FinisherContext<'a> {
    /// Compiled definition.
    definition: &'a FormDefinition,
    /// Collected state.
    state: &'a FormState,
    /// Response under construction.
    response: &'a mut FormResponse,
    /// Set once a finisher cancels the chain.
    cancelled: bool,
}

impl<'a> FinisherContext<'a> {
    /// Creates a context for one chain execution.
    pub const fn new(
        definition: &'a FormDefinition,
        state: &'a FormState,
        response: &'a mut FormResponse,
    ) -> Self {
        Self {
            definition,
            state,
            response,
            cancelled: false,
        }
    }

    /// Stops every finisher not yet invoked. Idempotent.
    pub const fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Returns true once [`Self::cancel`] was called.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Returns the compiled definition.
    #[must_use]
    pub const fn definition(&self) -> &FormDefinition {
        self.definition
    }

    /// Returns the effective value of an element (state value or default).
    #[must_use]
    pub fn element_value(&self, identifier: &str) -> Option<&'a Value> {
        if let Some(value) = self.state.value(identifier) {
            return Some(value);
        }
        self.definition.element(identifier).map(|element| element.default_value())
    }

    /// Returns the collected state values.
    #[must_use]
    pub fn values(&self) -> &BTreeMap<RenderableId, Value> {
        self.state.values()
    }

    /// Returns the response for modification.
    pub const fn response_mut(&mut self) -> &mut FormResponse {
        self.response
    }
}

// ============================================================================
// SECTION: Finisher Capability
// ============================================================================

/// Completion action.
pub trait Finisher: Send + Sync + fmt::Debug {
    /// Identifier of the finisher within the chain.
    fn identifier(&self) -> &str;

    /// Performs the action.
    ///
    /// # Errors
    ///
    /// Returns [`FinisherError`] when the action fails.
    fn execute(&self, context: &mut FinisherContext<'_>) -> Result<(), FinisherError>;
}

// ============================================================================
// SECTION: Built-in Finishers
// ============================================================================

/// Requests a redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectFinisher {
    /// Chain identifier.
    pub identifier: String,
    /// Target URI.
    pub uri: String,
    /// HTTP status code.
    pub status: u16,
}

impl RedirectFinisher {
    /// Creates a redirect finisher with the default status.
    #[must_use]
    pub fn new(identifier: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            uri: uri.into(),
            status: DEFAULT_REDIRECT_STATUS,
        }
    }
}

impl Finisher for RedirectFinisher {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn execute(&self, context: &mut FinisherContext<'_>) -> Result<(), FinisherError> {
        context.response_mut().redirect = Some(Redirect {
            uri: self.uri.clone(),
            status: self.status,
        });
        Ok(())
    }
}

/// Sets a confirmation message; `{identifier}` placeholders expand to values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationFinisher {
    /// Chain identifier.
    pub identifier: String,
    /// Message template.
    pub message: String,
}

impl Finisher for ConfirmationFinisher {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn execute(&self, context: &mut FinisherContext<'_>) -> Result<(), FinisherError> {
        let message = expand_placeholders(&self.message, |name| context.element_value(name));
        context.response_mut().confirmation = Some(message);
        Ok(())
    }
}

/// Closure signature accepted by [`ClosureFinisher`].
type FinisherFn = dyn Fn(&mut FinisherContext<'_>) -> Result<(), FinisherError> + Send + Sync;

/// Wraps a closure as a finisher.
#[derive(Clone)]
pub struct ClosureFinisher {
    /// Chain identifier.
    identifier: String,
    /// Wrapped action.
    action: Arc<FinisherFn>,
}

impl ClosureFinisher {
    /// Wraps `action`.
    pub fn new<F>(identifier: impl Into<String>, action: F) -> Self
    where
        F: Fn(&mut FinisherContext<'_>) -> Result<(), FinisherError> + Send + Sync + 'static,
    {
        Self {
            identifier: identifier.into(),
            action: Arc::new(action),
        }
    }
}

impl fmt::Debug for ClosureFinisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureFinisher").field("identifier", &self.identifier).finish_non_exhaustive()
    }
}

impl Finisher for ClosureFinisher {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn execute(&self, context: &mut FinisherContext<'_>) -> Result<(), FinisherError> {
        (self.action)(context)
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Builds a finisher from its chain identifier and merged options.
pub type FinisherConstructor = fn(&str, &ConfigMap) -> Result<Arc<dyn Finisher>, String>;

/// Implementation name to finisher constructor.
#[derive(Debug, Clone)]
pub struct FinisherRegistry {
    /// Registered constructors.
    constructors: BTreeMap<String, FinisherConstructor>,
}

impl Default for FinisherRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FinisherRegistry {
    /// Creates a registry holding `redirect` and `confirmation`.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            constructors: BTreeMap::new(),
        };
        registry.register("redirect", |identifier, options| {
            let uri = options.get("uri").and_then(Value::as_str).ok_or("redirect needs a uri")?;
            let status = match options.get("statusCode") {
                None | Some(Value::Null) => DEFAULT_REDIRECT_STATUS,
                Some(value) => value
                    .as_u64()
                    .and_then(|code| u16::try_from(code).ok())
                    .ok_or("statusCode must be a valid HTTP status")?,
            };
            Ok(Arc::new(RedirectFinisher {
                identifier: identifier.to_string(),
                uri: uri.to_string(),
                status,
            }))
        });
        registry.register("confirmation", |identifier, options| {
            let message =
                options.get("message").and_then(Value::as_str).ok_or("confirmation needs a message")?;
            Ok(Arc::new(ConfirmationFinisher {
                identifier: identifier.to_string(),
                message: message.to_string(),
            }))
        });
        registry
    }

    /// Registers or replaces a constructor.
    pub fn register(&mut self, implementation: impl Into<String>, constructor: FinisherConstructor) {
        self.constructors.insert(implementation.into(), constructor);
    }

    /// Constructs a finisher, returning `None` for unknown implementations.
    ///
    /// # Errors
    ///
    /// Returns the constructor's message when options are invalid.
    pub fn create(
        &self,
        implementation: &str,
        identifier: &str,
        options: &ConfigMap,
    ) -> Option<Result<Arc<dyn Finisher>, String>> {
        self.constructors.get(implementation).map(|constructor| constructor(identifier, options))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Replaces `{name}` with the looked-up value; unknown names stay literal.
fn expand_placeholders<'v, F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<&'v Value>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[.. start]);
        let after = &rest[start + 1 ..];
        let Some(end) = after.find('}') else {
            rest = &rest[start ..];
            break;
        };
        let name = &after[.. end];
        match lookup(name) {
            Some(Value::String(text)) => out.push_str(text),
            Some(Value::Null) | None => {
                out.push('{');
                out.push_str(name);
                out.push('}');
            }
            Some(other) => out.push_str(&other.to_string()),
        }
        rest = &after[end + 1 ..];
    }
    out.push_str(rest);
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================
