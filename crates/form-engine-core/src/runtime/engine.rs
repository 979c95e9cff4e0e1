// crates/form-engine-core/src/runtime/engine.rs
// ============================================================================
// Module: Form Runtime Engine
// Description: Per-request state machine driving one form session.
// Purpose: Restore state, process submissions, navigate, finish, and persist.
// Dependencies: crate::{core, interfaces, runtime::audit}, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`FormRuntime`] binds one immutable [`FormDefinition`] to one session for
//! the duration of a single request:
//!
//! 1. [`FormRuntime::initialize`] restores [`FormState`] from the transport,
//!    verifying the signature and the envelope binding first.
//! 2. [`FormRuntime::process`] decides between display, submission, explicit
//!    navigation, and completion, running processing rules and finishers.
//! 3. [`FormRuntime::finalize`] signs the state and hands it to the transport
//!    unless the form has finished.
//!
//! Security posture: inbound snapshots are untrusted; any integrity failure is
//! fatal and never degrades to a fresh session.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::core::definition::FormDefinition;
use crate::core::definition::Renderable;
use crate::core::finisher::FinisherContext;
use crate::core::hashing::HashError;
use crate::core::messages::ProcessingMessage;
use crate::core::request::FormRequest;
use crate::core::request::FormResponse;
use crate::core::state::FormState;
use crate::core::state::StateEnvelope;
use crate::core::state::StateIntegrityError;
use crate::interfaces::FormRenderer;
use crate::interfaces::RenderContext;
use crate::interfaces::RenderError;
use crate::interfaces::RenderedElement;
use crate::interfaces::SigningError;
use crate::interfaces::StateSigner;
use crate::interfaces::StateTransport;
use crate::runtime::audit::FormAuditEvent;
use crate::runtime::audit::FormAuditKind;
use crate::runtime::audit::FormAuditSink;

// ============================================================================
// SECTION: Runtime Configuration
// ============================================================================

/// Default upper bound for signed state blobs in bytes.
pub const DEFAULT_MAX_STATE_BYTES: usize = 64 * 1024;

/// Configuration for the form runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Maximum accepted size of a signed state blob, in both directions.
    pub max_state_bytes: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_state_bytes: DEFAULT_MAX_STATE_BYTES,
        }
    }
}

// ============================================================================
// SECTION: Phases and Outcomes
// ============================================================================

/// Position of the runtime within the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimePhase {
    /// No decision has been made yet.
    NotStarted,
    /// The page at this index should be displayed.
    PageDisplayed(usize),
    /// The last page was submitted and finishers ran.
    Finished,
}

/// Result of processing one page submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionReport {
    /// Submitted page index.
    pub page_index: usize,
    /// Number of error messages attached to the page's elements.
    pub error_count: usize,
}

impl SubmissionReport {
    /// Returns true when the page passed processing.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.error_count == 0
    }
}

/// Decision taken for the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeOutcome {
    /// A page should be rendered.
    DisplayPage {
        /// Page to display.
        page_index: usize,
        /// Submission processed on the way, if any.
        submission: Option<SubmissionReport>,
    },
    /// The form completed.
    Finished {
        /// Number of finishers that executed.
        finishers_run: usize,
        /// True when a finisher cancelled the rest of the chain.
        cancelled: bool,
    },
}

// ============================================================================
// SECTION: Form Runtime
// ============================================================================

/// State machine for one form session within one request.
pub struct FormRuntime<'d, S, T, A> {
    /// Shared compiled definition.
    definition: &'d FormDefinition,
    /// Snapshot integrity capability.
    signer: S,
    /// Snapshot carrier.
    transport: T,
    /// Audit sink.
    audit: A,
    /// Runtime configuration.
    config: RuntimeConfig,
    /// Session state.
    state: FormState,
    /// Current phase.
    phase: RuntimePhase,
    /// True once state was restored for this request.
    initialized: bool,
}

impl<'d, S, T, A> FormRuntime<'d, S, T, A>
where
    S: StateSigner,
    T: StateTransport,
    A: FormAuditSink,
{
    /// Creates a runtime for one request.
    #[must_use]
    pub fn new(
        definition: &'d FormDefinition,
        signer: S,
        transport: T,
        audit: A,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            definition,
            signer,
            transport,
            audit,
            config,
            state: FormState::new(),
            phase: RuntimePhase::NotStarted,
            initialized: false,
        }
    }

    /// Returns the compiled definition.
    #[must_use]
    pub const fn definition(&self) -> &'d FormDefinition {
        self.definition
    }

    /// Returns the session state.
    #[must_use]
    pub const fn state(&self) -> &FormState {
        &self.state
    }

    /// Returns the current phase.
    #[must_use]
    pub const fn phase(&self) -> RuntimePhase {
        self.phase
    }

    /// Runs initialize, process, and finalize for one request.
    ///
    /// # Errors
    ///
    /// Returns [`FormRuntimeError`] from any of the three steps.
    pub fn handle(
        &mut self,
        request: &FormRequest,
    ) -> Result<(RuntimeOutcome, FormResponse), FormRuntimeError> {
        let mut response = FormResponse::new();
        self.initialize(request)?;
        let outcome = self.process(request, &mut response)?;
        self.finalize(&mut response)?;
        Ok((outcome, response))
    }

    /// Restores state from the inbound signed snapshot, or starts fresh.
    ///
    /// Calling this more than once per request has no further effect.
    ///
    /// # Errors
    ///
    /// Returns [`FormRuntimeError::StateIntegrity`] when the snapshot is too
    /// large, forged, malformed, or bound to another form or definition.
    pub fn initialize(&mut self, request: &FormRequest) -> Result<(), FormRuntimeError> {
        if self.initialized {
            return Ok(());
        }
        let inbound = self.transport.read_inbound_state(request);
        let fresh = inbound.is_none();
        if let Some(signed) = inbound {
            if signed.len() > self.config.max_state_bytes {
                return Err(StateIntegrityError::TooLarge {
                    limit: self.config.max_state_bytes,
                }
                .into());
            }
            let payload = self
                .signer
                .verify(&signed)
                .map_err(|err| StateIntegrityError::Signature(err.to_string()))?;
            let envelope = StateEnvelope::decode(
                &payload,
                self.definition.identifier(),
                self.definition.digest(),
            )?;
            if let Some(index) = envelope.state.last_displayed_page_index
                && index >= self.definition.page_count()
            {
                return Err(StateIntegrityError::Malformed(format!(
                    "page index {index} out of range"
                ))
                .into());
            }
            self.state = envelope.state;
        }
        self.initialized = true;
        self.record(FormAuditKind::StateRestored {
            fresh,
        });
        Ok(())
    }

    /// Decides what the request does and applies it.
    ///
    /// An explicit `navigate_to` at or before the last displayed page shows
    /// that page without processing. A forward target submits the last
    /// displayed page and, when it passes, moves at most one page ahead.
    /// Before any page was displayed every valid target shows the first page.
    ///
    /// # Errors
    ///
    /// Returns [`FormRuntimeError::InvalidNavigation`] for out-of-range jumps,
    /// [`FormRuntimeError::FinisherFailed`] when a finisher fails, and
    /// [`FormRuntimeError::Finished`] when the form already finished.
    pub fn process(
        &mut self,
        request: &FormRequest,
        response: &mut FormResponse,
    ) -> Result<RuntimeOutcome, FormRuntimeError> {
        if self.phase == RuntimePhase::Finished {
            return Err(FormRuntimeError::Finished);
        }
        self.initialize(request)?;
        let page_count = self.definition.page_count();
        let last_displayed = self.state.last_displayed_page_index;

        if let Some(target) = request.navigate_to {
            if target > page_count {
                return Err(FormRuntimeError::InvalidNavigation {
                    target,
                    page_count,
                });
            }
            return match last_displayed {
                Some(last) if target > last => {
                    // Forward jumps never skip an unsubmitted page.
                    let target = target.min(last + 1);
                    self.record(FormAuditKind::NavigationOverride {
                        from: last,
                        to: target,
                    });
                    self.submit_and_move(request, response, last, target)
                }
                Some(last) => {
                    self.record(FormAuditKind::NavigationOverride {
                        from: last,
                        to: target,
                    });
                    Ok(self.display(target, None))
                }
                None if target < page_count => Ok(self.display(0, None)),
                None => Err(FormRuntimeError::InvalidNavigation {
                    target,
                    page_count,
                }),
            };
        }

        match last_displayed {
            Some(last) if self.is_submission(request, last) => {
                self.submit_and_move(request, response, last, last + 1)
            }
            Some(last) => Ok(self.display(last, None)),
            None => Ok(self.display(0, None)),
        }
    }

    /// Signs the state and hands it to the transport unless finished.
    ///
    /// # Errors
    ///
    /// Returns [`FormRuntimeError::Hash`], [`FormRuntimeError::Signing`], or
    /// [`FormRuntimeError::StateTooLarge`].
    pub fn finalize(&mut self, response: &mut FormResponse) -> Result<(), FormRuntimeError> {
        if self.phase == RuntimePhase::Finished {
            return Ok(());
        }
        let envelope = StateEnvelope::new(
            self.definition.identifier().clone(),
            self.definition.digest().clone(),
            self.state.clone(),
        );
        let signed = self.signer.sign(&envelope.encode()?)?;
        if signed.len() > self.config.max_state_bytes {
            return Err(FormRuntimeError::StateTooLarge {
                size: signed.len(),
                limit: self.config.max_state_bytes,
            });
        }
        self.record(FormAuditKind::StateWritten {
            bytes: signed.len(),
        });
        self.transport.write_outbound_state(response, signed);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Value access
    // ------------------------------------------------------------------------

    /// Returns the effective value of an element: state value, else default.
    ///
    /// # Errors
    ///
    /// Returns [`FormRuntimeError::ElementNotFound`] for unknown identifiers.
    pub fn element_value(&self, identifier: &str) -> Result<&Value, FormRuntimeError> {
        let element = self
            .definition
            .element(identifier)
            .ok_or_else(|| FormRuntimeError::ElementNotFound(identifier.to_string()))?;
        Ok(self.state.value(identifier).unwrap_or_else(|| element.default_value()))
    }

    /// Stores a value; `null` reverts the element to its default.
    ///
    /// # Errors
    ///
    /// Returns [`FormRuntimeError::ElementNotFound`] for unknown identifiers.
    pub fn set_element_value(&mut self, identifier: &str, value: Value) -> Result<(), FormRuntimeError> {
        let element = self
            .definition
            .element(identifier)
            .ok_or_else(|| FormRuntimeError::ElementNotFound(identifier.to_string()))?;
        self.state.set_value(element.identifier().clone(), value);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    /// Returns the index of the page the runtime currently points at.
    #[must_use]
    pub fn current_page_index(&self) -> Option<usize> {
        match self.phase {
            RuntimePhase::PageDisplayed(index) => Some(index),
            RuntimePhase::Finished => None,
            RuntimePhase::NotStarted => Some(self.state.last_displayed_page_index.unwrap_or(0)),
        }
    }

    /// Returns the current page.
    #[must_use]
    pub fn current_page(&self) -> Option<Renderable<'d>> {
        self.current_page_index().and_then(|index| self.definition.page(index))
    }

    /// Returns the page before the current one.
    #[must_use]
    pub fn previous_page(&self) -> Option<Renderable<'d>> {
        self.current_page_index().and_then(|index| self.definition.previous_page(index))
    }

    /// Returns the page after the current one.
    #[must_use]
    pub fn next_page(&self) -> Option<Renderable<'d>> {
        self.current_page_index().and_then(|index| self.definition.next_page(index))
    }

    // ------------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------------

    /// Builds the render context for the current page.
    ///
    /// # Errors
    ///
    /// Returns [`FormRuntimeError::Finished`] once the form has finished.
    pub fn render_context(&self) -> Result<RenderContext<'_>, FormRuntimeError> {
        let page_index = self.current_page_index().ok_or(FormRuntimeError::Finished)?;
        let page = self.definition.page(page_index).ok_or(FormRuntimeError::Finished)?;
        let elements = self
            .definition
            .elements_of(page_index)
            .into_iter()
            .map(|element| {
                let identifier = element.identifier().as_str();
                let value = self
                    .state
                    .value(identifier)
                    .or_else(|| Some(element.default_value()).filter(|value| !value.is_null()));
                RenderedElement {
                    element,
                    value,
                    messages: self.state.messages_for(identifier),
                }
            })
            .collect();
        Ok(RenderContext {
            form_id: self.definition.identifier(),
            page_index,
            page,
            elements,
            rendering_options: self.definition.rendering_options(),
            has_previous_page: self.definition.previous_page(page_index).is_some(),
            has_next_page: self.definition.next_page(page_index).is_some(),
        })
    }

    /// Renders the current page with `renderer`.
    ///
    /// # Errors
    ///
    /// Returns [`FormRuntimeError::Finished`] or [`FormRuntimeError::Render`].
    pub fn render_with<R: FormRenderer>(&self, renderer: &R) -> Result<R::Output, FormRuntimeError> {
        let context = self.render_context()?;
        Ok(renderer.render(&context)?)
    }

    // ------------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------------

    /// Returns true when `request` submits the page at `last`.
    fn is_submission(&self, request: &FormRequest, last: usize) -> bool {
        match request.submitted_page {
            Some(page) => page == last,
            None => self
                .definition
                .elements_of(last)
                .iter()
                .any(|element| element.has_value() && request.value(element.identifier().as_str()).is_some()),
        }
    }

    /// Submits `page`, then moves to `target` or finishes when it is past the end.
    fn submit_and_move(
        &mut self,
        request: &FormRequest,
        response: &mut FormResponse,
        page: usize,
        target: usize,
    ) -> Result<RuntimeOutcome, FormRuntimeError> {
        let report = self.process_page(request, page);
        if !report.is_valid() {
            return Ok(self.display(page, Some(report)));
        }
        if target >= self.definition.page_count() {
            return self.finish(response);
        }
        Ok(self.display(target, Some(report)))
    }

    /// Applies processing rules to every value-bearing element of `page`.
    fn process_page(&mut self, request: &FormRequest, page: usize) -> SubmissionReport {
        let definition = self.definition;
        let mut error_count = 0;
        for element in definition.elements_of(page) {
            if !element.has_value() {
                continue;
            }
            let identifier = element.identifier();
            let Some(rule) = definition.processing_rule(identifier.as_str()) else {
                continue;
            };
            let messages: Vec<ProcessingMessage> =
                match element.kind().on_submit(request.value(identifier.as_str())) {
                    Ok(value) => {
                        let outcome = rule.process(&value);
                        self.state.set_value(identifier.clone(), outcome.value);
                        outcome.messages
                    }
                    Err(message) => {
                        self.state.set_value(identifier.clone(), Value::Null);
                        vec![message]
                    }
                };
            error_count += messages.iter().filter(|message| message.is_error()).count();
            self.state.set_messages(identifier.clone(), messages);
        }
        self.record(FormAuditKind::PageSubmitted {
            page_index: page,
            error_count,
        });
        SubmissionReport {
            page_index: page,
            error_count,
        }
    }

    /// Marks `page` as displayed.
    fn display(&mut self, page: usize, submission: Option<SubmissionReport>) -> RuntimeOutcome {
        self.state.last_displayed_page_index = Some(page);
        self.phase = RuntimePhase::PageDisplayed(page);
        self.record(FormAuditKind::PageDisplayed {
            page_index: page,
        });
        RuntimeOutcome::DisplayPage {
            page_index: page,
            submission,
        }
    }

    /// Runs the finisher chain in order until completion or cancellation.
    fn finish(&mut self, response: &mut FormResponse) -> Result<RuntimeOutcome, FormRuntimeError> {
        let mut finishers_run = 0;
        let mut context = FinisherContext::new(self.definition, &self.state, response);
        for finisher in self.definition.finishers() {
            if context.is_cancelled() {
                break;
            }
            self.record(FormAuditKind::FinisherInvoked {
                finisher: finisher.identifier().to_string(),
            });
            finisher.execute(&mut context).map_err(|err| FormRuntimeError::FinisherFailed {
                identifier: finisher.identifier().to_string(),
                reason: err.to_string(),
            })?;
            finishers_run += 1;
            if context.is_cancelled() {
                self.record(FormAuditKind::FinisherChainCancelled {
                    finisher: finisher.identifier().to_string(),
                });
            }
        }
        let cancelled = context.is_cancelled();
        self.phase = RuntimePhase::Finished;
        self.record(FormAuditKind::FormFinished);
        Ok(RuntimeOutcome::Finished {
            finishers_run,
            cancelled,
        })
    }

    /// Sends an audit event for this form.
    fn record(&self, kind: FormAuditKind) {
        self.audit.record(&FormAuditEvent::new(self.definition.identifier(), kind));
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Runtime errors. Validation failures are not errors; they are messages.
#[derive(Debug, Error)]
pub enum FormRuntimeError {
    /// Inbound snapshot failed integrity checks.
    #[error(transparent)]
    StateIntegrity(#[from] StateIntegrityError),
    /// Element identifier is not part of the definition.
    #[error("element not found: {0}")]
    ElementNotFound(String),
    /// Requested page is beyond the end of the form.
    #[error("invalid navigation target {target} for a form with {page_count} pages")]
    InvalidNavigation {
        /// Requested page index.
        target: usize,
        /// Number of pages.
        page_count: usize,
    },
    /// A finisher reported an error.
    #[error("finisher {identifier} failed: {reason}")]
    FinisherFailed {
        /// Finisher identifier.
        identifier: String,
        /// Failure description.
        reason: String,
    },
    /// Outbound state could not be signed.
    #[error(transparent)]
    Signing(#[from] SigningError),
    /// Outbound state exceeds the configured limit.
    #[error("state snapshot of {size} bytes exceeds the {limit} byte limit")]
    StateTooLarge {
        /// Signed size in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },
    /// State could not be canonicalized.
    #[error(transparent)]
    Hash(#[from] HashError),
    /// Renderer failed.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// The form already finished in this request.
    #[error("form has already finished")]
    Finished,
}
