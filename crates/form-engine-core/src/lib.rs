// crates/form-engine-core/src/lib.rs
// ============================================================================
// Module: Form Engine Core Library
// Description: Public API surface for the form engine.
// Purpose: Expose core types, interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The form engine compiles multi-step forms from layered type and preset
//! configuration and drives them page by page across stateless requests.
//! Session state travels as a signed, versioned snapshot; signing, transport,
//! rendering, and persistence are explicit interfaces.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::FormPersistence;
pub use interfaces::FormRenderer;
pub use interfaces::FormSummary;
pub use interfaces::PersistenceError;
pub use interfaces::RenderContext;
pub use interfaces::RenderError;
pub use interfaces::RenderedElement;
pub use interfaces::SignedState;
pub use interfaces::SigningError;
pub use interfaces::StateSigner;
pub use interfaces::StateTransport;
pub use runtime::ArrayFormFactory;
pub use runtime::Ed25519StateSigner;
pub use runtime::FactoryError;
pub use runtime::FileAuditSink;
pub use runtime::FormAuditEvent;
pub use runtime::FormAuditKind;
pub use runtime::FormAuditSink;
pub use runtime::FormFactory;
pub use runtime::FormRuntime;
pub use runtime::FormRuntimeError;
pub use runtime::HiddenFieldTransport;
pub use runtime::InMemoryFormPersistence;
pub use runtime::MemoryAuditSink;
pub use runtime::NoopAuditSink;
pub use runtime::RuntimeConfig;
pub use runtime::RuntimeOutcome;
pub use runtime::RuntimePhase;
pub use runtime::StderrAuditSink;
pub use runtime::SubmissionReport;
pub use runtime::default_presets;
