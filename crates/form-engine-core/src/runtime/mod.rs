// crates/form-engine-core/src/runtime/mod.rs
// ============================================================================
// Module: Form Engine Runtime
// Description: Request-time state machine, factory, and default collaborators.
// Purpose: Drive form sessions against the core types and interfaces.
// Dependencies: crate::{core, interfaces}, base64, ed25519-dalek
// ============================================================================

//! ## Overview
//! Runtime modules implement the per-request form state machine plus the
//! default implementations of its collaborators: an ed25519 signer, a hidden
//! field transport, an in-memory persistence store, and audit sinks.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod audit;
pub mod engine;
pub mod factory;
pub mod signer;
pub mod store;
pub mod transport;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileAuditSink;
pub use audit::FormAuditEvent;
pub use audit::FormAuditKind;
pub use audit::FormAuditSink;
pub use audit::MemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use engine::FormRuntime;
pub use engine::FormRuntimeError;
pub use engine::RuntimeConfig;
pub use engine::RuntimeOutcome;
pub use engine::RuntimePhase;
pub use engine::SubmissionReport;
pub use factory::ArrayFormFactory;
pub use factory::FactoryError;
pub use factory::FormFactory;
pub use factory::default_presets;
pub use signer::Ed25519StateSigner;
pub use store::InMemoryFormPersistence;
pub use transport::HiddenFieldTransport;
