// crates/form-engine-core/src/core/mod.rs
// ============================================================================
// Module: Form Engine Core Types
// Description: Configuration resolution, form definitions, and session state.
// Purpose: Provide the deterministic building blocks the runtime drives.
// Dependencies: serde, serde_json, serde_jcs, sha2, thiserror
// ============================================================================

//! ## Overview
//! Core types cover the build phase (configuration merging, supertype and
//! preset resolution, the definition builder) and the data that crosses
//! requests (form state, processing messages). Nothing here performs I/O.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod definition;
pub mod finisher;
pub mod hashing;
pub mod identifiers;
pub mod kinds;
pub mod merge;
pub mod messages;
pub mod presets;
pub mod processing;
pub mod request;
pub mod resolve;
pub mod state;
pub mod supertypes;
pub mod validation;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use definition::BuildEnvironment;
pub use definition::BuildError;
pub use definition::FormDefinition;
pub use definition::FormDefinitionBuilder;
pub use definition::NodeHandle;
pub use definition::Renderable;
pub use finisher::ClosureFinisher;
pub use finisher::ConfirmationFinisher;
pub use finisher::Finisher;
pub use finisher::FinisherContext;
pub use finisher::FinisherError;
pub use finisher::FinisherRegistry;
pub use finisher::RedirectFinisher;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use identifiers::FormId;
pub use identifiers::RenderableId;
pub use identifiers::TypeName;
pub use kinds::ElementKind;
pub use kinds::ElementKindRegistry;
pub use kinds::ElementSetup;
pub use merge::ConfigMap;
pub use merge::merge;
pub use messages::ProcessingMessage;
pub use messages::Severity;
pub use presets::PresetResolver;
pub use presets::resolve_preset;
pub use processing::DataType;
pub use processing::MappingConfiguration;
pub use processing::ProcessingOutcome;
pub use processing::ProcessingRule;
pub use request::FormRequest;
pub use request::FormResponse;
pub use request::Redirect;
pub use resolve::ResolveError;
pub use state::FormState;
pub use state::StateEnvelope;
pub use state::StateIntegrityError;
pub use supertypes::SupertypeResolver;
pub use supertypes::resolve_type;
pub use validation::Validator;
pub use validation::ValidatorRegistry;
