// crates/form-engine-config/src/lib.rs
// ============================================================================
// Module: Form Engine Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for form-engine.toml semantics.
// Dependencies: form-engine-core, serde, toml
// ============================================================================

//! ## Overview
//! `form-engine-config` defines the configuration model for hosts embedding
//! the form engine: runtime limits, state signing keys, build defaults, and
//! additional presets. Validation is strict and fails closed.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
