// crates/form-engine-core/src/core/kinds.rs
// ============================================================================
// Module: Element Kinds
// Description: Behavior capability of pages and elements plus built-in kinds.
// Purpose: Let types customize construction, submission, and tree finishing.
// Dependencies: crate::core::{definition, messages, processing, validation}
// ============================================================================

//! ## Overview
//! A type definition names its behavior through `implementation`; the
//! [`ElementKindRegistry`] maps that name to a shared [`ElementKind`]. Kinds
//! hook into three moments:
//! - `initialize` once at construction, before element options apply.
//! - `on_building_finished` once per node after the whole tree exists.
//! - `on_submit` on every submission of the owning page, before conversion.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::core::definition::BuildError;
use crate::core::definition::FormDefinitionBuilder;
use crate::core::definition::NodeHandle;
use crate::core::identifiers::RenderableId;
use crate::core::merge::ConfigMap;
use crate::core::messages::ProcessingMessage;
use crate::core::processing::DataType;
use crate::core::processing::ProcessingRule;
use crate::core::validation::EmptyValidator;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Type name of the synthetic element appended by honeypot pages.
pub const HONEYPOT_TYPE: &str = "Honeypot";
/// Page property enabling the honeypot element.
pub const HONEYPOT_PROPERTY: &str = "honeypot";

// ============================================================================
// SECTION: Element Kind Capability
// ============================================================================

/// Mutable construction state handed to [`ElementKind::initialize`].
#[derive(Debug, Clone)]
pub struct ElementSetup {
    /// Identifier of the node under construction.
    pub identifier: RenderableId,
    /// Default value from the resolved type.
    pub default_value: Value,
    /// Properties from the resolved type.
    pub properties: ConfigMap,
    /// Rendering options from the resolved type.
    pub rendering_options: ConfigMap,
    /// Processing rule from the resolved type.
    pub rule: ProcessingRule,
}

/// Behavior shared by every node created from the same implementation.
pub trait ElementKind: Send + Sync + fmt::Debug {
    /// Implementation name this kind is registered under.
    fn implementation(&self) -> &str;

    /// Returns true for page kinds.
    fn is_page(&self) -> bool {
        false
    }

    /// Returns true when elements may be nested below this kind.
    fn is_composite(&self) -> bool {
        false
    }

    /// Returns true when the element carries a submitted value.
    fn has_value(&self) -> bool {
        true
    }

    /// Adjusts construction state once, right after type resolution.
    fn initialize(&self, _setup: &mut ElementSetup) {}

    /// Maps the raw submission before conversion.
    ///
    /// # Errors
    ///
    /// Returns a [`ProcessingMessage`] when the submission is unacceptable.
    fn on_submit(&self, submitted: Option<&Value>) -> Result<Value, ProcessingMessage> {
        Ok(submitted.cloned().unwrap_or(Value::Null))
    }

    /// Runs once after the whole tree is assembled.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] when the hook cannot extend the tree.
    fn on_building_finished(
        &self,
        _builder: &mut FormDefinitionBuilder,
        _handle: NodeHandle,
    ) -> Result<(), BuildError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Built-in Kinds
// ============================================================================

/// Page; may append a honeypot element when its `honeypot` property is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageKind;

impl ElementKind for PageKind {
    fn implementation(&self) -> &str {
        "page"
    }

    fn is_page(&self) -> bool {
        true
    }

    fn has_value(&self) -> bool {
        false
    }

    fn on_building_finished(
        &self,
        builder: &mut FormDefinitionBuilder,
        handle: NodeHandle,
    ) -> Result<(), BuildError> {
        let enabled = builder.properties_of(handle)?.get(HONEYPOT_PROPERTY) == Some(&Value::Bool(true));
        if !enabled {
            return Ok(());
        }
        let identifier = format!("{}-honeypot", builder.identifier_of(handle)?);
        builder.create_element(handle, &identifier, HONEYPOT_TYPE)?;
        Ok(())
    }
}

/// Plain input element.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericKind;

impl ElementKind for GenericKind {
    fn implementation(&self) -> &str {
        "generic"
    }
}

/// Grouping element holding nested elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionKind;

impl ElementKind for SectionKind {
    fn implementation(&self) -> &str {
        "section"
    }

    fn is_composite(&self) -> bool {
        true
    }

    fn has_value(&self) -> bool {
        false
    }
}

/// Display-only content.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticKind;

impl ElementKind for StaticKind {
    fn implementation(&self) -> &str {
        "static"
    }

    fn has_value(&self) -> bool {
        false
    }
}

/// Boolean toggle; an absent submission means unchecked.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckboxKind;

impl ElementKind for CheckboxKind {
    fn implementation(&self) -> &str {
        "checkbox"
    }

    fn initialize(&self, setup: &mut ElementSetup) {
        setup.rule.data_type = DataType::Boolean;
        if setup.default_value.is_null() {
            setup.default_value = Value::Bool(false);
        }
    }

    fn on_submit(&self, submitted: Option<&Value>) -> Result<Value, ProcessingMessage> {
        Ok(submitted.cloned().unwrap_or(Value::Bool(false)))
    }
}

/// Password entered twice; collapses to the password when both match.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordConfirmationKind;

impl ElementKind for PasswordConfirmationKind {
    fn implementation(&self) -> &str {
        "password_confirmation"
    }

    fn initialize(&self, setup: &mut ElementSetup) {
        setup.rule.data_type = DataType::String;
        setup.rule.mapping.trim = false;
    }

    fn on_submit(&self, submitted: Option<&Value>) -> Result<Value, ProcessingMessage> {
        let Some(Value::Object(fields)) = submitted else {
            return Ok(submitted.cloned().unwrap_or(Value::Null));
        };
        let password = fields.get("password").cloned().unwrap_or(Value::Null);
        let confirmation = fields.get("confirmation").cloned().unwrap_or(Value::Null);
        if password == confirmation {
            Ok(password)
        } else {
            Err(ProcessingMessage::error("passwords_mismatch", "Password doesn't match confirmation."))
        }
    }
}

/// Hidden field that must stay empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct HoneypotKind;

impl ElementKind for HoneypotKind {
    fn implementation(&self) -> &str {
        "honeypot"
    }

    fn initialize(&self, setup: &mut ElementSetup) {
        setup.rule.validators.push(Arc::new(EmptyValidator));
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Implementation name to element kind.
#[derive(Debug, Clone)]
pub struct ElementKindRegistry {
    /// Registered kinds.
    kinds: BTreeMap<String, Arc<dyn ElementKind>>,
}

impl Default for ElementKindRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ElementKindRegistry {
    /// Creates a registry holding the built-in kinds.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            kinds: BTreeMap::new(),
        };
        registry.register(Arc::new(PageKind));
        registry.register(Arc::new(GenericKind));
        registry.register(Arc::new(SectionKind));
        registry.register(Arc::new(StaticKind));
        registry.register(Arc::new(CheckboxKind));
        registry.register(Arc::new(PasswordConfirmationKind));
        registry.register(Arc::new(HoneypotKind));
        registry
    }

    /// Registers `kind` under its implementation name, replacing any previous.
    pub fn register(&mut self, kind: Arc<dyn ElementKind>) {
        self.kinds.insert(kind.implementation().to_string(), kind);
    }

    /// Returns the kind registered as `implementation`.
    #[must_use]
    pub fn get(&self, implementation: &str) -> Option<Arc<dyn ElementKind>> {
        self.kinds.get(implementation).cloned()
    }
}
