// crates/form-engine-core/src/runtime/factory.rs
// ============================================================================
// Module: Form Factory
// Description: Builds form definitions from nested configuration maps.
// Purpose: Drive the definition builder from preset-resolved configuration.
// Dependencies: crate::{core, interfaces}, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`ArrayFormFactory`] resolves a preset, derives the build environment from
//! it, and walks the nested `renderables` lists of a form configuration:
//!
//! ```text
//! { identifier, type?, label?, renderingOptions?, finishers?,
//!   renderables: [ { identifier, type?, label?, renderables: [...] } ] }
//! ```
//!
//! Top-level renderables are pages; everything below them is an element.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::core::definition::BuildEnvironment;
use crate::core::definition::BuildError;
use crate::core::definition::DEFAULT_FORM_TYPE;
use crate::core::definition::FormDefinition;
use crate::core::definition::FormDefinitionBuilder;
use crate::core::definition::NodeHandle;
use crate::core::finisher::FinisherRegistry;
use crate::core::identifiers::FormId;
use crate::core::kinds::ElementKindRegistry;
use crate::core::merge::ConfigMap;
use crate::core::presets::PresetResolver;
use crate::core::resolve::ResolveError;
use crate::core::validation::ValidatorRegistry;
use crate::interfaces::FormPersistence;
use crate::interfaces::PersistenceError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Name of the built-in preset.
pub const DEFAULT_PRESET: &str = "default";

/// Key holding nested renderables.
const RENDERABLES_KEY: &str = "renderables";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Factory errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactoryError {
    /// Preset resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// Tree construction failed.
    #[error(transparent)]
    Build(#[from] BuildError),
    /// Raw configuration could not be loaded.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    /// Configuration is not shaped as expected.
    #[error("invalid form configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Factory
// ============================================================================

/// Turns raw configuration into a compiled definition.
pub trait FormFactory {
    /// Builds the form described by `configuration` using `preset_name`.
    ///
    /// # Errors
    ///
    /// Returns [`FactoryError`] when resolution or construction fails.
    fn build(&self, configuration: &ConfigMap, preset_name: &str) -> Result<FormDefinition, FactoryError>;
}

/// Factory for nested array configuration.
#[derive(Debug, Clone)]
pub struct ArrayFormFactory {
    /// Preset registry.
    presets: PresetResolver,
    /// Element kinds available to built forms.
    kinds: ElementKindRegistry,
    /// Validator constructors available to built forms.
    validators: ValidatorRegistry,
    /// Finisher constructors available to built forms.
    finishers: FinisherRegistry,
}

impl Default for ArrayFormFactory {
    fn default() -> Self {
        Self::new(PresetResolver::new(default_presets()))
    }
}

impl ArrayFormFactory {
    /// Creates a factory over `presets` with built-in registries.
    #[must_use]
    pub fn new(presets: PresetResolver) -> Self {
        Self {
            presets,
            kinds: ElementKindRegistry::default(),
            validators: ValidatorRegistry::default(),
            finishers: FinisherRegistry::default(),
        }
    }

    /// Replaces the element kind registry.
    #[must_use]
    pub fn with_kinds(mut self, kinds: ElementKindRegistry) -> Self {
        self.kinds = kinds;
        self
    }

    /// Replaces the validator registry.
    #[must_use]
    pub fn with_validators(mut self, validators: ValidatorRegistry) -> Self {
        self.validators = validators;
        self
    }

    /// Replaces the finisher registry.
    #[must_use]
    pub fn with_finishers(mut self, finishers: FinisherRegistry) -> Self {
        self.finishers = finishers;
        self
    }

    /// Returns the preset registry.
    #[must_use]
    pub const fn presets(&self) -> &PresetResolver {
        &self.presets
    }

    /// Loads configuration from `persistence` and builds it.
    ///
    /// # Errors
    ///
    /// Returns [`FactoryError::Persistence`] when loading fails, otherwise as
    /// [`FormFactory::build`].
    pub fn build_persisted<P: FormPersistence>(
        &self,
        persistence: &P,
        identifier: &FormId,
        preset_name: &str,
    ) -> Result<FormDefinition, FactoryError> {
        let mut configuration = persistence.load(identifier)?;
        configuration
            .entry("identifier")
            .or_insert_with(|| Value::String(identifier.to_string()));
        self.build(&configuration, preset_name)
    }

    /// Creates elements for every entry of `renderables` below `parent`.
    fn build_children(
        builder: &mut FormDefinitionBuilder,
        parent: NodeHandle,
        renderables: &[Value],
    ) -> Result<(), FactoryError> {
        for entry in renderables {
            let (identifier, renderable) = renderable_entry(entry)?;
            let type_name = renderable
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| FactoryError::Invalid(format!("element {identifier} needs a type")))?;
            let handle = builder.create_element(parent, identifier, type_name)?;
            Self::apply_common(builder, handle, renderable)?;
            Self::build_children(builder, handle, nested_renderables(renderable)?)?;
        }
        Ok(())
    }

    /// Applies label and options shared by pages and elements.
    fn apply_common(
        builder: &mut FormDefinitionBuilder,
        handle: NodeHandle,
        renderable: &ConfigMap,
    ) -> Result<(), FactoryError> {
        if let Some(label) = renderable.get("label").and_then(Value::as_str) {
            builder.set_label(handle, label)?;
        }
        builder.set_options(handle, renderable)?;
        Ok(())
    }
}

impl FormFactory for ArrayFormFactory {
    fn build(&self, configuration: &ConfigMap, preset_name: &str) -> Result<FormDefinition, FactoryError> {
        let preset = self.presets.resolve(preset_name)?;
        let environment = BuildEnvironment::from_preset(&preset)?
            .with_kinds(self.kinds.clone())
            .with_validators(self.validators.clone())
            .with_finishers(self.finishers.clone());
        let identifier = configuration
            .get("identifier")
            .and_then(Value::as_str)
            .ok_or_else(|| FactoryError::Invalid("form needs a string identifier".to_string()))?;

        let mut builder = FormDefinitionBuilder::new(FormId::new(identifier), environment)?;
        let form_type = configuration.get("type").and_then(Value::as_str).unwrap_or(DEFAULT_FORM_TYPE);
        builder.apply_form_type(form_type)?;
        if let Some(label) = configuration.get("label").and_then(Value::as_str) {
            builder.set_form_label(label);
        }
        builder.set_form_options(configuration)?;

        for entry in nested_renderables(configuration)? {
            let (page_identifier, page) = renderable_entry(entry)?;
            let handle = builder.create_page(page_identifier, page.get("type").and_then(Value::as_str))?;
            Self::apply_common(&mut builder, handle, page)?;
            Self::build_children(&mut builder, handle, nested_renderables(page)?)?;
        }
        Ok(builder.build()?)
    }
}

// ============================================================================
// SECTION: Default Presets
// ============================================================================

/// Returns the built-in preset registry with a single `default` preset.
#[must_use]
pub fn default_presets() -> ConfigMap {
    let preset = json!({
        "formElementsDefinition": {
            "Form": {
                "renderingOptions": { "submitButtonLabel": "Submit" },
                "formEditor": { "label": "Form" }
            },
            "Page": {
                "implementation": "page",
                "renderingOptions": {
                    "previousButtonLabel": "Previous",
                    "nextButtonLabel": "Next"
                },
                "formEditor": { "label": "Page", "group": "page" }
            },
            "Section": {
                "implementation": "section",
                "formEditor": { "label": "Section", "group": "container" }
            },
            "StaticText": {
                "implementation": "static",
                "properties": { "text": "" }
            },
            "TextMixin": {
                "dataType": "string",
                "properties": { "placeholder": "" },
                "formEditor": { "group": "input" }
            },
            "SingleLineText": {
                "supertypes": ["TextMixin"],
                "implementation": "generic",
                "formEditor": { "label": "Text" }
            },
            "MultiLineText": {
                "supertypes": ["TextMixin"],
                "implementation": "generic",
                "mappingConfiguration": { "trim": false },
                "formEditor": { "label": "Textarea" }
            },
            "Integer": {
                "implementation": "generic",
                "dataType": "integer",
                "validators": [{ "identifier": "Integer" }]
            },
            "Email": {
                "supertypes": ["SingleLineText"],
                "validators": [{ "identifier": "EmailAddress" }],
                "formEditor": { "label": "Email" }
            },
            "Checkbox": {
                "implementation": "checkbox",
                "formEditor": { "label": "Checkbox", "group": "select" }
            },
            "Password": {
                "supertypes": ["SingleLineText"],
                "mappingConfiguration": { "trim": false }
            },
            "PasswordWithConfirmation": {
                "implementation": "password_confirmation",
                "formEditor": { "label": "Password with confirmation" }
            },
            "Honeypot": {
                "implementation": "honeypot",
                "renderingOptions": { "hidden": true }
            }
        },
        "validatorsDefinition": {
            "NotEmpty": { "implementation": "not_empty" },
            "StringLength": { "implementation": "string_length" },
            "NumberRange": { "implementation": "number_range" },
            "Integer": { "implementation": "integer" },
            "Number": { "implementation": "number" },
            "EmailAddress": { "implementation": "email_address" },
            "Alphanumeric": { "implementation": "alphanumeric" },
            "Count": { "implementation": "count" },
            "Empty": { "implementation": "empty" }
        },
        "finishersDefinition": {
            "Redirect": {
                "implementation": "redirect",
                "options": { "statusCode": 303 }
            },
            "Confirmation": {
                "implementation": "confirmation",
                "options": { "message": "Thank you for your submission." }
            }
        }
    });
    let mut presets = ConfigMap::new();
    presets.insert(DEFAULT_PRESET.to_string(), preset);
    presets
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads the identifier and map of one renderable entry.
fn renderable_entry(entry: &Value) -> Result<(&str, &ConfigMap), FactoryError> {
    let renderable = entry
        .as_object()
        .ok_or_else(|| FactoryError::Invalid("renderables must be maps".to_string()))?;
    let identifier = renderable
        .get("identifier")
        .and_then(Value::as_str)
        .ok_or_else(|| FactoryError::Invalid("renderables need a string identifier".to_string()))?;
    Ok((identifier, renderable))
}

/// Returns the nested renderables list, empty when absent.
fn nested_renderables(renderable: &ConfigMap) -> Result<&[Value], FactoryError> {
    match renderable.get(RENDERABLES_KEY) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(entries)) => Ok(entries.as_slice()),
        Some(_) => Err(FactoryError::Invalid("renderables must be a list".to_string())),
    }
}
