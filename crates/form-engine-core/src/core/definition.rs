// crates/form-engine-core/src/core/definition.rs
// ============================================================================
// Module: Form Definition
// Description: Build-time tree construction and the immutable compiled form.
// Purpose: Turn resolved type configuration into a validated page/element tree.
// Dependencies: crate::core::{finisher, hashing, kinds, merge, processing,
//               supertypes, validation}, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`FormDefinitionBuilder`] owns an arena of nodes while the tree is being
//! assembled. Every page and element is created through the builder, which
//! resolves its type, checks form-wide identifier uniqueness, and records a
//! [`ProcessingRule`] for value-bearing elements. [`FormDefinitionBuilder::build`]
//! runs the building-finished hooks once and freezes the result into a
//! [`FormDefinition`] that is shared read-only across sessions.
//!
//! Invariants:
//! - Identifiers are unique across the whole form.
//! - A node has at most one parent; re-attaching an owned node fails.
//! - Handles are only valid for the builder that issued them.
//! - No partially built definition escapes a failed build.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::core::finisher::Finisher;
use crate::core::finisher::FinisherRegistry;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::hashing::digest_canonical_json;
use crate::core::identifiers::FormId;
use crate::core::identifiers::RenderableId;
use crate::core::identifiers::TypeName;
use crate::core::kinds::ElementKind;
use crate::core::kinds::ElementKindRegistry;
use crate::core::kinds::ElementSetup;
use crate::core::merge::ConfigMap;
use crate::core::merge::merge_into;
use crate::core::processing::DataType;
use crate::core::processing::MappingConfiguration;
use crate::core::processing::ProcessingRule;
use crate::core::resolve::ResolveError;
use crate::core::supertypes::SupertypeResolver;
use crate::core::validation::Validator;
use crate::core::validation::ValidatorRegistry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default page type name.
pub const DEFAULT_PAGE_TYPE: &str = "Page";
/// Default form type name.
pub const DEFAULT_FORM_TYPE: &str = "Form";
/// Preset key holding element and page type definitions.
pub const FORM_ELEMENTS_DEFINITION_KEY: &str = "formElementsDefinition";
/// Preset key holding validator definitions.
pub const VALIDATORS_DEFINITION_KEY: &str = "validatorsDefinition";
/// Preset key holding finisher definitions.
pub const FINISHERS_DEFINITION_KEY: &str = "finishersDefinition";

/// Structural keys consumed by the factory, never applied as options.
const STRUCTURAL_KEYS: [&str; 4] = ["type", "identifier", "renderables", "label"];

/// Source of builder tokens binding handles to their builder.
static NEXT_BUILDER_TOKEN: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Build-time consistency and configuration errors. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Identifier already used somewhere in the form.
    #[error("duplicate form element identifier: {0}")]
    DuplicateIdentifier(String),
    /// Node is already owned, or the handle belongs to another builder.
    #[error("ownership violation: {0}")]
    OwnershipViolation(String),
    /// Parent handle does not name a node of this builder.
    #[error("unknown parent: {0}")]
    UnknownParent(String),
    /// Parent cannot hold children.
    #[error("renderable {0} cannot contain child elements")]
    NotComposite(String),
    /// Kind does not fit the position (page kind below a page, or vice versa).
    #[error("type {type_name} cannot be used as {expected}")]
    InvalidKind {
        /// Offending type name.
        type_name: String,
        /// Expected role.
        expected: String,
    },
    /// Type names an element kind that is not registered.
    #[error("unknown element implementation {implementation} for type {type_name}")]
    UnknownImplementation {
        /// Offending type name.
        type_name: String,
        /// Implementation name declared by the type.
        implementation: String,
    },
    /// Validator identifier or implementation is not registered.
    #[error("unknown validator: {0}")]
    UnknownValidator(String),
    /// Finisher identifier or implementation is not registered.
    #[error("unknown finisher: {0}")]
    UnknownFinisher(String),
    /// Option key or value is not accepted.
    #[error("invalid option {key} on {identifier}: {reason}")]
    InvalidOption {
        /// Identifier of the form, page, or element.
        identifier: String,
        /// Offending option key.
        key: String,
        /// Description of the problem.
        reason: String,
    },
    /// Identifier is empty.
    #[error("identifier must not be empty")]
    EmptyIdentifier,
    /// Form has no pages.
    #[error("form {0} has no pages")]
    NoPages(String),
    /// Element was detached and never re-attached.
    #[error("element {0} is not attached to any page")]
    DetachedElement(String),
    /// Type or preset resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// Definition digest could not be computed.
    #[error(transparent)]
    Hash(#[from] HashError),
}

// ============================================================================
// SECTION: Build Environment
// ============================================================================

/// Registries and resolved preset sections a builder draws from.
#[derive(Debug, Clone, Default)]
pub struct BuildEnvironment {
    /// Page and element type definitions.
    types: SupertypeResolver,
    /// Element kinds by implementation name.
    kinds: ElementKindRegistry,
    /// Validator constructors by implementation name.
    validators: ValidatorRegistry,
    /// Validator identifier to `{ implementation, options }`.
    validator_definitions: ConfigMap,
    /// Finisher constructors by implementation name.
    finishers: FinisherRegistry,
    /// Finisher identifier to `{ implementation, options }`.
    finisher_definitions: ConfigMap,
}

impl BuildEnvironment {
    /// Creates an environment over a type registry with built-in registries.
    #[must_use]
    pub fn new(types: ConfigMap) -> Self {
        Self {
            types: SupertypeResolver::new(types, Vec::new()),
            ..Self::default()
        }
    }

    /// Creates an environment from a resolved preset.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Resolve`] when a definition section is not a map.
    pub fn from_preset(preset: &ConfigMap) -> Result<Self, BuildError> {
        let mut environment = Self::new(preset_section(preset, FORM_ELEMENTS_DEFINITION_KEY)?);
        environment.validator_definitions = preset_section(preset, VALIDATORS_DEFINITION_KEY)?;
        environment.finisher_definitions = preset_section(preset, FINISHERS_DEFINITION_KEY)?;
        Ok(environment)
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

    /// Replaces the validator definitions.
    #[must_use]
    pub fn with_validator_definitions(mut self, definitions: ConfigMap) -> Self {
        self.validator_definitions = definitions;
        self
    }

    /// Replaces the finisher definitions.
    #[must_use]
    pub fn with_finisher_definitions(mut self, definitions: ConfigMap) -> Self {
        self.finisher_definitions = definitions;
        self
    }
}

/// Reads an optional map-valued preset section.
fn preset_section(preset: &ConfigMap, key: &str) -> Result<ConfigMap, BuildError> {
    match preset.get(key) {
        None | Some(Value::Null) => Ok(ConfigMap::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(BuildError::Resolve(ResolveError::InvalidDefinition {
            name: key.to_string(),
            reason: "section must be a map".to_string(),
        })),
    }
}

// ============================================================================
// SECTION: Nodes and Handles
// ============================================================================

/// Reference to a node owned by one builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    /// Token of the issuing builder.
    token: u64,
    /// Arena index.
    index: usize,
}

/// One page or element in the arena.
#[derive(Debug, Clone)]
struct Node {
    /// Form-wide unique identifier.
    identifier: RenderableId,
    /// Type the node was created from.
    type_name: TypeName,
    /// Behavior of the node.
    kind: Arc<dyn ElementKind>,
    /// Display label.
    label: Option<String>,
    /// Owning node; `None` for pages and detached elements.
    parent: Option<usize>,
    /// Child nodes in presentation order.
    children: Vec<usize>,
    /// Value used when state holds none.
    default_value: Value,
    /// Element-specific properties.
    properties: ConfigMap,
    /// Presentation-only options.
    rendering_options: ConfigMap,
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Assembles a form tree; consumed by [`FormDefinitionBuilder::build`].
#[derive(Debug)]
pub struct FormDefinitionBuilder {
    /// Token stamped on every handle issued by this builder.
    token: u64,
    /// Form identifier.
    identifier: FormId,
    /// Form label.
    label: Option<String>,
    /// Form rendering options.
    rendering_options: ConfigMap,
    /// Node arena.
    nodes: Vec<Node>,
    /// Page node indices in order.
    pages: Vec<usize>,
    /// Identifier to arena index.
    index: BTreeMap<RenderableId, usize>,
    /// Processing rules of value-bearing elements.
    rules: BTreeMap<RenderableId, ProcessingRule>,
    /// Finisher chain in declared order.
    finishers: Vec<Arc<dyn Finisher>>,
    /// Registries and definitions.
    environment: BuildEnvironment,
}

impl FormDefinitionBuilder {
    /// Starts a new form.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::EmptyIdentifier`] for an empty identifier.
    pub fn new(identifier: FormId, environment: BuildEnvironment) -> Result<Self, BuildError> {
        if identifier.as_str().is_empty() {
            return Err(BuildError::EmptyIdentifier);
        }
        Ok(Self {
            token: NEXT_BUILDER_TOKEN.fetch_add(1, Ordering::Relaxed),
            identifier,
            label: None,
            rendering_options: ConfigMap::new(),
            nodes: Vec::new(),
            pages: Vec::new(),
            index: BTreeMap::new(),
            rules: BTreeMap::new(),
            finishers: Vec::new(),
            environment,
        })
    }

    /// Returns the form identifier.
    #[must_use]
    pub const fn identifier(&self) -> &FormId {
        &self.identifier
    }

    /// Applies the rendering options and finishers of a form type.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] when the type cannot be resolved or its options
    /// are invalid.
    pub fn apply_form_type(&mut self, type_name: &str) -> Result<(), BuildError> {
        let mut resolved = self.environment.types.resolve(type_name, true)?;
        resolved.remove("implementation");
        if let Some(Value::String(label)) = resolved.remove("label") {
            self.label = Some(label);
        }
        let mut options = ConfigMap::new();
        for key in ["renderingOptions", "finishers"] {
            if let Some(value) = resolved.remove(key) {
                options.insert(key.to_string(), value);
            }
        }
        self.set_form_options(&options)
    }

    /// Sets the form label.
    pub fn set_form_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    /// Applies form-level options (`renderingOptions`, `finishers`).
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidOption`] for unknown keys or malformed
    /// values and [`BuildError::UnknownFinisher`] for undeclared finishers.
    pub fn set_form_options(&mut self, options: &ConfigMap) -> Result<(), BuildError> {
        for (key, value) in options {
            if STRUCTURAL_KEYS.contains(&key.as_str()) {
                continue;
            }
            match key.as_str() {
                "renderingOptions" => {
                    let overlay = expect_map(self.identifier.as_str(), key, value)?;
                    merge_into(&mut self.rendering_options, overlay);
                }
                "finishers" => {
                    let declared = expect_list(self.identifier.as_str(), key, value)?;
                    for entry in declared {
                        let finisher = self.create_finisher(entry)?;
                        self.finishers.push(finisher);
                    }
                }
                _ => return Err(invalid_option(self.identifier.as_str(), key, "unknown form option")),
            }
        }
        Ok(())
    }

    /// Appends a finisher to the chain.
    pub fn add_finisher(&mut self, finisher: Arc<dyn Finisher>) {
        self.finishers.push(finisher);
    }

    /// Creates a page; `type_name` defaults to `Page`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] for empty or duplicate identifiers, unresolvable
    /// types, and types whose kind is not a page.
    pub fn create_page(
        &mut self,
        identifier: &str,
        type_name: Option<&str>,
    ) -> Result<NodeHandle, BuildError> {
        let type_name = type_name.unwrap_or(DEFAULT_PAGE_TYPE);
        self.check_identifier(identifier)?;
        let (node, rule) = self.prepare_node(identifier, type_name)?;
        if !node.kind.is_page() {
            return Err(BuildError::InvalidKind {
                type_name: type_name.to_string(),
                expected: "a page".to_string(),
            });
        }
        let index = self.insert_node(node, rule);
        self.pages.push(index);
        Ok(self.handle(index))
    }

    /// Creates an element under a page or composite element.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] for empty or duplicate identifiers, foreign or
    /// non-composite parents, unresolvable types, and page kinds.
    pub fn create_element(
        &mut self,
        parent: NodeHandle,
        identifier: &str,
        type_name: &str,
    ) -> Result<NodeHandle, BuildError> {
        let parent_index = self.resolve_handle(parent)?;
        self.check_identifier(identifier)?;
        self.check_container(parent_index)?;
        let (mut node, rule) = self.prepare_node(identifier, type_name)?;
        if node.kind.is_page() {
            return Err(BuildError::InvalidKind {
                type_name: type_name.to_string(),
                expected: "an element".to_string(),
            });
        }
        node.parent = Some(parent_index);
        let index = self.insert_node(node, rule);
        self.nodes[parent_index].children.push(index);
        Ok(self.handle(index))
    }

    /// Applies options to a page or element.
    ///
    /// Structural keys (`type`, `identifier`, `renderables`, `label`) are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidOption`] for unknown keys or malformed
    /// values and [`BuildError::UnknownValidator`] for undeclared validators.
    pub fn set_options(&mut self, handle: NodeHandle, options: &ConfigMap) -> Result<(), BuildError> {
        let index = self.resolve_handle(handle)?;
        let identifier = self.nodes[index].identifier.clone();
        for (key, value) in options {
            if STRUCTURAL_KEYS.contains(&key.as_str()) {
                continue;
            }
            self.apply_option(index, &identifier, key, value)?;
        }
        Ok(())
    }

    /// Sets the label of a page or element.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::OwnershipViolation`] for foreign handles.
    pub fn set_label(&mut self, handle: NodeHandle, label: impl Into<String>) -> Result<(), BuildError> {
        let index = self.resolve_handle(handle)?;
        self.nodes[index].label = Some(label.into());
        Ok(())
    }

    /// Removes an element from its parent; it must be re-attached before build.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::OwnershipViolation`] for foreign handles, pages,
    /// and elements that are already detached.
    pub fn detach(&mut self, handle: NodeHandle) -> Result<(), BuildError> {
        let index = self.resolve_handle(handle)?;
        let Some(parent) = self.nodes[index].parent.take() else {
            return Err(BuildError::OwnershipViolation(format!(
                "{} has no parent to detach from",
                self.nodes[index].identifier
            )));
        };
        self.nodes[parent].children.retain(|child| *child != index);
        Ok(())
    }

    /// Attaches a detached element to a page or composite element.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::OwnershipViolation`] when the element already has
    /// a parent, is a page, or would become its own ancestor.
    pub fn attach(&mut self, handle: NodeHandle, parent: NodeHandle) -> Result<(), BuildError> {
        let index = self.resolve_handle(handle)?;
        let parent_index = self.resolve_handle(parent)?;
        let node = &self.nodes[index];
        if node.parent.is_some() || node.kind.is_page() {
            return Err(BuildError::OwnershipViolation(format!(
                "{} already belongs to the form tree",
                node.identifier
            )));
        }
        if self.is_ancestor_or_self(index, parent_index) {
            return Err(BuildError::OwnershipViolation(format!(
                "{} cannot contain itself",
                node.identifier
            )));
        }
        self.check_container(parent_index)?;
        self.nodes[index].parent = Some(parent_index);
        self.nodes[parent_index].children.push(index);
        Ok(())
    }

    /// Returns the handle for `identifier`.
    #[must_use]
    pub fn handle_of(&self, identifier: &str) -> Option<NodeHandle> {
        self.index.get(identifier).map(|index| self.handle(*index))
    }

    /// Returns the identifier behind `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::OwnershipViolation`] for foreign handles.
    pub fn identifier_of(&self, handle: NodeHandle) -> Result<&RenderableId, BuildError> {
        let index = self.resolve_handle(handle)?;
        Ok(&self.nodes[index].identifier)
    }

    /// Returns the properties of `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::OwnershipViolation`] for foreign handles.
    pub fn properties_of(&self, handle: NodeHandle) -> Result<&ConfigMap, BuildError> {
        let index = self.resolve_handle(handle)?;
        Ok(&self.nodes[index].properties)
    }

    /// Returns true when `identifier` is already used.
    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.index.contains_key(identifier)
    }

    /// Runs building-finished hooks once and freezes the definition.
    ///
    /// Hooks run in a single pre-order pass over the nodes attached when the
    /// build starts; nodes added by a hook do not get their own hook invoked.
    ///
    /// # Errors
    ///
    /// Returns the first hook error, [`BuildError::NoPages`],
    /// [`BuildError::DetachedElement`], or [`BuildError::Hash`].
    pub fn build(mut self) -> Result<FormDefinition, BuildError> {
        let snapshot = self.preorder();
        for index in snapshot {
            let kind = Arc::clone(&self.nodes[index].kind);
            let handle = self.handle(index);
            kind.on_building_finished(&mut self, handle)?;
        }
        if self.pages.is_empty() {
            return Err(BuildError::NoPages(self.identifier.to_string()));
        }
        if let Some(node) = self
            .nodes
            .iter()
            .enumerate()
            .find(|(index, node)| node.parent.is_none() && !self.pages.contains(index))
            .map(|(_, node)| node)
        {
            return Err(BuildError::DetachedElement(node.identifier.to_string()));
        }
        let mut definition = FormDefinition {
            identifier: self.identifier,
            label: self.label,
            rendering_options: self.rendering_options,
            nodes: self.nodes,
            pages: self.pages,
            index: self.index,
            rules: self.rules,
            finishers: self.finishers,
            digest: HashDigest::default(),
        };
        definition.digest = digest_canonical_json(&definition.digest_view())?;
        Ok(definition)
    }

    // ------------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------------

    /// Issues a handle for `index`.
    const fn handle(&self, index: usize) -> NodeHandle {
        NodeHandle {
            token: self.token,
            index,
        }
    }

    /// Validates that `handle` was issued by this builder.
    fn resolve_handle(&self, handle: NodeHandle) -> Result<usize, BuildError> {
        if handle.token != self.token {
            return Err(BuildError::OwnershipViolation(
                "handle belongs to another form".to_string(),
            ));
        }
        if handle.index >= self.nodes.len() {
            return Err(BuildError::UnknownParent(format!("node #{}", handle.index)));
        }
        Ok(handle.index)
    }

    /// Rejects empty and already used identifiers.
    fn check_identifier(&self, identifier: &str) -> Result<(), BuildError> {
        if identifier.is_empty() {
            return Err(BuildError::EmptyIdentifier);
        }
        if self.index.contains_key(identifier) {
            return Err(BuildError::DuplicateIdentifier(identifier.to_string()));
        }
        Ok(())
    }

    /// Requires `index` to accept children.
    fn check_container(&self, index: usize) -> Result<(), BuildError> {
        let node = &self.nodes[index];
        if node.kind.is_page() || node.kind.is_composite() {
            Ok(())
        } else {
            Err(BuildError::NotComposite(node.identifier.to_string()))
        }
    }

    /// Returns true when `index` is `candidate` or one of its ancestors.
    fn is_ancestor_or_self(&self, index: usize, candidate: usize) -> bool {
        let mut current = Some(candidate);
        while let Some(position) = current {
            if position == index {
                return true;
            }
            current = self.nodes[position].parent;
        }
        false
    }

    /// Resolves a type and builds an unattached node plus its rule.
    fn prepare_node(
        &mut self,
        identifier: &str,
        type_name: &str,
    ) -> Result<(Node, Option<ProcessingRule>), BuildError> {
        let resolved = self.environment.types.resolve(type_name, true)?;
        let implementation = match resolved.get("implementation") {
            Some(Value::String(name)) => name.clone(),
            _ => {
                return Err(BuildError::Resolve(ResolveError::InvalidDefinition {
                    name: type_name.to_string(),
                    reason: "implementation must be a string".to_string(),
                }));
            }
        };
        let Some(kind) = self.environment.kinds.get(&implementation) else {
            return Err(BuildError::UnknownImplementation {
                type_name: type_name.to_string(),
                implementation,
            });
        };

        let mut setup = ElementSetup {
            identifier: RenderableId::new(identifier),
            default_value: Value::Null,
            properties: ConfigMap::new(),
            rendering_options: ConfigMap::new(),
            rule: ProcessingRule::default(),
        };
        let label = match resolved.get("label") {
            Some(Value::String(label)) => Some(label.clone()),
            _ => None,
        };
        for (key, value) in &resolved {
            match key.as_str() {
                "defaultValue" => setup.default_value = value.clone(),
                "properties" => merge_into(&mut setup.properties, expect_map(identifier, key, value)?),
                "renderingOptions" => {
                    merge_into(&mut setup.rendering_options, expect_map(identifier, key, value)?);
                }
                "dataType" => setup.rule.data_type = parse_data_type(identifier, value)?,
                "mappingConfiguration" => {
                    setup.rule.mapping = merge_mapping(identifier, setup.rule.mapping, value)?;
                }
                "validators" => {
                    for entry in expect_list(identifier, key, value)? {
                        let validator = self.create_validator(identifier, entry)?;
                        setup.rule.validators.push(validator);
                    }
                }
                _ => {}
            }
        }
        kind.initialize(&mut setup);

        let rule = kind.has_value().then_some(setup.rule);
        let node = Node {
            identifier: setup.identifier,
            type_name: TypeName::new(type_name),
            kind,
            label,
            parent: None,
            children: Vec::new(),
            default_value: setup.default_value,
            properties: setup.properties,
            rendering_options: setup.rendering_options,
        };
        Ok((node, rule))
    }

    /// Inserts a prepared node into the arena and indexes.
    fn insert_node(&mut self, node: Node, rule: Option<ProcessingRule>) -> usize {
        let index = self.nodes.len();
        if let Some(rule) = rule {
            self.rules.insert(node.identifier.clone(), rule);
        }
        self.index.insert(node.identifier.clone(), index);
        self.nodes.push(node);
        index
    }

    /// Applies one non-structural option to a node.
    fn apply_option(
        &mut self,
        index: usize,
        identifier: &RenderableId,
        key: &str,
        value: &Value,
    ) -> Result<(), BuildError> {
        let id = identifier.as_str();
        match key {
            "defaultValue" => self.nodes[index].default_value = value.clone(),
            "properties" => merge_into(&mut self.nodes[index].properties, expect_map(id, key, value)?),
            "renderingOptions" => {
                merge_into(&mut self.nodes[index].rendering_options, expect_map(id, key, value)?);
            }
            "dataType" => {
                let data_type = parse_data_type(id, value)?;
                self.rule_mut(identifier, key)?.data_type = data_type;
            }
            "mappingConfiguration" => {
                let current = self.rule_mut(identifier, key)?.mapping;
                let mapping = merge_mapping(id, current, value)?;
                self.rule_mut(identifier, key)?.mapping = mapping;
            }
            "validators" => {
                let mut created = Vec::new();
                for entry in expect_list(id, key, value)? {
                    created.push(self.create_validator(id, entry)?);
                }
                self.rule_mut(identifier, key)?.validators.extend(created);
            }
            _ => return Err(invalid_option(id, key, "unknown option")),
        }
        Ok(())
    }

    /// Returns the rule of a value-bearing element.
    fn rule_mut(&mut self, identifier: &RenderableId, key: &str) -> Result<&mut ProcessingRule, BuildError> {
        self.rules
            .get_mut(identifier)
            .ok_or_else(|| invalid_option(identifier.as_str(), key, "element does not carry a value"))
    }

    /// Creates a validator from an `{ identifier, options }` reference.
    fn create_validator(
        &self,
        owner: &str,
        entry: &Value,
    ) -> Result<Arc<dyn Validator>, BuildError> {
        let (name, options) = declared_reference(owner, "validators", entry)?;
        let (implementation, defaults) =
            definition_entry(&self.environment.validator_definitions, &name)
                .ok_or_else(|| BuildError::UnknownValidator(name.clone()))?;
        let mut merged = defaults;
        merge_into(&mut merged, &options);
        match self.environment.validators.create(&implementation, &merged) {
            None => Err(BuildError::UnknownValidator(implementation)),
            Some(Err(reason)) => Err(invalid_option(owner, "validators", &reason)),
            Some(Ok(validator)) => Ok(validator),
        }
    }

    /// Creates a finisher from an `{ identifier, options }` reference.
    fn create_finisher(&self, entry: &Value) -> Result<Arc<dyn Finisher>, BuildError> {
        let owner = self.identifier.as_str();
        let (name, options) = declared_reference(owner, "finishers", entry)?;
        let (implementation, defaults) =
            definition_entry(&self.environment.finisher_definitions, &name)
                .ok_or_else(|| BuildError::UnknownFinisher(name.clone()))?;
        let mut merged = defaults;
        merge_into(&mut merged, &options);
        match self.environment.finishers.create(&implementation, &name, &merged) {
            None => Err(BuildError::UnknownFinisher(implementation)),
            Some(Err(reason)) => Err(invalid_option(owner, "finishers", &reason)),
            Some(Ok(finisher)) => Ok(finisher),
        }
    }

    /// Returns attached node indices in pre-order, page by page.
    fn preorder(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.nodes.len());
        for page in &self.pages {
            collect_preorder(&self.nodes, *page, &mut out);
        }
        out
    }
}

// ============================================================================
// SECTION: Compiled Definition
// ============================================================================

/// Immutable compiled form; safe to share across sessions.
///
/// # Invariants
/// - Identifiers are unique; every non-page node has a parent.
/// - `rules` holds exactly the value-bearing elements.
/// - `digest` covers everything that influences processing.
#[derive(Debug)]
pub struct FormDefinition {
    /// Form identifier.
    identifier: FormId,
    /// Form label.
    label: Option<String>,
    /// Form rendering options.
    rendering_options: ConfigMap,
    /// Node arena.
    nodes: Vec<Node>,
    /// Page node indices in order.
    pages: Vec<usize>,
    /// Identifier to arena index.
    index: BTreeMap<RenderableId, usize>,
    /// Processing rules by element identifier.
    rules: BTreeMap<RenderableId, ProcessingRule>,
    /// Finisher chain.
    finishers: Vec<Arc<dyn Finisher>>,
    /// Digest of the definition.
    digest: HashDigest,
}

impl FormDefinition {
    /// Returns the form identifier.
    #[must_use]
    pub const fn identifier(&self) -> &FormId {
        &self.identifier
    }

    /// Returns the form label.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Returns the form rendering options.
    #[must_use]
    pub const fn rendering_options(&self) -> &ConfigMap {
        &self.rendering_options
    }

    /// Returns the definition digest.
    #[must_use]
    pub const fn digest(&self) -> &HashDigest {
        &self.digest
    }

    /// Returns the number of pages.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Returns the page at `index`.
    #[must_use]
    pub fn page(&self, index: usize) -> Option<Renderable<'_>> {
        self.pages.get(index).map(|node| self.view(*node))
    }

    /// Returns all pages in order.
    pub fn pages(&self) -> impl Iterator<Item = Renderable<'_>> {
        self.pages.iter().map(|node| self.view(*node))
    }

    /// Returns the page called `identifier` and its index.
    #[must_use]
    pub fn page_by_identifier(&self, identifier: &str) -> Option<(usize, Renderable<'_>)> {
        self.pages
            .iter()
            .enumerate()
            .find(|(_, node)| self.nodes[**node].identifier.as_str() == identifier)
            .map(|(position, node)| (position, self.view(*node)))
    }

    /// Returns the page before `index`.
    #[must_use]
    pub fn previous_page(&self, index: usize) -> Option<Renderable<'_>> {
        index.checked_sub(1).and_then(|previous| self.page(previous))
    }

    /// Returns the page after `index`.
    #[must_use]
    pub fn next_page(&self, index: usize) -> Option<Renderable<'_>> {
        index.checked_add(1).and_then(|next| self.page(next))
    }

    /// Returns the page or element called `identifier`.
    #[must_use]
    pub fn element(&self, identifier: &str) -> Option<Renderable<'_>> {
        self.index.get(identifier).map(|node| self.view(*node))
    }

    /// Returns the elements of the page at `index` in pre-order.
    #[must_use]
    pub fn elements_of(&self, index: usize) -> Vec<Renderable<'_>> {
        let Some(page) = self.pages.get(index) else {
            return Vec::new();
        };
        let mut order = Vec::new();
        collect_preorder(&self.nodes, *page, &mut order);
        order.into_iter().skip(1).map(|node| self.view(node)).collect()
    }

    /// Returns the index of the page containing `identifier`.
    #[must_use]
    pub fn parent_page_of(&self, identifier: &str) -> Option<usize> {
        let mut current = *self.index.get(identifier)?;
        while let Some(parent) = self.nodes[current].parent {
            current = parent;
        }
        self.pages.iter().position(|page| *page == current)
    }

    /// Returns the processing rule of a value-bearing element.
    #[must_use]
    pub fn processing_rule(&self, identifier: &str) -> Option<&ProcessingRule> {
        self.rules.get(identifier)
    }

    /// Returns the finisher chain.
    #[must_use]
    pub fn finishers(&self) -> &[Arc<dyn Finisher>] {
        &self.finishers
    }

    /// Creates a view of node `index`.
    const fn view(&self, index: usize) -> Renderable<'_> {
        Renderable {
            definition: self,
            index,
        }
    }

    /// Canonical projection hashed into the digest.
    fn digest_view(&self) -> Value {
        let pages: Vec<Value> = self.pages.iter().map(|page| self.digest_node(*page)).collect();
        let finishers: Vec<&str> = self.finishers.iter().map(|finisher| finisher.identifier()).collect();
        json!({
            "identifier": self.identifier,
            "renderingOptions": self.rendering_options,
            "pages": pages,
            "finishers": finishers,
        })
    }

    /// Canonical projection of one node and its subtree.
    fn digest_node(&self, index: usize) -> Value {
        let node = &self.nodes[index];
        let rule = self.rules.get(&node.identifier).map(|rule| {
            let validators: Vec<&str> = rule.validators.iter().map(|validator| validator.name()).collect();
            json!({
                "dataType": rule.data_type,
                "mapping": rule.mapping,
                "validators": validators,
            })
        });
        let children: Vec<Value> = node.children.iter().map(|child| self.digest_node(*child)).collect();
        json!({
            "identifier": node.identifier,
            "type": node.type_name,
            "implementation": node.kind.implementation(),
            "defaultValue": node.default_value,
            "properties": node.properties,
            "rule": rule,
            "children": children,
        })
    }
}

// ============================================================================
// SECTION: Renderable View
// ============================================================================

/// Read-only view of one page or element.
#[derive(Debug, Clone, Copy)]
pub struct Renderable<'a> {
    /// Owning definition.
    definition: &'a FormDefinition,
    /// Arena index.
    index: usize,
}

impl<'a> Renderable<'a> {
    /// Returns the backing node.
    fn node(&self) -> &'a Node {
        &self.definition.nodes[self.index]
    }

    /// Returns the identifier.
    #[must_use]
    pub fn identifier(&self) -> &'a RenderableId {
        &self.node().identifier
    }

    /// Returns the type name.
    #[must_use]
    pub fn type_name(&self) -> &'a TypeName {
        &self.node().type_name
    }

    /// Returns the element kind.
    #[must_use]
    pub fn kind(&self) -> &'a dyn ElementKind {
        self.node().kind.as_ref()
    }

    /// Returns the label.
    #[must_use]
    pub fn label(&self) -> Option<&'a str> {
        self.node().label.as_deref()
    }

    /// Returns the configured default value.
    #[must_use]
    pub fn default_value(&self) -> &'a Value {
        &self.node().default_value
    }

    /// Returns element-specific properties.
    #[must_use]
    pub fn properties(&self) -> &'a ConfigMap {
        &self.node().properties
    }

    /// Returns rendering options.
    #[must_use]
    pub fn rendering_options(&self) -> &'a ConfigMap {
        &self.node().rendering_options
    }

    /// Returns true for pages.
    #[must_use]
    pub fn is_page(&self) -> bool {
        self.node().kind.is_page()
    }

    /// Returns true when the element carries a value.
    #[must_use]
    pub fn has_value(&self) -> bool {
        self.definition.rules.contains_key(&self.node().identifier)
    }

    /// Returns the parent page or element.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.node().parent.map(|parent| self.definition.view(parent))
    }

    /// Returns direct children in order.
    pub fn children(&self) -> impl Iterator<Item = Renderable<'a>> + use<'a> {
        let definition = self.definition;
        self.node().children.iter().map(move |child| definition.view(*child))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Appends `index` and its descendants in pre-order.
fn collect_preorder(nodes: &[Node], index: usize, out: &mut Vec<usize>) {
    out.push(index);
    for child in &nodes[index].children {
        collect_preorder(nodes, *child, out);
    }
}

/// Builds an [`BuildError::InvalidOption`].
fn invalid_option(identifier: &str, key: &str, reason: &str) -> BuildError {
    BuildError::InvalidOption {
        identifier: identifier.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// Requires a map-valued option.
fn expect_map<'v>(identifier: &str, key: &str, value: &'v Value) -> Result<&'v ConfigMap, BuildError> {
    value.as_object().ok_or_else(|| invalid_option(identifier, key, "expected a map"))
}

/// Requires a list-valued option.
fn expect_list<'v>(identifier: &str, key: &str, value: &'v Value) -> Result<&'v Vec<Value>, BuildError> {
    value.as_array().ok_or_else(|| invalid_option(identifier, key, "expected a list"))
}

/// Parses a `dataType` option.
fn parse_data_type(identifier: &str, value: &Value) -> Result<DataType, BuildError> {
    serde_json::from_value(value.clone())
        .map_err(|err| invalid_option(identifier, "dataType", &err.to_string()))
}

/// Merges a `mappingConfiguration` option over the current mapping.
fn merge_mapping(
    identifier: &str,
    current: MappingConfiguration,
    value: &Value,
) -> Result<MappingConfiguration, BuildError> {
    let overlay = expect_map(identifier, "mappingConfiguration", value)?;
    let mut base = match serde_json::to_value(current) {
        Ok(Value::Object(map)) => map,
        _ => ConfigMap::new(),
    };
    merge_into(&mut base, overlay);
    serde_json::from_value(Value::Object(base))
        .map_err(|err| invalid_option(identifier, "mappingConfiguration", &err.to_string()))
}

/// Reads `{ identifier, options }` from a validator or finisher reference.
fn declared_reference(owner: &str, key: &str, entry: &Value) -> Result<(String, ConfigMap), BuildError> {
    let map = expect_map(owner, key, entry)?;
    let name = map
        .get("identifier")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid_option(owner, key, "entries need a string identifier"))?;
    let options = match map.get("options") {
        None | Some(Value::Null) => ConfigMap::new(),
        Some(value) => expect_map(owner, key, value)?.clone(),
    };
    Ok((name.to_string(), options))
}

/// Reads `{ implementation, options }` from a definition section.
fn definition_entry(definitions: &ConfigMap, name: &str) -> Option<(String, ConfigMap)> {
    let entry = definitions.get(name)?.as_object()?;
    let implementation = entry.get("implementation")?.as_str()?.to_string();
    let options = entry.get("options").and_then(Value::as_object).cloned().unwrap_or_default();
    Some((implementation, options))
}
