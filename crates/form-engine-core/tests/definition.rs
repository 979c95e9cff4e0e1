//! Form definition builder tests for form-engine core.
// crates/form-engine-core/tests/definition.rs
// ============================================================================
// Module: Definition Builder Tests
// Description: Tree construction, ownership, hooks, and digests.
// Purpose: Ensure built definitions are consistent and failures leave no trace.
// ============================================================================
//! ## Overview
//! Exercises the builder directly against the built-in preset.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use form_engine_core::BuildEnvironment;
use form_engine_core::BuildError;
use form_engine_core::ConfigMap;
use form_engine_core::DataType;
use form_engine_core::FormDefinitionBuilder;
use form_engine_core::FormId;
use form_engine_core::PresetResolver;
use form_engine_core::ResolveError;
use form_engine_core::default_presets;
use serde_json::Value;
use serde_json::json;

fn environment() -> BuildEnvironment {
    let preset = PresetResolver::new(default_presets()).resolve("default").unwrap();
    BuildEnvironment::from_preset(&preset).unwrap()
}

fn builder(identifier: &str) -> FormDefinitionBuilder {
    FormDefinitionBuilder::new(FormId::new(identifier), environment()).unwrap()
}

fn map(value: Value) -> ConfigMap {
    value.as_object().cloned().unwrap()
}

fn identifiers(definition: &form_engine_core::FormDefinition, page: usize) -> Vec<String> {
    definition.elements_of(page).iter().map(|element| element.identifier().to_string()).collect()
}

/// Verifies an empty form identifier is rejected.
#[test]
fn empty_form_identifier_is_rejected() {
    let err = FormDefinitionBuilder::new(FormId::new(""), environment()).unwrap_err();
    assert_eq!(err, BuildError::EmptyIdentifier);
}

/// Verifies duplicate identifiers fail without touching the tree.
#[test]
fn duplicate_identifiers_leave_tree_unchanged() {
    let mut builder = builder("contact");
    let page = builder.create_page("page-1", None).unwrap();
    builder.create_element(page, "name", "SingleLineText").unwrap();

    let err = builder.create_element(page, "name", "Integer").unwrap_err();
    assert_eq!(err, BuildError::DuplicateIdentifier("name".to_string()));
    let err = builder.create_page("name", None).unwrap_err();
    assert_eq!(err, BuildError::DuplicateIdentifier("name".to_string()));
    let err = builder.create_page("page-1", None).unwrap_err();
    assert_eq!(err, BuildError::DuplicateIdentifier("page-1".to_string()));

    let definition = builder.build().unwrap();
    assert_eq!(definition.page_count(), 1);
    assert_eq!(identifiers(&definition, 0), vec!["name".to_string()]);
    assert_eq!(definition.element("name").unwrap().type_name().as_str(), "SingleLineText");
}

/// Verifies an unknown type fails without touching the tree.
#[test]
fn failed_type_resolution_leaves_tree_unchanged() {
    let mut builder = builder("contact");
    let page = builder.create_page("page-1", None).unwrap();
    let err = builder.create_element(page, "ghost", "NoSuchType").unwrap_err();
    assert_eq!(err, BuildError::Resolve(ResolveError::TypeNotFound("NoSuchType".to_string())));
    assert!(!builder.contains("ghost"));
    let definition = builder.build().unwrap();
    assert!(definition.elements_of(0).is_empty());
}

/// Verifies page kinds only create pages and element kinds only create elements.
#[test]
fn kinds_must_match_their_position() {
    let mut builder = builder("contact");
    let page = builder.create_page("page-1", None).unwrap();
    let err = builder.create_element(page, "nested-page", "Page").unwrap_err();
    assert!(matches!(err, BuildError::InvalidKind { .. }));
    let err = builder.create_page("text-page", Some("SingleLineText")).unwrap_err();
    assert!(matches!(err, BuildError::InvalidKind { .. }));
    assert!(!builder.contains("nested-page"));
    assert!(!builder.contains("text-page"));
}

/// Verifies plain elements cannot hold children.
#[test]
fn only_pages_and_composites_hold_children() {
    let mut builder = builder("contact");
    let page = builder.create_page("page-1", None).unwrap();
    let text = builder.create_element(page, "name", "SingleLineText").unwrap();
    let err = builder.create_element(text, "inner", "SingleLineText").unwrap_err();
    assert_eq!(err, BuildError::NotComposite("name".to_string()));

    let section = builder.create_element(page, "address", "Section").unwrap();
    builder.create_element(section, "street", "SingleLineText").unwrap();
    builder.create_element(section, "city", "SingleLineText").unwrap();
    builder.create_element(page, "note", "MultiLineText").unwrap();

    let definition = builder.build().unwrap();
    assert_eq!(
        identifiers(&definition, 0),
        vec!["name", "address", "street", "city", "note"].into_iter().map(String::from).collect::<Vec<_>>()
    );
    let street = definition.element("street").unwrap();
    assert_eq!(street.parent().unwrap().identifier().as_str(), "address");
    assert_eq!(definition.parent_page_of("street"), Some(0));
    assert!(!definition.element("address").unwrap().has_value());
    assert!(definition.processing_rule("address").is_none());
}

/// Verifies handles from another builder are refused.
#[test]
fn handles_are_bound_to_their_builder() {
    let mut first = builder("first");
    let mut second = builder("second");
    let page = first.create_page("page-1", None).unwrap();
    second.create_page("page-1", None).unwrap();
    let err = second.create_element(page, "name", "SingleLineText").unwrap_err();
    assert!(matches!(err, BuildError::OwnershipViolation(_)));
}

/// Verifies an attached element must be detached before reattaching.
#[test]
fn attached_elements_cannot_be_attached_again() {
    let mut builder = builder("contact");
    let first = builder.create_page("page-1", None).unwrap();
    let second = builder.create_page("page-2", None).unwrap();
    let name = builder.create_element(first, "name", "SingleLineText").unwrap();
    let err = builder.attach(name, second).unwrap_err();
    assert!(matches!(err, BuildError::OwnershipViolation(_)));
    let err = builder.attach(second, first).unwrap_err();
    assert!(matches!(err, BuildError::OwnershipViolation(_)));
}

/// Verifies detach and attach move an element to another page.
#[test]
fn detached_elements_can_move_between_pages() {
    let mut builder = builder("contact");
    let first = builder.create_page("page-1", None).unwrap();
    let second = builder.create_page("page-2", None).unwrap();
    let name = builder.create_element(first, "name", "SingleLineText").unwrap();
    builder.detach(name).unwrap();
    assert!(matches!(builder.detach(name).unwrap_err(), BuildError::OwnershipViolation(_)));
    builder.attach(name, second).unwrap();

    let definition = builder.build().unwrap();
    assert!(definition.elements_of(0).is_empty());
    assert_eq!(identifiers(&definition, 1), vec!["name".to_string()]);
    assert_eq!(definition.parent_page_of("name"), Some(1));
}

/// Verifies attaching a section below itself is refused.
#[test]
fn composites_cannot_contain_themselves() {
    let mut builder = builder("contact");
    let page = builder.create_page("page-1", None).unwrap();
    let outer = builder.create_element(page, "outer", "Section").unwrap();
    let inner = builder.create_element(outer, "inner", "Section").unwrap();
    builder.detach(outer).unwrap();
    let err = builder.attach(outer, inner).unwrap_err();
    assert!(matches!(err, BuildError::OwnershipViolation(_)));
}

/// Verifies an element left detached fails the build.
#[test]
fn detached_elements_fail_the_build() {
    let mut builder = builder("contact");
    let page = builder.create_page("page-1", None).unwrap();
    let name = builder.create_element(page, "name", "SingleLineText").unwrap();
    builder.detach(name).unwrap();
    assert_eq!(builder.build().unwrap_err(), BuildError::DetachedElement("name".to_string()));
}

/// Verifies a form needs at least one page.
#[test]
fn forms_without_pages_fail_the_build() {
    let builder = builder("empty");
    assert_eq!(builder.build().unwrap_err(), BuildError::NoPages("empty".to_string()));
}

/// Verifies the honeypot page hook appends a hidden empty-only element.
#[test]
fn honeypot_hook_appends_an_empty_only_element() {
    let mut builder = builder("contact");
    let page = builder.create_page("page-1", None).unwrap();
    builder.create_element(page, "name", "SingleLineText").unwrap();
    builder.set_options(page, &map(json!({ "properties": { "honeypot": true } }))).unwrap();
    let plain = builder.create_page("page-2", None).unwrap();
    builder.create_element(plain, "email", "Email").unwrap();

    let definition = builder.build().unwrap();
    assert_eq!(identifiers(&definition, 0), vec!["name".to_string(), "page-1-honeypot".to_string()]);
    assert_eq!(identifiers(&definition, 1), vec!["email".to_string()]);
    let honeypot = definition.element("page-1-honeypot").unwrap();
    assert_eq!(honeypot.type_name().as_str(), "Honeypot");
    assert_eq!(honeypot.rendering_options().get("hidden"), Some(&json!(true)));
    let rule = definition.processing_rule("page-1-honeypot").unwrap();
    let names: Vec<&str> = rule.validators.iter().map(|validator| validator.name()).collect();
    assert_eq!(names, vec!["empty"]);
}

/// Verifies a hook creating a duplicate identifier fails the build.
#[test]
fn hook_identifier_collisions_fail_the_build() {
    let mut builder = builder("contact");
    let page = builder.create_page("page-1", None).unwrap();
    builder.create_element(page, "page-1-honeypot", "SingleLineText").unwrap();
    builder.set_options(page, &map(json!({ "properties": { "honeypot": true } }))).unwrap();
    assert_eq!(
        builder.build().unwrap_err(),
        BuildError::DuplicateIdentifier("page-1-honeypot".to_string())
    );
}

/// Verifies inherited type settings end up in the processing rule.
#[test]
fn inherited_type_settings_reach_the_rule() {
    let mut builder = builder("contact");
    let page = builder.create_page("page-1", None).unwrap();
    builder.create_element(page, "email", "Email").unwrap();
    builder.create_element(page, "age", "Integer").unwrap();
    builder.create_element(page, "bio", "MultiLineText").unwrap();
    let definition = builder.build().unwrap();

    let email = definition.processing_rule("email").unwrap();
    assert_eq!(email.data_type, DataType::String);
    assert!(email.mapping.trim);
    let names: Vec<&str> = email.validators.iter().map(|validator| validator.name()).collect();
    assert_eq!(names, vec!["email_address"]);
    assert_eq!(definition.element("email").unwrap().properties().get("placeholder"), Some(&json!("")));

    assert_eq!(definition.processing_rule("age").unwrap().data_type, DataType::Integer);
    assert!(!definition.processing_rule("bio").unwrap().mapping.trim);
}

/// Verifies element options add validators and merge properties.
#[test]
fn options_extend_validators_and_merge_properties() {
    let mut builder = builder("contact");
    let page = builder.create_page("page-1", None).unwrap();
    let email = builder.create_element(page, "email", "Email").unwrap();
    builder
        .set_options(
            email,
            &map(json!({
                "defaultValue": "someone@example.com",
                "properties": { "autocomplete": "email" },
                "validators": [
                    { "identifier": "NotEmpty" },
                    { "identifier": "StringLength", "options": { "maximum": 64 } }
                ]
            })),
        )
        .unwrap();
    let definition = builder.build().unwrap();

    let element = definition.element("email").unwrap();
    assert_eq!(element.default_value(), &json!("someone@example.com"));
    assert_eq!(element.properties().get("placeholder"), Some(&json!("")));
    assert_eq!(element.properties().get("autocomplete"), Some(&json!("email")));
    let names: Vec<&str> =
        definition.processing_rule("email").unwrap().validators.iter().map(|validator| validator.name()).collect();
    assert_eq!(names, vec!["email_address", "not_empty", "string_length"]);
}

/// Verifies malformed or unknown element options are rejected.
#[test]
fn invalid_options_are_rejected() {
    let mut builder = builder("contact");
    let page = builder.create_page("page-1", None).unwrap();
    let text = builder.create_element(page, "name", "SingleLineText").unwrap();
    let section = builder.create_element(page, "group", "Section").unwrap();

    let err = builder.set_options(text, &map(json!({ "colour": "red" }))).unwrap_err();
    assert!(matches!(err, BuildError::InvalidOption { ref key, .. } if key == "colour"));
    let err = builder.set_options(section, &map(json!({ "dataType": "integer" }))).unwrap_err();
    assert!(matches!(err, BuildError::InvalidOption { ref key, .. } if key == "dataType"));
    let err = builder.set_options(text, &map(json!({ "dataType": "decimal" }))).unwrap_err();
    assert!(matches!(err, BuildError::InvalidOption { .. }));
    let err = builder.set_options(text, &map(json!({ "validators": [{ "identifier": "Bogus" }] }))).unwrap_err();
    assert_eq!(err, BuildError::UnknownValidator("Bogus".to_string()));
    let err = builder
        .set_options(text, &map(json!({ "validators": [{ "identifier": "StringLength", "options": { "minimum": -1 } }] })))
        .unwrap_err();
    assert!(matches!(err, BuildError::InvalidOption { .. }));
}

/// Verifies form finishers are attached in declaration order.
#[test]
fn form_options_attach_finishers_in_order() {
    let mut builder = builder("contact");
    builder.apply_form_type("Form").unwrap();
    builder
        .set_form_options(&map(json!({
            "renderingOptions": { "submitButtonLabel": "Send" },
            "finishers": [
                { "identifier": "Confirmation" },
                { "identifier": "Redirect", "options": { "uri": "/thanks" } }
            ]
        })))
        .unwrap();
    builder.create_page("page-1", None).unwrap();
    let definition = builder.build().unwrap();
    assert_eq!(definition.rendering_options().get("submitButtonLabel"), Some(&json!("Send")));
    let finishers: Vec<&str> = definition.finishers().iter().map(|finisher| finisher.identifier()).collect();
    assert_eq!(finishers, vec!["Confirmation", "Redirect"]);
}

/// Verifies unknown form options and finisher names are rejected.
#[test]
fn unknown_form_options_and_finishers_are_rejected() {
    let mut builder = builder("contact");
    let err = builder.set_form_options(&map(json!({ "layout": "wide" }))).unwrap_err();
    assert!(matches!(err, BuildError::InvalidOption { .. }));
    let err = builder.set_form_options(&map(json!({ "finishers": [{ "identifier": "Email" }] }))).unwrap_err();
    assert_eq!(err, BuildError::UnknownFinisher("Email".to_string()));
}

fn sample_definition(label_hint: &str) -> form_engine_core::FormDefinition {
    let mut builder = builder("contact");
    let page = builder.create_page("page-1", None).unwrap();
    let name = builder.create_element(page, "name", "SingleLineText").unwrap();
    builder.set_options(name, &map(json!({ "properties": { "placeholder": label_hint } }))).unwrap();
    builder.build().unwrap()
}

/// Verifies the definition digest is stable and changes with the tree.
#[test]
fn digest_is_stable_and_sensitive_to_structure() {
    let first = sample_definition("Your name");
    let second = sample_definition("Your name");
    let changed = sample_definition("Full name");
    assert_eq!(first.digest(), second.digest());
    assert_eq!(first.digest().as_str().len(), 64);
    assert!(first.digest().as_str().bytes().all(|byte| byte.is_ascii_hexdigit() && !byte.is_ascii_uppercase()));
    assert_ne!(first.digest(), changed.digest());
}

/// Verifies previous and next page lookups follow page order.
#[test]
fn page_navigation_helpers_follow_page_order() {
    let mut builder = builder("wizard");
    for identifier in ["one", "two", "three"] {
        builder.create_page(identifier, None).unwrap();
    }
    let definition = builder.build().unwrap();
    assert_eq!(definition.page_count(), 3);
    assert!(definition.previous_page(0).is_none());
    assert_eq!(definition.next_page(0).unwrap().identifier().as_str(), "two");
    assert_eq!(definition.previous_page(2).unwrap().identifier().as_str(), "two");
    assert!(definition.next_page(2).is_none());
    let (index, page) = definition.page_by_identifier("three").unwrap();
    assert_eq!(index, 2);
    assert!(page.is_page());
}
