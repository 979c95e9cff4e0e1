//! Form runtime tests for form-engine core.
// crates/form-engine-core/tests/runtime.rs
// ============================================================================
// Module: Form Runtime Tests
// Description: Multi-request flows through the runtime state machine.
// Purpose: Ensure navigation, validation, finishing, and state integrity.
// ============================================================================
//! ## Overview
//! Every test drives real round trips: the signed state written by one
//! request is carried into the next through the hidden field transport.

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

use std::sync::Arc;
use std::sync::Mutex;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use form_engine_core::ArrayFormFactory;
use form_engine_core::BuildEnvironment;
use form_engine_core::ClosureFinisher;
use form_engine_core::Ed25519StateSigner;
use form_engine_core::FinisherError;
use form_engine_core::FormAuditKind;
use form_engine_core::FormDefinition;
use form_engine_core::FormDefinitionBuilder;
use form_engine_core::FormFactory;
use form_engine_core::FormId;
use form_engine_core::FormRenderer;
use form_engine_core::FormRequest;
use form_engine_core::FormResponse;
use form_engine_core::FormRuntime;
use form_engine_core::FormRuntimeError;
use form_engine_core::HiddenFieldTransport;
use form_engine_core::MemoryAuditSink;
use form_engine_core::PresetResolver;
use form_engine_core::RenderContext;
use form_engine_core::RenderError;
use form_engine_core::RuntimeConfig;
use form_engine_core::RuntimeOutcome;
use form_engine_core::RuntimePhase;
use form_engine_core::StateIntegrityError;
use form_engine_core::SubmissionReport;
use form_engine_core::default_presets;
use proptest::prelude::*;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const STATE_FIELD: &str = "__state";

fn signer() -> Ed25519StateSigner {
    Ed25519StateSigner::from_seed(&[7; 32])
}

fn build(configuration: &Value) -> FormDefinition {
    let configuration = configuration.as_object().cloned().unwrap();
    ArrayFormFactory::default().build(&configuration, "default").unwrap()
}

fn wizard() -> FormDefinition {
    build(&json!({
        "identifier": "wizard",
        "finishers": [{ "identifier": "Confirmation", "options": { "message": "Thanks {name}" } }],
        "renderables": [
            { "identifier": "step-1", "renderables": [
                { "identifier": "name", "type": "SingleLineText",
                  "validators": [{ "identifier": "StringLength", "options": { "minimum": 3 } }] },
                { "identifier": "email", "type": "Email" }
            ] },
            { "identifier": "step-2", "renderables": [
                { "identifier": "age", "type": "Integer", "defaultValue": 18 },
                { "identifier": "newsletter", "type": "Checkbox" }
            ] },
            { "identifier": "step-3", "renderables": [
                { "identifier": "comment", "type": "MultiLineText" }
            ] }
        ]
    }))
}

fn runtime<'d>(
    definition: &'d FormDefinition,
    audit: &'d MemoryAuditSink,
) -> FormRuntime<'d, Ed25519StateSigner, HiddenFieldTransport, &'d MemoryAuditSink> {
    FormRuntime::new(definition, signer(), HiddenFieldTransport::default(), audit, RuntimeConfig::default())
}

fn send(definition: &FormDefinition, request: &FormRequest) -> (RuntimeOutcome, FormResponse) {
    let audit = MemoryAuditSink::new();
    runtime(definition, &audit).handle(request).unwrap()
}

fn carry(response: &FormResponse) -> FormRequest {
    let blob = response.hidden_fields.get(STATE_FIELD).cloned().unwrap();
    FormRequest::new().with_hidden_field(STATE_FIELD, blob)
}

fn display(page_index: usize, submission: Option<SubmissionReport>) -> RuntimeOutcome {
    RuntimeOutcome::DisplayPage {
        page_index,
        submission,
    }
}

fn valid(page_index: usize) -> Option<SubmissionReport> {
    Some(SubmissionReport {
        page_index,
        error_count: 0,
    })
}

/// Completes page one of the wizard and returns the response showing page two.
fn past_first_page(definition: &FormDefinition) -> FormResponse {
    let (_, first) = send(definition, &FormRequest::new());
    let request = carry(&first).with_value("name", "Ada").with_value("email", "ada@example.com").submitting(0);
    let (outcome, second) = send(definition, &request);
    assert_eq!(outcome, display(1, valid(0)));
    second
}

// ============================================================================
// SECTION: Navigation
// ============================================================================

/// Verifies the first request shows page one and writes signed state.
#[test]
fn first_request_displays_first_page_and_writes_state() {
    let definition = wizard();
    let audit = MemoryAuditSink::new();
    let mut runtime = runtime(&definition, &audit);
    let (outcome, response) = runtime.handle(&FormRequest::new()).unwrap();

    assert_eq!(outcome, display(0, None));
    assert_eq!(runtime.phase(), RuntimePhase::PageDisplayed(0));
    assert!(response.hidden_fields.contains_key(STATE_FIELD));
    assert!(runtime.previous_page().is_none());
    assert_eq!(runtime.next_page().unwrap().identifier().as_str(), "step-2");
    assert!(matches!(
        audit.kinds().as_slice(),
        [
            FormAuditKind::StateRestored { fresh: true },
            FormAuditKind::PageDisplayed { page_index: 0 },
            FormAuditKind::StateWritten { .. }
        ]
    ));
}

/// Verifies a valid submission advances and keeps the submitted values.
#[test]
fn valid_submission_advances_and_keeps_values() {
    let definition = wizard();
    let second = past_first_page(&definition);

    let audit = MemoryAuditSink::new();
    let mut runtime = runtime(&definition, &audit);
    let (outcome, _) = runtime.handle(&carry(&second)).unwrap();
    assert_eq!(outcome, display(1, None));
    assert_eq!(runtime.element_value("name").unwrap(), &json!("Ada"));
    assert_eq!(runtime.element_value("age").unwrap(), &json!(18));
    assert_eq!(runtime.current_page().unwrap().identifier().as_str(), "step-2");
    assert_eq!(runtime.previous_page().unwrap().identifier().as_str(), "step-1");
    assert_eq!(runtime.next_page().unwrap().identifier().as_str(), "step-3");
}

/// Verifies navigating back shows the page without processing input.
#[test]
fn backward_navigation_skips_processing() {
    let definition = wizard();
    let second = past_first_page(&definition);

    let audit = MemoryAuditSink::new();
    let mut runtime = runtime(&definition, &audit);
    let request = carry(&second).with_value("age", "not a number").navigating_to(0);
    let (outcome, _) = runtime.handle(&request).unwrap();
    assert_eq!(outcome, display(0, None));
    assert_eq!(runtime.element_value("age").unwrap(), &json!(18));
    assert!(runtime.state().messages_for("age").is_empty());
    assert!(audit.kinds().contains(&FormAuditKind::NavigationOverride {
        from: 1,
        to: 0
    }));
}

/// Verifies navigating forward submits the current page and moves one page.
#[test]
fn forward_navigation_submits_current_page_first() {
    let definition = wizard();
    let (_, first) = send(&definition, &FormRequest::new());

    let blocked = carry(&first).with_value("name", "Al").with_value("email", "al@example.com").navigating_to(2);
    let (outcome, _) = send(&definition, &blocked);
    assert_eq!(
        outcome,
        display(
            0,
            Some(SubmissionReport {
                page_index: 0,
                error_count: 1
            })
        )
    );

    let allowed = carry(&first).with_value("name", "Alan").with_value("email", "al@example.com").navigating_to(2);
    let audit = MemoryAuditSink::new();
    let (outcome, _) = runtime(&definition, &audit).handle(&allowed).unwrap();
    assert_eq!(outcome, display(1, valid(0)));
    assert!(audit.kinds().contains(&FormAuditKind::NavigationOverride {
        from: 0,
        to: 1
    }));
}

/// Verifies a jump to the end only finishes once the last page is submitted.
#[test]
fn forward_navigation_cannot_skip_unvisited_pages() {
    let definition = wizard();
    let (_, first) = send(&definition, &FormRequest::new());

    let request = carry(&first).with_value("name", "Ada").with_value("email", "ada@example.com").navigating_to(3);
    let (outcome, second) = send(&definition, &request);
    assert_eq!(outcome, display(1, valid(0)));
    assert!(second.confirmation.is_none());

    let (outcome, third) = send(&definition, &carry(&second).navigating_to(3));
    assert_eq!(outcome, display(2, valid(1)));
    assert!(third.confirmation.is_none());

    let (outcome, done) = send(&definition, &carry(&third).navigating_to(3));
    assert!(matches!(outcome, RuntimeOutcome::Finished { finishers_run: 1, .. }));
    assert_eq!(done.confirmation.as_deref(), Some("Thanks Ada"));
}

/// Verifies targets beyond the page count are rejected.
#[test]
fn navigation_past_the_end_is_rejected() {
    let definition = wizard();
    let (_, first) = send(&definition, &FormRequest::new());
    let audit = MemoryAuditSink::new();
    let err = runtime(&definition, &audit).handle(&carry(&first).navigating_to(4)).unwrap_err();
    assert!(matches!(
        err,
        FormRuntimeError::InvalidNavigation {
            target: 4,
            page_count: 3
        }
    ));
}

/// Verifies navigation before any display starts on page one.
#[test]
fn navigation_without_state_starts_at_first_page() {
    let definition = wizard();
    let (outcome, _) = send(&definition, &FormRequest::new().navigating_to(2));
    assert_eq!(outcome, display(0, None));
    let audit = MemoryAuditSink::new();
    let err = runtime(&definition, &audit).handle(&FormRequest::new().navigating_to(3)).unwrap_err();
    assert!(matches!(err, FormRuntimeError::InvalidNavigation { .. }));
}

/// Verifies submitting a page other than the last displayed one only redisplays.
#[test]
fn stale_submissions_redisplay_the_last_page() {
    let definition = wizard();
    let (_, first) = send(&definition, &FormRequest::new());
    let request = carry(&first).with_value("name", "Ada").submitting(1);
    let audit = MemoryAuditSink::new();
    let mut runtime = runtime(&definition, &audit);
    let (outcome, _) = runtime.handle(&request).unwrap();
    assert_eq!(outcome, display(0, None));
    assert!(runtime.state().value("name").is_none());
}

/// Verifies values for the displayed page count as a submission.
#[test]
fn submitted_values_imply_a_submission() {
    let definition = wizard();
    let (_, first) = send(&definition, &FormRequest::new());
    let request = carry(&first).with_value("name", "Ada").with_value("email", "ada@example.com");
    let (outcome, _) = send(&definition, &request);
    assert_eq!(outcome, display(1, valid(0)));
}

// ============================================================================
// SECTION: Processing
// ============================================================================

/// Verifies mixed valid and invalid values are all kept on a failed page.
#[test]
fn invalid_and_valid_values_are_both_kept() {
    let definition = wizard();
    let (_, first) = send(&definition, &FormRequest::new());
    let request = carry(&first).with_value("name", "  Al  ").with_value("email", "al@example.com").submitting(0);

    let audit = MemoryAuditSink::new();
    let mut runtime = runtime(&definition, &audit);
    let (outcome, _) = runtime.handle(&request).unwrap();
    assert_eq!(
        outcome,
        display(
            0,
            Some(SubmissionReport {
                page_index: 0,
                error_count: 1
            })
        )
    );
    let state = runtime.state();
    assert_eq!(state.value("name"), Some(&json!("Al")));
    assert_eq!(state.value("email"), Some(&json!("al@example.com")));
    assert_eq!(state.messages_for("name").len(), 1);
    assert_eq!(state.messages_for("name")[0].code, "string_length");
    assert!(state.messages_for("email").is_empty());
    assert!(audit.kinds().contains(&FormAuditKind::PageSubmitted {
        page_index: 0,
        error_count: 1
    }));
}

/// Verifies messages disappear once the value becomes valid.
#[test]
fn messages_clear_once_the_value_is_fixed() {
    let definition = wizard();
    let (_, first) = send(&definition, &FormRequest::new());
    let (_, retry) = send(&definition, &carry(&first).with_value("name", "Al").submitting(0));

    let audit = MemoryAuditSink::new();
    let mut runtime = runtime(&definition, &audit);
    let request = carry(&retry).with_value("name", "Alan").with_value("email", "").submitting(0);
    let (outcome, _) = runtime.handle(&request).unwrap();
    assert_eq!(outcome, display(1, valid(0)));
    assert!(runtime.state().messages_for("name").is_empty());
    assert!(!runtime.state().has_errors());
}

/// Verifies conversion failures keep the submitted text.
#[test]
fn conversion_failures_keep_the_raw_value() {
    let definition = wizard();
    let second = past_first_page(&definition);
    let audit = MemoryAuditSink::new();
    let mut runtime = runtime(&definition, &audit);
    let (outcome, _) = runtime.handle(&carry(&second).with_value("age", "twelve").submitting(1)).unwrap();
    assert!(matches!(outcome, RuntimeOutcome::DisplayPage { page_index: 1, .. }));
    assert_eq!(runtime.state().value("age"), Some(&json!("twelve")));
    assert_eq!(runtime.state().messages_for("age")[0].code, "property_mapping");
}

/// Verifies integer and checkbox values are stored typed.
#[test]
fn integers_and_checkboxes_are_converted() {
    let definition = wizard();
    let second = past_first_page(&definition);
    let audit = MemoryAuditSink::new();
    let mut runtime = runtime(&definition, &audit);
    let (outcome, _) = runtime.handle(&carry(&second).with_value("age", " 42 ").submitting(1)).unwrap();
    assert_eq!(outcome, display(2, valid(1)));
    assert_eq!(runtime.state().value("age"), Some(&json!(42)));
    assert_eq!(runtime.state().value("newsletter"), Some(&json!(false)));
}

/// Verifies writing null reverts to the default and writes are idempotent.
#[test]
fn null_values_revert_to_defaults() {
    let definition = wizard();
    let audit = MemoryAuditSink::new();
    let mut runtime = runtime(&definition, &audit);
    runtime.initialize(&FormRequest::new()).unwrap();
    assert_eq!(runtime.element_value("age").unwrap(), &json!(18));
    runtime.set_element_value("age", json!(30)).unwrap();
    let once = runtime.state().clone();
    runtime.set_element_value("age", json!(30)).unwrap();
    assert_eq!(runtime.state(), &once);
    assert_eq!(runtime.element_value("age").unwrap(), &json!(30));
    runtime.set_element_value("age", Value::Null).unwrap();
    assert_eq!(runtime.element_value("age").unwrap(), &json!(18));
    assert!(matches!(
        runtime.set_element_value("missing", json!(1)).unwrap_err(),
        FormRuntimeError::ElementNotFound(_)
    ));
}

fn priced() -> FormDefinition {
    build(&json!({
        "identifier": "shop",
        "renderables": [
            { "identifier": "order", "renderables": [
                { "identifier": "price", "type": "SingleLineText", "dataType": "float" }
            ] },
            { "identifier": "review", "renderables": [
                { "identifier": "note", "type": "MultiLineText" }
            ] }
        ]
    }))
}

/// Submits `price` on the first page; returns the stored value and the next response.
fn submit_price(definition: &FormDefinition, price: Value) -> (Value, FormResponse) {
    let (_, first) = send(definition, &FormRequest::new());
    let audit = MemoryAuditSink::new();
    let mut runtime = runtime(definition, &audit);
    let (outcome, second) = runtime.handle(&carry(&first).with_value("price", price).submitting(0)).unwrap();
    assert_eq!(outcome, display(1, valid(0)));
    (runtime.element_value("price").unwrap().clone(), second)
}

/// Reads `price` back after restoring the state carried by `response`.
fn restored_price(definition: &FormDefinition, response: &FormResponse) -> Value {
    let audit = MemoryAuditSink::new();
    let mut runtime = runtime(definition, &audit);
    runtime.handle(&carry(response)).unwrap();
    runtime.element_value("price").unwrap().clone()
}

/// Verifies a whole-number float keeps its value on the next request.
#[test]
fn float_values_survive_request_round_trips() {
    let definition = priced();
    let (stored, second) = submit_price(&definition, json!("5.0"));
    assert_eq!(stored.as_f64(), Some(5.0));
    assert_eq!(restored_price(&definition, &second), stored);

    let (stored, second) = submit_price(&definition, json!("0.1"));
    assert_eq!(stored, json!(0.1));
    assert_eq!(restored_price(&definition, &second), stored);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Verifies any finite submitted float reads back identically after a signed round trip.
    #[test]
    fn submitted_floats_read_back_identically(price in any::<f64>().prop_filter("finite", |value| value.is_finite())) {
        let definition = priced();
        let (stored, second) = submit_price(&definition, Value::from(price));
        prop_assert_eq!(stored.as_f64(), Some(price));
        prop_assert_eq!(restored_price(&definition, &second), stored);
    }
}

/// Verifies a filled honeypot keeps the visitor on the page.
#[test]
fn filled_honeypots_block_the_page() {
    let definition = build(&json!({
        "identifier": "guarded",
        "renderables": [
            { "identifier": "page", "properties": { "honeypot": true }, "renderables": [
                { "identifier": "name", "type": "SingleLineText" }
            ] },
            { "identifier": "done" }
        ]
    }));
    let (_, first) = send(&definition, &FormRequest::new());
    let request = carry(&first).with_value("name", "bot").with_value("page-honeypot", "spam").submitting(0);
    let (outcome, _) = send(&definition, &request);
    assert_eq!(
        outcome,
        display(
            0,
            Some(SubmissionReport {
                page_index: 0,
                error_count: 1
            })
        )
    );
    let (outcome, _) = send(&definition, &carry(&first).with_value("name", "human").submitting(0));
    assert_eq!(outcome, display(1, valid(0)));
}

/// Verifies password confirmation collapses only when both entries match.
#[test]
fn password_confirmation_must_match() {
    let definition = build(&json!({
        "identifier": "signup",
        "renderables": [
            { "identifier": "page", "renderables": [
                { "identifier": "password", "type": "PasswordWithConfirmation" }
            ] },
            { "identifier": "done" }
        ]
    }));
    let (_, first) = send(&definition, &FormRequest::new());
    let mismatch = carry(&first).with_value("password", json!({ "password": "s3cret", "confirmation": "secret" })).submitting(0);
    let audit = MemoryAuditSink::new();
    let mut runtime = runtime(&definition, &audit);
    let (outcome, _) = runtime.handle(&mismatch).unwrap();
    assert!(matches!(outcome, RuntimeOutcome::DisplayPage { page_index: 0, .. }));
    assert_eq!(runtime.state().messages_for("password")[0].code, "passwords_mismatch");
    assert!(runtime.state().value("password").is_none());

    let matching = carry(&first).with_value("password", json!({ "password": " s3cret", "confirmation": " s3cret" })).submitting(0);
    let audit = MemoryAuditSink::new();
    let mut runtime = self::runtime(&definition, &audit);
    let (outcome, _) = runtime.handle(&matching).unwrap();
    assert_eq!(outcome, display(1, valid(0)));
    assert_eq!(runtime.state().value("password"), Some(&json!(" s3cret")));
}

// ============================================================================
// SECTION: Finishing
// ============================================================================

/// Verifies finishing runs the finishers and writes no state.
#[test]
fn last_page_submission_runs_finishers_and_writes_no_state() {
    let definition = wizard();
    let second = past_first_page(&definition);
    let (_, third) = send(&definition, &carry(&second).submitting(1));

    let audit = MemoryAuditSink::new();
    let mut runtime = runtime(&definition, &audit);
    let (outcome, response) = runtime.handle(&carry(&third).with_value("comment", "hi").submitting(2)).unwrap();
    assert_eq!(
        outcome,
        RuntimeOutcome::Finished {
            finishers_run: 1,
            cancelled: false
        }
    );
    assert_eq!(runtime.phase(), RuntimePhase::Finished);
    assert_eq!(response.confirmation.as_deref(), Some("Thanks Ada"));
    assert!(!response.hidden_fields.contains_key(STATE_FIELD));
    assert!(audit.kinds().contains(&FormAuditKind::FormFinished));
    assert!(!audit.kinds().iter().any(|kind| matches!(kind, FormAuditKind::StateWritten { .. })));

    let mut response = FormResponse::new();
    let err = runtime.process(&FormRequest::new(), &mut response).unwrap_err();
    assert!(matches!(err, FormRuntimeError::Finished));
    assert!(runtime.render_context().is_err());
}

fn recording_finisher(identifier: &str, log: &Arc<Mutex<Vec<String>>>, cancel: bool) -> ClosureFinisher {
    let log = Arc::clone(log);
    let name = identifier.to_string();
    ClosureFinisher::new(identifier, move |context| {
        log.lock().map_err(|_| FinisherError::Failed("log poisoned".to_string()))?.push(name.clone());
        if cancel {
            context.cancel();
        }
        Ok(())
    })
}

fn single_page(finishers: Vec<ClosureFinisher>) -> FormDefinition {
    let preset = PresetResolver::new(default_presets()).resolve("default").unwrap();
    let environment = BuildEnvironment::from_preset(&preset).unwrap();
    let mut builder = FormDefinitionBuilder::new(FormId::new("chain"), environment).unwrap();
    let page = builder.create_page("page", None).unwrap();
    builder.create_element(page, "name", "SingleLineText").unwrap();
    for finisher in finishers {
        builder.add_finisher(Arc::new(finisher));
    }
    builder.build().unwrap()
}

/// Verifies a cancelling finisher stops every later finisher.
#[test]
fn cancelling_finisher_stops_the_chain() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let definition = single_page(vec![
        recording_finisher("A", &log, false),
        recording_finisher("B", &log, true),
        recording_finisher("C", &log, false),
    ]);
    let (_, first) = send(&definition, &FormRequest::new());

    let audit = MemoryAuditSink::new();
    let (outcome, _) = runtime(&definition, &audit).handle(&carry(&first).with_value("name", "x").submitting(0)).unwrap();
    assert_eq!(
        outcome,
        RuntimeOutcome::Finished {
            finishers_run: 2,
            cancelled: true
        }
    );
    assert_eq!(*log.lock().unwrap(), vec!["A".to_string(), "B".to_string()]);
    assert!(audit.kinds().contains(&FormAuditKind::FinisherChainCancelled {
        finisher: "B".to_string()
    }));
}

/// Verifies a failing finisher aborts the request.
#[test]
fn failing_finisher_is_reported() {
    let definition = single_page(vec![ClosureFinisher::new("Boom", |_| Err(FinisherError::Failed("smtp down".to_string())))]);
    let (_, first) = send(&definition, &FormRequest::new());
    let audit = MemoryAuditSink::new();
    let err = runtime(&definition, &audit).handle(&carry(&first).with_value("name", "x").submitting(0)).unwrap_err();
    assert!(matches!(err, FormRuntimeError::FinisherFailed { ref identifier, .. } if identifier == "Boom"));
}

/// Verifies the redirect finisher sets the response redirect.
#[test]
fn redirect_finisher_sets_the_response() {
    let definition = build(&json!({
        "identifier": "redirecting",
        "finishers": [{ "identifier": "Redirect", "options": { "uri": "/thanks" } }],
        "renderables": [{ "identifier": "page", "renderables": [
            { "identifier": "name", "type": "SingleLineText" }
        ] }]
    }));
    let (_, first) = send(&definition, &FormRequest::new());
    let (_, response) = send(&definition, &carry(&first).with_value("name", "x").submitting(0));
    let redirect = response.redirect.unwrap();
    assert_eq!(redirect.uri, "/thanks");
    assert_eq!(redirect.status, 303);
}

// ============================================================================
// SECTION: State Integrity
// ============================================================================

fn forged(response: &FormResponse, edit: impl FnOnce(&mut Value)) -> FormRequest {
    let blob = response.hidden_fields.get(STATE_FIELD).unwrap();
    let (payload, signature) = blob.split_once('.').unwrap();
    let mut envelope: Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();
    edit(&mut envelope);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&envelope).unwrap());
    FormRequest::new().with_hidden_field(STATE_FIELD, format!("{payload}.{signature}"))
}

/// Verifies an edited snapshot fails signature verification.
#[test]
fn tampered_state_is_rejected() {
    let definition = wizard();
    let second = past_first_page(&definition);
    let request = forged(&second, |envelope| {
        envelope["state"]["last_displayed_page_index"] = json!(2);
    });
    let audit = MemoryAuditSink::new();
    let err = runtime(&definition, &audit).handle(&request).unwrap_err();
    assert!(matches!(err, FormRuntimeError::StateIntegrity(StateIntegrityError::Signature(_))));
}

/// Verifies an unparseable state blob is rejected.
#[test]
fn garbage_state_is_rejected() {
    let definition = wizard();
    let request = FormRequest::new().with_hidden_field(STATE_FIELD, "not-a-signed-blob");
    let audit = MemoryAuditSink::new();
    let err = runtime(&definition, &audit).handle(&request).unwrap_err();
    assert!(matches!(err, FormRuntimeError::StateIntegrity(StateIntegrityError::Signature(_))));
}

/// Verifies state signed with another key is rejected.
#[test]
fn state_signed_by_another_key_is_rejected() {
    let definition = wizard();
    let second = past_first_page(&definition);
    let audit = MemoryAuditSink::new();
    let mut runtime = FormRuntime::new(
        &definition,
        Ed25519StateSigner::from_seed(&[9; 32]),
        HiddenFieldTransport::default(),
        &audit,
        RuntimeConfig::default(),
    );
    let err = runtime.handle(&carry(&second)).unwrap_err();
    assert!(matches!(err, FormRuntimeError::StateIntegrity(StateIntegrityError::Signature(_))));
}

/// Verifies state written by another form is rejected.
#[test]
fn state_from_another_form_is_rejected() {
    let definition = wizard();
    let second = past_first_page(&definition);
    let other = build(&json!({
        "identifier": "other",
        "renderables": [{ "identifier": "page" }]
    }));
    let audit = MemoryAuditSink::new();
    let err = runtime(&other, &audit).handle(&carry(&second)).unwrap_err();
    assert!(matches!(err, FormRuntimeError::StateIntegrity(StateIntegrityError::FormMismatch { .. })));
}

/// Verifies state written by an older definition is rejected.
#[test]
fn state_from_a_changed_definition_is_rejected() {
    let definition = wizard();
    let second = past_first_page(&definition);
    let changed = build(&json!({
        "identifier": "wizard",
        "renderables": [{ "identifier": "step-1" }, { "identifier": "step-2" }]
    }));
    let audit = MemoryAuditSink::new();
    let err = runtime(&changed, &audit).handle(&carry(&second)).unwrap_err();
    assert!(matches!(err, FormRuntimeError::StateIntegrity(StateIntegrityError::DefinitionMismatch)));
}

/// Verifies the state size limit applies to inbound and outbound blobs.
#[test]
fn oversized_state_is_rejected_both_ways() {
    let definition = wizard();
    let audit = MemoryAuditSink::new();
    let tiny = RuntimeConfig {
        max_state_bytes: 16,
    };
    let mut outbound = FormRuntime::new(&definition, signer(), HiddenFieldTransport::default(), &audit, tiny);
    let err = outbound.handle(&FormRequest::new()).unwrap_err();
    assert!(matches!(err, FormRuntimeError::StateTooLarge { limit: 16, .. }));

    let (_, first) = send(&definition, &FormRequest::new());
    let mut inbound = FormRuntime::new(&definition, signer(), HiddenFieldTransport::default(), &audit, tiny);
    let err = inbound.handle(&carry(&first)).unwrap_err();
    assert!(matches!(err, FormRuntimeError::StateIntegrity(StateIntegrityError::TooLarge { limit: 16 })));
}

/// Verifies the transport writes to the configured field name.
#[test]
fn custom_state_field_is_honoured() {
    let definition = wizard();
    let audit = MemoryAuditSink::new();
    let transport = HiddenFieldTransport::new("form_state");
    let mut runtime = FormRuntime::new(&definition, signer(), transport, &audit, RuntimeConfig::default());
    let (_, response) = runtime.handle(&FormRequest::new()).unwrap();
    assert!(response.hidden_fields.contains_key("form_state"));
    assert!(!response.hidden_fields.contains_key(STATE_FIELD));
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Renders each element as `identifier=value [codes]`.
struct LineRenderer;

impl FormRenderer for LineRenderer {
    type Output = Vec<String>;

    fn render(&self, context: &RenderContext<'_>) -> Result<Self::Output, RenderError> {
        let mut lines = vec![format!(
            "{}#{} prev={} next={}",
            context.form_id, context.page_index, context.has_previous_page, context.has_next_page
        )];
        for element in &context.elements {
            let value = element.value.map_or_else(|| "-".to_string(), Value::to_string);
            let codes: Vec<&str> = element.messages.iter().map(|message| message.code.as_str()).collect();
            lines.push(format!("{}={} [{}]", element.element.identifier(), value, codes.join(",")));
        }
        Ok(lines)
    }
}

/// Verifies renderers receive values, defaults, and messages.
#[test]
fn renderer_sees_values_defaults_and_messages() {
    let definition = wizard();
    let (_, first) = send(&definition, &FormRequest::new());
    let audit = MemoryAuditSink::new();
    let mut runtime = runtime(&definition, &audit);
    runtime.handle(&carry(&first).with_value("name", "Al").submitting(0)).unwrap();
    let lines = runtime.render_with(&LineRenderer).unwrap();
    assert_eq!(
        lines,
        vec![
            "wizard#0 prev=false next=true".to_string(),
            "name=\"Al\" [string_length]".to_string(),
            "email=- []".to_string(),
        ]
    );
}

/// Verifies the render context reports previous and next pages.
#[test]
fn render_context_reports_page_neighbours() {
    let definition = wizard();
    let second = past_first_page(&definition);
    let audit = MemoryAuditSink::new();
    let mut runtime = runtime(&definition, &audit);
    runtime.handle(&carry(&second)).unwrap();
    let context = runtime.render_context().unwrap();
    assert_eq!(context.page_index, 1);
    assert_eq!(context.page.identifier().as_str(), "step-2");
    assert!(context.has_previous_page);
    assert!(context.has_next_page);
    assert_eq!(context.elements[0].value, Some(&json!(18)));
    assert_eq!(context.elements[1].value, Some(&json!(false)));
}
