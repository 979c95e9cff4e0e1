// crates/form-engine-core/src/core/validation.rs
// ============================================================================
// Module: Validators
// Description: Validator capability, built-in validators, and their registry.
// Purpose: Check converted element values and report processing messages.
// Dependencies: crate::core::{merge, messages}, serde_json
// ============================================================================

//! ## Overview
//! Validators run after property mapping and never short-circuit each other.
//! Except for [`NotEmptyValidator`], validators accept empty values so an
//! optional field only fails on content that is actually present.
//!
//! Presets declare validators under `validatorsDefinition` as
//! `{ implementation, options }`; the [`ValidatorRegistry`] maps an
//! implementation name to a constructor taking the merged options.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::core::merge::ConfigMap;
use crate::core::messages::ProcessingMessage;

// ============================================================================
// SECTION: Validator Capability
// ============================================================================

/// A check applied to a converted element value.
pub trait Validator: Send + Sync + fmt::Debug {
    /// Implementation name used in messages and logs.
    fn name(&self) -> &str;

    /// Returns true when empty values skip this validator.
    fn accepts_empty(&self) -> bool {
        true
    }

    /// Returns a message when `value` is invalid.
    fn check(&self, value: &Value) -> Option<ProcessingMessage>;
}

/// Runs every validator against `value` and collects all messages.
#[must_use]
pub fn run_validators(validators: &[Arc<dyn Validator>], value: &Value) -> Vec<ProcessingMessage> {
    let empty = is_empty_value(value);
    validators
        .iter()
        .filter(|validator| !(empty && validator.accepts_empty()))
        .filter_map(|validator| validator.check(value))
        .collect()
}

/// Returns true for `null`, empty strings, empty lists, and empty maps.
#[must_use]
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

// ============================================================================
// SECTION: Built-in Validators
// ============================================================================

/// Requires a non-empty value.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotEmptyValidator;

impl Validator for NotEmptyValidator {
    fn name(&self) -> &str {
        "not_empty"
    }

    fn accepts_empty(&self) -> bool {
        false
    }

    fn check(&self, value: &Value) -> Option<ProcessingMessage> {
        is_empty_value(value)
            .then(|| ProcessingMessage::error("not_empty", "This property is required."))
    }
}

/// Requires the value to stay empty (honeypot fields).
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyValidator;

impl Validator for EmptyValidator {
    fn name(&self) -> &str {
        "empty"
    }

    fn check(&self, value: &Value) -> Option<ProcessingMessage> {
        (!is_empty_value(value))
            .then(|| ProcessingMessage::error("empty", "This property must be empty."))
    }
}

/// Bounds the character length of a string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StringLengthValidator {
    /// Minimum number of characters.
    pub minimum: Option<u64>,
    /// Maximum number of characters.
    pub maximum: Option<u64>,
}

impl Validator for StringLengthValidator {
    fn name(&self) -> &str {
        "string_length"
    }

    fn check(&self, value: &Value) -> Option<ProcessingMessage> {
        let Some(text) = value.as_str() else {
            return Some(ProcessingMessage::error("string_length", "A text value is expected."));
        };
        let length = text.chars().count() as u64;
        check_bounds("string_length", "characters", length, self.minimum, self.maximum)
    }
}

/// Bounds a numeric value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumberRangeValidator {
    /// Inclusive lower bound.
    pub minimum: Option<f64>,
    /// Inclusive upper bound.
    pub maximum: Option<f64>,
}

impl Validator for NumberRangeValidator {
    fn name(&self) -> &str {
        "number_range"
    }

    fn check(&self, value: &Value) -> Option<ProcessingMessage> {
        let Some(number) = numeric(value) else {
            return Some(ProcessingMessage::error("number_range", "A number is expected."));
        };
        if self.minimum.is_some_and(|minimum| number < minimum)
            || self.maximum.is_some_and(|maximum| number > maximum)
        {
            return Some(ProcessingMessage::error(
                "number_range",
                format!(
                    "Please enter a number between {} and {}.",
                    describe_bound(self.minimum),
                    describe_bound(self.maximum)
                ),
            ));
        }
        None
    }
}

/// Requires an integer value (or an integer-shaped string).
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerValidator;

impl Validator for IntegerValidator {
    fn name(&self) -> &str {
        "integer"
    }

    fn check(&self, value: &Value) -> Option<ProcessingMessage> {
        let valid = match value {
            Value::Number(number) => number.is_i64() || number.is_u64(),
            Value::String(text) => text.trim().parse::<i64>().is_ok(),
            _ => false,
        };
        (!valid).then(|| ProcessingMessage::error("integer", "A valid integer number is expected."))
    }
}

/// Requires a numeric value (or a number-shaped string).
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberValidator;

impl Validator for NumberValidator {
    fn name(&self) -> &str {
        "number"
    }

    fn check(&self, value: &Value) -> Option<ProcessingMessage> {
        numeric(value)
            .is_none()
            .then(|| ProcessingMessage::error("number", "A valid number is expected."))
    }
}

/// Requires a plausible email address.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailAddressValidator;

impl Validator for EmailAddressValidator {
    fn name(&self) -> &str {
        "email_address"
    }

    fn check(&self, value: &Value) -> Option<ProcessingMessage> {
        let valid = value.as_str().is_some_and(is_plausible_email);
        (!valid).then(|| ProcessingMessage::error("email_address", "Please specify a valid email address."))
    }
}

/// Requires ASCII letters and digits only.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlphanumericValidator;

impl Validator for AlphanumericValidator {
    fn name(&self) -> &str {
        "alphanumeric"
    }

    fn check(&self, value: &Value) -> Option<ProcessingMessage> {
        let valid = value.as_str().is_some_and(|text| text.chars().all(|c| c.is_ascii_alphanumeric()));
        (!valid).then(|| {
            ProcessingMessage::error("alphanumeric", "Only letters and digits are allowed.")
        })
    }
}

/// Bounds the number of entries in a list or map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountValidator {
    /// Minimum number of entries.
    pub minimum: Option<u64>,
    /// Maximum number of entries.
    pub maximum: Option<u64>,
}

impl Validator for CountValidator {
    fn name(&self) -> &str {
        "count"
    }

    fn check(&self, value: &Value) -> Option<ProcessingMessage> {
        let count = match value {
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            _ => return Some(ProcessingMessage::error("count", "A list of values is expected.")),
        };
        check_bounds("count", "entries", count as u64, self.minimum, self.maximum)
    }
}

// ============================================================================
// SECTION: Validator Registry
// ============================================================================

/// Builds a validator from merged options.
pub type ValidatorConstructor = fn(&ConfigMap) -> Result<Arc<dyn Validator>, String>;

/// Implementation name to validator constructor.
#[derive(Debug, Clone)]
pub struct ValidatorRegistry {
    /// Registered constructors.
    constructors: BTreeMap<String, ValidatorConstructor>,
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ValidatorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Creates a registry holding the built-in validators.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("not_empty", |_| Ok(Arc::new(NotEmptyValidator)));
        registry.register("empty", |_| Ok(Arc::new(EmptyValidator)));
        registry.register("integer", |_| Ok(Arc::new(IntegerValidator)));
        registry.register("number", |_| Ok(Arc::new(NumberValidator)));
        registry.register("email_address", |_| Ok(Arc::new(EmailAddressValidator)));
        registry.register("alphanumeric", |_| Ok(Arc::new(AlphanumericValidator)));
        registry.register("string_length", |options| {
            Ok(Arc::new(StringLengthValidator {
                minimum: option_u64(options, "minimum")?,
                maximum: option_u64(options, "maximum")?,
            }))
        });
        registry.register("count", |options| {
            Ok(Arc::new(CountValidator {
                minimum: option_u64(options, "minimum")?,
                maximum: option_u64(options, "maximum")?,
            }))
        });
        registry.register("number_range", |options| {
            Ok(Arc::new(NumberRangeValidator {
                minimum: option_f64(options, "minimum")?,
                maximum: option_f64(options, "maximum")?,
            }))
        });
        registry
    }

    /// Registers or replaces a constructor.
    pub fn register(&mut self, implementation: impl Into<String>, constructor: ValidatorConstructor) {
        self.constructors.insert(implementation.into(), constructor);
    }

    /// Returns true when `implementation` is registered.
    #[must_use]
    pub fn contains(&self, implementation: &str) -> bool {
        self.constructors.contains_key(implementation)
    }

    /// Constructs a validator, returning `None` for unknown implementations.
    ///
    /// # Errors
    ///
    /// Returns the constructor's message when options are invalid.
    pub fn create(
        &self,
        implementation: &str,
        options: &ConfigMap,
    ) -> Option<Result<Arc<dyn Validator>, String>> {
        self.constructors.get(implementation).map(|constructor| constructor(options))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads an optional non-negative integer option.
fn option_u64(options: &ConfigMap, key: &str) -> Result<Option<u64>, String> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            value.as_u64().map(Some).ok_or_else(|| format!("option {key} must be a non-negative integer"))
        }
    }
}

/// Reads an optional numeric option.
fn option_f64(options: &ConfigMap, key: &str) -> Result<Option<f64>, String> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_f64().map(Some).ok_or_else(|| format!("option {key} must be a number")),
    }
}

/// Returns the numeric reading of a number or number-shaped string.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|number| number.is_finite()),
        _ => None,
    }
}

/// Renders an optional bound for messages.
fn describe_bound(bound: Option<f64>) -> String {
    bound.map_or_else(|| "any".to_string(), |value| value.to_string())
}

/// Checks `actual` against optional inclusive bounds.
fn check_bounds(
    code: &str,
    unit: &str,
    actual: u64,
    minimum: Option<u64>,
    maximum: Option<u64>,
) -> Option<ProcessingMessage> {
    if let Some(minimum) = minimum
        && actual < minimum
    {
        return Some(ProcessingMessage::error(code, format!("At least {minimum} {unit} are required.")));
    }
    if let Some(maximum) = maximum
        && actual > maximum
    {
        return Some(ProcessingMessage::error(code, format!("At most {maximum} {unit} are allowed.")));
    }
    None
}

/// Structural email check: one `@`, non-empty local part, dotted domain.
fn is_plausible_email(text: &str) -> bool {
    if text.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}
