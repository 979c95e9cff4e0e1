// crates/form-engine-core/src/core/processing.rs
// ============================================================================
// Module: Processing Rules
// Description: Per-element property mapping and validation.
// Purpose: Turn raw submitted values into typed, validated values.
// Dependencies: crate::core::{messages, validation}, serde, serde_json
// ============================================================================

//! ## Overview
//! A [`ProcessingRule`] first converts the raw submission to the element's
//! [`DataType`] and then runs its validators. A conversion failure produces a
//! `property_mapping` error, keeps the raw value, and skips validation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Number;
use serde_json::Value;

use crate::core::messages::ProcessingMessage;
use crate::core::validation::Validator;
use crate::core::validation::run_validators;

// ============================================================================
// SECTION: Data Types
// ============================================================================

/// Target type of an element value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Text value.
    String,
    /// Signed integer value.
    Integer,
    /// Floating-point value.
    Float,
    /// Boolean value.
    Boolean,
    /// List of values.
    Array,
    /// Map of values.
    Object,
    /// Accepted unchanged.
    #[default]
    Any,
}

/// Options applied before type conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MappingConfiguration {
    /// Trim surrounding whitespace from text.
    pub trim: bool,
    /// Treat empty text as no value.
    pub empty_as_null: bool,
}

impl Default for MappingConfiguration {
    fn default() -> Self {
        Self {
            trim: true,
            empty_as_null: true,
        }
    }
}

// ============================================================================
// SECTION: Processing Rule
// ============================================================================

/// Result of processing one submitted value.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingOutcome {
    /// Value to store in state.
    pub value: Value,
    /// Messages produced by conversion or validation.
    pub messages: Vec<ProcessingMessage>,
}

impl ProcessingOutcome {
    /// Returns true when any message is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(ProcessingMessage::is_error)
    }
}

/// Conversion and validation settings for one element.
#[derive(Debug, Clone, Default)]
pub struct ProcessingRule {
    /// Target data type.
    pub data_type: DataType,
    /// Validators run after conversion.
    pub validators: Vec<Arc<dyn Validator>>,
    /// Pre-conversion mapping options.
    pub mapping: MappingConfiguration,
}

impl ProcessingRule {
    /// Creates a rule for `data_type` with no validators.
    #[must_use]
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            ..Self::default()
        }
    }

    /// Appends a validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validators.push(validator);
        self
    }

    /// Converts `raw` to the rule's data type.
    ///
    /// # Errors
    ///
    /// Returns a `property_mapping` [`ProcessingMessage`] when the value
    /// cannot be represented as the target type.
    pub fn convert(&self, raw: &Value) -> Result<Value, ProcessingMessage> {
        let mapped = self.apply_mapping(raw);
        if mapped.is_null() {
            return Ok(Value::Null);
        }
        match self.data_type {
            DataType::Any => Ok(mapped),
            DataType::String => to_string_value(&mapped),
            DataType::Integer => to_integer_value(&mapped),
            DataType::Float => to_float_value(&mapped),
            DataType::Boolean => to_boolean_value(&mapped),
            DataType::Array => match mapped {
                Value::Array(_) => Ok(mapped),
                other => Ok(Value::Array(vec![other])),
            },
            DataType::Object => match mapped {
                Value::Object(_) => Ok(mapped),
                _ => Err(mapping_error("an object")),
            },
        }
    }

    /// Converts and validates `raw`.
    #[must_use]
    pub fn process(&self, raw: &Value) -> ProcessingOutcome {
        match self.convert(raw) {
            Ok(value) => {
                let messages = run_validators(&self.validators, &value);
                ProcessingOutcome {
                    value,
                    messages,
                }
            }
            Err(message) => ProcessingOutcome {
                value: raw.clone(),
                messages: vec![message],
            },
        }
    }

    /// Applies trimming and empty handling to text input.
    fn apply_mapping(&self, raw: &Value) -> Value {
        let Value::String(text) = raw else {
            return raw.clone();
        };
        let text = if self.mapping.trim { text.trim() } else { text.as_str() };
        if text.is_empty() && self.mapping.empty_as_null {
            Value::Null
        } else {
            Value::String(text.to_string())
        }
    }
}

// ============================================================================
// SECTION: Conversions
// ============================================================================

/// Builds the standard conversion failure message.
fn mapping_error(expected: &str) -> ProcessingMessage {
    ProcessingMessage::error("property_mapping", format!("The value could not be converted to {expected}."))
}

/// Converts scalars to text.
fn to_string_value(value: &Value) -> Result<Value, ProcessingMessage> {
    match value {
        Value::String(_) => Ok(value.clone()),
        Value::Number(number) => Ok(Value::String(number.to_string())),
        Value::Bool(flag) => Ok(Value::String(flag.to_string())),
        _ => Err(mapping_error("text")),
    }
}

/// Converts numbers and numeric text to an integer.
fn to_integer_value(value: &Value) -> Result<Value, ProcessingMessage> {
    match value {
        Value::Number(number) if number.is_i64() || number.is_u64() => Ok(value.clone()),
        Value::String(text) => {
            text.parse::<i64>().map(Value::from).map_err(|_| mapping_error("an integer"))
        }
        _ => Err(mapping_error("an integer")),
    }
}

/// Converts numbers and numeric text to a float.
fn to_float_value(value: &Value) -> Result<Value, ProcessingMessage> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.parse::<f64>().ok(),
        _ => None,
    };
    parsed.and_then(Number::from_f64).map(Value::Number).ok_or_else(|| mapping_error("a number"))
}

/// Converts booleans and common boolean spellings.
fn to_boolean_value(value: &Value) -> Result<Value, ProcessingMessage> {
    match value {
        Value::Bool(_) => Ok(value.clone()),
        Value::Number(number) => match number.as_i64() {
            Some(0) => Ok(Value::Bool(false)),
            Some(1) => Ok(Value::Bool(true)),
            _ => Err(mapping_error("a boolean")),
        },
        Value::String(text) => match text.to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => Ok(Value::Bool(true)),
            "0" | "false" | "off" | "no" => Ok(Value::Bool(false)),
            _ => Err(mapping_error("a boolean")),
        },
        _ => Err(mapping_error("a boolean")),
    }
}
