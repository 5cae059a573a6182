// src/steps/definition.rs
// =============================================================================
// Step metadata advertised in the manifest, and helpers for decoding the
// loosely typed step data the host sends.
// =============================================================================

use crate::steps::response::RunStepResponse;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    Action,
    Validation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    String,
    Numeric,
    Email,
    AnyScalar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Optionality {
    Required,
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordType {
    Table,
    Binary,
    Keyvalue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDefinition {
    pub key: &'static str,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub optionality: Optionality,
    pub description: &'static str,
}

impl FieldDefinition {
    pub const fn required(key: &'static str, field_type: FieldType, description: &'static str) -> Self {
        Self {
            key,
            field_type,
            optionality: Optionality::Required,
            description,
        }
    }

    pub const fn optional(key: &'static str, field_type: FieldType, description: &'static str) -> Self {
        Self {
            key,
            field_type,
            optionality: Optionality::Optional,
            description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedRecord {
    pub id: &'static str,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub fields: Vec<FieldDefinition>,
    pub dynamic_fields: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    pub step_id: &'static str,
    pub name: &'static str,
    pub expression: &'static str,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub expected_fields: Vec<FieldDefinition>,
    pub expected_records: Vec<ExpectedRecord>,
}

// Decodes step data into a typed request, or an error verdict explaining
// what was wrong with it
pub fn decode_request<T: DeserializeOwned>(data: &Value) -> Result<T, RunStepResponse> {
    serde_json::from_value(data.clone()).map_err(|e| {
        RunStepResponse::error("Invalid step data: %s", vec![json!(e.to_string())])
    })
}

// Hosts send numbers as doubles (1.0) and sometimes as strings ("1").
// Accept all of those for whole, non-negative numbers.
pub fn whole_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_whole_number(&value).ok_or_else(|| {
        de::Error::custom(format!("expected a whole number, got {}", value))
    })
}

pub fn optional_whole_number<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => parse_whole_number(&value)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("expected a whole number, got {}", value))),
    }
}

fn parse_whole_number(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// Renders any scalar (string, number, bool) as text
pub fn scalar_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(de::Error::custom(format!("expected a scalar, got {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::response::Outcome;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(deserialize_with = "whole_number")]
        position: u64,
        #[serde(default, deserialize_with = "optional_whole_number")]
        limit: Option<u64>,
        #[serde(deserialize_with = "scalar_text")]
        expectation: String,
    }

    #[test]
    fn test_whole_numbers_from_host_shapes() {
        for raw in [json!(2), json!(2.0), json!("2")] {
            let sample: Sample =
                decode_request(&json!({ "position": raw, "expectation": "x" })).unwrap();
            assert_eq!(sample.position, 2);
            assert_eq!(sample.limit, None);
        }
    }

    #[test]
    fn test_fractional_position_is_an_error_verdict() {
        let err = decode_request::<Sample>(&json!({ "position": 1.5, "expectation": "x" }))
            .unwrap_err();
        assert_eq!(err.outcome, Outcome::Error);
        assert!(err.rendered_message().starts_with("Invalid step data:"));
    }

    #[test]
    fn test_scalar_text() {
        let sample: Sample =
            decode_request(&json!({ "position": 1, "limit": "3", "expectation": 42 })).unwrap();
        assert_eq!(sample.expectation, "42");
        assert_eq!(sample.limit, Some(3));
    }
}
